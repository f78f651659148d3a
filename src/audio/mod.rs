//! Audio plumbing: microphone capture, chunk buffering, WAV encoding and
//! container decoding.
//!
//! # Pipeline
//!
//! ```text
//! Microphone → cpal callback → downmix_to_mono → AudioChunk → ChunkFanout
//!                                                   ├─▶ SharedSampleBuffer (capture session)
//!                                                   └─▶ TapSet (visualizer)
//!
//! stop → SampleBuffer::merge_and_clear → MergedPcm → encode_wav → WavArtifact
//! upload → decode_audio → DecodedAudio → encode_wav → WavArtifact
//! ```
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use voice_emotion::audio::{ChunkFanout, CpalDriver, InputDriver, SharedSampleBuffer};
//!
//! let fanout = ChunkFanout::new();
//! let buffer = Arc::new(SharedSampleBuffer::new());
//! let _sub = fanout.subscribe(buffer.clone());
//!
//! let driver = CpalDriver::new(None, Some(4096));
//! let mut stream = driver.open(Arc::clone(&fanout)).unwrap();
//! std::thread::sleep(std::time::Duration::from_secs(1));
//! stream.close();
//!
//! println!("captured {} samples", buffer.total_samples());
//! ```

pub mod buffer;
pub mod capture;
pub mod decode;
pub mod downmix;
pub mod wav;

pub use buffer::{MergedPcm, SampleBuffer, SharedSampleBuffer};
pub use capture::{
    AudioCapture, AudioChunk, CaptureError, ChunkFanout, ChunkSubscriber, CpalDriver, CpalStream,
    InputDriver, InputStream, Subscription,
};
pub use decode::{decode_audio, measure_duration, DecodeError, DecodedAudio};
pub use downmix::downmix_to_mono;
pub use wav::{encode_wav, sample_to_i16, wav_filename, WavArtifact, WAV_HEADER_LEN, WAV_MIME};
