//! Accumulation of capture chunks for one session.
//!
//! [`SampleBuffer`] keeps every [`AudioChunk`] in arrival order and merges
//! them into one contiguous [`MergedPcm`] when the session stops.  Chunks are
//! held by reference (`Arc<[f32]>`) so `append` is O(1) on the audio thread;
//! the copy happens once, in [`SampleBuffer::merge_and_clear`].
//!
//! # Example
//!
//! ```rust
//! use voice_emotion::audio::{AudioChunk, SampleBuffer};
//!
//! let mut buf = SampleBuffer::new();
//! buf.append(AudioChunk::new(vec![0.1, 0.2], 16_000));
//! buf.append(AudioChunk::new(vec![0.3], 16_000));
//! assert_eq!(buf.total_samples(), 3);
//!
//! let merged = buf.merge_and_clear();
//! assert_eq!(merged, vec![0.1, 0.2, 0.3]);
//! assert!(buf.is_empty());
//! ```

use std::sync::Mutex;

use super::capture::{AudioChunk, ChunkSubscriber};

// ---------------------------------------------------------------------------
// SampleBuffer
// ---------------------------------------------------------------------------

/// Ordered chunk list plus running sample count.
#[derive(Debug, Default)]
pub struct SampleBuffer {
    chunks: Vec<AudioChunk>,
    total_samples: usize,
}

impl SampleBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append `chunk` after everything already buffered.  Contents are not
    /// inspected.
    pub fn append(&mut self, chunk: AudioChunk) {
        self.total_samples += chunk.len();
        self.chunks.push(chunk);
    }

    /// Concatenate all chunks in arrival order and reset the buffer.
    ///
    /// An empty buffer yields an empty vector, meaning "no audio captured".
    pub fn merge_and_clear(&mut self) -> Vec<f32> {
        let mut merged = Vec::with_capacity(self.total_samples);
        for chunk in self.chunks.drain(..) {
            merged.extend_from_slice(&chunk.samples);
        }
        self.total_samples = 0;
        merged
    }

    /// Drop all buffered chunks without merging them.
    pub fn clear(&mut self) {
        self.chunks.clear();
        self.total_samples = 0;
    }

    /// Sum of the lengths of all buffered chunks.
    pub fn total_samples(&self) -> usize {
        self.total_samples
    }

    pub fn chunk_count(&self) -> usize {
        self.chunks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.total_samples == 0
    }

    /// Buffered duration in seconds at `sample_rate` Hz mono.
    pub fn duration_secs(&self, sample_rate: u32) -> f32 {
        if sample_rate == 0 {
            return 0.0;
        }
        self.total_samples as f32 / sample_rate as f32
    }
}

// ---------------------------------------------------------------------------
// SharedSampleBuffer
// ---------------------------------------------------------------------------

/// [`SampleBuffer`] behind a mutex, registered as a fan-out subscriber for
/// the lifetime of a capture session.
#[derive(Debug, Default)]
pub struct SharedSampleBuffer {
    inner: Mutex<SampleBuffer>,
}

impl SharedSampleBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn clear(&self) {
        self.lock().clear();
    }

    pub fn merge_and_clear(&self) -> Vec<f32> {
        self.lock().merge_and_clear()
    }

    pub fn total_samples(&self) -> usize {
        self.lock().total_samples()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, SampleBuffer> {
        match self.inner.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}

impl ChunkSubscriber for SharedSampleBuffer {
    fn on_chunk(&self, chunk: &AudioChunk) {
        self.lock().append(chunk.clone());
    }
}

// ---------------------------------------------------------------------------
// MergedPcm
// ---------------------------------------------------------------------------

/// The single contiguous result of one capture session.
#[derive(Debug, Clone, PartialEq)]
pub struct MergedPcm {
    pub samples: Vec<f32>,
    pub sample_rate: u32,
    pub channels: u16,
}

impl MergedPcm {
    /// Captured PCM is always mono.
    pub fn mono(samples: Vec<f32>, sample_rate: u32) -> Self {
        Self {
            samples,
            sample_rate,
            channels: 1,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn duration_secs(&self) -> f64 {
        if self.sample_rate == 0 || self.channels == 0 {
            return 0.0;
        }
        self.samples.len() as f64 / (self.sample_rate as f64 * self.channels as f64)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
