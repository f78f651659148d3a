//! Microphone recording sessions.
//!
//! [`CaptureSession`] drives [`CaptureSessionState`] and owns the input
//! stream for the duration of one recording.  Live chunks flow through the
//! shared [`ChunkFanout`](crate::audio::ChunkFanout), so the visualizer can
//! tap the same stream without the session knowing about it.

pub mod session;
pub mod state;

pub use session::{CaptureSession, StartOutcome, StoppedCapture};
pub use state::{CaptureSessionState, SessionSignal, StopReason};
