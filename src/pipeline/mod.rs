//! Pipeline module: everything between a user action and a published result.
//!
//! # Architecture
//!
//! ```text
//! PipelineCommand (mpsc, from the widget)
//!        │
//!        ▼
//! PipelineRunner::run()  ← async tokio task
//!        │
//!        ├─ StartCapture  → CaptureSession::start        [Capturing]
//!        ├─ StopCapture / deadline
//!        │     └─ CaptureSession::stop → WavArtifact "recording.wav" ─┐
//!        └─ SubmitFile(path) → AudioInput ─────────────────────────────┤
//!                                                                      ▼
//!                                    IngestCoordinator::ingest   [Processing]
//!                                      ├─ spawn_blocking(normalize)
//!                                      ├─ Classifier::classify
//!                                      └─ ResultBroadcaster::publish ("emotionResult")
//!
//! SharedState (Arc<Mutex<AppState>>) ←─── read by egui update() each frame
//! ```

pub mod coordinator;
pub mod notify;
pub mod runner;
pub mod state;

// ---------------------------------------------------------------------------
// Public re-exports
// ---------------------------------------------------------------------------

pub use coordinator::{
    mime_for_path, normalize, AudioInput, IngestCoordinator, IngestError, AUDIO_EXTENSIONS,
};
pub use notify::{ResultBroadcaster, EMOTION_RESULT};
pub use runner::{PipelineCommand, PipelineRunner, CAPTURE_FILENAME};
pub use state::{new_shared_state, AppState, PipelineState, SharedState};
