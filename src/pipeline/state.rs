//! Pipeline phase and shared application state.
//!
//! [`PipelineState`] is what the widget renders from.  The runner writes it
//! into [`AppState`] behind [`SharedState`]; the egui update loop reads it
//! every frame.  The session-level state machine lives in
//! [`crate::capture::CaptureSessionState`]; this enum only adds the phases
//! the user sees after capture ends.

use std::sync::{Arc, Mutex};
use std::time::Instant;

use crate::config::AppConfig;

// ---------------------------------------------------------------------------
// PipelineState
// ---------------------------------------------------------------------------

/// Phases of one record-or-upload cycle.
///
/// ```text
/// Idle ──start──▶ Capturing ──stop / time limit──▶ Processing ──▶ Result
///   └──────────── file dropped ──────────────────▶ Processing ──▶ Error
/// Result / Error ──next start or drop──▶ …
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PipelineState {
    /// Waiting for a recording or a file.
    #[default]
    Idle,

    /// The microphone is open and chunks are being buffered.
    Capturing,

    /// A submission is being validated, encoded or classified.
    Processing,

    /// The last submission was classified.
    Result,

    /// The last action failed; the message is in [`AppState::error_message`].
    Error,
}

impl PipelineState {
    /// `true` while new submissions should be refused by the widget.
    ///
    /// ```
    /// use voice_emotion::pipeline::PipelineState;
    ///
    /// assert!(!PipelineState::Idle.is_busy());
    /// assert!(PipelineState::Processing.is_busy());
    /// ```
    pub fn is_busy(&self) -> bool {
        matches!(self, PipelineState::Capturing | PipelineState::Processing)
    }

    pub fn label(&self) -> &'static str {
        match self {
            PipelineState::Idle => "Ready",
            PipelineState::Capturing => "Recording",
            PipelineState::Processing => "Analyzing",
            PipelineState::Result => "Done",
            PipelineState::Error => "Error",
        }
    }
}

// ---------------------------------------------------------------------------
// AppState
// ---------------------------------------------------------------------------

/// Everything the widget needs to draw a frame.
pub struct AppState {
    pub pipeline: PipelineState,

    /// Name of the file or recording currently being processed.
    ///
    /// Cleared when a submission succeeds.
    pub pending_file: Option<String>,

    /// Set while capturing; the widget derives the recording timer from it.
    pub capture_started: Option<Instant>,

    /// Recording ceiling shown next to the timer.
    pub max_recording_secs: f32,

    /// Message for `PipelineState::Error`.
    pub error_message: Option<String>,

    /// Transient notice that does not change the phase (e.g. "busy").
    pub notice: Option<String>,

    pub config: AppConfig,
}

impl AppState {
    pub fn new(config: AppConfig) -> Self {
        Self {
            pipeline: PipelineState::Idle,
            pending_file: None,
            capture_started: None,
            max_recording_secs: config.capture.max_recording_secs,
            error_message: None,
            notice: None,
            config,
        }
    }

    /// Seconds since capture started, or `0.0` when not capturing.
    pub fn recording_secs(&self) -> f32 {
        self.capture_started
            .map(|t| t.elapsed().as_secs_f32())
            .unwrap_or(0.0)
    }

    pub fn fail(&mut self, message: impl Into<String>) {
        self.pipeline = PipelineState::Error;
        self.capture_started = None;
        self.error_message = Some(message.into());
    }
}

impl Default for AppState {
    fn default() -> Self {
        Self::new(AppConfig::default())
    }
}

// ---------------------------------------------------------------------------
// SharedState
// ---------------------------------------------------------------------------

/// Thread-safe handle to [`AppState`].  Do not hold the lock across `.await`.
pub type SharedState = Arc<Mutex<AppState>>;

pub fn new_shared_state(config: AppConfig) -> SharedState {
    Arc::new(Mutex::new(AppState::new(config)))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
