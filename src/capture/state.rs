//! Capture session state machine.
//!
//! ```text
//! Idle ──Start──▶ Capturing ──Stop / CountdownElapsed──▶ Stopping ──Released──▶ Idle
//! ```
//!
//! Every other (state, signal) pair is a no-op: a second `Start` while
//! capturing does not reopen the device, a `Stop` while idle does nothing,
//! and a countdown that fires after the session has already stopped cannot
//! stop it again.

/// Phase of the single process-wide capture session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CaptureSessionState {
    #[default]
    Idle,
    Capturing,
    Stopping,
}

/// Inputs that drive [`CaptureSessionState`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionSignal {
    /// External start request.
    Start,
    /// External stop request.
    Stop,
    /// The recording ceiling was reached.
    CountdownElapsed,
    /// The input stream is closed and the buffer has been handed off.
    Released,
}

/// Why a session left `Capturing`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    Requested,
    TimeLimit,
}

impl StopReason {
    pub fn signal(self) -> SessionSignal {
        match self {
            StopReason::Requested => SessionSignal::Stop,
            StopReason::TimeLimit => SessionSignal::CountdownElapsed,
        }
    }
}

impl CaptureSessionState {
    /// The state reached by applying `signal`, or `None` when the signal is a
    /// no-op in the current state.
    ///
    /// ```
    /// use voice_emotion::capture::{CaptureSessionState, SessionSignal};
    ///
    /// let s = CaptureSessionState::Idle;
    /// assert_eq!(s.transition(SessionSignal::Start), Some(CaptureSessionState::Capturing));
    /// assert_eq!(s.transition(SessionSignal::Stop), None);
    /// ```
    pub fn transition(self, signal: SessionSignal) -> Option<CaptureSessionState> {
        use CaptureSessionState::*;
        use SessionSignal::*;

        match (self, signal) {
            (Idle, Start) => Some(Capturing),
            (Capturing, Stop) | (Capturing, CountdownElapsed) => Some(Stopping),
            (Stopping, Released) => Some(Idle),
            _ => None,
        }
    }

    pub fn is_capturing(self) -> bool {
        self == CaptureSessionState::Capturing
    }
}
