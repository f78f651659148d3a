//! Pipeline runner: drives capture sessions and submissions from UI commands.
//!
//! [`PipelineRunner`] owns the [`CaptureSession`] and reacts to
//! [`PipelineCommand`]s received over a `tokio::sync::mpsc` channel.
//!
//! # Flow
//!
//! ```text
//! StartCapture
//!   └─▶ session.start()                              [Capturing]
//!
//! StopCapture  ─┐
//! deadline hit ─┴─▶ session.stop() → MergedPcm
//!                     └─▶ encode "recording.wav" ─┐
//! SubmitFile(path) ─▶ read bytes ─────────────────┴─▶ coordinator.ingest  [Processing]
//!                                                       ├─ Ok  → broadcast        [Result]
//!                                                       └─ Err → message          [Error]
//! ```
//!
//! The recording deadline is awaited in the same `select!` as the command
//! channel, so an auto-stop and a manual stop can never both run.

use std::future::Future;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

use tokio::runtime::RuntimeFlavor;
use tokio::sync::mpsc;

use super::coordinator::{AudioInput, IngestCoordinator, IngestError};
use super::state::{PipelineState, SharedState};
use crate::audio::WavArtifact;
use crate::capture::{CaptureSession, StartOutcome, StopReason};

/// Name given to a finished microphone recording.
pub const CAPTURE_FILENAME: &str = "recording.wav";

const MIC_UNAVAILABLE: &str =
    "Unable to access microphone. Please check your permissions and try again.";

/// Requests sent by the widget.
#[derive(Debug, Clone, PartialEq)]
pub enum PipelineCommand {
    StartCapture,
    StopCapture,
    /// Start when idle, stop when capturing.
    ToggleCapture,
    /// A file dropped onto the widget.
    SubmitFile(PathBuf),
    /// Raw bytes already in memory.
    Submit(AudioInput),
}

// ---------------------------------------------------------------------------
// PipelineRunner
// ---------------------------------------------------------------------------

/// Create with [`PipelineRunner::new`], then spawn [`run`](Self::run) on the
/// tokio runtime.
///
/// ```rust,no_run
/// use std::sync::Arc;
/// use std::time::Duration;
/// use voice_emotion::audio::{ChunkFanout, CpalDriver};
/// use voice_emotion::capture::CaptureSession;
/// use voice_emotion::classify::HttpClassifier;
/// use voice_emotion::config::AppConfig;
/// use voice_emotion::pipeline::{new_shared_state, IngestCoordinator, PipelineCommand, PipelineRunner};
///
/// # async fn example() {
/// let config = AppConfig::default();
/// let session = CaptureSession::new(
///     Box::new(CpalDriver::new(None, Some(4096))),
///     ChunkFanout::new(),
///     Duration::from_secs(8),
/// );
/// let coordinator = Arc::new(IngestCoordinator::new(
///     Arc::new(HttpClassifier::from_config(&config.classifier)),
///     config.ingest.max_duration_secs,
/// ));
///
/// let (tx, rx) = tokio::sync::mpsc::channel(16);
/// let runner = PipelineRunner::new(new_shared_state(config), session, coordinator);
/// tokio::spawn(runner.run(rx));
/// tx.send(PipelineCommand::StartCapture).await.unwrap();
/// # }
/// ```
pub struct PipelineRunner {
    state: SharedState,
    session: CaptureSession,
    coordinator: Arc<IngestCoordinator>,
}

impl PipelineRunner {
    pub fn new(
        state: SharedState,
        session: CaptureSession,
        coordinator: Arc<IngestCoordinator>,
    ) -> Self {
        Self {
            state,
            session,
            coordinator,
        }
    }

    // -----------------------------------------------------------------------
    // Main async loop
    // -----------------------------------------------------------------------

    /// Run until `commands` is closed.  A recording still open at that point
    /// is stopped and discarded.
    pub async fn run(mut self, mut commands: mpsc::Receiver<PipelineCommand>) {
        loop {
            let deadline = self.session.deadline();

            tokio::select! {
                command = commands.recv() => match command {
                    Some(command) => self.handle(command).await,
                    None => break,
                },
                _ = countdown(deadline), if deadline.is_some() => {
                    log::info!("pipeline: recording limit reached, stopping capture");
                    self.stop_capture(StopReason::TimeLimit).await;
                }
            }
        }

        if blocking(|| self.session.stop(StopReason::Requested)).is_some() {
            log::debug!("pipeline: discarded open recording on shutdown");
        }
        log::info!("pipeline: command channel closed, runner shutting down");
    }

    async fn handle(&mut self, command: PipelineCommand) {
        log::debug!("pipeline: {command:?}");
        match command {
            PipelineCommand::StartCapture => self.start_capture(),
            PipelineCommand::StopCapture => self.stop_capture(StopReason::Requested).await,
            PipelineCommand::ToggleCapture => {
                if self.session.is_capturing() {
                    self.stop_capture(StopReason::Requested).await;
                } else {
                    self.start_capture();
                }
            }
            PipelineCommand::SubmitFile(path) => match AudioInput::from_path(&path).await {
                Ok(input) => self.submit(input).await,
                Err(e) => {
                    log::warn!("pipeline: cannot read {}: {e}", path.display());
                    self.with_state(|st| st.fail(format!("Could not open {}: {e}", path.display())));
                }
            },
            PipelineCommand::Submit(input) => self.submit(input).await,
        }
    }

    // -----------------------------------------------------------------------
    // Capture
    // -----------------------------------------------------------------------

    fn start_capture(&mut self) {
        match blocking(|| self.session.start()) {
            Ok(StartOutcome::Started) => self.with_state(|st| {
                st.pipeline = PipelineState::Capturing;
                st.capture_started = Some(Instant::now());
                st.max_recording_secs = self.session.max_duration().as_secs_f32();
                st.pending_file = None;
                st.error_message = None;
                st.notice = None;
            }),
            Ok(StartOutcome::AlreadyCapturing) => {}
            Err(e) => {
                log::warn!("pipeline: {e}");
                self.with_state(|st| st.fail(MIC_UNAVAILABLE));
            }
        }
    }

    async fn stop_capture(&mut self, reason: StopReason) {
        let Some(stopped) = blocking(|| self.session.stop(reason)) else {
            return;
        };

        if stopped.pcm.is_empty() {
            log::warn!("pipeline: capture ended with no audio");
            self.with_state(|st| {
                st.pipeline = PipelineState::Idle;
                st.capture_started = None;
                st.notice = Some("No audio was captured.".into());
            });
            return;
        }

        self.with_state(|st| st.capture_started = None);
        let artifact = WavArtifact::from_pcm(&stopped.pcm, CAPTURE_FILENAME);
        self.submit(AudioInput::from_artifact(artifact)).await;
    }

    // -----------------------------------------------------------------------
    // Submission
    // -----------------------------------------------------------------------

    async fn submit(&mut self, input: AudioInput) {
        if self.session.is_capturing() {
            self.with_state(|st| {
                st.notice = Some("Stop recording before submitting a file.".into())
            });
            return;
        }

        let previous = self.with_state(|st| {
            let previous = st.pipeline;
            st.pipeline = PipelineState::Processing;
            st.pending_file = Some(input.name.clone());
            st.error_message = None;
            st.notice = None;
            previous
        });

        match self.coordinator.ingest(input).await {
            Ok(result) => {
                log::info!("pipeline: classified as {:?}", result.prediction);
                self.with_state(|st| {
                    st.pipeline = PipelineState::Result;
                    st.pending_file = None;
                });
            }
            Err(e @ (IngestError::InvalidFileType(_) | IngestError::Busy)) => {
                log::warn!("pipeline: submission refused: {e:?}");
                self.with_state(|st| {
                    st.pipeline = previous;
                    st.pending_file = None;
                    st.notice = Some(e.to_string());
                });
            }
            Err(e) => {
                log::warn!("pipeline: submission failed: {e:?}");
                self.with_state(|st| st.fail(e.to_string()));
            }
        }
    }

    // -----------------------------------------------------------------------
    // Helpers
    // -----------------------------------------------------------------------

    fn with_state<R>(&self, f: impl FnOnce(&mut super::state::AppState) -> R) -> R {
        let mut st = match self.state.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        f(&mut st)
    }
}

/// Runs `f`, which may wait on the audio device thread.  On a multi-thread
/// runtime the worker is handed off first so other tasks keep running.
fn blocking<R>(f: impl FnOnce() -> R) -> R {
    match tokio::runtime::Handle::try_current() {
        Ok(handle) if handle.runtime_flavor() == RuntimeFlavor::MultiThread => {
            tokio::task::block_in_place(f)
        }
        _ => f(),
    }
}

/// Completes at `deadline`; never completes when there is none.
fn countdown(deadline: Option<tokio::time::Instant>) -> impl Future<Output = ()> {
    async move {
        match deadline {
            Some(at) => tokio::time::sleep_until(at).await,
            None => std::future::pending().await,
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
