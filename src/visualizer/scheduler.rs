//! Per-frame scheduling with explicit cancellation.
//!
//! A [`FrameLoop`] asks its [`FrameScheduler`] for the next frame once per
//! rendered frame, and only while its [`CancellationToken`] is live.  Once
//! cancelled it never schedules again, so no frame callback outlives the
//! visualizer that started it.

use tokio_util::sync::CancellationToken;

/// Something that can be asked to render another frame.
pub trait FrameScheduler {
    fn schedule_next_frame(&self);
}

impl FrameScheduler for egui::Context {
    fn schedule_next_frame(&self) {
        self.request_repaint();
    }
}

#[derive(Debug)]
pub struct FrameLoop {
    token: CancellationToken,
    frames: u64,
}

impl FrameLoop {
    pub fn start() -> Self {
        Self {
            token: CancellationToken::new(),
            frames: 0,
        }
    }

    /// Called once per rendered frame.  Schedules the next frame and returns
    /// `true`, or returns `false` without scheduling once cancelled.
    pub fn tick<S: FrameScheduler + ?Sized>(&mut self, scheduler: &S) -> bool {
        if self.token.is_cancelled() {
            return false;
        }
        self.frames += 1;
        scheduler.schedule_next_frame();
        true
    }

    pub fn cancel(&self) {
        self.token.cancel();
    }

    pub fn is_running(&self) -> bool {
        !self.token.is_cancelled()
    }

    /// Handle for cancelling the loop from elsewhere.
    pub fn cancel_token(&self) -> CancellationToken {
        self.token.clone()
    }

    pub fn frames(&self) -> u64 {
        self.frames
    }
}

impl Drop for FrameLoop {
    fn drop(&mut self) {
        self.token.cancel();
    }
}
