//! Live spectral waveform visualizer.
//!
//! ```text
//!                 ┌─▶ SharedSampleBuffer (capture session)
//! ChunkFanout ────┤
//!                 └─▶ TapSet ─▶ AnalysisTap × N ─▶ AtomicU8 bins
//!                                                     │ lock-free read
//! egui update() ─▶ SpectralVisualizer::frame ─────────┘
//!                    ├─ active:   live_frame(levels, t)   + FrameLoop::tick
//!                    └─ inactive: static_frame
//! ```
//!
//! The visualizer subscribes its own taps to the shared fan-out when capture
//! becomes active and drops them when it ends; it never opens or closes the
//! input stream itself.

pub mod frame;
pub mod scheduler;
pub mod tap;

pub use frame::{live_frame, motion_amplitude, static_frame, FrameGeometry, Polyline};
pub use scheduler::{FrameLoop, FrameScheduler};
pub use tap::{magnitude_to_byte, AnalysisTap, AnalysisTapConfig, TapSet, PALETTE};

use std::sync::Arc;
use std::time::Instant;

use crate::audio::{ChunkFanout, Subscription};
use crate::config::VisualizerConfig;

/// Resources held only while capture is active.  Field order is drop order:
/// the frame loop is cancelled before the taps are unsubscribed.
struct LiveFeed {
    frames: FrameLoop,
    _subscription: Subscription,
    taps: Arc<TapSet>,
}

pub struct SpectralVisualizer {
    config: VisualizerConfig,
    layout: Vec<AnalysisTapConfig>,
    mounted_at: Instant,
    live: Option<LiveFeed>,
}

impl SpectralVisualizer {
    /// Create the visualizer in its static state.
    pub fn mount(config: &VisualizerConfig) -> Self {
        Self {
            layout: AnalysisTapConfig::layout(config),
            config: config.clone(),
            mounted_at: Instant::now(),
            live: None,
        }
    }

    pub fn is_active(&self) -> bool {
        self.live.is_some()
    }

    pub fn layout(&self) -> &[AnalysisTapConfig] {
        &self.layout
    }

    pub fn height(&self) -> f32 {
        self.config.height
    }

    /// Attach fresh analysis taps to `fanout` and start the frame loop.
    /// Does nothing when already active.
    pub fn activate(&mut self, fanout: &Arc<ChunkFanout>) {
        if self.live.is_some() {
            return;
        }
        let taps = TapSet::new(&self.layout);
        let subscription = fanout.subscribe(taps.clone());
        self.live = Some(LiveFeed {
            frames: FrameLoop::start(),
            _subscription: subscription,
            taps,
        });
        log::debug!("visualizer: {} taps attached", self.layout.len());
    }

    /// Cancel the frame loop and release the taps.
    pub fn deactivate(&mut self) {
        if let Some(live) = self.live.take() {
            live.frames.cancel();
            log::debug!(
                "visualizer: released after {} live frames",
                live.frames.frames()
            );
        }
    }

    /// Follow the capture state: activate while `capturing`, otherwise
    /// deactivate.
    pub fn sync(&mut self, capturing: bool, fanout: &Arc<ChunkFanout>) {
        match (capturing, self.is_active()) {
            (true, false) => self.activate(fanout),
            (false, true) => self.deactivate(),
            _ => {}
        }
    }

    /// Geometry for the frame being rendered now.
    ///
    /// While active this also asks `scheduler` for the next frame; in the
    /// static state nothing is scheduled.
    pub fn frame<S: FrameScheduler + ?Sized>(
        &mut self,
        scheduler: &S,
        width: f32,
        height: f32,
    ) -> Vec<Polyline> {
        let time_ms = self.mounted_at.elapsed().as_secs_f64() * 1000.0;
        self.frame_at(scheduler, width, height, time_ms)
    }

    fn frame_at<S: FrameScheduler + ?Sized>(
        &mut self,
        scheduler: &S,
        width: f32,
        height: f32,
        time_ms: f64,
    ) -> Vec<Polyline> {
        let geom = FrameGeometry {
            width,
            height,
            sweep_step: self.config.sweep_step,
            motion_scale: self.config.motion_scale,
        };

        if let Some(live) = self.live.as_mut() {
            if live.frames.tick(scheduler) {
                return live_frame(&self.layout, &live.taps.levels(), time_ms, &geom);
            }
        }
        static_frame(&self.layout, &geom)
    }

    /// Tear down; equivalent to dropping the visualizer.
    pub fn unmount(mut self) {
        self.deactivate();
    }
}

impl Drop for SpectralVisualizer {
    fn drop(&mut self) {
        self.deactivate();
    }
}

#[cfg(test)]
mod tests {
    use super::scheduler::tests::CountingScheduler;
    use super::*;
    use crate::audio::AudioChunk;

    fn tone(len: usize) -> AudioChunk {
        let samples = (0..len)
            .map(|i| 0.8 * (std::f32::consts::TAU * 1_000.0 * i as f32 / 16_000.0).sin())
            .collect();
        AudioChunk::new(samples, 16_000)
    }

    #[test]
    fn mounts_static() {
        let sched = CountingScheduler::default();
        let mut vis = SpectralVisualizer::mount(&VisualizerConfig::default());
        assert!(!vis.is_active());

        let lines = vis.frame(&sched, 400.0, 250.0);
        assert_eq!(lines.len(), 6);
        assert_eq!(sched.requests.get(), 0);
    }

    #[test]
    fn activation_subscribes_and_deactivation_releases() {
        let fanout = ChunkFanout::new();
        let mut vis = SpectralVisualizer::mount(&VisualizerConfig::default());

        vis.activate(&fanout);
        vis.activate(&fanout);
        assert!(vis.is_active());
        assert_eq!(fanout.subscriber_count(), 1);

        vis.deactivate();
        assert!(!vis.is_active());
        assert_eq!(fanout.subscriber_count(), 0);
    }

    #[test]
    fn live_frames_schedule_until_deactivated() {
        let fanout = ChunkFanout::new();
        let sched = CountingScheduler::default();
        let mut vis = SpectralVisualizer::mount(&VisualizerConfig::default());

        vis.activate(&fanout);
        vis.frame(&sched, 400.0, 250.0);
        vis.frame(&sched, 400.0, 250.0);
        assert_eq!(sched.requests.get(), 2);

        vis.deactivate();
        vis.frame(&sched, 400.0, 250.0);
        assert_eq!(sched.requests.get(), 2);
    }

    #[test]
    fn published_audio_moves_the_lines() {
        let fanout = ChunkFanout::new();
        let sched = CountingScheduler::default();
        let mut vis = SpectralVisualizer::mount(&VisualizerConfig::default());
        vis.activate(&fanout);

        fanout.publish(&tone(4096));
        let lines = vis.frame_at(&sched, 400.0, 250.0, 0.0);
        let flat = static_frame(
            vis.layout(),
            &FrameGeometry {
                width: 400.0,
                height: 250.0,
                sweep_step: 10.0,
                motion_scale: 60.0,
            },
        );
        assert_ne!(lines, flat);
    }

    #[test]
    fn sync_follows_capture_state() {
        let fanout = ChunkFanout::new();
        let mut vis = SpectralVisualizer::mount(&VisualizerConfig::default());

        vis.sync(true, &fanout);
        assert_eq!(fanout.subscriber_count(), 1);
        vis.sync(true, &fanout);
        assert_eq!(fanout.subscriber_count(), 1);
        vis.sync(false, &fanout);
        assert_eq!(fanout.subscriber_count(), 0);
    }

    #[test]
    fn unmount_releases_taps() {
        let fanout = ChunkFanout::new();
        let mut vis = SpectralVisualizer::mount(&VisualizerConfig::default());
        vis.activate(&fanout);

        vis.unmount();
        assert_eq!(fanout.subscriber_count(), 0);
    }
}
