//! The capture session: owns the input stream for one recording, subscribes
//! the sample buffer to the fan-out, and hands back the merged PCM on stop.
//!
//! The time ceiling is exposed as a [`deadline`](CaptureSession::deadline)
//! rather than a spawned timer.  The pipeline runner selects on it next to
//! its command channel, so an auto-stop and a manual stop are handled on the
//! same task and the state machine decides which one wins.

use std::sync::Arc;
use std::time::Duration;

use tokio::time::Instant;

use super::state::{CaptureSessionState, SessionSignal, StopReason};
use crate::audio::{
    CaptureError, ChunkFanout, InputDriver, InputStream, MergedPcm, SharedSampleBuffer,
    Subscription,
};

/// Result of [`CaptureSession::start`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StartOutcome {
    /// A new stream was opened.
    Started,
    /// A session was already running; nothing changed.
    AlreadyCapturing,
}

/// What a finished session hands downstream.
#[derive(Debug, Clone, PartialEq)]
pub struct StoppedCapture {
    /// Merged mono PCM.  Empty when no chunk arrived before the stop.
    pub pcm: MergedPcm,
    pub reason: StopReason,
    pub elapsed: Duration,
}

/// The single microphone recording session.
pub struct CaptureSession {
    driver: Box<dyn InputDriver>,
    fanout: Arc<ChunkFanout>,
    buffer: Arc<SharedSampleBuffer>,
    max_duration: Duration,

    state: CaptureSessionState,
    stream: Option<Box<dyn InputStream>>,
    subscription: Option<Subscription>,
    started_at: Option<Instant>,
    sample_rate: u32,
}

impl CaptureSession {
    pub fn new(
        driver: Box<dyn InputDriver>,
        fanout: Arc<ChunkFanout>,
        max_duration: Duration,
    ) -> Self {
        Self {
            driver,
            fanout,
            buffer: Arc::new(SharedSampleBuffer::new()),
            max_duration,
            state: CaptureSessionState::Idle,
            stream: None,
            subscription: None,
            started_at: None,
            sample_rate: 0,
        }
    }

    pub fn state(&self) -> CaptureSessionState {
        self.state
    }

    pub fn is_capturing(&self) -> bool {
        self.state.is_capturing()
    }

    pub fn max_duration(&self) -> Duration {
        self.max_duration
    }

    /// The shared fan-out live chunks are published to.
    pub fn fanout(&self) -> &Arc<ChunkFanout> {
        &self.fanout
    }

    /// Acquire the input device and begin buffering.
    ///
    /// A call while already capturing returns
    /// [`StartOutcome::AlreadyCapturing`] and leaves the running stream
    /// untouched.
    ///
    /// # Errors
    ///
    /// [`CaptureError::DeviceUnavailable`] when the device cannot be opened.
    /// The session stays `Idle` and holds no stream or subscription.
    pub fn start(&mut self) -> Result<StartOutcome, CaptureError> {
        let Some(next) = self.state.transition(SessionSignal::Start) else {
            log::debug!("capture: start ignored in state {:?}", self.state);
            return Ok(StartOutcome::AlreadyCapturing);
        };

        self.buffer.clear();
        let subscription = self.fanout.subscribe(self.buffer.clone());

        let stream = match self.driver.open(Arc::clone(&self.fanout)) {
            Ok(stream) => stream,
            Err(e) => {
                drop(subscription);
                log::warn!("capture: start failed: {e}");
                return Err(e);
            }
        };

        self.sample_rate = stream.sample_rate();
        self.stream = Some(stream);
        self.subscription = Some(subscription);
        self.started_at = Some(Instant::now());
        self.state = next;

        log::info!(
            "capture: started at {} Hz (limit {:.1}s)",
            self.sample_rate,
            self.max_duration.as_secs_f32()
        );
        Ok(StartOutcome::Started)
    }

    /// End the session: close the stream, unsubscribe the buffer and merge it.
    ///
    /// The stream is closed before the merge, so no chunk can land in the
    /// buffer after it has been handed off.  Returns `None` when there was no
    /// session to stop.
    pub fn stop(&mut self, reason: StopReason) -> Option<StoppedCapture> {
        let stopping = self.state.transition(reason.signal())?;
        self.state = stopping;

        if let Some(mut stream) = self.stream.take() {
            stream.close();
        }
        self.subscription = None;

        let elapsed = self
            .started_at
            .take()
            .map(|t| t.elapsed())
            .unwrap_or_default();
        let pcm = MergedPcm::mono(self.buffer.merge_and_clear(), self.sample_rate);

        self.state = self
            .state
            .transition(SessionSignal::Released)
            .unwrap_or(CaptureSessionState::Idle);

        log::info!(
            "capture: stopped ({reason:?}) after {:.2}s, {} samples",
            elapsed.as_secs_f32(),
            pcm.samples.len()
        );
        Some(StoppedCapture {
            pcm,
            reason,
            elapsed,
        })
    }

    /// Time since the current session started, zero when idle.
    pub fn elapsed(&self) -> Duration {
        self.started_at.map(|t| t.elapsed()).unwrap_or_default()
    }

    /// When the running session must auto-stop.  `None` when idle, so a
    /// deadline can never outlive the session it belongs to.
    pub fn deadline(&self) -> Option<Instant> {
        if !self.is_capturing() {
            return None;
        }
        self.started_at.map(|t| t + self.max_duration)
    }
}

impl Drop for CaptureSession {
    fn drop(&mut self) {
        if let Some(mut stream) = self.stream.take() {
            stream.close();
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::audio::AudioChunk;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

    /// Test driver: records open/close calls and lets the test publish
    /// chunks through the fan-out it was opened with.
    #[derive(Default)]
    pub(crate) struct MockDriver {
        pub opens: AtomicUsize,
        pub closes: Arc<AtomicUsize>,
        pub fail: AtomicBool,
        pub fanout: std::sync::Mutex<Option<Arc<ChunkFanout>>>,
    }

    struct MockStream {
        closes: Arc<AtomicUsize>,
        closed: bool,
    }

    impl InputStream for MockStream {
        fn sample_rate(&self) -> u32 {
            16_000
        }

        fn close(&mut self) {
            if !self.closed {
                self.closed = true;
                self.closes.fetch_add(1, Ordering::SeqCst);
            }
        }
    }

    impl InputDriver for Arc<MockDriver> {
        fn open(&self, fanout: Arc<ChunkFanout>) -> Result<Box<dyn InputStream>, CaptureError> {
            self.opens.fetch_add(1, Ordering::SeqCst);
            if self.fail.load(Ordering::SeqCst) {
                return Err(CaptureError::DeviceUnavailable("permission denied".into()));
            }
            *self.fanout.lock().unwrap() = Some(fanout);
            Ok(Box::new(MockStream {
                closes: Arc::clone(&self.closes),
                closed: false,
            }))
        }
    }

    impl MockDriver {
        pub fn push(&self, samples: Vec<f32>) {
            if let Some(fanout) = self.fanout.lock().unwrap().as_ref() {
                fanout.publish(&AudioChunk::new(samples, 16_000));
            }
        }
    }

    fn session(driver: &Arc<MockDriver>) -> CaptureSession {
        CaptureSession::new(
            Box::new(Arc::clone(driver)),
            ChunkFanout::new(),
            Duration::from_secs(8),
        )
    }

    #[test]
    fn start_then_stop_returns_merged_pcm() {
        let driver = Arc::new(MockDriver::default());
        let mut s = session(&driver);

        assert_eq!(s.start().unwrap(), StartOutcome::Started);
        assert_eq!(s.state(), CaptureSessionState::Capturing);
        driver.push(vec![0.1; 4096]);
        driver.push(vec![0.2; 4096]);
        driver.push(vec![0.3; 2048]);

        let stopped = s.stop(StopReason::Requested).expect("session was running");
        assert_eq!(stopped.pcm.samples.len(), 10_240);
        assert_eq!(stopped.pcm.sample_rate, 16_000);
        assert_eq!(stopped.pcm.channels, 1);
        assert_eq!(stopped.reason, StopReason::Requested);
        assert_eq!(s.state(), CaptureSessionState::Idle);
        assert_eq!(driver.closes.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn second_start_does_not_reopen_the_device() {
        let driver = Arc::new(MockDriver::default());
        let mut s = session(&driver);

        s.start().unwrap();
        assert_eq!(s.start().unwrap(), StartOutcome::AlreadyCapturing);
        assert_eq!(driver.opens.load(Ordering::SeqCst), 1);
        assert_eq!(s.fanout().subscriber_count(), 1);
    }

    #[test]
    fn stop_when_idle_is_a_no_op() {
        let driver = Arc::new(MockDriver::default());
        let mut s = session(&driver);
        assert!(s.stop(StopReason::Requested).is_none());
        assert_eq!(driver.closes.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn failed_start_stays_idle_and_unsubscribed() {
        let driver = Arc::new(MockDriver::default());
        driver.fail.store(true, Ordering::SeqCst);
        let mut s = session(&driver);

        let err = s.start().unwrap_err();
        assert!(matches!(err, CaptureError::DeviceUnavailable(_)));
        assert_eq!(s.state(), CaptureSessionState::Idle);
        assert_eq!(s.fanout().subscriber_count(), 0);
        assert!(s.deadline().is_none());
    }

    #[test]
    fn stop_without_chunks_yields_empty_pcm() {
        let driver = Arc::new(MockDriver::default());
        let mut s = session(&driver);
        s.start().unwrap();

        let stopped = s.stop(StopReason::Requested).unwrap();
        assert!(stopped.pcm.is_empty());
    }

    #[test]
    fn chunks_after_stop_are_not_buffered() {
        let driver = Arc::new(MockDriver::default());
        let mut s = session(&driver);
        s.start().unwrap();
        driver.push(vec![0.5; 100]);
        s.stop(StopReason::Requested).unwrap();

        // Late chunk from a stale callback: the buffer is no longer subscribed.
        driver.push(vec![0.5; 100]);
        assert_eq!(s.fanout().subscriber_count(), 0);

        s.start().unwrap();
        let stopped = s.stop(StopReason::Requested).unwrap();
        assert!(stopped.pcm.is_empty());
    }

    #[test]
    fn new_session_starts_with_empty_buffer() {
        let driver = Arc::new(MockDriver::default());
        let mut s = session(&driver);

        s.start().unwrap();
        driver.push(vec![0.1; 50]);
        s.stop(StopReason::Requested).unwrap();

        s.start().unwrap();
        driver.push(vec![0.2; 30]);
        let stopped = s.stop(StopReason::Requested).unwrap();
        assert_eq!(stopped.pcm.samples, vec![0.2; 30]);
    }

    #[tokio::test(start_paused = true)]
    async fn deadline_is_start_plus_limit_and_cleared_on_stop() {
        let driver = Arc::new(MockDriver::default());
        let mut s = session(&driver);
        assert!(s.deadline().is_none());

        let before = Instant::now();
        s.start().unwrap();
        assert_eq!(s.deadline(), Some(before + Duration::from_secs(8)));

        tokio::time::advance(Duration::from_secs(3)).await;
        assert_eq!(s.elapsed(), Duration::from_secs(3));

        let stopped = s.stop(StopReason::TimeLimit).unwrap();
        assert_eq!(stopped.elapsed, Duration::from_secs(3));
        assert_eq!(stopped.reason, StopReason::TimeLimit);
        assert!(s.deadline().is_none());
        assert_eq!(s.elapsed(), Duration::ZERO);
    }

    #[test]
    fn dropping_a_running_session_closes_the_stream() {
        let driver = Arc::new(MockDriver::default());
        let mut s = session(&driver);
        s.start().unwrap();
        drop(s);
        assert_eq!(driver.closes.load(Ordering::SeqCst), 1);
    }
}
