//! Microphone capture via `cpal`, with chunk fan-out.
//!
//! The hardware callback wraps every delivered block in an [`AudioChunk`] and
//! hands it to a [`ChunkFanout`].  The fan-out notifies each registered
//! [`ChunkSubscriber`] in turn: the capture session's sample buffer and the
//! visualizer's analysis taps are independent subscribers of the same stream,
//! and neither one owns it.
//!
//! `cpal::Stream` is not `Send` on every platform, so [`CpalDriver`] keeps the
//! stream on a dedicated `audio-capture` thread and hands the session a
//! [`CpalStream`] handle that stops and joins that thread on close.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{mpsc, Arc, RwLock, Weak};
use std::thread::JoinHandle;

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use thiserror::Error;

use super::downmix::downmix_to_mono;

// ---------------------------------------------------------------------------
// AudioChunk
// ---------------------------------------------------------------------------

/// One capture callback's worth of mono samples in `[-1.0, 1.0]`.
///
/// The sample storage is shared (`Arc<[f32]>`) so every subscriber sees the
/// same immutable block without copying it.
#[derive(Debug, Clone)]
pub struct AudioChunk {
    /// Mono PCM samples, oldest first.
    pub samples: Arc<[f32]>,
    /// Sample rate of the capture stream in Hz.
    pub sample_rate: u32,
}

impl AudioChunk {
    pub fn new(samples: Vec<f32>, sample_rate: u32) -> Self {
        Self {
            samples: samples.into(),
            sample_rate,
        }
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }
}

// ---------------------------------------------------------------------------
// Fan-out
// ---------------------------------------------------------------------------

/// A consumer of live capture chunks.
///
/// `on_chunk` runs on the audio thread.  Implementations must return quickly:
/// no file or network I/O, no waiting on other threads.
pub trait ChunkSubscriber: Send + Sync {
    fn on_chunk(&self, chunk: &AudioChunk);
}

/// Broadcasts every captured chunk to all current subscribers.
#[derive(Default)]
pub struct ChunkFanout {
    subscribers: RwLock<Vec<(u64, Arc<dyn ChunkSubscriber>)>>,
    next_id: AtomicU64,
}

impl ChunkFanout {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Register `subscriber`.  It stays registered until the returned
    /// [`Subscription`] is dropped.
    pub fn subscribe(self: &Arc<Self>, subscriber: Arc<dyn ChunkSubscriber>) -> Subscription {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        match self.subscribers.write() {
            Ok(mut subs) => subs.push((id, subscriber)),
            Err(poisoned) => poisoned.into_inner().push((id, subscriber)),
        }
        Subscription {
            fanout: Arc::downgrade(self),
            id,
        }
    }

    /// Deliver `chunk` to every subscriber in registration order.
    pub fn publish(&self, chunk: &AudioChunk) {
        if let Ok(subs) = self.subscribers.read() {
            for (_, subscriber) in subs.iter() {
                subscriber.on_chunk(chunk);
            }
        }
    }

    pub fn subscriber_count(&self) -> usize {
        self.subscribers.read().map(|s| s.len()).unwrap_or(0)
    }

    fn unsubscribe(&self, id: u64) {
        let mut subs = match self.subscribers.write() {
            Ok(subs) => subs,
            Err(poisoned) => poisoned.into_inner(),
        };
        subs.retain(|(sub_id, _)| *sub_id != id);
    }
}

/// RAII registration in a [`ChunkFanout`].  Dropping it unsubscribes.
pub struct Subscription {
    fanout: Weak<ChunkFanout>,
    id: u64,
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(fanout) = self.fanout.upgrade() {
            fanout.unsubscribe(self.id);
        }
    }
}

// ---------------------------------------------------------------------------
// CaptureError
// ---------------------------------------------------------------------------

/// Failure to acquire the microphone.
///
/// Permission denial, a missing input device and a stream the platform
/// refuses to build all collapse into `DeviceUnavailable`; the session
/// reports it and stays idle.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum CaptureError {
    #[error("microphone unavailable: {0}")]
    DeviceUnavailable(String),
}

impl From<cpal::DefaultStreamConfigError> for CaptureError {
    fn from(e: cpal::DefaultStreamConfigError) -> Self {
        CaptureError::DeviceUnavailable(format!("failed to query input config: {e}"))
    }
}

impl From<cpal::BuildStreamError> for CaptureError {
    fn from(e: cpal::BuildStreamError) -> Self {
        CaptureError::DeviceUnavailable(format!("failed to build input stream: {e}"))
    }
}

impl From<cpal::PlayStreamError> for CaptureError {
    fn from(e: cpal::PlayStreamError) -> Self {
        CaptureError::DeviceUnavailable(format!("failed to start input stream: {e}"))
    }
}

// ---------------------------------------------------------------------------
// Driver traits
// ---------------------------------------------------------------------------

/// Source of live input streams.  The capture session opens one stream per
/// session and closes it before merging the buffer.
pub trait InputDriver: Send + Sync {
    /// Acquire the input device and start publishing chunks to `fanout`.
    fn open(&self, fanout: Arc<ChunkFanout>) -> Result<Box<dyn InputStream>, CaptureError>;
}

/// A running input stream.
pub trait InputStream: Send {
    /// Rate of the chunks this stream publishes, in Hz.
    fn sample_rate(&self) -> u32;

    /// Stop the hardware stream.  Once this returns no further chunks are
    /// published.  Calling it twice is harmless.
    fn close(&mut self);
}

// ---------------------------------------------------------------------------
// AudioCapture
// ---------------------------------------------------------------------------

/// cpal host/device/config bundle for one input device.
pub struct AudioCapture {
    device: cpal::Device,
    config: cpal::StreamConfig,
    sample_rate: u32,
    channels: u16,
}

impl AudioCapture {
    /// Resolve the input device named `device_name`, or the host default when
    /// `None`.
    ///
    /// # Errors
    ///
    /// [`CaptureError::DeviceUnavailable`] when no matching device exists or
    /// the device cannot report a default configuration.
    pub fn new(device_name: Option<&str>) -> Result<Self, CaptureError> {
        let host = cpal::default_host();

        let device = match device_name {
            Some(name) => host
                .input_devices()
                .map_err(|e| CaptureError::DeviceUnavailable(e.to_string()))?
                .find(|d| d.name().map(|n| n == name).unwrap_or(false))
                .ok_or_else(|| {
                    CaptureError::DeviceUnavailable(format!("input device {name:?} not found"))
                })?,
            None => host.default_input_device().ok_or_else(|| {
                CaptureError::DeviceUnavailable("no input device found".into())
            })?,
        };

        let supported = device.default_input_config()?;
        let channels = supported.channels();
        let sample_rate = supported.sample_rate().0;

        Ok(Self {
            device,
            config: supported.into(),
            sample_rate,
            channels,
        })
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn channels(&self) -> u16 {
        self.channels
    }

    /// Build and start the input stream, publishing mono chunks to `fanout`.
    ///
    /// A fixed `block_size` (frames per callback) is requested first; if the
    /// device rejects it the device default buffer size is used instead.
    pub fn start(
        &self,
        block_size: Option<u32>,
        fanout: Arc<ChunkFanout>,
    ) -> Result<cpal::Stream, CaptureError> {
        let stream = match block_size {
            Some(frames) => {
                let mut fixed = self.config.clone();
                fixed.buffer_size = cpal::BufferSize::Fixed(frames);
                match self.build(&fixed, Arc::clone(&fanout)) {
                    Ok(stream) => stream,
                    Err(e) => {
                        log::warn!(
                            "capture: fixed block size {frames} rejected ({e}); using device default"
                        );
                        self.build(&self.config, fanout)?
                    }
                }
            }
            None => self.build(&self.config, fanout)?,
        };

        stream.play()?;
        Ok(stream)
    }

    fn build(
        &self,
        config: &cpal::StreamConfig,
        fanout: Arc<ChunkFanout>,
    ) -> Result<cpal::Stream, cpal::BuildStreamError> {
        let sample_rate = self.sample_rate;
        let channels = self.channels as usize;

        self.device.build_input_stream(
            config,
            move |data: &[f32], _: &cpal::InputCallbackInfo| {
                let chunk = AudioChunk::new(downmix_to_mono(data, channels), sample_rate);
                fanout.publish(&chunk);
            },
            |err: cpal::StreamError| {
                log::error!("cpal stream error: {err}");
            },
            None,
        )
    }
}

// ---------------------------------------------------------------------------
// CpalDriver / CpalStream
// ---------------------------------------------------------------------------

/// Production [`InputDriver`] backed by cpal.
pub struct CpalDriver {
    device_name: Option<String>,
    block_size: Option<u32>,
}

impl CpalDriver {
    pub fn new(device_name: Option<String>, block_size: Option<u32>) -> Self {
        Self {
            device_name,
            block_size,
        }
    }
}

impl InputDriver for CpalDriver {
    fn open(&self, fanout: Arc<ChunkFanout>) -> Result<Box<dyn InputStream>, CaptureError> {
        let (ready_tx, ready_rx) = mpsc::channel::<Result<u32, CaptureError>>();
        let (stop_tx, stop_rx) = mpsc::channel::<()>();
        let device_name = self.device_name.clone();
        let block_size = self.block_size;

        let thread = std::thread::Builder::new()
            .name("audio-capture".into())
            .spawn(move || {
                let opened = AudioCapture::new(device_name.as_deref()).and_then(|capture| {
                    let stream = capture.start(block_size, fanout)?;
                    Ok((capture, stream))
                });

                let (capture, stream) = match opened {
                    Ok(pair) => pair,
                    Err(e) => {
                        let _ = ready_tx.send(Err(e));
                        return;
                    }
                };

                log::info!(
                    "capture: stream open ({} Hz, {} ch)",
                    capture.sample_rate(),
                    capture.channels()
                );
                let _ = ready_tx.send(Ok(capture.sample_rate()));

                // Returns on an explicit stop or when the handle is dropped.
                let _ = stop_rx.recv();
                drop(stream);
                log::debug!("capture: stream released");
            })
            .map_err(|e| {
                CaptureError::DeviceUnavailable(format!("failed to spawn capture thread: {e}"))
            })?;

        match ready_rx.recv() {
            Ok(Ok(sample_rate)) => Ok(Box::new(CpalStream {
                sample_rate,
                stop_tx: Some(stop_tx),
                thread: Some(thread),
            })),
            Ok(Err(e)) => {
                let _ = thread.join();
                Err(e)
            }
            Err(_) => {
                let _ = thread.join();
                Err(CaptureError::DeviceUnavailable(
                    "capture thread exited during start-up".into(),
                ))
            }
        }
    }
}

/// Handle to the stream living on the `audio-capture` thread.
pub struct CpalStream {
    sample_rate: u32,
    stop_tx: Option<mpsc::Sender<()>>,
    thread: Option<JoinHandle<()>>,
}

impl InputStream for CpalStream {
    fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    fn close(&mut self) {
        if let Some(tx) = self.stop_tx.take() {
            let _ = tx.send(());
        }
        if let Some(thread) = self.thread.take() {
            if thread.join().is_err() {
                log::warn!("capture: audio thread panicked during shutdown");
            }
        }
    }
}

impl Drop for CpalStream {
    fn drop(&mut self) {
        self.close();
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
