//! Frequency-analysis taps on the live capture stream.
//!
//! Each [`AnalysisTap`] buffers incoming samples into fixed-size windows and,
//! for every completed window, runs a Blackman-windowed FFT with `rustfft`,
//! smooths the magnitudes over time and maps them to bytes on a decibel
//! scale (`-100 dB → 0`, `-30 dB → 255`).  The latest bytes are published
//! into atomics, so the render loop reads a snapshot without locking and
//! without ever waiting on the audio thread.
//!
//! [`TapSet`] groups the taps of one visualizer mount and is what gets
//! subscribed to the [`ChunkFanout`](crate::audio::ChunkFanout).

use std::f32::consts::PI;
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::{Arc, Mutex};

use rustfft::{num_complex::Complex, Fft, FftPlanner};

use crate::audio::{AudioChunk, ChunkSubscriber};
use crate::config::VisualizerConfig;

/// Byte value 0 corresponds to this level.
pub const MIN_DECIBELS: f32 = -100.0;
/// Byte value 255 corresponds to this level.
pub const MAX_DECIBELS: f32 = -30.0;
/// Weight of the previous window in the running magnitude average.
pub const SMOOTHING: f32 = 0.8;

/// Line colours as RGBA, cycled by tap index.
pub const PALETTE: [[u8; 4]; 6] = [
    [127, 90, 240, 217],
    [59, 130, 246, 217],
    [255, 255, 255, 179],
    [0, 255, 255, 153],
    [30, 80, 200, 179],
    [128, 0, 255, 153],
];

// ---------------------------------------------------------------------------
// AnalysisTapConfig
// ---------------------------------------------------------------------------

/// Static per-tap parameters, fixed for the lifetime of a mount.
#[derive(Debug, Clone, PartialEq)]
pub struct AnalysisTapConfig {
    pub index: usize,
    pub fft_size: usize,
    /// Vertical baseline offset from the canvas centre, in points.
    pub offset: f32,
    pub color: [u8; 4],
    /// Phase advance in radians per millisecond.
    pub speed: f64,
}

impl AnalysisTapConfig {
    /// One config per tap: offsets `(i - N/2) * spacing`, colours cycled
    /// from [`PALETTE`], speed `base_speed * (i + 1)`.
    pub fn layout(cfg: &VisualizerConfig) -> Vec<AnalysisTapConfig> {
        let n = cfg.tap_count;
        let half = n as f32 / 2.0;
        (0..n)
            .map(|i| AnalysisTapConfig {
                index: i,
                fft_size: cfg.fft_size.max(2),
                offset: (i as f32 - half) * cfg.line_spacing,
                color: PALETTE[i % PALETTE.len()],
                speed: cfg.base_speed * (i + 1) as f64,
            })
            .collect()
    }

    /// Number of magnitude bins a tap publishes.
    pub fn bin_count(&self) -> usize {
        self.fft_size / 2
    }
}

// ---------------------------------------------------------------------------
// AnalysisTap
// ---------------------------------------------------------------------------

/// Audio-thread side of a tap.  Only ever locked from `push`.
struct Analyser {
    fft: Arc<dyn Fft<f32>>,
    window: Vec<f32>,
    pending: Vec<f32>,
    smoothed: Vec<f32>,
    scratch: Vec<Complex<f32>>,
}

impl Analyser {
    fn new(fft_size: usize) -> Self {
        let fft = FftPlanner::new().plan_fft_forward(fft_size);
        Self {
            fft,
            window: blackman(fft_size),
            pending: Vec::with_capacity(fft_size * 2),
            smoothed: vec![0.0; fft_size / 2],
            scratch: vec![Complex::new(0.0, 0.0); fft_size],
        }
    }

    /// Analyse the oldest full window in `pending` and update `smoothed`.
    fn analyse_front(&mut self) {
        let n = self.window.len();
        for ((slot, &s), &w) in self
            .scratch
            .iter_mut()
            .zip(&self.pending[..n])
            .zip(&self.window)
        {
            *slot = Complex::new(s * w, 0.0);
        }
        self.fft.process(&mut self.scratch);

        let norm = 1.0 / n as f32;
        for (avg, bin) in self.smoothed.iter_mut().zip(&self.scratch) {
            let mag = bin.norm() * norm;
            *avg = SMOOTHING * *avg + (1.0 - SMOOTHING) * mag;
        }
        self.pending.drain(..n);
    }
}

/// One independent analysis of the live stream.
pub struct AnalysisTap {
    config: AnalysisTapConfig,
    analyser: Mutex<Analyser>,
    bins: Vec<AtomicU8>,
}

impl AnalysisTap {
    pub fn new(config: AnalysisTapConfig) -> Self {
        let bins = (0..config.bin_count()).map(|_| AtomicU8::new(0)).collect();
        Self {
            analyser: Mutex::new(Analyser::new(config.fft_size)),
            config,
            bins,
        }
    }

    pub fn config(&self) -> &AnalysisTapConfig {
        &self.config
    }

    /// Feed mono samples.  Every completed window updates the snapshot.
    pub fn push(&self, samples: &[f32]) {
        let mut analyser = match self.analyser.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        analyser.pending.extend_from_slice(samples);

        let n = self.config.fft_size;
        let mut updated = false;
        while analyser.pending.len() >= n {
            analyser.analyse_front();
            updated = true;
        }

        if updated {
            for (slot, &mag) in self.bins.iter().zip(&analyser.smoothed) {
                slot.store(magnitude_to_byte(mag), Ordering::Relaxed);
            }
        }
    }

    /// Latest byte magnitudes, one per bin.  Lock-free; may be one window
    /// stale.
    pub fn snapshot(&self) -> Vec<u8> {
        self.bins.iter().map(|b| b.load(Ordering::Relaxed)).collect()
    }

    /// Mean of the latest snapshot, in `[0, 255]`.
    pub fn mean_magnitude(&self) -> f32 {
        if self.bins.is_empty() {
            return 0.0;
        }
        let sum: u32 = self
            .bins
            .iter()
            .map(|b| b.load(Ordering::Relaxed) as u32)
            .sum();
        sum as f32 / self.bins.len() as f32
    }
}

/// Map a linear magnitude onto `[0, 255]` between [`MIN_DECIBELS`] and
/// [`MAX_DECIBELS`].
pub fn magnitude_to_byte(magnitude: f32) -> u8 {
    if magnitude.is_nan() || magnitude <= 0.0 {
        return 0;
    }
    let db = 20.0 * magnitude.log10();
    let scaled = 255.0 * (db - MIN_DECIBELS) / (MAX_DECIBELS - MIN_DECIBELS);
    scaled.clamp(0.0, 255.0) as u8
}

fn blackman(n: usize) -> Vec<f32> {
    let (a0, a1, a2) = (0.42f32, 0.5f32, 0.08f32);
    (0..n)
        .map(|i| {
            let x = 2.0 * PI * i as f32 / n as f32;
            a0 - a1 * x.cos() + a2 * (2.0 * x).cos()
        })
        .collect()
}

// ---------------------------------------------------------------------------
// TapSet
// ---------------------------------------------------------------------------

/// All taps of one visualizer mount, subscribed together.
pub struct TapSet {
    taps: Vec<AnalysisTap>,
}

impl TapSet {
    pub fn new(configs: &[AnalysisTapConfig]) -> Arc<Self> {
        Arc::new(Self {
            taps: configs.iter().cloned().map(AnalysisTap::new).collect(),
        })
    }

    pub fn len(&self) -> usize {
        self.taps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.taps.is_empty()
    }

    pub fn taps(&self) -> &[AnalysisTap] {
        &self.taps
    }

    /// Mean magnitude per tap, in tap order.
    pub fn levels(&self) -> Vec<f32> {
        self.taps.iter().map(AnalysisTap::mean_magnitude).collect()
    }
}

impl ChunkSubscriber for TapSet {
    fn on_chunk(&self, chunk: &AudioChunk) {
        for tap in &self.taps {
            tap.push(&chunk.samples);
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn default_layout() -> Vec<AnalysisTapConfig> {
        AnalysisTapConfig::layout(&VisualizerConfig::default())
    }

    fn sine(freq: f32, rate: f32, len: usize, amp: f32) -> Vec<f32> {
        (0..len)
            .map(|i| {
            let phase = 2.0 * std::f64::consts::PI * freq as f64 * i as f64 / rate as f64;
            amp * phase.sin() as f32
        })
            .collect()
    }

    #[test]
    fn layout_matches_reference_geometry() {
        let taps = default_layout();
        assert_eq!(taps.len(), 6);
        let offsets: Vec<f32> = taps.iter().map(|t| t.offset).collect();
        assert_eq!(offsets, vec![-15.0, -10.0, -5.0, 0.0, 5.0, 10.0]);
        assert_eq!(taps[0].color, PALETTE[0]);
        assert_eq!(taps[5].color, PALETTE[5]);
        assert!((taps[2].speed - 0.000_15).abs() < 1e-12);
        assert!(taps.iter().all(|t| t.bin_count() == 128));
    }

    #[test]
    fn colours_cycle_past_the_palette() {
        let cfg = VisualizerConfig {
            tap_count: 8,
            ..VisualizerConfig::default()
        };
        let taps = AnalysisTapConfig::layout(&cfg);
        assert_eq!(taps[6].color, PALETTE[0]);
        assert_eq!(taps[7].color, PALETTE[1]);
    }

    #[test]
    fn silence_reads_as_zero() {
        let tap = AnalysisTap::new(default_layout().remove(0));
        tap.push(&vec![0.0; 1024]);
        assert!(tap.snapshot().iter().all(|&b| b == 0));
        assert_eq!(tap.mean_magnitude(), 0.0);
    }

    #[test]
    fn partial_window_does_not_update_snapshot() {
        let tap = AnalysisTap::new(default_layout().remove(0));
        tap.push(&sine(1_000.0, 16_000.0, 200, 0.9));
        assert_eq!(tap.mean_magnitude(), 0.0);
    }

    #[test]
    fn tone_raises_its_own_bin() {
        let tap = AnalysisTap::new(default_layout().remove(0));
        // 2 kHz at 16 kHz with a 256-point FFT lands in bin 32.
        tap.push(&sine(2_000.0, 16_000.0, 256 * 16, 0.9));

        let snap = tap.snapshot();
        assert_eq!(snap.len(), 128);
        assert_eq!(snap[32], 255);
        assert_eq!(snap.iter().copied().max(), Some(snap[32]));
        assert!(snap[100] < 50, "far bin {}", snap[100]);
        assert!(tap.mean_magnitude() > 0.0);
    }

    #[test]
    fn louder_input_gives_larger_mean() {
        let quiet = AnalysisTap::new(default_layout().remove(0));
        let loud = AnalysisTap::new(default_layout().remove(0));
        quiet.push(&sine(440.0, 16_000.0, 4096, 0.01));
        loud.push(&sine(440.0, 16_000.0, 4096, 0.9));
        assert!(loud.mean_magnitude() > quiet.mean_magnitude());
    }

    #[test]
    fn magnitude_to_byte_scale() {
        assert_eq!(magnitude_to_byte(0.0), 0);
        assert_eq!(magnitude_to_byte(f32::NAN), 0);
        // -100 dB and below clamp to 0, -30 dB and above to 255.
        assert_eq!(magnitude_to_byte(1e-6), 0);
        assert_eq!(magnitude_to_byte(1.0), 255);
        // -65 dB is the midpoint.
        let mid = magnitude_to_byte(10f32.powf(-65.0 / 20.0));
        assert!((126..=128).contains(&mid), "{mid}");
    }

    #[test]
    fn tap_set_feeds_every_tap() {
        let set = TapSet::new(&default_layout());
        set.on_chunk(&AudioChunk::new(sine(1_000.0, 16_000.0, 1024, 0.5), 16_000));
        assert_eq!(set.len(), 6);
        let levels = set.levels();
        assert_eq!(levels.len(), 6);
        assert!(levels.iter().all(|&l| l > 0.0));
    }
}
