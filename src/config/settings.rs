//! Application settings structs, defaults and TOML persistence.
//!
//! All structs implement `Serialize`, `Deserialize`, `Default` and `Clone`
//! so they can be round-tripped through TOML files and shared across threads.
//! Every section is `#[serde(default)]`, so a partial `settings.toml` only
//! overrides the keys it names.

use std::time::Duration;

use anyhow::Result;
use serde::{Deserialize, Serialize};

use super::AppPaths;

// ---------------------------------------------------------------------------
// CaptureConfig
// ---------------------------------------------------------------------------

/// Live microphone capture settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CaptureConfig {
    /// Capture stops on its own after this many seconds.
    pub max_recording_secs: f32,
    /// Frames per capture callback requested from the driver.  `None` lets
    /// the device choose.
    pub block_size: Option<u32>,
    /// Input device name; `None` means the system default.
    pub audio_device: Option<String>,
}

const DEFAULT_MAX_RECORDING_SECS: f32 = 8.0;

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            max_recording_secs: DEFAULT_MAX_RECORDING_SECS,
            block_size: Some(4096),
            audio_device: None,
        }
    }
}

impl CaptureConfig {
    /// The recording ceiling.  Values that do not fit a `Duration`
    /// (`inf`, overflow) fall back to the default.
    pub fn max_recording(&self) -> Duration {
        Duration::try_from_secs_f32(self.max_recording_secs.max(0.0))
            .unwrap_or_else(|_| Duration::from_secs_f32(DEFAULT_MAX_RECORDING_SECS))
    }
}

// ---------------------------------------------------------------------------
// IngestConfig
// ---------------------------------------------------------------------------

/// Validation policy applied to every submission.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct IngestConfig {
    /// Files measured strictly longer than this are rejected.
    pub max_duration_secs: f64,
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            max_duration_secs: 10.0,
        }
    }
}

// ---------------------------------------------------------------------------
// ClassifierConfig
// ---------------------------------------------------------------------------

/// Where and how normalized audio is sent for classification.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ClassifierConfig {
    /// Full URL of the prediction endpoint.
    pub endpoint: String,
    /// Seconds to wait for the service before giving up.
    pub timeout_secs: u64,
}

impl Default for ClassifierConfig {
    fn default() -> Self {
        Self {
            endpoint: "https://manelbrh1342-emotion-recognition-app.hf.space/predict".into(),
            timeout_secs: 30,
        }
    }
}

// ---------------------------------------------------------------------------
// VisualizerConfig
// ---------------------------------------------------------------------------

/// Spectral waveform animation parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct VisualizerConfig {
    /// Number of analysis taps, one animated line each.
    pub tap_count: usize,
    /// FFT window length per tap (power of two).
    pub fft_size: usize,
    /// Vertical distance between neighbouring baselines, in points.
    pub line_spacing: f32,
    /// Peak displacement for a fully saturated spectrum, in points.
    pub motion_scale: f32,
    /// Phase advance in radians per millisecond for tap 0; tap `i` moves
    /// `i + 1` times as fast.
    pub base_speed: f64,
    /// Horizontal distance between polyline vertices, in points.
    pub sweep_step: f32,
    /// Canvas height in points.
    pub height: f32,
}

impl Default for VisualizerConfig {
    fn default() -> Self {
        Self {
            tap_count: 6,
            fft_size: 256,
            line_spacing: 5.0,
            motion_scale: 60.0,
            base_speed: 0.000_05,
            sweep_step: 10.0,
            height: 250.0,
        }
    }
}

// ---------------------------------------------------------------------------
// UiConfig
// ---------------------------------------------------------------------------

/// egui window appearance settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct UiConfig {
    /// Last saved window position `(x, y)` in screen pixels.
    pub window_position: Option<(f32, f32)>,
    /// Keep the window floating above all other windows.
    pub always_on_top: bool,
}

impl Default for UiConfig {
    fn default() -> Self {
        Self {
            window_position: None,
            always_on_top: false,
        }
    }
}

// ---------------------------------------------------------------------------
// AppConfig  (top-level)
// ---------------------------------------------------------------------------

/// Top-level application configuration, serialised as `settings.toml`.
///
/// ```rust,no_run
/// use voice_emotion::config::AppConfig;
///
/// // Load (returns Default when file is missing)
/// let config = AppConfig::load().unwrap();
/// assert!(config.capture.max_recording_secs > 0.0);
/// ```
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub capture: CaptureConfig,
    pub ingest: IngestConfig,
    pub classifier: ClassifierConfig,
    pub visualizer: VisualizerConfig,
    pub ui: UiConfig,
}

impl AppConfig {
    /// Load configuration from the platform-appropriate `settings.toml`.
    ///
    /// Returns `Ok(AppConfig::default())` when the file does not exist yet.
    pub fn load() -> Result<Self> {
        Self::load_from(&AppPaths::new().settings_file)
    }

    /// Load from an explicit path (useful for tests).
    pub fn load_from(path: &std::path::Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(path)?;
        let config: Self = toml::from_str(&content)?;
        Ok(config)
    }

    /// Save configuration to the platform-appropriate `settings.toml`,
    /// creating parent directories as needed.
    pub fn save(&self) -> Result<()> {
        self.save_to(&AppPaths::new().settings_file)
    }

    /// Save to an explicit path (useful for tests).
    pub fn save_to(&self, path: &std::path::Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn default_values_match_reference_configuration() {
        let cfg = AppConfig::default();

        assert_eq!(cfg.capture.max_recording_secs, 8.0);
        assert_eq!(cfg.capture.block_size, Some(4096));
        assert_eq!(cfg.capture.max_recording(), Duration::from_secs(8));
        assert_eq!(cfg.ingest.max_duration_secs, 10.0);
        assert!(cfg.classifier.endpoint.ends_with("/predict"));
        assert_eq!(cfg.visualizer.tap_count, 6);
        assert_eq!(cfg.visualizer.fft_size, 256);
        assert_eq!(cfg.visualizer.line_spacing, 5.0);
        assert_eq!(cfg.visualizer.motion_scale, 60.0);
    }

    #[test]
    fn load_missing_returns_default() {
        let dir = tempdir().expect("temp dir");
        let path = dir.path().join("nonexistent.toml");

        let config = AppConfig::load_from(&path).expect("should not error");
        assert_eq!(config.ingest.max_duration_secs, 10.0);
        assert_eq!(config.visualizer.tap_count, 6);
    }

    #[test]
    fn round_trip_modified_values() {
        let dir = tempdir().expect("temp dir");
        let path = dir.path().join("nested").join("settings.toml");

        let mut cfg = AppConfig::default();
        cfg.capture.max_recording_secs = 5.0;
        cfg.capture.block_size = None;
        cfg.capture.audio_device = Some("USB Mic".into());
        cfg.ingest.max_duration_secs = 12.5;
        cfg.classifier.endpoint = "http://localhost:8000/predict".into();
        cfg.visualizer.tap_count = 3;
        cfg.ui.window_position = Some((10.0, 20.0));

        cfg.save_to(&path).expect("save");
        let loaded = AppConfig::load_from(&path).expect("load");

        assert_eq!(loaded.capture.max_recording_secs, 5.0);
        assert_eq!(loaded.capture.block_size, None);
        assert_eq!(loaded.capture.audio_device.as_deref(), Some("USB Mic"));
        assert_eq!(loaded.ingest.max_duration_secs, 12.5);
        assert_eq!(loaded.classifier.endpoint, "http://localhost:8000/predict");
        assert_eq!(loaded.visualizer.tap_count, 3);
        assert_eq!(loaded.ui.window_position, Some((10.0, 20.0)));
    }

    #[test]
    fn partial_file_keeps_other_defaults() {
        let dir = tempdir().expect("temp dir");
        let path = dir.path().join("settings.toml");
        std::fs::write(&path, "[ingest]\nmax_duration_secs = 4.0\n").expect("write");

        let loaded = AppConfig::load_from(&path).expect("load");
        assert_eq!(loaded.ingest.max_duration_secs, 4.0);
        assert_eq!(loaded.capture.max_recording_secs, 8.0);
        assert_eq!(loaded.classifier.timeout_secs, 30);
    }

    #[test]
    fn unrepresentable_recording_limit_uses_default() {
        let dir = tempdir().expect("temp dir");
        let path = dir.path().join("settings.toml");
        std::fs::write(&path, "[capture]\nmax_recording_secs = inf\n").expect("write");

        let loaded = AppConfig::load_from(&path).expect("load");
        assert!(loaded.capture.max_recording_secs.is_infinite());
        assert_eq!(loaded.capture.max_recording(), Duration::from_secs(8));

        let negative = CaptureConfig {
            max_recording_secs: -3.0,
            ..CaptureConfig::default()
        };
        assert_eq!(negative.max_recording(), Duration::ZERO);
    }

    #[test]
    fn malformed_file_is_an_error() {
        let dir = tempdir().expect("temp dir");
        let path = dir.path().join("settings.toml");
        std::fs::write(&path, "capture = [not valid").expect("write");

        assert!(AppConfig::load_from(&path).is_err());
    }
}
