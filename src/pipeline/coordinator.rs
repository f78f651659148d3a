//! Ingest coordinator: the single validation path every submission takes.
//!
//! ```text
//! AudioInput ─▶ MIME check ─▶ decode ─▶ duration ≤ limit ─▶ re-encode WAV
//!                                                                │
//!           ResultBroadcaster ◀── publish ◀── Classifier ◀───────┘
//! ```
//!
//! A captured recording and a dropped file go through exactly the same
//! steps.  Decoding runs on the blocking pool; only one submission may be in
//! flight at a time and a second one is rejected with [`IngestError::Busy`].

use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use thiserror::Error;
use tokio::sync::mpsc;

use super::notify::ResultBroadcaster;
use crate::audio::{decode_audio, wav_filename, WavArtifact};
use crate::classify::{ClassificationResult, Classifier};

// ---------------------------------------------------------------------------
// IngestError
// ---------------------------------------------------------------------------

/// Why a submission was not classified.  The `Display` text is what the user
/// sees; the carried detail is for the log.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum IngestError {
    /// The input does not declare an `audio/*` MIME type.
    #[error("Please select an audio file (MP3, WAV, M4A, etc.)")]
    InvalidFileType(String),

    /// The container or codec could not be decoded.
    #[error("Unable to read audio file. Please try a different format.")]
    UnsupportedFormat(String),

    /// Measured duration is strictly greater than the configured ceiling.
    #[error("Audio must be {limit} seconds or shorter. Your file is {measured:.1} seconds long.")]
    DurationExceeded { measured: f64, limit: f64 },

    /// The classification service failed or returned something unusable.
    #[error("Failed to process your audio file. Please try a different file.")]
    DispatchFailure(String),

    /// Another submission is still being processed.
    #[error("Already processing an audio file. Please wait for the result.")]
    Busy,

    /// The submission carried no bytes.
    #[error("No audio was captured. Please try again.")]
    NoAudio,
}

// ---------------------------------------------------------------------------
// AudioInput
// ---------------------------------------------------------------------------

/// One submission: a name, a declared MIME type and the raw file bytes.
#[derive(Debug, Clone, PartialEq)]
pub struct AudioInput {
    pub name: String,
    pub mime: String,
    pub bytes: Vec<u8>,
}

impl AudioInput {
    pub fn new(name: impl Into<String>, mime: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            name: name.into(),
            mime: mime.into(),
            bytes,
        }
    }

    /// A freshly captured recording.
    pub fn from_artifact(artifact: WavArtifact) -> Self {
        Self {
            name: artifact.filename,
            mime: artifact.mime,
            bytes: artifact.bytes,
        }
    }

    /// Read a file from disk, deriving the MIME type from its extension.
    pub async fn from_path(path: &Path) -> std::io::Result<Self> {
        let bytes = tokio::fs::read(path).await?;
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        Ok(Self::new(name, mime_for_path(path), bytes))
    }

    /// Lower-case extension of `name`, used as a probe hint.
    pub fn extension(&self) -> Option<String> {
        Path::new(&self.name)
            .extension()
            .map(|e| e.to_string_lossy().to_ascii_lowercase())
    }
}

/// Extensions the decoder can read.  Used for the MIME table and the file
/// picker filter.
pub const AUDIO_EXTENSIONS: &[&str] = &["wav", "mp3", "m4a", "mp4", "aac", "flac", "ogg", "oga"];

/// MIME type for a file, judged by its extension.  Containers the decoder
/// cannot read (Opus, WebM) are not typed as audio.
///
/// ```
/// use std::path::Path;
/// use voice_emotion::pipeline::mime_for_path;
///
/// assert_eq!(mime_for_path(Path::new("clip.MP3")), "audio/mpeg");
/// assert_eq!(mime_for_path(Path::new("notes.txt")), "application/octet-stream");
/// ```
pub fn mime_for_path(path: &Path) -> &'static str {
    let ext = path
        .extension()
        .map(|e| e.to_string_lossy().to_ascii_lowercase())
        .unwrap_or_default();
    match ext.as_str() {
        "wav" => "audio/wav",
        "mp3" => "audio/mpeg",
        "m4a" | "mp4" => "audio/mp4",
        "aac" => "audio/aac",
        "flac" => "audio/flac",
        "ogg" | "oga" => "audio/ogg",
        _ => "application/octet-stream",
    }
}

// ---------------------------------------------------------------------------
// normalize
// ---------------------------------------------------------------------------

/// Validate `input` and re-encode it as 16-bit PCM WAV.
///
/// Steps, in order: MIME check, decode, duration check against
/// `max_duration_secs`, re-encode.  A file exactly at the limit is accepted.
pub fn normalize(input: &AudioInput, max_duration_secs: f64) -> Result<WavArtifact, IngestError> {
    if !input.mime.starts_with("audio/") {
        return Err(IngestError::InvalidFileType(input.mime.clone()));
    }
    if input.bytes.is_empty() {
        return Err(IngestError::NoAudio);
    }

    let decoded = decode_audio(&input.bytes, input.extension().as_deref())
        .map_err(|e| IngestError::UnsupportedFormat(e.to_string()))?;

    let measured = decoded.duration_secs();
    if measured > max_duration_secs {
        return Err(IngestError::DurationExceeded {
            measured,
            limit: max_duration_secs,
        });
    }

    Ok(WavArtifact::encode(
        &decoded.samples,
        decoded.sample_rate,
        decoded.channels,
        wav_filename(&input.name),
    ))
}

// ---------------------------------------------------------------------------
// IngestCoordinator
// ---------------------------------------------------------------------------

pub struct IngestCoordinator {
    classifier: Arc<dyn Classifier>,
    results: ResultBroadcaster,
    max_duration_secs: f64,
    in_flight: AtomicBool,
}

impl IngestCoordinator {
    pub fn new(classifier: Arc<dyn Classifier>, max_duration_secs: f64) -> Self {
        Self {
            classifier,
            results: ResultBroadcaster::new(),
            max_duration_secs,
            in_flight: AtomicBool::new(false),
        }
    }

    /// Listen for every published [`ClassificationResult`].
    pub fn subscribe(&self) -> mpsc::UnboundedReceiver<ClassificationResult> {
        self.results.subscribe()
    }

    pub fn max_duration_secs(&self) -> f64 {
        self.max_duration_secs
    }

    /// `true` while a submission is being validated or classified.
    pub fn is_busy(&self) -> bool {
        self.in_flight.load(Ordering::Acquire)
    }

    /// Validate, normalize, classify and publish one submission.
    ///
    /// On success the result has already been broadcast when this returns.
    /// Failures are returned to the caller and never retried.
    pub async fn ingest(&self, input: AudioInput) -> Result<ClassificationResult, IngestError> {
        let _guard = InFlight::acquire(&self.in_flight).ok_or(IngestError::Busy)?;

        log::info!(
            "ingest: {:?} ({}, {} bytes)",
            input.name,
            input.mime,
            input.bytes.len()
        );

        let limit = self.max_duration_secs;
        let artifact = tokio::task::spawn_blocking(move || normalize(&input, limit))
            .await
            .map_err(|e| IngestError::UnsupportedFormat(format!("decoder task failed: {e}")))?
            .inspect_err(|e| log::warn!("ingest: rejected: {e:?}"))?;

        log::debug!(
            "ingest: dispatching {:?} ({} bytes)",
            artifact.filename,
            artifact.len()
        );

        let result = self.classifier.classify(&artifact).await.map_err(|e| {
            log::warn!("ingest: dispatch failed: {e}");
            IngestError::DispatchFailure(e.to_string())
        })?;

        self.results.publish(&result);
        Ok(result)
    }
}

/// Holds the in-flight flag for the duration of one submission.
struct InFlight<'a>(&'a AtomicBool);

impl<'a> InFlight<'a> {
    fn acquire(flag: &'a AtomicBool) -> Option<Self> {
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| InFlight(flag))
    }
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
