//! `Classifier` trait and the HTTP implementation.
//!
//! [`HttpClassifier`] posts the normalized WAV as a `multipart/form-data`
//! body with a single `file` field, the same shape a browser `FormData`
//! upload has, and parses the JSON reply into a [`ClassificationResult`].

use std::time::Duration;

use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use thiserror::Error;

use super::result::ClassificationResult;
use crate::audio::WavArtifact;
use crate::config::ClassifierConfig;

/// Multipart field name the service reads the upload from.
pub const UPLOAD_FIELD: &str = "file";

// ---------------------------------------------------------------------------
// ClassifyError
// ---------------------------------------------------------------------------

/// Errors that can occur while classifying an artifact.
#[derive(Debug, Error)]
pub enum ClassifyError {
    /// HTTP transport or connection error.
    #[error("classification request failed: {0}")]
    Request(String),

    /// The service did not answer within the configured timeout.
    #[error("classification request timed out")]
    Timeout,

    /// The service answered with a non-success status.
    #[error("classification service returned HTTP {0}")]
    Status(u16),

    /// The body was not JSON.
    #[error("failed to parse classification response: {0}")]
    Parse(String),

    /// The body was JSON but not a usable result.
    #[error("invalid classification response: {0}")]
    InvalidResponse(String),
}

impl From<reqwest::Error> for ClassifyError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            ClassifyError::Timeout
        } else {
            ClassifyError::Request(e.to_string())
        }
    }
}

// ---------------------------------------------------------------------------
// Classifier trait
// ---------------------------------------------------------------------------

/// Sends one normalized WAV artifact for emotion classification.
///
/// Implementors must be `Send + Sync` so they can be shared as
/// `Arc<dyn Classifier>` between the ingest coordinator and its tasks.
#[async_trait]
pub trait Classifier: Send + Sync {
    async fn classify(&self, artifact: &WavArtifact) -> Result<ClassificationResult, ClassifyError>;
}

// ---------------------------------------------------------------------------
// HttpClassifier
// ---------------------------------------------------------------------------

/// Posts artifacts to the configured prediction endpoint.
pub struct HttpClassifier {
    client: reqwest::Client,
    endpoint: String,
}

impl HttpClassifier {
    /// Build a classifier from application config.
    ///
    /// The client carries the per-request timeout from
    /// `config.timeout_secs`; if the builder fails a default client is used.
    pub fn from_config(config: &ClassifierConfig) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());

        Self {
            client,
            endpoint: config.endpoint.clone(),
        }
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

/// Multipart body carrying `artifact` under [`UPLOAD_FIELD`].
pub fn upload_form(artifact: &WavArtifact) -> Result<Form, ClassifyError> {
    let part = Part::bytes(artifact.bytes.clone())
        .file_name(artifact.filename.clone())
        .mime_str(&artifact.mime)?;
    Ok(Form::new().part(UPLOAD_FIELD, part))
}

#[async_trait]
impl Classifier for HttpClassifier {
    async fn classify(&self, artifact: &WavArtifact) -> Result<ClassificationResult, ClassifyError> {
        log::debug!(
            "classify: POST {} ({} bytes as {:?})",
            self.endpoint,
            artifact.len(),
            artifact.filename
        );

        let response = self
            .client
            .post(&self.endpoint)
            .multipart(upload_form(artifact)?)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            log::warn!("classify: service answered {status}");
            return Err(ClassifyError::Status(status.as_u16()));
        }

        let json: serde_json::Value = response
            .json()
            .await
            .map_err(|e| ClassifyError::Parse(e.to_string()))?;

        let result = ClassificationResult::from_json(&json)?;
        log::info!("classify: prediction {:?}", result.prediction);
        Ok(result)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
