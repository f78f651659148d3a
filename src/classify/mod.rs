//! Emotion classification over HTTP.
//!
//! ```text
//! WavArtifact ──▶ Classifier::classify ──▶ POST multipart "file" ──▶ JSON
//!                                                                    │
//!                                  ClassificationResult ◀── from_json┘
//! ```

pub mod client;
pub mod result;

pub use client::{upload_form, Classifier, ClassifyError, HttpClassifier, UPLOAD_FIELD};
pub use result::ClassificationResult;
