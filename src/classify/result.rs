//! The classification service's answer.
//!
//! The service replies with a JSON object like
//!
//! ```json
//! { "prediction": "happy",
//!   "probabilities": { "angry": 0.01, "calm": 0.04, "happy": 0.82, "sad": 0.13 } }
//! ```
//!
//! Only those two fields are read; anything else in the body is ignored.
//! The probability map is kept exactly as received.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::client::ClassifyError;

/// Predicted emotion label plus the per-label probability map.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassificationResult {
    pub prediction: String,
    pub probabilities: BTreeMap<String, f64>,
}

impl ClassificationResult {
    /// Validate and extract a result from an arbitrary JSON body.
    ///
    /// # Errors
    ///
    /// [`ClassifyError::InvalidResponse`] when `prediction` is missing or not
    /// a non-empty string, when `probabilities` is missing or not an object,
    /// or when any probability is not a number in `[0, 1]`.
    pub fn from_json(body: &serde_json::Value) -> Result<Self, ClassifyError> {
        let prediction = body
            .get("prediction")
            .and_then(|v| v.as_str())
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .ok_or_else(|| invalid("missing \"prediction\" label"))?
            .to_string();

        let raw = body
            .get("probabilities")
            .and_then(|v| v.as_object())
            .ok_or_else(|| invalid("missing \"probabilities\" object"))?;

        let mut probabilities = BTreeMap::new();
        for (label, value) in raw {
            let p = value
                .as_f64()
                .ok_or_else(|| invalid(format!("probability for {label:?} is not a number")))?;
            if !(0.0..=1.0).contains(&p) {
                return Err(invalid(format!("probability for {label:?} out of range: {p}")));
            }
            probabilities.insert(label.clone(), p);
        }

        Ok(Self {
            prediction,
            probabilities,
        })
    }

    /// Labels ordered by descending probability, ties broken alphabetically.
    pub fn ranked(&self) -> Vec<(&str, f64)> {
        let mut ranked: Vec<(&str, f64)> = self
            .probabilities
            .iter()
            .map(|(label, p)| (label.as_str(), *p))
            .collect();
        ranked.sort_by(|a, b| b.1.total_cmp(&a.1).then_with(|| a.0.cmp(b.0)));
        ranked
    }

    /// Probability of the predicted label, if the map contains it.
    pub fn confidence(&self) -> Option<f64> {
        self.probabilities.get(&self.prediction).copied()
    }

    /// Confidence of the prediction as a whole percentage, e.g. `0.82` → `82`.
    pub fn dominant_percent(&self) -> Option<u32> {
        self.confidence().map(|p| (p * 100.0).round() as u32)
    }
}

fn invalid(msg: impl Into<String>) -> ClassifyError {
    ClassifyError::InvalidResponse(msg.into())
}
