//! Risk classifiers.
//!
//! Two implementations ship with the crate:
//! - [`ThresholdClassifier`] flags a rise of the current value over the
//!   previous one by a fixed ratio (KDIGO stage 1 uses 1.5x)
//! - [`LinearClassifier`] applies weights exported from an offline model
//!
//! # Example
//!
//! ```
//! use aki_client::risk::{LinearClassifier, RiskClassifier, RiskDecision, FeatureVector};
//!
//! let model = LinearClassifier::from_json(r#"{"weights": [1.0, -1.0], "bias": 0.0}"#).unwrap();
//! let decision = model.classify(&FeatureVector(vec![2.0, 1.0])).unwrap();
//! assert_eq!(decision, RiskDecision::Positive);
//! ```

use std::path::Path;

use serde::Deserialize;

use super::features::{CreatinineFeatures, FeatureVector};
use crate::error::{ClientError, Result};

/// Binary classifier output.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RiskDecision {
    Negative,
    Positive,
}

impl RiskDecision {
    pub fn is_positive(&self) -> bool {
        matches!(self, RiskDecision::Positive)
    }
}

/// Feature vector → decision.
pub trait RiskClassifier: Send + Sync {
    fn classify(&self, features: &FeatureVector) -> Result<RiskDecision>;
}

/// Default ratio threshold.
pub const DEFAULT_RATIO_THRESHOLD: f64 = 1.5;

/// Positive when one feature reaches a threshold.
#[derive(Debug, Clone, Copy)]
pub struct ThresholdClassifier {
    /// Which feature to compare.
    pub index: usize,
    pub threshold: f64,
}

impl ThresholdClassifier {
    pub fn new(index: usize, threshold: f64) -> Self {
        Self { index, threshold }
    }
}

impl Default for ThresholdClassifier {
    fn default() -> Self {
        Self::new(CreatinineFeatures::RATIO_INDEX, DEFAULT_RATIO_THRESHOLD)
    }
}

impl RiskClassifier for ThresholdClassifier {
    fn classify(&self, features: &FeatureVector) -> Result<RiskDecision> {
        let value = features.as_slice().get(self.index).ok_or_else(|| {
            ClientError::Classifier(format!(
                "feature {} requested from a vector of length {}",
                self.index,
                features.len()
            ))
        })?;

        Ok(if *value >= self.threshold {
            RiskDecision::Positive
        } else {
            RiskDecision::Negative
        })
    }
}

/// Logistic-regression style linear model.
///
/// Positive when `w · x + b > 0`.
#[derive(Debug, Clone, Deserialize)]
pub struct LinearClassifier {
    pub weights: Vec<f64>,
    #[serde(default)]
    pub bias: f64,
}

impl LinearClassifier {
    /// Parse a model from JSON text.
    pub fn from_json(text: &str) -> Result<Self> {
        let model: Self = serde_json::from_str(text)?;
        if model.weights.is_empty() {
            return Err(ClientError::Classifier("model has no weights".into()));
        }
        Ok(model)
    }

    /// Load a model from a JSON file.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_json(&text)
    }

    /// Raw decision score.
    pub fn score(&self, features: &FeatureVector) -> Result<f64> {
        if features.len() != self.weights.len() {
            return Err(ClientError::Classifier(format!(
                "model expects {} features, got {}",
                self.weights.len(),
                features.len()
            )));
        }

        let dot: f64 = self
            .weights
            .iter()
            .zip(features.as_slice())
            .map(|(w, x)| w * x)
            .sum();
        Ok(dot + self.bias)
    }
}

impl RiskClassifier for LinearClassifier {
    fn classify(&self, features: &FeatureVector) -> Result<RiskDecision> {
        Ok(if self.score(features)? > 0.0 {
            RiskDecision::Positive
        } else {
            RiskDecision::Negative
        })
    }
}
