//! Risk scoring for lab results.
//!
//! Provides:
//! - [`FeatureTransform`] - builds a [`FeatureVector`] from a result and snapshot
//! - [`RiskClassifier`] - turns the vector into a [`RiskDecision`]

mod classifier;
mod features;

pub use classifier::{
    LinearClassifier, RiskClassifier, RiskDecision, ThresholdClassifier, DEFAULT_RATIO_THRESHOLD,
};
pub use features::{CreatinineFeatures, FeatureTransform, FeatureVector};
