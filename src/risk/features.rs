//! Feature transform from a lab result and patient snapshot.

use crate::error::Result;
use crate::message::LabResult;
use crate::store::PatientSnapshot;

/// Ordered numeric classifier input.
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureVector(pub Vec<f64>);

impl FeatureVector {
    /// Number of features.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether the vector is empty.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Feature values.
    pub fn as_slice(&self) -> &[f64] {
        &self.0
    }
}

/// Builds classifier input for one result.
pub trait FeatureTransform: Send + Sync {
    fn transform(&self, result: &LabResult, snapshot: &PatientSnapshot) -> Result<FeatureVector>;
}

/// Default creatinine feature set.
///
/// Layout: `[age_years, sex_flag, current, previous, ratio]`.
///
/// - `age_years` at the time of observation; 0 when the dob is unknown
/// - `sex_flag` 1.0 for `F`, 0.0 otherwise
/// - `previous` is the latest stored value, or the current value when the
///   patient has no history, which makes `ratio` 1.0
#[derive(Debug, Clone, Copy, Default)]
pub struct CreatinineFeatures;

impl CreatinineFeatures {
    /// Index of the current/previous ratio in the vector.
    pub const RATIO_INDEX: usize = 4;

    /// Length of the vector this transform produces.
    pub const LEN: usize = 5;
}

impl FeatureTransform for CreatinineFeatures {
    fn transform(&self, result: &LabResult, snapshot: &PatientSnapshot) -> Result<FeatureVector> {
        let age_years = snapshot
            .dob
            .map(|dob| {
                let days = (result.observed_at.date() - dob.date()).num_days();
                (days as f64 / 365.25).max(0.0)
            })
            .unwrap_or(0.0);

        let sex_flag = match snapshot.sex.as_deref() {
            Some(s) if s.eq_ignore_ascii_case("F") => 1.0,
            _ => 0.0,
        };

        let current = result.value;
        let previous = snapshot.latest_measurement.unwrap_or(current);
        let ratio = if previous > 0.0 { current / previous } else { 1.0 };

        Ok(FeatureVector(vec![age_years, sex_flag, current, previous, ratio]))
    }
}
