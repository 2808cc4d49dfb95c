//! Prediction endpoint response schema and normalization
//!
//! The endpoint returns JSON with a required numeric `bone_age_months` and
//! optional `confidenceScore` / `standardDeviation`. Other fields (such as
//! the endpoint's own timestamp) are ignored.

use boneage_common::models::round_hundredths;
use boneage_common::PredictionResult;
use chrono::{DateTime, Utc};
use serde::Deserialize;

use super::PredictError;
use crate::image::SelectedImage;

/// Substituted when the endpoint omits a confidence score
pub const DEFAULT_CONFIDENCE_SCORE: f64 = 0.95;

/// Substituted when the endpoint omits a standard deviation (months)
pub const DEFAULT_STANDARD_DEVIATION: f64 = 4.2;

/// Expected response body
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct PredictionResponse {
    pub bone_age_months: f64,

    #[serde(default, rename = "confidenceScore", alias = "confidence_score")]
    pub confidence_score: Option<f64>,

    #[serde(default, rename = "standardDeviation", alias = "standard_deviation")]
    pub standard_deviation: Option<f64>,
}

impl PredictionResponse {
    /// Response carrying only a bone age
    pub fn bone_age(bone_age_months: f64) -> Self {
        Self {
            bone_age_months,
            confidence_score: None,
            standard_deviation: None,
        }
    }

    /// Parse a response body
    pub fn parse(body: &[u8]) -> Result<Self, PredictError> {
        serde_json::from_slice(body).map_err(|e| PredictError::MalformedResponse(e.to_string()))
    }

    /// Build the canonical result
    ///
    /// Bone age is rounded to two decimals, missing optional fields take
    /// their defaults, the image reference is the selected image and the
    /// timestamp is `now`. Values outside their domain are rejected.
    pub fn normalize(
        self,
        image: &SelectedImage,
        now: DateTime<Utc>,
    ) -> Result<PredictionResult, PredictError> {
        if self.bone_age_months < 0.0 {
            return Err(PredictError::MalformedResponse(format!(
                "negative bone age {}",
                self.bone_age_months
            )));
        }

        PredictionResult::new(
            round_hundredths(self.bone_age_months),
            self.confidence_score.unwrap_or(DEFAULT_CONFIDENCE_SCORE),
            self.standard_deviation.unwrap_or(DEFAULT_STANDARD_DEVIATION),
            image.data_url(),
            now,
        )
        .map_err(|e| PredictError::MalformedResponse(e.to_string()))
    }
}
