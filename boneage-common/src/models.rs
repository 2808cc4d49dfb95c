//! Data model shared by the prediction service and its UI
//!
//! JSON field names follow the browser page's conventions (camelCase).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize, Serializer};
use uuid::Uuid;

use crate::time::to_iso_millis;
use crate::{Error, Result};

/// Patient record attached to a prediction
///
/// Every field is a plain string so the form can hold half-typed values;
/// completeness is only checked when a prediction is submitted.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PatientInfo {
    /// Hospital/patient identifier (may be empty)
    pub id: String,
    /// Full name (required for submission)
    pub name: String,
    /// Date of birth, `YYYY-MM-DD` (required for submission)
    pub date_of_birth: String,
    /// Gender token, e.g. "male" or "female" (required for submission)
    pub gender: String,
    /// Referring physician (optional)
    pub referring_physician: String,
}

impl PatientInfo {
    /// Names of the required fields that are still blank
    pub fn missing_required_fields(&self) -> Vec<&'static str> {
        let mut missing = Vec::new();
        if self.name.trim().is_empty() {
            missing.push("name");
        }
        if self.date_of_birth.trim().is_empty() {
            missing.push("dateOfBirth");
        }
        if self.gender.trim().is_empty() {
            missing.push("gender");
        }
        missing
    }

    /// Merge a partial update field-by-field
    pub fn apply(&mut self, update: PatientInfoUpdate) {
        let PatientInfoUpdate {
            id,
            name,
            date_of_birth,
            gender,
            referring_physician,
        } = update;

        if let Some(v) = id {
            self.id = v;
        }
        if let Some(v) = name {
            self.name = v;
        }
        if let Some(v) = date_of_birth {
            self.date_of_birth = v;
        }
        if let Some(v) = gender {
            self.gender = v;
        }
        if let Some(v) = referring_physician {
            self.referring_physician = v;
        }
    }
}

/// Partial patient update; absent fields are left unchanged
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PatientInfoUpdate {
    pub id: Option<String>,
    pub name: Option<String>,
    pub date_of_birth: Option<String>,
    pub gender: Option<String>,
    pub referring_physician: Option<String>,
}

/// Normalized output of one bone age prediction
///
/// Fields are private: a result is immutable once built, and
/// [`PredictionResult::new`] refuses values outside their domain.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PredictionResult {
    bone_age_months: f64,
    confidence_score: f64,
    standard_deviation: f64,
    #[serde(serialize_with = "serialize_timestamp")]
    timestamp: DateTime<Utc>,
    image_url: String,
}

impl PredictionResult {
    /// Build a result, checking the numeric invariants
    ///
    /// - bone age: finite and >= 0
    /// - confidence: finite and within [0, 1]
    /// - standard deviation: finite and >= 0
    pub fn new(
        bone_age_months: f64,
        confidence_score: f64,
        standard_deviation: f64,
        image_url: impl Into<String>,
        timestamp: DateTime<Utc>,
    ) -> Result<Self> {
        if !bone_age_months.is_finite() || bone_age_months < 0.0 {
            return Err(Error::InvalidInput(format!(
                "bone age must be a non-negative number of months, got {}",
                bone_age_months
            )));
        }
        if !confidence_score.is_finite() || !(0.0..=1.0).contains(&confidence_score) {
            return Err(Error::InvalidInput(format!(
                "confidence score must lie in [0, 1], got {}",
                confidence_score
            )));
        }
        if !standard_deviation.is_finite() || standard_deviation < 0.0 {
            return Err(Error::InvalidInput(format!(
                "standard deviation must be non-negative, got {}",
                standard_deviation
            )));
        }

        Ok(Self {
            bone_age_months,
            confidence_score,
            standard_deviation,
            timestamp,
            image_url: image_url.into(),
        })
    }

    pub fn bone_age_months(&self) -> f64 {
        self.bone_age_months
    }

    pub fn confidence_score(&self) -> f64 {
        self.confidence_score
    }

    pub fn standard_deviation(&self) -> f64 {
        self.standard_deviation
    }

    pub fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }

    /// Timestamp rendered as ISO-8601 with milliseconds
    pub fn timestamp_iso(&self) -> String {
        to_iso_millis(self.timestamp)
    }

    /// Reference to the analysed image (data URL or remote URL)
    pub fn image_url(&self) -> &str {
        &self.image_url
    }

    /// Confidence band for display
    pub fn confidence_band(&self) -> ConfidenceBand {
        ConfidenceBand::from_score(self.confidence_score)
    }
}

fn serialize_timestamp<S: Serializer>(ts: &DateTime<Utc>, s: S) -> std::result::Result<S::Ok, S::Error> {
    s.serialize_str(&to_iso_millis(*ts))
}

/// A past prediction paired with the patient record active at submission
///
/// The patient is a value copy; later edits to the live form never reach it.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryEntry {
    id: Uuid,
    #[serde(flatten)]
    result: PredictionResult,
    patient_info: PatientInfo,
}

impl HistoryEntry {
    pub fn new(result: PredictionResult, patient_info: PatientInfo) -> Self {
        Self {
            id: Uuid::new_v4(),
            result,
            patient_info,
        }
    }

    /// Stable identifier used by the detail view
    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn result(&self) -> &PredictionResult {
        &self.result
    }

    pub fn patient_info(&self) -> &PatientInfo {
        &self.patient_info
    }

    /// Case-insensitive substring match against patient name or ID
    ///
    /// `needle_lower` must already be lowercased.
    pub fn matches(&self, needle_lower: &str) -> bool {
        self.patient_info.name.to_lowercase().contains(needle_lower)
            || self.patient_info.id.to_lowercase().contains(needle_lower)
    }
}

/// Confidence classification used for colouring and reports
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConfidenceBand {
    /// >= 0.95
    VeryHigh,
    /// >= 0.90
    High,
    /// >= 0.80
    Moderate,
    Low,
}

impl ConfidenceBand {
    pub fn from_score(score: f64) -> Self {
        if score >= 0.95 {
            ConfidenceBand::VeryHigh
        } else if score >= 0.9 {
            ConfidenceBand::High
        } else if score >= 0.8 {
            ConfidenceBand::Moderate
        } else {
            ConfidenceBand::Low
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            ConfidenceBand::VeryHigh => "very high",
            ConfidenceBand::High => "high",
            ConfidenceBand::Moderate => "moderate",
            ConfidenceBand::Low => "low",
        }
    }
}

/// Render a unit-interval score as a percentage with one decimal, e.g. "95.0%"
pub fn format_percent(score: f64) -> String {
    format!("{:.1}%", score * 100.0)
}

/// Round to two decimal places
pub fn round_hundredths(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}
