//! Detail view and printable report for one prediction
//!
//! Adds the derived figures the page shows next to a result: chronological
//! age from the date of birth, the bone/chronological difference, year-month
//! breakdowns and the confidence band.

use std::fmt;

use boneage_common::age::{age_difference_months, chronological_age_months, AgeBreakdown};
use boneage_common::models::{format_percent, ConfidenceBand};
use boneage_common::{HistoryEntry, PatientInfo, PredictionResult};
use chrono::NaiveDate;
use serde::Serialize;
use uuid::Uuid;

/// One bar of the age comparison chart
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct AgeComparison {
    pub name: &'static str,
    pub age: f64,
}

/// Result plus derived figures
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResultDetail {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub entry_id: Option<Uuid>,
    pub result: PredictionResult,
    pub patient_info: PatientInfo,
    pub bone_age: AgeBreakdown,
    pub confidence: String,
    pub confidence_band: ConfidenceBand,
    pub chronological_age_months: Option<i64>,
    pub chronological_age: Option<AgeBreakdown>,
    pub age_difference_months: Option<f64>,
    /// Empty when chronological age is unknown
    pub age_comparison: Vec<AgeComparison>,
}

impl ResultDetail {
    /// Derive the detail view as of `today`
    pub fn new(result: &PredictionResult, patient_info: &PatientInfo, today: NaiveDate) -> Self {
        let bone_age_months = result.bone_age_months();
        let chronological = chronological_age_months(&patient_info.date_of_birth, today);

        let age_comparison = match chronological {
            Some(months) => vec![
                AgeComparison {
                    name: "Chronological",
                    age: months as f64,
                },
                AgeComparison {
                    name: "Bone",
                    age: bone_age_months,
                },
            ],
            None => Vec::new(),
        };

        Self {
            entry_id: None,
            result: result.clone(),
            patient_info: patient_info.clone(),
            bone_age: AgeBreakdown::from_months(bone_age_months),
            confidence: format_percent(result.confidence_score()),
            confidence_band: result.confidence_band(),
            chronological_age_months: chronological,
            chronological_age: chronological.map(|m| AgeBreakdown::from_months(m as f64)),
            age_difference_months: chronological.map(|m| age_difference_months(bone_age_months, m)),
            age_comparison,
        }
    }

    pub fn for_entry(entry: &HistoryEntry, today: NaiveDate) -> Self {
        Self {
            entry_id: Some(entry.id()),
            ..Self::new(entry.result(), entry.patient_info(), today)
        }
    }

    /// Plain-text report suitable for download or printing
    pub fn render_text(&self) -> String {
        TextReport(self).to_string()
    }
}

/// Printable layout of a [`ResultDetail`]
pub struct TextReport<'a>(pub &'a ResultDetail);

impl fmt::Display for TextReport<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let detail = self.0;
        let patient = &detail.patient_info;
        let result = &detail.result;

        writeln!(f, "BONE AGE ASSESSMENT REPORT")?;
        writeln!(f, "==========================")?;
        writeln!(f)?;
        writeln!(f, "Patient:             {}", patient.name)?;
        writeln!(f, "Patient ID:          {}", or_not_specified(&patient.id))?;
        writeln!(f, "Gender:              {}", patient.gender)?;
        writeln!(f, "Date of Birth:       {}", patient.date_of_birth)?;
        writeln!(
            f,
            "Referring Physician: {}",
            or_not_specified(&patient.referring_physician)
        )?;
        writeln!(f)?;
        writeln!(f, "Prediction Time:     {}", result.timestamp_iso())?;
        writeln!(
            f,
            "Predicted Bone Age:  {} months ({})",
            result.bone_age_months(),
            detail.bone_age
        )?;
        writeln!(
            f,
            "Confidence Score:    {} ({})",
            detail.confidence,
            detail.confidence_band.label()
        )?;
        writeln!(
            f,
            "Standard Deviation:  +/-{:.1} months",
            result.standard_deviation()
        )?;

        match (
            detail.chronological_age_months,
            detail.chronological_age,
            detail.age_difference_months,
        ) {
            (Some(months), Some(breakdown), Some(diff)) => {
                let sign = if diff > 0.0 { "+" } else { "" };
                writeln!(f, "Chronological Age:   {} months ({})", months, breakdown)?;
                writeln!(f, "Age Difference:      {}{} months", sign, diff)
            }
            _ => writeln!(f, "Chronological Age:   unavailable"),
        }
    }
}

fn or_not_specified(value: &str) -> &str {
    if value.trim().is_empty() {
        "Not specified"
    } else {
        value
    }
}
