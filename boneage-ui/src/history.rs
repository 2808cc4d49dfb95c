//! History search and table rows

use boneage_common::age::AgeBreakdown;
use boneage_common::models::format_percent;
use boneage_common::HistoryEntry;
use serde::Serialize;
use uuid::Uuid;

/// Entries whose patient name or ID contains `term`, ignoring case
///
/// An empty or blank term matches everything. Order is preserved.
pub fn filter<'a>(
    entries: impl IntoIterator<Item = &'a HistoryEntry>,
    term: &str,
) -> Vec<&'a HistoryEntry> {
    let needle = term.trim().to_lowercase();
    entries
        .into_iter()
        .filter(|entry| entry.matches(&needle))
        .collect()
}

/// One row of the history table
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryRow {
    pub id: Uuid,
    pub timestamp: String,
    pub patient_name: String,
    /// "-" when the patient has no ID
    pub patient_id: String,
    pub gender: String,
    pub bone_age_months: f64,
    pub bone_age: AgeBreakdown,
    pub confidence: String,
}

impl From<&HistoryEntry> for HistoryRow {
    fn from(entry: &HistoryEntry) -> Self {
        let result = entry.result();
        let patient = entry.patient_info();

        Self {
            id: entry.id(),
            timestamp: result.timestamp_iso(),
            patient_name: patient.name.clone(),
            patient_id: if patient.id.is_empty() {
                "-".to_string()
            } else {
                patient.id.clone()
            },
            gender: patient.gender.clone(),
            bone_age_months: result.bone_age_months(),
            bone_age: AgeBreakdown::from_months(result.bone_age_months()),
            confidence: format_percent(result.confidence_score()),
        }
    }
}
