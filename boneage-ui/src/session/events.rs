//! Session events pushed to the page over SSE

use boneage_common::PredictionResult;
use serde::Serialize;
use uuid::Uuid;

/// Something the page should re-render for
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all_fields = "camelCase")]
pub enum SessionEvent {
    ImageSelected {
        file_name: String,
    },
    AnalysisStarted,
    ResultReady {
        entry_id: Uuid,
        result: PredictionResult,
    },
    AnalysisFailed {
        category: String,
        message: String,
    },
    Cleared,
}

impl SessionEvent {
    /// SSE event name
    pub fn name(&self) -> &'static str {
        match self {
            SessionEvent::ImageSelected { .. } => "ImageSelected",
            SessionEvent::AnalysisStarted => "AnalysisStarted",
            SessionEvent::ResultReady { .. } => "ResultReady",
            SessionEvent::AnalysisFailed { .. } => "AnalysisFailed",
            SessionEvent::Cleared => "Cleared",
        }
    }
}
