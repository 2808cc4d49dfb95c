//! Inbound prediction log endpoint
//!
//! Receives the records the prediction sink posts after each successful
//! prediction and writes them to the service log. Whatever the body, the
//! answer is `{"status":"ok"}`.

use axum::{body::Bytes, routing::post, Json, Router};
use serde::Serialize;
use serde_json::Value;
use tracing::info;

use crate::AppState;

/// Image references longer than this are cut in the log line
const IMAGE_REF_LOG_CHARS: usize = 50;

#[derive(Debug, Serialize)]
pub struct LogAck {
    pub status: &'static str,
}

fn field<'a>(record: &'a Value, camel: &str, snake: &str) -> Option<&'a Value> {
    record.get(camel).or_else(|| record.get(snake))
}

fn truncate_reference(reference: &str) -> String {
    if reference.chars().count() > IMAGE_REF_LOG_CHARS {
        let head: String = reference.chars().take(IMAGE_REF_LOG_CHARS).collect();
        format!("{}...", head)
    } else {
        reference.to_string()
    }
}

/// POST /api/log-prediction
pub async fn log_prediction(body: Bytes) -> Json<LogAck> {
    match serde_json::from_slice::<Value>(&body) {
        Ok(record) => {
            let image_ref = field(&record, "imageUrl", "image_url")
                .and_then(Value::as_str)
                .map(truncate_reference)
                .unwrap_or_default();

            info!(
                target: "boneage_ui::telemetry",
                bone_age_months = ?field(&record, "boneAgeMonths", "bone_age_months"),
                confidence_score = ?field(&record, "confidenceScore", "confidence_score"),
                standard_deviation = ?field(&record, "standardDeviation", "standard_deviation"),
                timestamp = ?field(&record, "timestamp", "timestamp"),
                image_url = %image_ref,
                "Prediction logged"
            );
        }
        Err(_) => {
            info!(
                target: "boneage_ui::telemetry",
                bytes = body.len(),
                "Prediction log received (not JSON)"
            );
        }
    }

    Json(LogAck { status: "ok" })
}

/// Build logging routes
pub fn logging_routes() -> Router<AppState> {
    Router::new().route("/api/log-prediction", post(log_prediction))
}
