//! Fire-and-forget prediction telemetry
//!
//! After a successful prediction the flattened result is posted to a
//! collection endpoint. Recording never blocks and never fails from the
//! caller's point of view: once the post is handed to a background task the
//! record counts as accepted. There is no retry and no acknowledgement.

use std::sync::{Arc, Mutex};

use boneage_common::PredictionResult;
use tracing::{debug, warn};

/// Destination for prediction records
pub trait PredictionSink: Send + Sync {
    /// Hand off one record; returns once it is accepted for delivery
    fn record(&self, result: &PredictionResult);
}

/// Posts records as JSON to an HTTP endpoint
pub struct HttpLogSink {
    http_client: reqwest::Client,
    endpoint: String,
}

impl HttpLogSink {
    pub fn new(http_client: reqwest::Client, endpoint: impl Into<String>) -> Self {
        Self {
            http_client,
            endpoint: endpoint.into(),
        }
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

impl PredictionSink for HttpLogSink {
    fn record(&self, result: &PredictionResult) {
        // Requires a tokio runtime; outside one there is nowhere to hand off to
        let Ok(runtime) = tokio::runtime::Handle::try_current() else {
            warn!("No async runtime available, dropping prediction record");
            return;
        };

        let request = self.http_client.post(&self.endpoint).json(result);
        let endpoint = self.endpoint.clone();

        runtime.spawn(async move {
            match request.send().await {
                Ok(response) if response.status().is_success() => {
                    debug!(endpoint = %endpoint, "Prediction record delivered");
                }
                Ok(response) => {
                    warn!(
                        endpoint = %endpoint,
                        status = response.status().as_u16(),
                        "Prediction log endpoint rejected record"
                    );
                }
                Err(e) => {
                    warn!(endpoint = %endpoint, "Prediction log delivery failed: {}", e);
                }
            }
        });
    }
}

/// Discards every record (telemetry disabled)
#[derive(Debug, Default)]
pub struct NullSink;

impl PredictionSink for NullSink {
    fn record(&self, _result: &PredictionResult) {}
}

/// Keeps records in memory, for tests and local inspection
#[derive(Debug, Default, Clone)]
pub struct RecordingSink {
    records: Arc<Mutex<Vec<PredictionResult>>>,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of everything recorded so far
    pub fn records(&self) -> Vec<PredictionResult> {
        self.records
            .lock()
            .map(|records| records.clone())
            .unwrap_or_default()
    }

    pub fn len(&self) -> usize {
        self.records.lock().map(|records| records.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl PredictionSink for RecordingSink {
    fn record(&self, result: &PredictionResult) {
        if let Ok(mut records) = self.records.lock() {
            records.push(result.clone());
        }
    }
}
