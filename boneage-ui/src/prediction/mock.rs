//! Test double for the prediction endpoint
//!
//! **Not a model.** `MockPredictor` returns canned endpoint responses so the
//! UI and session flow can be exercised without the inference service. It is
//! wired in only by tests or by starting the service with `--mock-predictor`,
//! which logs a warning at startup.
//!
//! Canned responses go through the same normalization as real ones.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use boneage_common::{time, PredictionResult};
use tokio::sync::Notify;
use tracing::debug;

use super::{PredictError, PredictionResponse, Predictor};
use crate::image::SelectedImage;
use crate::sink::PredictionSink;

type Outcome = Result<PredictionResponse, PredictError>;

/// Scripted stand-in for [`super::HttpPredictionClient`]
pub struct MockPredictor {
    outcomes: Vec<Outcome>,
    calls: AtomicUsize,
    delay: Option<Duration>,
    gate: Option<Arc<Notify>>,
    sink: Option<Arc<dyn PredictionSink>>,
}

impl MockPredictor {
    /// Play the outcomes in order; the last one repeats once exhausted
    ///
    /// An empty script behaves like an endpoint answering 503.
    pub fn scripted(outcomes: Vec<Outcome>) -> Self {
        Self {
            outcomes,
            calls: AtomicUsize::new(0),
            delay: None,
            gate: None,
            sink: None,
        }
    }

    /// Always answer with the given bone age and no optional fields
    pub fn fixed(bone_age_months: f64) -> Self {
        Self::scripted(vec![Ok(PredictionResponse::bone_age(bone_age_months))])
    }

    /// Always fail with the given error
    pub fn failing(error: PredictError) -> Self {
        Self::scripted(vec![Err(error)])
    }

    /// Development mode: fixed answer after a short simulated analysis
    pub fn development() -> Self {
        Self::scripted(vec![Ok(PredictionResponse {
            bone_age_months: 120.0,
            confidence_score: Some(0.9),
            standard_deviation: Some(3.5),
        })])
        .with_delay(Duration::from_secs(2))
    }

    /// Sleep before answering
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Hold every call until the gate is notified
    pub fn with_gate(mut self, gate: Arc<Notify>) -> Self {
        self.gate = Some(gate);
        self
    }

    /// Forward successful results to a sink, like the real client
    pub fn with_sink(mut self, sink: Arc<dyn PredictionSink>) -> Self {
        self.sink = Some(sink);
        self
    }

    /// Number of predictions requested so far
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    fn outcome_for(&self, call: usize) -> Outcome {
        match self.outcomes.get(call).or_else(|| self.outcomes.last()) {
            Some(outcome) => outcome.clone(),
            None => Err(PredictError::RequestFailed {
                status: 503,
                body: "mock predictor has no scripted outcome".to_string(),
            }),
        }
    }
}

#[async_trait]
impl Predictor for MockPredictor {
    async fn predict(&self, image: &SelectedImage) -> Result<PredictionResult, PredictError> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst);
        debug!(call, "Mock prediction requested");

        if let Some(gate) = &self.gate {
            gate.notified().await;
        }
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }

        let result = self.outcome_for(call)?.normalize(image, time::now())?;

        if let Some(sink) = &self.sink {
            sink.record(&result);
        }

        Ok(result)
    }
}
