//! HTTP client for the external bone age inference endpoint
//!
//! Sends the selected image as a single multipart part named `file` and
//! normalizes the JSON answer. Every request carries a fixed timeout so an
//! unresponsive endpoint surfaces as a request failure instead of leaving a
//! session stuck in the analyzing state.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use boneage_common::{time, PredictionResult};
use reqwest::multipart::{Form, Part};
use tracing::{debug, info, warn};

use super::{PredictError, PredictionResponse, Predictor};
use crate::image::{is_image_type, SelectedImage};
use crate::sink::PredictionSink;

const USER_AGENT: &str = concat!("boneage-ui/", env!("CARGO_PKG_VERSION"));
const MULTIPART_FIELD: &str = "file";
const MAX_ERROR_BODY_CHARS: usize = 512;

/// Prediction endpoint client
pub struct HttpPredictionClient {
    http_client: reqwest::Client,
    endpoint: String,
    sink: Arc<dyn PredictionSink>,
}

impl HttpPredictionClient {
    /// Create a client with its own connection pool and request timeout
    pub fn new(
        endpoint: impl Into<String>,
        timeout: Duration,
        sink: Arc<dyn PredictionSink>,
    ) -> Result<Self, PredictError> {
        let http_client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(timeout)
            .build()
            .map_err(|e| PredictError::Transport(e.to_string()))?;

        Ok(Self::with_client(http_client, endpoint, sink))
    }

    /// Create a client around an existing `reqwest::Client`
    pub fn with_client(
        http_client: reqwest::Client,
        endpoint: impl Into<String>,
        sink: Arc<dyn PredictionSink>,
    ) -> Self {
        Self {
            http_client,
            endpoint: endpoint.into(),
            sink,
        }
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    fn build_form(image: &SelectedImage) -> Result<Form, PredictError> {
        let part = Part::bytes(image.bytes().to_vec())
            .file_name(image.file_name().to_string())
            .mime_str(image.content_type())
            .map_err(|_| PredictError::UnsupportedFileType(image.content_type().to_string()))?;

        Ok(Form::new().part(MULTIPART_FIELD, part))
    }
}

#[async_trait]
impl Predictor for HttpPredictionClient {
    async fn predict(&self, image: &SelectedImage) -> Result<PredictionResult, PredictError> {
        if !is_image_type(image.content_type()) {
            return Err(PredictError::UnsupportedFileType(
                image.content_type().to_string(),
            ));
        }

        let form = Self::build_form(image)?;

        debug!(
            endpoint = %self.endpoint,
            file_name = image.file_name(),
            size_bytes = image.bytes().len(),
            "Sending prediction request"
        );

        let response = self
            .http_client
            .post(&self.endpoint)
            .multipart(form)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    PredictError::Transport(format!("timed out waiting for {}", self.endpoint))
                } else {
                    PredictError::Transport(e.to_string())
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            let body: String = response
                .text()
                .await
                .unwrap_or_default()
                .chars()
                .take(MAX_ERROR_BODY_CHARS)
                .collect();
            warn!(status = status.as_u16(), "Prediction endpoint returned an error status");
            return Err(PredictError::RequestFailed {
                status: status.as_u16(),
                body,
            });
        }

        let body = response
            .bytes()
            .await
            .map_err(|e| PredictError::Transport(e.to_string()))?;

        let result = PredictionResponse::parse(&body)
            .and_then(|parsed| parsed.normalize(image, time::now()))
            .map_err(|e| {
                warn!("Prediction endpoint returned an unusable body: {}", e);
                e
            })?;

        info!(
            bone_age_months = result.bone_age_months(),
            confidence_score = result.confidence_score(),
            standard_deviation = result.standard_deviation(),
            "Prediction received"
        );

        self.sink.record(&result);

        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sink::RecordingSink;

    #[test]
    fn test_client_creation() {
        let client = HttpPredictionClient::new(
            "http://localhost:8000/predict",
            Duration::from_secs(30),
            Arc::new(RecordingSink::new()),
        );
        assert!(client.is_ok());
        assert_eq!(client.unwrap().endpoint(), "http://localhost:8000/predict");
    }

    #[test]
    fn test_form_builds_for_image() {
        let image = SelectedImage::from_upload(
            Some("hand.png".to_string()),
            Some("image/png".to_string()),
            vec![1, 2, 3],
        )
        .unwrap();
        assert!(HttpPredictionClient::build_form(&image).is_ok());
    }

    #[tokio::test]
    async fn test_unreachable_endpoint_is_request_failure() {
        let sink = RecordingSink::new();
        let client = HttpPredictionClient::new(
            "http://127.0.0.1:9/predict",
            Duration::from_secs(2),
            Arc::new(sink.clone()),
        )
        .unwrap();
        let image = SelectedImage::from_upload(None, Some("image/png".to_string()), vec![1]).unwrap();

        let err = client.predict(&image).await.unwrap_err();

        assert_eq!(err.category(), "request_failed");
        assert!(sink.is_empty());
    }
}
