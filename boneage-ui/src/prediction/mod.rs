//! Bone age prediction
//!
//! One abstraction, [`Predictor`], with one real implementation
//! ([`HttpPredictionClient`]) and one explicitly labeled test double
//! ([`MockPredictor`]). Both produce results through the same response
//! normalization.

pub mod client;
pub mod mock;
pub mod response;

pub use client::HttpPredictionClient;
pub use mock::MockPredictor;
pub use response::{PredictionResponse, DEFAULT_CONFIDENCE_SCORE, DEFAULT_STANDARD_DEVIATION};

use async_trait::async_trait;
use boneage_common::PredictionResult;
use thiserror::Error;

use crate::image::SelectedImage;

/// Prediction errors
///
/// `RequestFailed` and `Transport` are both request failures from the
/// user's point of view; `MalformedResponse` means the endpoint answered
/// successfully with something that is not a usable prediction.
#[derive(Debug, Clone, Error)]
pub enum PredictError {
    #[error("Unsupported file type '{0}'")]
    UnsupportedFileType(String),

    #[error("Prediction request failed with status {status}")]
    RequestFailed { status: u16, body: String },

    #[error("Prediction request failed: {0}")]
    Transport(String),

    #[error("Malformed prediction response: {0}")]
    MalformedResponse(String),
}

impl PredictError {
    /// Short category name for logs and UI
    pub fn category(&self) -> &'static str {
        match self {
            PredictError::UnsupportedFileType(_) => "unsupported_file_type",
            PredictError::RequestFailed { .. } | PredictError::Transport(_) => "request_failed",
            PredictError::MalformedResponse(_) => "malformed_response",
        }
    }
}

/// Something that turns an image into a bone age prediction
#[async_trait]
pub trait Predictor: Send + Sync {
    async fn predict(&self, image: &SelectedImage) -> Result<PredictionResult, PredictError>;
}
