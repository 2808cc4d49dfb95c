//! Error types for boneage-ui HTTP handlers
//!
//! Every failure reaches the page as `{"error": {"code", "message"}}`.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

use crate::image::ImageError;
use crate::prediction::PredictError;
use crate::session::SessionError;

/// API error type
#[derive(Debug, Error)]
pub enum ApiError {
    /// Unknown session or history entry (404)
    #[error("Resource not found: {0}")]
    NotFound(String),

    /// Unreadable request, e.g. bad multipart (400)
    #[error("Invalid request: {0}")]
    BadRequest(String),

    /// Session operation failed
    #[error(transparent)]
    Session(#[from] SessionError),
}

impl From<ImageError> for ApiError {
    fn from(err: ImageError) -> Self {
        ApiError::Session(SessionError::Image(err))
    }
}

impl ApiError {
    /// HTTP status and stable error code
    pub fn status_and_code(&self) -> (StatusCode, &'static str) {
        match self {
            ApiError::NotFound(_) => (StatusCode::NOT_FOUND, "NOT_FOUND"),
            ApiError::BadRequest(_) => (StatusCode::BAD_REQUEST, "BAD_REQUEST"),
            ApiError::Session(err) => match err {
                SessionError::Validation(_) => (StatusCode::BAD_REQUEST, "VALIDATION_FAILED"),
                SessionError::Image(ImageError::UnsupportedFileType(_)) => {
                    (StatusCode::UNSUPPORTED_MEDIA_TYPE, "UNSUPPORTED_FILE_TYPE")
                }
                SessionError::Image(ImageError::Empty) => {
                    (StatusCode::BAD_REQUEST, "BAD_REQUEST")
                }
                SessionError::AlreadyAnalyzing => (StatusCode::CONFLICT, "ANALYSIS_IN_PROGRESS"),
                SessionError::Superseded => (StatusCode::CONFLICT, "SUPERSEDED"),
                SessionError::Prediction(p) => match p {
                    PredictError::UnsupportedFileType(_) => {
                        (StatusCode::UNSUPPORTED_MEDIA_TYPE, "UNSUPPORTED_FILE_TYPE")
                    }
                    PredictError::RequestFailed { .. } | PredictError::Transport(_) => {
                        (StatusCode::BAD_GATEWAY, "REQUEST_FAILED")
                    }
                    PredictError::MalformedResponse(_) => {
                        (StatusCode::BAD_GATEWAY, "MALFORMED_RESPONSE")
                    }
                },
            },
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, error_code) = self.status_and_code();

        let body = Json(json!({
            "error": {
                "code": error_code,
                "message": self.to_string(),
            }
        }));

        (status, body).into_response()
    }
}

/// Result type for API handlers
pub type ApiResult<T> = Result<T, ApiError>;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::ValidationFailure;

    #[test]
    fn test_status_mapping() {
        let cases: Vec<(ApiError, StatusCode, &str)> = vec![
            (
                SessionError::Validation(ValidationFailure::MissingImage).into(),
                StatusCode::BAD_REQUEST,
                "VALIDATION_FAILED",
            ),
            (
                ImageError::UnsupportedFileType("text/plain".into()).into(),
                StatusCode::UNSUPPORTED_MEDIA_TYPE,
                "UNSUPPORTED_FILE_TYPE",
            ),
            (
                SessionError::Prediction(PredictError::Transport("timed out".into())).into(),
                StatusCode::BAD_GATEWAY,
                "REQUEST_FAILED",
            ),
            (
                SessionError::Prediction(PredictError::MalformedResponse("x".into())).into(),
                StatusCode::BAD_GATEWAY,
                "MALFORMED_RESPONSE",
            ),
            (
                SessionError::AlreadyAnalyzing.into(),
                StatusCode::CONFLICT,
                "ANALYSIS_IN_PROGRESS",
            ),
            (
                SessionError::Superseded.into(),
                StatusCode::CONFLICT,
                "SUPERSEDED",
            ),
            (
                ApiError::NotFound("session".into()),
                StatusCode::NOT_FOUND,
                "NOT_FOUND",
            ),
        ];

        for (err, status, code) in cases {
            assert_eq!(err.status_and_code(), (status, code), "{}", err);
        }
    }
}
