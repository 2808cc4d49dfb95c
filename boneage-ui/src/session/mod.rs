//! Session state: one store per browser session
//!
//! - [`Session`]: synchronous state machine (image, patient, result, history)
//! - [`SessionHandle`]: async access, duplicate-submission guard, events, span
//! - [`SessionRegistry`]: lookup by session ID, idle eviction

mod events;
mod handle;
mod registry;
mod store;

pub use events::SessionEvent;
pub use handle::{HistoryPage, SessionHandle, SessionSnapshot, Submitted};
pub use registry::SessionRegistry;
pub use store::{PendingSubmission, Session, SessionPhase};

use thiserror::Error;

use crate::image::ImageError;
use crate::prediction::PredictError;

/// Submission preconditions that were not met
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationFailure {
    #[error("No image selected: please upload an X-ray image first")]
    MissingImage,

    #[error("Incomplete patient information: please fill in {}", .0.join(", "))]
    IncompletePatientInfo(Vec<&'static str>),
}

/// Session operation errors
#[derive(Debug, Error)]
pub enum SessionError {
    #[error(transparent)]
    Validation(#[from] ValidationFailure),

    #[error(transparent)]
    Image(#[from] ImageError),

    #[error("An analysis is already in progress")]
    AlreadyAnalyzing,

    #[error(transparent)]
    Prediction(#[from] PredictError),

    #[error("Analysis was superseded by a new image or a clear")]
    Superseded,
}
