//! Per-session state store
//!
//! Plain synchronous state machine; locking and async orchestration live in
//! [`super::SessionHandle`]. A prediction is split into `begin_submit`
//! (validate, raise the analyzing flag, snapshot inputs) and
//! `complete_submit` (apply the outcome) so no lock is held while the
//! endpoint works.
//!
//! ```text
//! Idle -> ImageSelected -> Analyzing -> ResultReady
//!                              |
//!                              +-> ImageSelected   (failure, error surfaced)
//! clear(): any -> Idle          set_image(): any -> ImageSelected
//! ```
//!
//! `clear` and `set_image` supersede an in-flight submission: its outcome is
//! dropped, but the analyzing flag stays raised until the request returns.

use std::collections::VecDeque;

use boneage_common::{HistoryEntry, PatientInfo, PatientInfoUpdate, PredictionResult};
use serde::Serialize;
use uuid::Uuid;

use super::{SessionError, ValidationFailure};
use crate::history;
use crate::image::SelectedImage;
use crate::prediction::PredictError;

/// Where the session is in the prediction cycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionPhase {
    Idle,
    ImageSelected,
    Analyzing,
    ResultReady,
}

/// Inputs captured when a submission starts
#[derive(Debug, Clone)]
pub struct PendingSubmission {
    generation: u64,
    image: SelectedImage,
    patient_info: PatientInfo,
}

impl PendingSubmission {
    pub fn image(&self) -> &SelectedImage {
        &self.image
    }

    pub fn patient_info(&self) -> &PatientInfo {
        &self.patient_info
    }
}

/// State of one clinician session
#[derive(Debug, Default)]
pub struct Session {
    image: Option<SelectedImage>,
    patient_info: PatientInfo,
    current_result: Option<PredictionResult>,
    /// Newest first
    history: VecDeque<HistoryEntry>,
    /// Generation of the submission whose request is out, if any
    in_flight: Option<u64>,
    /// Bumped by anything that invalidates an in-flight submission
    generation: u64,
}

impl Session {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the selected image; any current result is stale
    pub fn set_image(&mut self, image: SelectedImage) {
        self.image = Some(image);
        self.current_result = None;
        self.supersede_in_flight();
    }

    /// Merge a partial patient update (no validation here)
    pub fn set_patient_info(&mut self, update: PatientInfoUpdate) {
        self.patient_info.apply(update);
    }

    /// Validate preconditions and mark the session as analyzing
    pub fn begin_submit(&mut self) -> Result<PendingSubmission, SessionError> {
        if self.in_flight.is_some() {
            return Err(SessionError::AlreadyAnalyzing);
        }

        let Some(image) = self.image.clone() else {
            return Err(ValidationFailure::MissingImage.into());
        };

        let missing = self.patient_info.missing_required_fields();
        if !missing.is_empty() {
            return Err(ValidationFailure::IncompletePatientInfo(missing).into());
        }

        self.in_flight = Some(self.generation);

        Ok(PendingSubmission {
            generation: self.generation,
            image,
            patient_info: self.patient_info.clone(),
        })
    }

    /// Apply the outcome of a submission started with `begin_submit`
    ///
    /// Success sets the current result and prepends a history entry holding
    /// the patient snapshot taken at submission time. Failure leaves result
    /// and history untouched. Outcomes of superseded submissions are dropped.
    /// The analyzing flag is lowered whatever the outcome.
    pub fn complete_submit(
        &mut self,
        pending: PendingSubmission,
        outcome: Result<PredictionResult, PredictError>,
    ) -> Result<HistoryEntry, SessionError> {
        self.in_flight = None;

        if pending.generation != self.generation {
            return Err(SessionError::Superseded);
        }

        let result = outcome?;
        let entry = HistoryEntry::new(result.clone(), pending.patient_info);

        self.current_result = Some(result);
        self.history.push_front(entry.clone());

        Ok(entry)
    }

    /// Reset image, result and patient info; history is kept
    pub fn clear(&mut self) {
        self.image = None;
        self.current_result = None;
        self.patient_info = PatientInfo::default();
        self.supersede_in_flight();
    }

    fn supersede_in_flight(&mut self) {
        self.generation = self.generation.wrapping_add(1);
    }

    /// A superseded request still in flight does not count as analyzing here
    pub fn phase(&self) -> SessionPhase {
        if self.in_flight == Some(self.generation) {
            SessionPhase::Analyzing
        } else if self.current_result.is_some() {
            SessionPhase::ResultReady
        } else if self.image.is_some() {
            SessionPhase::ImageSelected
        } else {
            SessionPhase::Idle
        }
    }

    /// True while any prediction request is out, superseded or not
    pub fn is_analyzing(&self) -> bool {
        self.in_flight.is_some()
    }

    pub fn image(&self) -> Option<&SelectedImage> {
        self.image.as_ref()
    }

    pub fn patient_info(&self) -> &PatientInfo {
        &self.patient_info
    }

    pub fn current_result(&self) -> Option<&PredictionResult> {
        self.current_result.as_ref()
    }

    /// Past predictions, newest first
    pub fn history(&self) -> impl Iterator<Item = &HistoryEntry> {
        self.history.iter()
    }

    pub fn history_len(&self) -> usize {
        self.history.len()
    }

    pub fn find_entry(&self, id: Uuid) -> Option<&HistoryEntry> {
        self.history.iter().find(|entry| entry.id() == id)
    }

    /// History entries whose patient name or ID contains `term`
    pub fn search_history(&self, term: &str) -> Vec<&HistoryEntry> {
        history::filter(self.history.iter(), term)
    }
}
