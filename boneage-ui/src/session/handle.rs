//! Async handle around one session's state
//!
//! The lock is only held for state transitions, never across the
//! prediction request; the analyzing flag is what keeps a second submit out
//! while one is in flight.

use std::sync::Mutex as StdMutex;
use std::time::{Duration, Instant};

use boneage_common::{time, HistoryEntry, PatientInfo, PatientInfoUpdate, PredictionResult};
use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::{broadcast, Mutex};
use tracing::{info, info_span, warn, Instrument, Span};
use uuid::Uuid;

use super::{Session, SessionError, SessionEvent, SessionPhase};
use crate::image::{ImageSummary, SelectedImage};
use crate::prediction::Predictor;

const EVENT_CAPACITY: usize = 32;

/// Everything the page needs to render the predict tab
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionSnapshot {
    pub session_id: Uuid,
    pub phase: SessionPhase,
    pub analyzing: bool,
    pub image: Option<ImageSummary>,
    pub patient_info: PatientInfo,
    pub current_result: Option<PredictionResult>,
    pub history_length: usize,
}

/// A finished prediction and the history length right after it
#[derive(Debug, Clone)]
pub struct Submitted {
    pub entry: HistoryEntry,
    pub history_length: usize,
}

/// One page of history plus the unfiltered count, read together
#[derive(Debug, Clone)]
pub struct HistoryPage {
    pub entries: Vec<HistoryEntry>,
    pub total: usize,
}

/// Shared, lockable session
pub struct SessionHandle {
    id: Uuid,
    state: Mutex<Session>,
    events: broadcast::Sender<SessionEvent>,
    span: Span,
    started_at: DateTime<Utc>,
    last_activity: StdMutex<Instant>,
}

impl SessionHandle {
    /// Start a session; opens its tracing span
    pub fn new(id: Uuid) -> Self {
        let span = info_span!("session", session_id = %id);
        info!(parent: &span, "Session started");

        let (events, _) = broadcast::channel(EVENT_CAPACITY);

        Self {
            id,
            state: Mutex::new(Session::new()),
            events,
            span,
            started_at: time::now(),
            last_activity: StdMutex::new(Instant::now()),
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    /// Record activity (resets the idle clock)
    pub fn touch(&self) {
        if let Ok(mut last) = self.last_activity.lock() {
            *last = Instant::now();
        }
    }

    /// Time since the last activity
    pub fn idle_for(&self) -> Duration {
        self.last_activity
            .lock()
            .map(|last| last.elapsed())
            .unwrap_or_default()
    }

    /// Whether an event stream is attached (an open page)
    pub fn has_subscribers(&self) -> bool {
        self.events.receiver_count() > 0
    }

    /// Subscribe to this session's events
    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.events.subscribe()
    }

    fn publish(&self, event: SessionEvent) {
        // No subscribers is fine
        let _ = self.events.send(event);
    }

    fn snapshot_of(&self, session: &Session) -> SessionSnapshot {
        SessionSnapshot {
            session_id: self.id,
            phase: session.phase(),
            analyzing: session.is_analyzing(),
            image: session.image().map(SelectedImage::summary),
            patient_info: session.patient_info().clone(),
            current_result: session.current_result().cloned(),
            history_length: session.history_len(),
        }
    }

    pub async fn snapshot(&self) -> SessionSnapshot {
        let session = self.state.lock().await;
        self.snapshot_of(&session)
    }

    pub async fn set_image(&self, image: SelectedImage) -> SessionSnapshot {
        let file_name = image.file_name().to_string();
        let mut session = self.state.lock().await;

        if session.is_analyzing() {
            warn!(
                parent: &self.span,
                "New image selected during analysis; pending result will be discarded"
            );
        }
        session.set_image(image);
        info!(parent: &self.span, file_name = %file_name, "Image selected");

        self.publish(SessionEvent::ImageSelected { file_name });
        self.snapshot_of(&session)
    }

    pub async fn set_patient_info(&self, update: PatientInfoUpdate) -> PatientInfo {
        let mut session = self.state.lock().await;
        session.set_patient_info(update);
        session.patient_info().clone()
    }

    /// Run one prediction for the selected image and current patient
    ///
    /// Rejected without any request when preconditions fail or another
    /// analysis is in flight. The returned entry carries the patient snapshot
    /// taken when the submission started.
    pub async fn submit(&self, predictor: &dyn Predictor) -> Result<Submitted, SessionError> {
        let pending = {
            let mut session = self.state.lock().await;
            session.begin_submit().map_err(|e| {
                info!(parent: &self.span, "Submission rejected: {}", e);
                e
            })?
        };

        info!(parent: &self.span, "Analysis started");
        self.publish(SessionEvent::AnalysisStarted);

        let outcome = predictor
            .predict(pending.image())
            .instrument(self.span.clone())
            .await;

        let completed = {
            let mut session = self.state.lock().await;
            session.complete_submit(pending, outcome).map(|entry| Submitted {
                entry,
                history_length: session.history_len(),
            })
        };
        self.touch();

        match completed {
            Ok(submitted) => {
                let result = submitted.entry.result();
                info!(
                    parent: &self.span,
                    bone_age_months = result.bone_age_months(),
                    "Analysis complete"
                );
                self.publish(SessionEvent::ResultReady {
                    entry_id: submitted.entry.id(),
                    result: result.clone(),
                });
                Ok(submitted)
            }
            Err(SessionError::Superseded) => {
                info!(parent: &self.span, "Discarded outcome of superseded analysis");
                Err(SessionError::Superseded)
            }
            Err(e) => {
                let category = match &e {
                    SessionError::Prediction(p) => p.category(),
                    _ => "session",
                };
                warn!(parent: &self.span, category, "Analysis failed: {}", e);
                self.publish(SessionEvent::AnalysisFailed {
                    category: category.to_string(),
                    message: e.to_string(),
                });
                Err(e)
            }
        }
    }

    pub async fn clear(&self) -> SessionSnapshot {
        let mut session = self.state.lock().await;
        session.clear();
        info!(parent: &self.span, "Session cleared");

        self.publish(SessionEvent::Cleared);
        self.snapshot_of(&session)
    }

    /// History entries matching `search` (all when `None`), newest first
    pub async fn history(&self, search: Option<&str>) -> HistoryPage {
        let session = self.state.lock().await;
        let entries = match search {
            Some(term) => session.search_history(term).into_iter().cloned().collect(),
            None => session.history().cloned().collect(),
        };
        HistoryPage {
            entries,
            total: session.history_len(),
        }
    }

    pub async fn entry(&self, entry_id: Uuid) -> Option<HistoryEntry> {
        let session = self.state.lock().await;
        session.find_entry(entry_id).cloned()
    }

    /// Close the session's span with a summary line
    pub async fn end(&self, reason: &str) {
        let session = self.state.lock().await;
        let duration = time::now().signed_duration_since(self.started_at);
        info!(
            parent: &self.span,
            reason,
            predictions = session.history_len(),
            duration_seconds = duration.num_seconds().max(0),
            "Session ended"
        );
    }
}
