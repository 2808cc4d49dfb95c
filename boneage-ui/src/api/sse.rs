//! Server-Sent Events (SSE) for one session
//!
//! Streams events:
//! - ConnectionStatus (on connect)
//! - ImageSelected
//! - AnalysisStarted
//! - ResultReady
//! - AnalysisFailed
//! - Cleared

use std::convert::Infallible;
use std::time::Duration;

use axum::{
    extract::{Path, State},
    response::sse::{Event, KeepAlive, Sse},
};
use futures::stream::Stream;
use tokio::sync::broadcast::error::RecvError;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::error::{ApiError, ApiResult};
use crate::AppState;

const HEARTBEAT: Duration = Duration::from_secs(15);

/// GET /api/sessions/:id/events
pub async fn session_event_stream(
    State(state): State<AppState>,
    Path(session_id): Path<Uuid>,
) -> ApiResult<Sse<impl Stream<Item = Result<Event, Infallible>>>> {
    let handle = state
        .sessions
        .get(session_id)
        .await
        .ok_or_else(|| ApiError::NotFound(format!("session {}", session_id)))?;

    // Only the receiver moves into the stream; the session itself is not kept alive
    let mut rx = handle.subscribe();
    drop(handle);

    info!(session_id = %session_id, "New SSE client connected to session events");

    let stream = async_stream::stream! {
        yield Ok(Event::default()
            .event("ConnectionStatus")
            .data("connected"));

        loop {
            match rx.recv().await {
                Ok(event) => {
                    let event_type = event.name();
                    match serde_json::to_string(&event) {
                        Ok(event_json) => {
                            debug!("SSE: Broadcasting session event: {}", event_type);
                            yield Ok(Event::default().event(event_type).data(event_json));
                        }
                        Err(e) => {
                            warn!("SSE: Failed to serialize event {}: {}", event_type, e);
                        }
                    }
                }
                Err(RecvError::Lagged(skipped)) => {
                    warn!(skipped, "SSE: Client lagging, events dropped");
                }
                Err(RecvError::Closed) => {
                    debug!(session_id = %session_id, "SSE: Session ended, closing stream");
                    break;
                }
            }
        }
    };

    Ok(Sse::new(stream).keep_alive(KeepAlive::new().interval(HEARTBEAT).text("heartbeat")))
}
