//! Session API: image, patient form, submission, history
//!
//! Every route but `POST /api/sessions` addresses an existing session by
//! its ID; unknown IDs answer 404.

use std::sync::Arc;

use axum::{
    extract::{Multipart, Path, Query, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, patch, post},
    Json, Router,
};
use boneage_common::{time, PatientInfo, PatientInfoUpdate};
use serde::{Deserialize, Serialize};
use tracing::debug;
use uuid::Uuid;

use crate::error::{ApiError, ApiResult};
use crate::history::HistoryRow;
use crate::image::SelectedImage;
use crate::report::ResultDetail;
use crate::session::{SessionHandle, SessionSnapshot};
use crate::AppState;

/// Multipart field carrying the image
const FILE_FIELD: &str = "file";

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionCreated {
    pub session_id: Uuid,
}

#[derive(Debug, Deserialize)]
pub struct HistoryQuery {
    pub search: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryResponse {
    pub entries: Vec<HistoryRow>,
    /// Entries in the session, before filtering
    pub total: usize,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmitResponse {
    pub detail: ResultDetail,
    pub history_length: usize,
}

async fn session(state: &AppState, session_id: Uuid) -> ApiResult<Arc<SessionHandle>> {
    state
        .sessions
        .get(session_id)
        .await
        .ok_or_else(|| ApiError::NotFound(format!("session {}", session_id)))
}

/// POST /api/sessions
pub async fn create_session(State(state): State<AppState>) -> (StatusCode, Json<SessionCreated>) {
    let handle = state.sessions.create().await;
    (
        StatusCode::CREATED,
        Json(SessionCreated {
            session_id: handle.id(),
        }),
    )
}

/// GET /api/sessions/:id
pub async fn get_session(
    State(state): State<AppState>,
    Path(session_id): Path<Uuid>,
) -> ApiResult<Json<SessionSnapshot>> {
    let handle = session(&state, session_id).await?;
    Ok(Json(handle.snapshot().await))
}

/// DELETE /api/sessions/:id
pub async fn end_session(
    State(state): State<AppState>,
    Path(session_id): Path<Uuid>,
) -> ApiResult<StatusCode> {
    if state.sessions.end(session_id).await {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(ApiError::NotFound(format!("session {}", session_id)))
    }
}

/// POST /api/sessions/:id/image
///
/// Multipart upload; the image is in the `file` field.
pub async fn upload_image(
    State(state): State<AppState>,
    Path(session_id): Path<Uuid>,
    mut multipart: Multipart,
) -> ApiResult<Json<SessionSnapshot>> {
    let handle = session(&state, session_id).await?;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::BadRequest(format!("Invalid multipart body: {}", e)))?
    {
        if field.name() != Some(FILE_FIELD) {
            debug!(field = ?field.name(), "Ignoring multipart field");
            continue;
        }

        let file_name = field.file_name().map(str::to_string);
        let content_type = field.content_type().map(str::to_string);
        let bytes = field
            .bytes()
            .await
            .map_err(|e| ApiError::BadRequest(format!("Failed to read upload: {}", e)))?;

        let image = SelectedImage::from_upload(file_name, content_type, bytes.to_vec())?;
        return Ok(Json(handle.set_image(image).await));
    }

    Err(ApiError::BadRequest(format!(
        "Missing multipart field '{}'",
        FILE_FIELD
    )))
}

/// PATCH /api/sessions/:id/patient
pub async fn update_patient(
    State(state): State<AppState>,
    Path(session_id): Path<Uuid>,
    Json(update): Json<PatientInfoUpdate>,
) -> ApiResult<Json<PatientInfo>> {
    let handle = session(&state, session_id).await?;
    Ok(Json(handle.set_patient_info(update).await))
}

/// POST /api/sessions/:id/submit
pub async fn submit(
    State(state): State<AppState>,
    Path(session_id): Path<Uuid>,
) -> ApiResult<Json<SubmitResponse>> {
    let handle = session(&state, session_id).await?;
    let submitted = handle.submit(state.predictor.as_ref()).await?;

    Ok(Json(SubmitResponse {
        detail: ResultDetail::for_entry(&submitted.entry, time::today()),
        history_length: submitted.history_length,
    }))
}

/// POST /api/sessions/:id/clear
pub async fn clear(
    State(state): State<AppState>,
    Path(session_id): Path<Uuid>,
) -> ApiResult<Json<SessionSnapshot>> {
    let handle = session(&state, session_id).await?;
    Ok(Json(handle.clear().await))
}

/// GET /api/sessions/:id/history?search=
pub async fn list_history(
    State(state): State<AppState>,
    Path(session_id): Path<Uuid>,
    Query(query): Query<HistoryQuery>,
) -> ApiResult<Json<HistoryResponse>> {
    let handle = session(&state, session_id).await?;

    let page = handle.history(query.search.as_deref()).await;
    let entries = page.entries.iter().map(HistoryRow::from).collect();

    Ok(Json(HistoryResponse {
        entries,
        total: page.total,
    }))
}

/// GET /api/sessions/:id/history/:entry_id
pub async fn get_history_entry(
    State(state): State<AppState>,
    Path((session_id, entry_id)): Path<(Uuid, Uuid)>,
) -> ApiResult<Json<ResultDetail>> {
    let handle = session(&state, session_id).await?;
    let entry = handle
        .entry(entry_id)
        .await
        .ok_or_else(|| ApiError::NotFound(format!("history entry {}", entry_id)))?;

    Ok(Json(ResultDetail::for_entry(&entry, time::today())))
}

/// GET /api/sessions/:id/history/:entry_id/report
///
/// Plain-text report, served as a download.
pub async fn download_report(
    State(state): State<AppState>,
    Path((session_id, entry_id)): Path<(Uuid, Uuid)>,
) -> ApiResult<Response> {
    let handle = session(&state, session_id).await?;
    let entry = handle
        .entry(entry_id)
        .await
        .ok_or_else(|| ApiError::NotFound(format!("history entry {}", entry_id)))?;

    let report = ResultDetail::for_entry(&entry, time::today()).render_text();
    let disposition = format!("attachment; filename=\"bone-age-report-{}.txt\"", entry_id);

    Ok((
        StatusCode::OK,
        [
            (header::CONTENT_TYPE, "text/plain; charset=utf-8".to_string()),
            (header::CONTENT_DISPOSITION, disposition),
        ],
        report,
    )
        .into_response())
}

/// Build session routes
pub fn session_routes() -> Router<AppState> {
    Router::new()
        .route("/api/sessions", post(create_session))
        .route("/api/sessions/:id", get(get_session).delete(end_session))
        .route("/api/sessions/:id/image", post(upload_image))
        .route("/api/sessions/:id/patient", patch(update_patient))
        .route("/api/sessions/:id/submit", post(submit))
        .route("/api/sessions/:id/clear", post(clear))
        .route("/api/sessions/:id/history", get(list_history))
        .route("/api/sessions/:id/history/:entry_id", get(get_history_entry))
        .route(
            "/api/sessions/:id/history/:entry_id/report",
            get(download_report),
        )
        .route("/api/sessions/:id/events", get(super::session_event_stream))
}
