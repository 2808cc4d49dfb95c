//! boneage-ui library - Bone age prediction workbench
//!
//! Uploads hand X-ray images to an external prediction service, keeps the
//! results in a per-browser-session history and serves the page that drives
//! it all.

use std::sync::Arc;

use axum::extract::DefaultBodyLimit;
use axum::Router;
use chrono::{DateTime, Utc};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

pub mod api;
pub mod config;
pub mod error;
pub mod history;
pub mod image;
pub mod prediction;
pub mod report;
pub mod session;
pub mod sink;

use prediction::Predictor;
use session::SessionRegistry;

/// Application state shared across HTTP handlers
#[derive(Clone)]
pub struct AppState {
    /// Live sessions
    pub sessions: Arc<SessionRegistry>,
    /// Prediction backend (HTTP client, or the mock in development)
    pub predictor: Arc<dyn Predictor>,
    /// Service startup timestamp for uptime tracking
    pub startup_time: DateTime<Utc>,
    /// Upper bound on request bodies (image uploads)
    pub max_upload_bytes: usize,
}

impl AppState {
    pub fn new(predictor: Arc<dyn Predictor>, max_upload_bytes: usize) -> Self {
        Self {
            sessions: Arc::new(SessionRegistry::new()),
            predictor,
            startup_time: Utc::now(),
            max_upload_bytes,
        }
    }
}

/// Build application router
pub fn build_router(state: AppState) -> Router {
    let body_limit = state.max_upload_bytes;

    Router::new()
        .merge(api::ui_routes())
        .merge(api::health_routes())
        .merge(api::buildinfo_routes())
        .merge(api::session_routes())
        .merge(api::logging_routes())
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}
