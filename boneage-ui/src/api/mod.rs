//! HTTP API handlers for boneage-ui

pub mod buildinfo;
pub mod health;
pub mod logging;
pub mod sessions;
pub mod sse;
pub mod ui;

pub use buildinfo::buildinfo_routes;
pub use health::health_routes;
pub use logging::logging_routes;
pub use sessions::session_routes;
pub use sse::session_event_stream;
pub use ui::ui_routes;
