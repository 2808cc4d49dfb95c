//! Integration tests for boneage-ui API endpoints
//!
//! Tests cover:
//! - Health, page and build info endpoints
//! - Session lifecycle (create, snapshot, end)
//! - Image upload validation
//! - Submission: success, validation failure, prediction failure
//! - History search, entry detail and report download
//! - Inbound prediction log endpoint

use std::sync::Arc;

use axum::{
    body::Body,
    http::{header, Request, StatusCode},
    Router,
};
use boneage_ui::prediction::{MockPredictor, PredictError, PredictionResponse, Predictor};
use boneage_ui::{build_router, AppState};
use http_body_util::BodyExt;
use serde_json::{json, Value};
use tokio::sync::Notify;
use tower::util::ServiceExt; // for `oneshot` method

const BOUNDARY: &str = "boneage-test-boundary";

/// Smallest header `infer` recognizes as PNG
const PNG_BYTES: &[u8] = &[0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A, 0, 0, 0, 0x0D];

/// Test helper: Create app around a predictor
fn setup_app(predictor: Arc<dyn Predictor>) -> Router {
    build_router(AppState::new(predictor, 1024 * 1024))
}

fn test_request(method: &str, uri: &str) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .body(Body::empty())
        .unwrap()
}

fn json_request(method: &str, uri: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

/// Test helper: multipart body with one file part
fn multipart_request(
    uri: &str,
    field: &str,
    file_name: &str,
    content_type: &str,
    bytes: &[u8],
) -> Request<Body> {
    let mut body = Vec::new();
    body.extend_from_slice(
        format!(
            "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"{field}\"; filename=\"{file_name}\"\r\nContent-Type: {content_type}\r\n\r\n"
        )
        .as_bytes(),
    );
    body.extend_from_slice(bytes);
    body.extend_from_slice(format!("\r\n--{BOUNDARY}--\r\n").as_bytes());

    Request::builder()
        .method("POST")
        .uri(uri)
        .header(
            header::CONTENT_TYPE,
            format!("multipart/form-data; boundary={BOUNDARY}"),
        )
        .body(Body::from(body))
        .unwrap()
}

async fn body_bytes(body: Body) -> Vec<u8> {
    body.collect().await.unwrap().to_bytes().to_vec()
}

async fn extract_json(body: Body) -> Value {
    serde_json::from_slice(&body_bytes(body).await).expect("Should parse JSON")
}

/// Test helper: start a session, return its ID
async fn create_session(app: &Router) -> String {
    let response = app
        .clone()
        .oneshot(test_request("POST", "/api/sessions"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CREATED);

    let body = extract_json(response.into_body()).await;
    body["sessionId"].as_str().unwrap().to_string()
}

async fn upload_png(app: &Router, session: &str) -> Value {
    let response = app
        .clone()
        .oneshot(multipart_request(
            &format!("/api/sessions/{session}/image"),
            "file",
            "hand.png",
            "image/png",
            PNG_BYTES,
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    extract_json(response.into_body()).await
}

async fn set_patient(app: &Router, session: &str, name: &str, id: &str) {
    let response = app
        .clone()
        .oneshot(json_request(
            "PATCH",
            &format!("/api/sessions/{session}/patient"),
            json!({
                "id": id,
                "name": name,
                "dateOfBirth": "2015-06-15",
                "gender": "female",
            }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}

async fn submit(app: &Router, session: &str) -> (StatusCode, Value) {
    let response = app
        .clone()
        .oneshot(test_request("POST", &format!("/api/sessions/{session}/submit")))
        .await
        .unwrap();
    let status = response.status();
    (status, extract_json(response.into_body()).await)
}

async fn get_json(app: &Router, uri: &str) -> (StatusCode, Value) {
    let response = app.clone().oneshot(test_request("GET", uri)).await.unwrap();
    let status = response.status();
    (status, extract_json(response.into_body()).await)
}

// =============================================================================
// Health, page, build info
// =============================================================================

#[tokio::test]
async fn test_health_endpoint() {
    let app = setup_app(Arc::new(MockPredictor::fixed(100.0)));

    let (status, body) = get_json(&app, "/health").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
    assert_eq!(body["module"], "boneage-ui");
    assert!(body["version"].is_string());
    assert_eq!(body["active_sessions"], 0);

    create_session(&app).await;
    let (_, body) = get_json(&app, "/health").await;
    assert_eq!(body["active_sessions"], 1);
}

#[tokio::test]
async fn test_page_and_script_are_served() {
    let app = setup_app(Arc::new(MockPredictor::fixed(100.0)));

    let response = app.clone().oneshot(test_request("GET", "/")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let html = String::from_utf8(body_bytes(response.into_body()).await).unwrap();
    assert!(html.contains("/static/app.js"));

    let response = app
        .oneshot(test_request("GET", "/static/app.js"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers()[header::CONTENT_TYPE],
        "application/javascript"
    );
}

#[tokio::test]
async fn test_build_info() {
    let app = setup_app(Arc::new(MockPredictor::fixed(100.0)));

    let (status, body) = get_json(&app, "/api/buildinfo").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["version"], env!("CARGO_PKG_VERSION"));
    assert!(body["git_hash"].is_string());
}

// =============================================================================
// Session lifecycle
// =============================================================================

#[tokio::test]
async fn test_new_session_is_idle() {
    let app = setup_app(Arc::new(MockPredictor::fixed(100.0)));
    let session = create_session(&app).await;

    let (status, body) = get_json(&app, &format!("/api/sessions/{session}")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["sessionId"], session);
    assert_eq!(body["phase"], "idle");
    assert_eq!(body["analyzing"], false);
    assert!(body["image"].is_null());
    assert_eq!(body["historyLength"], 0);
}

#[tokio::test]
async fn test_unknown_session_is_not_found() {
    let app = setup_app(Arc::new(MockPredictor::fixed(100.0)));

    let (status, body) = get_json(
        &app,
        "/api/sessions/00000000-0000-0000-0000-000000000000",
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"]["code"], "NOT_FOUND");
}

#[tokio::test]
async fn test_end_session() {
    let app = setup_app(Arc::new(MockPredictor::fixed(100.0)));
    let session = create_session(&app).await;
    let uri = format!("/api/sessions/{session}");

    let response = app
        .clone()
        .oneshot(test_request("DELETE", &uri))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NO_CONTENT);

    let response = app.oneshot(test_request("DELETE", &uri)).await.unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

// =============================================================================
// Image upload
// =============================================================================

#[tokio::test]
async fn test_upload_selects_image() {
    let app = setup_app(Arc::new(MockPredictor::fixed(100.0)));
    let session = create_session(&app).await;

    let snapshot = upload_png(&app, &session).await;
    assert_eq!(snapshot["phase"], "image_selected");
    assert_eq!(snapshot["image"]["fileName"], "hand.png");
    assert_eq!(snapshot["image"]["contentType"], "image/png");
    assert!(snapshot["image"]["dataUrl"]
        .as_str()
        .unwrap()
        .starts_with("data:image/png;base64,"));
}

#[tokio::test]
async fn test_upload_sniffs_generic_content_type() {
    let app = setup_app(Arc::new(MockPredictor::fixed(100.0)));
    let session = create_session(&app).await;

    let response = app
        .oneshot(multipart_request(
            &format!("/api/sessions/{session}/image"),
            "file",
            "scan",
            "application/octet-stream",
            PNG_BYTES,
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let snapshot = extract_json(response.into_body()).await;
    assert_eq!(snapshot["image"]["contentType"], "image/png");
}

#[tokio::test]
async fn test_non_image_upload_rejected_without_request() {
    let predictor = Arc::new(MockPredictor::fixed(100.0));
    let app = setup_app(predictor.clone());
    let session = create_session(&app).await;

    let response = app
        .clone()
        .oneshot(multipart_request(
            &format!("/api/sessions/{session}/image"),
            "file",
            "notes.txt",
            "text/plain",
            b"hello",
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNSUPPORTED_MEDIA_TYPE);
    let body = extract_json(response.into_body()).await;
    assert_eq!(body["error"]["code"], "UNSUPPORTED_FILE_TYPE");

    let (_, snapshot) = get_json(&app, &format!("/api/sessions/{session}")).await;
    assert_eq!(snapshot["phase"], "idle");
    assert_eq!(predictor.calls(), 0);
}

#[tokio::test]
async fn test_upload_without_file_field() {
    let app = setup_app(Arc::new(MockPredictor::fixed(100.0)));
    let session = create_session(&app).await;

    let response = app
        .oneshot(multipart_request(
            &format!("/api/sessions/{session}/image"),
            "attachment",
            "hand.png",
            "image/png",
            PNG_BYTES,
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = extract_json(response.into_body()).await;
    assert_eq!(body["error"]["code"], "BAD_REQUEST");
}

// =============================================================================
// Submission
// =============================================================================

#[tokio::test]
async fn test_submit_success() {
    let predictor = Arc::new(MockPredictor::fixed(87.456));
    let app = setup_app(predictor.clone());
    let session = create_session(&app).await;
    upload_png(&app, &session).await;
    set_patient(&app, &session, "Alice Smith", "P1").await;

    let (status, body) = submit(&app, &session).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(predictor.calls(), 1);
    assert_eq!(body["historyLength"], 1);

    let result = &body["detail"]["result"];
    assert_eq!(result["boneAgeMonths"], 87.46);
    assert_eq!(result["confidenceScore"], 0.95);
    assert_eq!(result["standardDeviation"], 4.2);
    assert!(result["imageUrl"]
        .as_str()
        .unwrap()
        .starts_with("data:image/png;base64,"));
    assert_eq!(body["detail"]["confidence"], "95.0%");
    assert_eq!(body["detail"]["confidenceBand"], "very_high");
    assert_eq!(body["detail"]["boneAge"]["years"], 7);

    let (_, snapshot) = get_json(&app, &format!("/api/sessions/{session}")).await;
    assert_eq!(snapshot["phase"], "result_ready");
    assert_eq!(snapshot["currentResult"]["boneAgeMonths"], 87.46);
}

#[tokio::test]
async fn test_submit_with_incomplete_patient_issues_no_request() {
    let predictor = Arc::new(MockPredictor::fixed(100.0));
    let app = setup_app(predictor.clone());
    let session = create_session(&app).await;
    upload_png(&app, &session).await;

    let (status, body) = submit(&app, &session).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["code"], "VALIDATION_FAILED");
    assert!(body["error"]["message"]
        .as_str()
        .unwrap()
        .contains("dateOfBirth"));
    assert_eq!(predictor.calls(), 0);
}

#[tokio::test]
async fn test_submit_without_image_issues_no_request() {
    let predictor = Arc::new(MockPredictor::fixed(100.0));
    let app = setup_app(predictor.clone());
    let session = create_session(&app).await;
    set_patient(&app, &session, "Alice Smith", "P1").await;

    let (status, body) = submit(&app, &session).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["code"], "VALIDATION_FAILED");
    assert_eq!(predictor.calls(), 0);
}

#[tokio::test]
async fn test_failed_prediction_leaves_history_unchanged() {
    let predictor = Arc::new(MockPredictor::failing(PredictError::RequestFailed {
        status: 500,
        body: "internal error".into(),
    }));
    let app = setup_app(predictor.clone());
    let session = create_session(&app).await;
    upload_png(&app, &session).await;
    set_patient(&app, &session, "Alice Smith", "P1").await;

    let (status, body) = submit(&app, &session).await;

    assert_eq!(status, StatusCode::BAD_GATEWAY);
    assert_eq!(body["error"]["code"], "REQUEST_FAILED");

    let (_, snapshot) = get_json(&app, &format!("/api/sessions/{session}")).await;
    assert_eq!(snapshot["phase"], "image_selected");
    assert_eq!(snapshot["analyzing"], false);
    assert_eq!(snapshot["historyLength"], 0);
    assert!(snapshot["currentResult"].is_null());
}

#[tokio::test]
async fn test_malformed_prediction_response() {
    let predictor = Arc::new(MockPredictor::scripted(vec![Ok(PredictionResponse {
        bone_age_months: 90.0,
        confidence_score: Some(1.7),
        standard_deviation: None,
    })]));
    let app = setup_app(predictor);
    let session = create_session(&app).await;
    upload_png(&app, &session).await;
    set_patient(&app, &session, "Alice Smith", "P1").await;

    let (status, body) = submit(&app, &session).await;

    assert_eq!(status, StatusCode::BAD_GATEWAY);
    assert_eq!(body["error"]["code"], "MALFORMED_RESPONSE");
}

#[tokio::test]
async fn test_clear_keeps_history() {
    let app = setup_app(Arc::new(MockPredictor::fixed(100.0)));
    let session = create_session(&app).await;
    upload_png(&app, &session).await;
    set_patient(&app, &session, "Alice Smith", "P1").await;
    submit(&app, &session).await;

    let response = app
        .clone()
        .oneshot(test_request("POST", &format!("/api/sessions/{session}/clear")))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let snapshot = extract_json(response.into_body()).await;
    assert_eq!(snapshot["phase"], "idle");
    assert!(snapshot["image"].is_null());
    assert!(snapshot["currentResult"].is_null());
    assert_eq!(snapshot["patientInfo"]["name"], "");
    assert_eq!(snapshot["historyLength"], 1);
}

/// Test helper: start a gated submit in the background, return once it is in flight
async fn spawn_gated_submit(
    app: &Router,
    session: &str,
) -> tokio::task::JoinHandle<(StatusCode, Value)> {
    let task = {
        let app = app.clone();
        let session = session.to_string();
        tokio::spawn(async move { submit(&app, &session).await })
    };

    loop {
        let (_, snapshot) = get_json(app, &format!("/api/sessions/{session}")).await;
        if snapshot["analyzing"] == true {
            break;
        }
        tokio::task::yield_now().await;
    }
    task
}

#[tokio::test]
async fn test_reupload_during_analysis_rejects_second_submit() {
    let gate = Arc::new(Notify::new());
    let predictor = Arc::new(MockPredictor::fixed(70.0).with_gate(gate.clone()));
    let app = setup_app(predictor.clone());
    let session = create_session(&app).await;
    upload_png(&app, &session).await;
    set_patient(&app, &session, "Alice Smith", "P1").await;

    let first = spawn_gated_submit(&app, &session).await;

    let snapshot = upload_png(&app, &session).await;
    assert_eq!(snapshot["phase"], "image_selected");
    assert_eq!(snapshot["analyzing"], true);

    let (status, body) = submit(&app, &session).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["error"]["code"], "ANALYSIS_IN_PROGRESS");
    assert_eq!(predictor.calls(), 1);

    gate.notify_one();
    let (status, body) = first.await.unwrap();
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["error"]["code"], "SUPERSEDED");

    let (_, snapshot) = get_json(&app, &format!("/api/sessions/{session}")).await;
    assert_eq!(snapshot["analyzing"], false);
    assert_eq!(snapshot["historyLength"], 0);
}

#[tokio::test]
async fn test_submit_detail_uses_patient_from_submission_start() {
    let gate = Arc::new(Notify::new());
    let predictor = Arc::new(MockPredictor::fixed(110.5).with_gate(gate.clone()));
    let app = setup_app(predictor);
    let session = create_session(&app).await;
    upload_png(&app, &session).await;
    set_patient(&app, &session, "Alice Smith", "P1").await;

    let task = spawn_gated_submit(&app, &session).await;

    let response = app
        .clone()
        .oneshot(json_request(
            "PATCH",
            &format!("/api/sessions/{session}/patient"),
            json!({ "name": "Edited Meanwhile", "dateOfBirth": "2001-01-01" }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    gate.notify_one();

    let (status, body) = task.await.unwrap();
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["detail"]["patientInfo"]["name"], "Alice Smith");
    assert_eq!(body["detail"]["patientInfo"]["dateOfBirth"], "2015-06-15");
    assert!(body["detail"]["entryId"].is_string());
    assert_eq!(body["historyLength"], 1);
}

#[tokio::test]
async fn test_history_total_counts_unfiltered_entries() {
    let app = setup_app(Arc::new(MockPredictor::fixed(100.0)));
    let session = create_session(&app).await;
    upload_png(&app, &session).await;
    set_patient(&app, &session, "Alice Smith", "A1").await;
    submit(&app, &session).await;
    set_patient(&app, &session, "Bob Jones", "B2").await;
    submit(&app, &session).await;

    let (_, body) = get_json(
        &app,
        &format!("/api/sessions/{session}/history?search=nobody"),
    )
    .await;
    assert!(body["entries"].as_array().unwrap().is_empty());
    assert_eq!(body["total"], 2);
}

// =============================================================================
// History, detail, report
// =============================================================================

#[tokio::test]
async fn test_history_is_newest_first_and_searchable() {
    let app = setup_app(Arc::new(MockPredictor::fixed(100.0)));
    let session = create_session(&app).await;
    upload_png(&app, &session).await;

    set_patient(&app, &session, "Alice Smith", "A1").await;
    submit(&app, &session).await;
    set_patient(&app, &session, "Bob Jones", "B2").await;
    submit(&app, &session).await;

    let (status, body) = get_json(&app, &format!("/api/sessions/{session}/history")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["total"], 2);
    assert_eq!(body["entries"][0]["patientName"], "Bob Jones");
    assert_eq!(body["entries"][1]["patientName"], "Alice Smith");

    let (_, body) = get_json(
        &app,
        &format!("/api/sessions/{session}/history?search=SMITH"),
    )
    .await;
    let entries = body["entries"].as_array().unwrap();
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0]["patientName"], "Alice Smith");

    let (_, body) = get_json(&app, &format!("/api/sessions/{session}/history?search=b2")).await;
    assert_eq!(body["entries"][0]["patientId"], "B2");
}

#[tokio::test]
async fn test_history_keeps_patient_snapshot() {
    let app = setup_app(Arc::new(MockPredictor::fixed(100.0)));
    let session = create_session(&app).await;
    upload_png(&app, &session).await;
    set_patient(&app, &session, "Alice Smith", "A1").await;
    submit(&app, &session).await;

    // Later edits do not reach the recorded entry
    set_patient(&app, &session, "Someone Else", "Z9").await;

    let (_, body) = get_json(&app, &format!("/api/sessions/{session}/history")).await;
    assert_eq!(body["entries"][0]["patientName"], "Alice Smith");
}

#[tokio::test]
async fn test_entry_detail_and_report() {
    let app = setup_app(Arc::new(MockPredictor::fixed(87.456)));
    let session = create_session(&app).await;
    upload_png(&app, &session).await;
    set_patient(&app, &session, "Alice Smith", "A1").await;
    submit(&app, &session).await;

    let (_, history) = get_json(&app, &format!("/api/sessions/{session}/history")).await;
    let entry_id = history["entries"][0]["id"].as_str().unwrap().to_string();

    let (status, detail) = get_json(
        &app,
        &format!("/api/sessions/{session}/history/{entry_id}"),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(detail["entryId"], entry_id.as_str());
    assert_eq!(detail["patientInfo"]["name"], "Alice Smith");
    assert!(detail["chronologicalAgeMonths"].is_number());
    assert_eq!(detail["ageComparison"].as_array().unwrap().len(), 2);

    let response = app
        .clone()
        .oneshot(test_request(
            "GET",
            &format!("/api/sessions/{session}/history/{entry_id}/report"),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let disposition = response.headers()[header::CONTENT_DISPOSITION]
        .to_str()
        .unwrap()
        .to_string();
    assert!(disposition.starts_with("attachment"));

    let report = String::from_utf8(body_bytes(response.into_body()).await).unwrap();
    assert!(report.contains("BONE AGE ASSESSMENT REPORT"));
    assert!(report.contains("Alice Smith"));
    assert!(report.contains("87.46"));
}

#[tokio::test]
async fn test_unknown_history_entry() {
    let app = setup_app(Arc::new(MockPredictor::fixed(100.0)));
    let session = create_session(&app).await;

    let (status, body) = get_json(
        &app,
        &format!("/api/sessions/{session}/history/00000000-0000-0000-0000-000000000000"),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"]["code"], "NOT_FOUND");
}

// =============================================================================
// Inbound log endpoint
// =============================================================================

#[tokio::test]
async fn test_log_prediction_accepts_any_body() {
    let app = setup_app(Arc::new(MockPredictor::fixed(100.0)));

    let bodies = [
        r#"{"boneAgeMonths": 87.46, "confidenceScore": 0.95, "imageUrl": "data:image/png;base64,AAAA"}"#,
        "{}",
        "definitely not json",
    ];

    for body in bodies {
        let request = Request::builder()
            .method("POST")
            .uri("/api/log-prediction")
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body))
            .unwrap();
        let response = app.clone().oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(extract_json(response.into_body()).await["status"], "ok");
    }
}
