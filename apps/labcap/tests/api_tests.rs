//! Integration tests for the Labcap HTTP API.
//!
//! Uses axum-test to exercise the handlers without starting a real
//! server. Registry lookups run against an empty provider so the tests
//! never touch the network.

// Allow unwrap and panic in tests - these are standard for test code
// Allow holding MutexGuard across await in auth tests - tests are serialized
// intentionally to avoid env var conflicts
#![allow(clippy::unwrap_used, clippy::panic, clippy::await_holding_lock)]

use axum::http::{HeaderValue, StatusCode, header};
use axum_test::TestServer;
use labcap::api::{
    AppState, CaptureResponse, DeleteResponse, FindResponse, HealthResponse, SessionsResponse,
    create_router,
};
use labcap_core::{Catalog, Record, RecordStatus, RegistryProvider, SchemaConfig, TurnRole};
use serde_json::json;
use std::sync::Mutex;

/// Mutex to serialize tests since auth/rate-limit config comes from env vars.
static ENV_TEST_MUTEX: Mutex<()> = Mutex::new(());

// =============================================================================
// HELPER FUNCTIONS
// =============================================================================

/// Guard wrapper that holds the mutex and ensures cleanup on drop.
struct TestGuard {
    _guard: std::sync::MutexGuard<'static, ()>,
}

impl Drop for TestGuard {
    fn drop(&mut self) {
        // SAFETY: Tests run sequentially under ENV_TEST_MUTEX, so no concurrent env access.
        unsafe { std::env::remove_var("LABCAP_API_KEY") };
    }
}

/// Create a test server with a fresh in-memory catalog and no registry
/// backends. Returns a guard that must be kept alive during the test.
fn create_test_server() -> (TestServer, TestGuard) {
    let guard = ENV_TEST_MUTEX.lock().unwrap_or_else(|e| e.into_inner());
    // SAFETY: Tests run sequentially under ENV_TEST_MUTEX, so no concurrent env access.
    unsafe { std::env::remove_var("LABCAP_API_KEY") };
    let state = AppState::new(
        Catalog::new(),
        SchemaConfig::default(),
        RegistryProvider::new(),
    );
    let router = create_router(state);
    (
        TestServer::new(router).unwrap(),
        TestGuard { _guard: guard },
    )
}

/// Create a test server over a catalog pre-populated with a subject, a
/// linked session, and some conversation history.
fn create_populated_test_server() -> (TestServer, TestGuard, String, String) {
    let guard = ENV_TEST_MUTEX.lock().unwrap_or_else(|e| e.into_inner());
    // SAFETY: Tests run sequentially under ENV_TEST_MUTEX, so no concurrent env access.
    unsafe { std::env::remove_var("LABCAP_API_KEY") };

    let mut catalog = Catalog::new();
    let subject = catalog
        .create(
            "demo-session",
            labcap_core::RecordType::Subject,
            json!({"subject_id": "553429", "species": {"name": "Mus musculus"}}),
            None,
        )
        .unwrap();
    let session = catalog
        .create(
            "demo-session",
            labcap_core::RecordType::Session,
            json!({"session_start_time": "2025-01-15T09:00:00"}),
            None,
        )
        .unwrap();
    catalog.link(&subject.id, &session.id).unwrap();
    catalog
        .save_turn("demo-session", TurnRole::User, "we ran mouse 553429")
        .unwrap();
    catalog
        .save_turn("demo-session", TurnRole::Assistant, "captured the subject")
        .unwrap();

    let subject_id = subject.id.to_string();
    let session_id = session.id.to_string();
    let state = AppState::new(catalog, SchemaConfig::default(), RegistryProvider::new());
    let router = create_router(state);
    (
        TestServer::new(router).unwrap(),
        TestGuard { _guard: guard },
        subject_id,
        session_id,
    )
}

// =============================================================================
// HEALTH ENDPOINT TESTS
// =============================================================================

#[tokio::test]
async fn test_health_endpoint() {
    let (server, _guard) = create_test_server();

    let response = server.get("/health").await;

    response.assert_status_ok();
    let health: HealthResponse = response.json();
    assert_eq!(health.status, "ok");
    assert_eq!(health.version, env!("CARGO_PKG_VERSION"));
}

// =============================================================================
// CAPTURE ENDPOINT TESTS
// =============================================================================

#[tokio::test]
async fn test_capture_creates_record_with_validation() {
    let (server, _guard) = create_test_server();

    let response = server
        .post("/capture")
        .json(&json!({
            "session_id": "s1",
            "record_type": "subject",
            "data": {"subject_id": "553429", "sex": "Male"},
        }))
        .await;

    response.assert_status_ok();
    let capture: CaptureResponse = response.json();
    assert_eq!(capture.action, "created");
    assert_eq!(capture.record_type, "subject");
    assert_eq!(capture.category, "shared");
    assert_eq!(capture.name.as_deref(), Some("553429"));
    assert!(capture.validation_summary.contains("VALIDATION PASSED"));
    assert!(capture.tool_result.is_none());
}

#[tokio::test]
async fn test_capture_attributes_tool_use_id() {
    let (server, _guard) = create_test_server();

    let response = server
        .post("/capture")
        .json(&json!({
            "session_id": "s1",
            "record_type": "subject",
            "data": {"subject_id": "12"},
            "tool_use_id": "toolu_xyz",
        }))
        .await;

    response.assert_status_ok();
    let capture: CaptureResponse = response.json();
    let tool_result = capture.tool_result.expect("attributed validation");
    assert_eq!(tool_result.tool_use_id, "toolu_xyz");
    assert_eq!(tool_result.event.record_id.to_string(), capture.record_id);
}

#[tokio::test]
async fn test_capture_update_merges_existing_record() {
    let (server, _guard) = create_test_server();

    let created: CaptureResponse = server
        .post("/capture")
        .json(&json!({
            "session_id": "s1",
            "record_type": "subject",
            "data": {"subject_id": "553429"},
        }))
        .await
        .json();

    let response = server
        .post("/capture")
        .json(&json!({
            "session_id": "s1",
            "record_type": "subject",
            "data": {"sex": "Female"},
            "record_id": created.record_id,
        }))
        .await;

    response.assert_status_ok();
    let updated: CaptureResponse = response.json();
    assert_eq!(updated.action, "updated");
    assert_eq!(updated.record_id, created.record_id);
}

#[tokio::test]
async fn test_capture_rejects_unknown_record_type() {
    let (server, _guard) = create_test_server();

    let response = server
        .post("/capture")
        .json(&json!({
            "session_id": "s1",
            "record_type": "experiment",
            "data": {},
        }))
        .await;

    response.assert_status_bad_request();
}

#[tokio::test]
async fn test_capture_reports_validation_errors() {
    let (server, _guard) = create_test_server();

    let response = server
        .post("/capture")
        .json(&json!({
            "session_id": "s1",
            "record_type": "data_description",
            "data": {"modality": [{"abbreviation": "xray"}], "project_name": "Test"},
        }))
        .await;

    response.assert_status_ok();
    let capture: CaptureResponse = response.json();
    assert_eq!(capture.validation.errors.len(), 1);
    assert!(capture.validation_summary.contains("VALIDATION ERRORS"));
}

// =============================================================================
// RECORD CRUD TESTS
// =============================================================================

#[tokio::test]
async fn test_create_get_update_delete_record() {
    let (server, _guard) = create_test_server();

    let response = server
        .post("/records")
        .json(&json!({
            "session_id": "s1",
            "record_type": "rig",
            "data": {"rig_id": "rig-001"},
        }))
        .await;
    response.assert_status(axum::http::StatusCode::CREATED);
    let record: Record = response.json();
    assert_eq!(record.name.as_deref(), Some("rig-001"));

    let fetched: Record = server.get(&format!("/records/{}", record.id)).await.json();
    assert_eq!(fetched.id, record.id);

    let updated: Record = server
        .patch(&format!("/records/{}", record.id))
        .json(&json!({"data": {"modalities": ["ecephys"]}}))
        .await
        .json();
    assert_eq!(updated.data["rig_id"], "rig-001");
    assert_eq!(updated.data["modalities"][0], "ecephys");

    let deleted: DeleteResponse = server
        .delete(&format!("/records/{}", record.id))
        .await
        .json();
    assert!(deleted.deleted);

    server
        .get(&format!("/records/{}", record.id))
        .await
        .assert_status_not_found();
}

#[tokio::test]
async fn test_get_missing_record_is_404() {
    let (server, _guard) = create_test_server();
    server.get("/records/no-such-id").await.assert_status_not_found();
}

#[tokio::test]
async fn test_confirm_record() {
    let (server, _guard, subject_id, _) = create_populated_test_server();

    let response = server.post(&format!("/records/{subject_id}/confirm")).await;
    response.assert_status_ok();
    let record: Record = response.json();
    assert_eq!(record.status, RecordStatus::Confirmed);
}

// =============================================================================
// SEARCH TESTS
// =============================================================================

#[tokio::test]
async fn test_find_records_by_type_and_query() {
    let (server, _guard, _, _) = create_populated_test_server();

    let by_type: FindResponse = server
        .get("/records")
        .add_query_param("record_type", "subject")
        .await
        .json();
    assert_eq!(by_type.count, 1);
    assert_eq!(by_type.records[0].record_type, "subject");

    let by_query: FindResponse = server
        .get("/records")
        .add_query_param("query", "553429")
        .await
        .json();
    assert_eq!(by_query.count, 1);

    let by_category: FindResponse = server
        .get("/records")
        .add_query_param("category", "asset")
        .await
        .json();
    assert_eq!(by_category.count, 1);
    assert_eq!(by_category.records[0].record_type, "session");
}

#[tokio::test]
async fn test_find_rejects_bad_filters() {
    let (server, _guard) = create_test_server();

    server
        .get("/records")
        .add_query_param("record_type", "experiment")
        .await
        .assert_status_bad_request();
    server
        .get("/records")
        .add_query_param("category", "private")
        .await
        .assert_status_bad_request();
}

// =============================================================================
// LINK TESTS
// =============================================================================

#[tokio::test]
async fn test_linked_records_and_unlink() {
    let (server, _guard, subject_id, session_id) = create_populated_test_server();

    let linked: FindResponse = server
        .get(&format!("/records/{subject_id}/linked"))
        .await
        .json();
    assert_eq!(linked.count, 1);
    assert_eq!(linked.records[0].id, session_id);

    // Relinking in the opposite orientation is a no-op.
    server
        .post("/links")
        .json(&json!({"source_id": session_id, "target_id": subject_id}))
        .await
        .assert_status_ok();
    let still_one: FindResponse = server
        .get(&format!("/records/{subject_id}/linked"))
        .await
        .json();
    assert_eq!(still_one.count, 1);

    let unlinked: DeleteResponse = server
        .delete("/links")
        .json(&json!({"source_id": subject_id, "target_id": session_id}))
        .await
        .json();
    assert!(unlinked.deleted);

    let none: FindResponse = server
        .get(&format!("/records/{subject_id}/linked"))
        .await
        .json();
    assert_eq!(none.count, 0);
}

#[tokio::test]
async fn test_link_to_missing_record_is_404() {
    let (server, _guard, subject_id, _) = create_populated_test_server();

    server
        .post("/links")
        .json(&json!({"source_id": subject_id, "target_id": "no-such-id"}))
        .await
        .assert_status_not_found();
}

// =============================================================================
// SESSION TESTS
// =============================================================================

#[tokio::test]
async fn test_sessions_and_session_records() {
    let (server, _guard, _, _) = create_populated_test_server();

    let sessions: SessionsResponse = server.get("/sessions").await.json();
    assert_eq!(sessions.sessions.len(), 1);
    assert_eq!(sessions.sessions[0].session_id, "demo-session");
    assert_eq!(sessions.sessions[0].message_count, 2);
    assert_eq!(
        sessions.sessions[0].first_message.as_deref(),
        Some("we ran mouse 553429")
    );

    let records: FindResponse = server.get("/sessions/demo-session/records").await.json();
    assert_eq!(records.count, 2);
}

#[tokio::test]
async fn test_save_and_read_conversation_turns() {
    let (server, _guard) = create_test_server();

    server
        .post("/sessions/chat-1/turns")
        .json(&json!({"role": "user", "content": "we used rig 3 today"}))
        .await
        .assert_status(StatusCode::NO_CONTENT);
    server
        .post("/sessions/chat-1/turns")
        .json(&json!({"role": "assistant", "content": "noted, capturing the rig"}))
        .await
        .assert_status(StatusCode::NO_CONTENT);

    let history: labcap::api::HistoryResponse =
        server.get("/sessions/chat-1/turns").await.json();
    assert_eq!(history.turns.len(), 2);
    assert_eq!(history.turns[0].content, "we used rig 3 today");

    let sessions: SessionsResponse = server.get("/sessions").await.json();
    assert_eq!(sessions.sessions.len(), 1);
    assert_eq!(sessions.sessions[0].session_id, "chat-1");
}

#[tokio::test]
async fn test_delete_session_cascades() {
    let (server, _guard, subject_id, _) = create_populated_test_server();

    let deleted: DeleteResponse = server.delete("/sessions/demo-session").await.json();
    assert!(deleted.deleted);

    server
        .get(&format!("/records/{subject_id}"))
        .await
        .assert_status_not_found();
    let records: FindResponse = server.get("/sessions/demo-session/records").await.json();
    assert_eq!(records.count, 0);

    // A second delete reports nothing left.
    let again: DeleteResponse = server.delete("/sessions/demo-session").await.json();
    assert!(!again.deleted);
}

// =============================================================================
// AUTH TESTS
// =============================================================================

#[tokio::test]
async fn test_auth_rejects_missing_and_wrong_keys() {
    let guard = ENV_TEST_MUTEX.lock().unwrap_or_else(|e| e.into_inner());
    // SAFETY: Tests run sequentially under ENV_TEST_MUTEX, so no concurrent env access.
    unsafe { std::env::set_var("LABCAP_API_KEY", "test-secret") };
    let _guard = TestGuard { _guard: guard };

    let state = AppState::new(
        Catalog::new(),
        SchemaConfig::default(),
        RegistryProvider::new(),
    );
    let server = TestServer::new(create_router(state)).unwrap();

    // Health stays open for load balancers.
    server.get("/health").await.assert_status_ok();

    // No credentials.
    server
        .get("/records")
        .await
        .assert_status(StatusCode::UNAUTHORIZED);

    // Wrong credentials.
    server
        .get("/records")
        .add_header(
            header::AUTHORIZATION,
            "Bearer wrong-key".parse::<HeaderValue>().unwrap(),
        )
        .await
        .assert_status(StatusCode::UNAUTHORIZED);

    // Correct credentials, Bearer and raw forms.
    server
        .get("/records")
        .add_header(
            header::AUTHORIZATION,
            "Bearer test-secret".parse::<HeaderValue>().unwrap(),
        )
        .await
        .assert_status_ok();
    server
        .get("/records")
        .add_header(
            header::AUTHORIZATION,
            "test-secret".parse::<HeaderValue>().unwrap(),
        )
        .await
        .assert_status_ok();
}
