//! # API Endpoint Handlers
//!
//! This module implements the actual HTTP endpoint handlers.

use super::{
    AppState,
    types::{
        CaptureApiRequest, CaptureResponse, CreateRecordRequest, DeleteResponse, FindParams,
        FindResponse, HealthResponse, HistoryResponse, LinkRequest, LinkResponse, RecordSummary,
        SessionsResponse, TurnRequest, UpdateRecordRequest, error_response,
    },
};
use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use labcap_core::{
    CaptureError, CaptureRequest, Category, RecordFilter, RecordId, RecordStatus, RecordType,
    ToolUseCorrelator, capture, turn_channel,
};

// =============================================================================
// HEALTH HANDLER
// =============================================================================

/// Health check endpoint.
pub async fn health_handler() -> impl IntoResponse {
    Json(HealthResponse::default())
}

// =============================================================================
// CAPTURE HANDLER
// =============================================================================

/// Execute one capture operation.
///
/// Runs a turn-scoped event channel around the capture so the validation
/// result comes back attributed to the supplied `tool_use_id`, the same
/// contract the streaming consumer upholds between tool invocations.
pub async fn capture_handler(
    State(state): State<AppState>,
    Json(request): Json<CaptureApiRequest>,
) -> Response {
    let record_type = match RecordType::parse(&request.record_type) {
        Ok(t) => t,
        Err(e) => return error_response(&e).into_response(),
    };

    let (sender, mut receiver) = turn_channel();
    let mut correlator = ToolUseCorrelator::new();
    if let Some(tool_use_id) = &request.tool_use_id {
        correlator.observe(tool_use_id.clone());
    }

    let outcome = capture(
        &state.catalog,
        &state.schema,
        &state.registries,
        Some(&sender),
        CaptureRequest {
            session_id: request.session_id,
            record_type,
            data: request.data,
            name: request.name,
            record_id: request.record_id.map(RecordId::new),
            link_to: request.link_to.map(RecordId::new),
        },
    )
    .await;

    match outcome {
        Ok(outcome) => {
            let tool_result = correlator.attach(&mut receiver).into_iter().next();
            (
                StatusCode::OK,
                Json(CaptureResponse::from_outcome(outcome, tool_result)),
            )
                .into_response()
        }
        Err(e) => error_response(&e).into_response(),
    }
}

// =============================================================================
// RECORD CRUD HANDLERS
// =============================================================================

/// Create a record.
pub async fn create_record_handler(
    State(state): State<AppState>,
    Json(request): Json<CreateRecordRequest>,
) -> Response {
    let record_type = match RecordType::parse(&request.record_type) {
        Ok(t) => t,
        Err(e) => return error_response(&e).into_response(),
    };

    let mut catalog = state.catalog.write().await;
    match catalog.create(&request.session_id, record_type, request.data, request.name) {
        Ok(record) => (StatusCode::CREATED, Json(record)).into_response(),
        Err(e) => error_response(&e).into_response(),
    }
}

/// Fetch a record by id.
pub async fn get_record_handler(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Response {
    let catalog = state.catalog.read().await;
    match catalog.get(&RecordId::new(id)) {
        Ok(record) => (StatusCode::OK, Json(record)).into_response(),
        Err(e) => error_response(&e).into_response(),
    }
}

/// Merge data onto a record and/or rename it.
pub async fn update_record_handler(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(request): Json<UpdateRecordRequest>,
) -> Response {
    let mut catalog = state.catalog.write().await;
    match catalog.update(&RecordId::new(id), request.data, request.name) {
        Ok(record) => (StatusCode::OK, Json(record)).into_response(),
        Err(e) => error_response(&e).into_response(),
    }
}

/// Delete a record and its incident links.
pub async fn delete_record_handler(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Response {
    let mut catalog = state.catalog.write().await;
    match catalog.delete(&RecordId::new(id)) {
        Ok(deleted) => (StatusCode::OK, Json(DeleteResponse { deleted })).into_response(),
        Err(e) => error_response(&e).into_response(),
    }
}

/// Confirm a record. Unconditional; there is no un-confirm.
pub async fn confirm_record_handler(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Response {
    let mut catalog = state.catalog.write().await;
    match catalog.confirm(&RecordId::new(id)) {
        Ok(record) => (StatusCode::OK, Json(record)).into_response(),
        Err(e) => error_response(&e).into_response(),
    }
}

// =============================================================================
// SEARCH HANDLERS
// =============================================================================

fn build_filter(params: &FindParams) -> Result<RecordFilter, CaptureError> {
    let record_type = params
        .record_type
        .as_deref()
        .map(RecordType::parse)
        .transpose()?;
    let category = params.category.as_deref().map(Category::parse).transpose()?;
    let status = params.status.as_deref().map(RecordStatus::parse).transpose()?;
    Ok(RecordFilter {
        record_type,
        category,
        status,
        query: params.query.clone(),
    })
}

/// Search records with optional filters.
pub async fn find_records_handler(
    State(state): State<AppState>,
    Query(params): Query<FindParams>,
) -> Response {
    let filter = match build_filter(&params) {
        Ok(f) => f,
        Err(e) => return error_response(&e).into_response(),
    };

    let catalog = state.catalog.read().await;
    match catalog.find(&filter) {
        Ok(records) => {
            let summaries: Vec<RecordSummary> = records.iter().map(RecordSummary::from).collect();
            (
                StatusCode::OK,
                Json(FindResponse {
                    count: summaries.len(),
                    records: summaries,
                }),
            )
                .into_response()
        }
        Err(e) => error_response(&e).into_response(),
    }
}

/// Records linked to the given one, either orientation.
pub async fn linked_records_handler(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Response {
    let catalog = state.catalog.read().await;
    match catalog.linked(&RecordId::new(id)) {
        Ok(records) => {
            let summaries: Vec<RecordSummary> = records.iter().map(RecordSummary::from).collect();
            (
                StatusCode::OK,
                Json(FindResponse {
                    count: summaries.len(),
                    records: summaries,
                }),
            )
                .into_response()
        }
        Err(e) => error_response(&e).into_response(),
    }
}

// =============================================================================
// LINK HANDLERS
// =============================================================================

/// Link two records.
pub async fn create_link_handler(
    State(state): State<AppState>,
    Json(request): Json<LinkRequest>,
) -> Response {
    let source = RecordId::new(&request.source_id);
    let target = RecordId::new(&request.target_id);

    let mut catalog = state.catalog.write().await;
    let described = match (catalog.get(&source), catalog.get(&target)) {
        (Ok(source_record), Ok(target_record)) => format!(
            "Linked {} '{}' to {} '{}'",
            source_record.record_type,
            source_record.name.as_deref().unwrap_or(request.source_id.as_str()),
            target_record.record_type,
            target_record.name.as_deref().unwrap_or(request.target_id.as_str()),
        ),
        (Err(e), _) | (_, Err(e)) => return error_response(&e).into_response(),
    };

    match catalog.link(&source, &target) {
        Ok(()) => (
            StatusCode::OK,
            Json(LinkResponse {
                message: described,
                source_id: request.source_id,
                target_id: request.target_id,
            }),
        )
            .into_response(),
        Err(e) => error_response(&e).into_response(),
    }
}

/// Remove the link between two records.
pub async fn delete_link_handler(
    State(state): State<AppState>,
    Json(request): Json<LinkRequest>,
) -> Response {
    let mut catalog = state.catalog.write().await;
    match catalog.unlink(
        &RecordId::new(&request.source_id),
        &RecordId::new(&request.target_id),
    ) {
        Ok(deleted) => (StatusCode::OK, Json(DeleteResponse { deleted })).into_response(),
        Err(e) => error_response(&e).into_response(),
    }
}

// =============================================================================
// SESSION HANDLERS
// =============================================================================

/// List conversation sessions.
pub async fn list_sessions_handler(State(state): State<AppState>) -> Response {
    let catalog = state.catalog.read().await;
    match catalog.sessions() {
        Ok(sessions) => (StatusCode::OK, Json(SessionsResponse { sessions })).into_response(),
        Err(e) => error_response(&e).into_response(),
    }
}

/// Records captured within a session.
pub async fn session_records_handler(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Response {
    let catalog = state.catalog.read().await;
    match catalog.list_by_session(&id) {
        Ok(records) => {
            let summaries: Vec<RecordSummary> = records.iter().map(RecordSummary::from).collect();
            (
                StatusCode::OK,
                Json(FindResponse {
                    count: summaries.len(),
                    records: summaries,
                }),
            )
                .into_response()
        }
        Err(e) => error_response(&e).into_response(),
    }
}

/// Persist one conversation turn for a session.
pub async fn save_turn_handler(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(request): Json<TurnRequest>,
) -> Response {
    let mut catalog = state.catalog.write().await;
    match catalog.save_turn(&id, request.role, &request.content) {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(e) => error_response(&e).into_response(),
    }
}

/// Full conversation history for a session, oldest first.
pub async fn session_history_handler(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Response {
    let catalog = state.catalog.read().await;
    match catalog.history(&id) {
        Ok(turns) => (StatusCode::OK, Json(HistoryResponse { turns })).into_response(),
        Err(e) => error_response(&e).into_response(),
    }
}

/// Delete a session's records and conversation history.
pub async fn delete_session_handler(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Response {
    let mut catalog = state.catalog.write().await;
    match catalog.delete_session(&id) {
        Ok(deleted) => (StatusCode::OK, Json(DeleteResponse { deleted })).into_response(),
        Err(e) => error_response(&e).into_response(),
    }
}
