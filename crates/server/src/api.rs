//! JSON API over the conversation cache and the dispatch pipeline.
//!
//! - `POST  /api/v1/calls`                      start buffering a call
//! - `GET   /api/v1/calls/{call_id}`            full cached conversation
//! - `POST  /api/v1/calls/{call_id}/turns`      append a transcript turn
//! - `PATCH /api/v1/calls/{call_id}/metadata`   shallow-merge call metadata
//! - `POST  /api/v1/calls/{call_id}/end`        finalize, sync and dispatch
//! - `POST  /api/v1/calls/{call_id}/sync`       push to the record store now
//! - `POST  /api/v1/calls/{call_id}/analyze`    analysis and trigger scores only
//! - `POST  /api/v1/dispatch/select`            run vendor selection directly

use std::collections::BTreeMap;

use axum::{
    body::Bytes,
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, patch, post},
    Json, Router,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::warn;
use uuid::Uuid;

use leadline_agent::{DispatchReport, DispatchRuntime};
use leadline_core::cache::ConversationCache;
use leadline_core::domain::conversation::{
    CachedConversation, CallId, CallMetadata, CallMetadataPatch, CallStatus, ConversationTurn,
    ExtractedBusinessData, Speaker, SyncStatus,
};
use leadline_core::errors::{ApplicationError, InterfaceError};
use leadline_core::selection::{DispatchOutcome, DispatchRequest};

#[derive(Clone)]
pub struct ApiState {
    cache: ConversationCache,
    runtime: DispatchRuntime,
}

pub fn router(cache: ConversationCache, runtime: DispatchRuntime) -> Router {
    Router::new()
        .route("/api/v1/calls", post(start_call))
        .route("/api/v1/calls/{call_id}", get(get_call))
        .route("/api/v1/calls/{call_id}/turns", post(add_turn))
        .route("/api/v1/calls/{call_id}/metadata", patch(update_metadata))
        .route("/api/v1/calls/{call_id}/end", post(end_call))
        .route("/api/v1/calls/{call_id}/sync", post(sync_call))
        .route("/api/v1/calls/{call_id}/analyze", post(analyze_call))
        .route("/api/v1/dispatch/select", post(select_vendors))
        .with_state(ApiState { cache, runtime })
}

// ---------------------------------------------------------------------------
// Request / Response types
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
pub struct StartCallRequest {
    #[serde(default)]
    pub call_id: Option<String>,
    pub phone_number: String,
    #[serde(default)]
    pub call_type: Option<String>,
    #[serde(default)]
    pub started_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub owner_id: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct AddTurnRequest {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub timestamp: Option<DateTime<Utc>>,
    pub speaker: Speaker,
    pub content: String,
    #[serde(default)]
    pub confidence: Option<f64>,
    #[serde(default)]
    pub intent: Option<String>,
    #[serde(default)]
    pub entities: Option<BTreeMap<String, String>>,
    #[serde(default)]
    pub duration_secs: Option<f64>,
}

#[derive(Debug, Serialize)]
pub struct CallSummary {
    pub call_id: CallId,
    pub status: CallStatus,
    pub sync_status: SyncStatus,
    pub turns: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duration_secs: Option<i64>,
    pub extracted_data: ExtractedBusinessData,
    pub last_updated: DateTime<Utc>,
}

impl From<&CachedConversation> for CallSummary {
    fn from(conversation: &CachedConversation) -> Self {
        Self {
            call_id: conversation.call_id().clone(),
            status: conversation.metadata.status,
            sync_status: conversation.sync_status,
            turns: conversation.turns().len(),
            duration_secs: conversation.metadata.duration_secs,
            extracted_data: conversation.extracted_data.clone(),
            last_updated: conversation.last_updated,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct SyncResponse {
    pub call_id: CallId,
    pub synced: bool,
    pub sync_status: SyncStatus,
}

#[derive(Debug, Serialize)]
pub struct ApiErrorBody {
    pub error: &'static str,
    pub detail: String,
    pub correlation_id: String,
}

pub struct ApiError(InterfaceError);

impl ApiError {
    fn bad_request(message: impl Into<String>) -> Self {
        Self(InterfaceError::BadRequest { message: message.into(), correlation_id: correlation_id() })
    }

    fn call_not_found(call_id: &CallId) -> Self {
        Self(InterfaceError::NotFound {
            message: format!("call {call_id} is not cached"),
            correlation_id: correlation_id(),
        })
    }
}

impl From<ApplicationError> for ApiError {
    fn from(error: ApplicationError) -> Self {
        Self(error.into_interface(correlation_id()))
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self.0 {
            InterfaceError::BadRequest { .. } => StatusCode::BAD_REQUEST,
            InterfaceError::NotFound { .. } => StatusCode::NOT_FOUND,
            InterfaceError::ServiceUnavailable { .. } => StatusCode::SERVICE_UNAVAILABLE,
            InterfaceError::Internal { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        };
        warn!(
            event_name = "api.request.failed",
            correlation_id = %self.0.correlation_id(),
            status = status.as_u16(),
            error = %self.0,
            "api request failed"
        );

        let detail = match &self.0 {
            InterfaceError::BadRequest { message, .. } | InterfaceError::NotFound { message, .. } => {
                message.clone()
            }
            InterfaceError::ServiceUnavailable { .. } | InterfaceError::Internal { .. } => {
                String::new()
            }
        };
        let body = ApiErrorBody {
            error: self.0.user_message(),
            detail,
            correlation_id: self.0.correlation_id().to_string(),
        };
        (status, Json(body)).into_response()
    }
}

type ApiResult<T> = Result<T, ApiError>;

fn correlation_id() -> String {
    format!("req-{}", Uuid::new_v4().simple())
}

// ---------------------------------------------------------------------------
// Handlers
// ---------------------------------------------------------------------------

async fn start_call(
    State(state): State<ApiState>,
    Json(body): Json<StartCallRequest>,
) -> ApiResult<(StatusCode, Json<CachedConversation>)> {
    let phone_number = body.phone_number.trim();
    if phone_number.is_empty() {
        return Err(ApiError::bad_request("phone_number is required"));
    }
    let call_id = body
        .call_id
        .map(|id| id.trim().to_string())
        .filter(|id| !id.is_empty())
        .unwrap_or_else(|| format!("call-{}", Uuid::new_v4().simple()));

    let mut metadata = CallMetadata::new(
        call_id,
        phone_number,
        body.call_type.unwrap_or_else(|| "inbound".to_string()),
        body.started_at.unwrap_or_else(Utc::now),
    );
    metadata.owner_id = body.owner_id.filter(|owner| !owner.trim().is_empty());

    let conversation = state.cache.start_conversation(metadata).await;
    Ok((StatusCode::CREATED, Json(conversation)))
}

async fn get_call(
    Path(call_id): Path<String>,
    State(state): State<ApiState>,
) -> ApiResult<Json<CachedConversation>> {
    let call_id = CallId(call_id);
    state
        .cache
        .get_conversation(&call_id)
        .await
        .map(Json)
        .ok_or_else(|| ApiError::call_not_found(&call_id))
}

async fn add_turn(
    Path(call_id): Path<String>,
    State(state): State<ApiState>,
    Json(body): Json<AddTurnRequest>,
) -> ApiResult<Json<CallSummary>> {
    if body.content.trim().is_empty() {
        return Err(ApiError::bad_request("turn content is required"));
    }
    let call_id = CallId(call_id);
    let turn = ConversationTurn {
        id: body.id.unwrap_or_else(|| Uuid::new_v4().to_string()),
        timestamp: body.timestamp.unwrap_or_else(Utc::now),
        speaker: body.speaker,
        content: body.content,
        confidence: body.confidence,
        intent: body.intent,
        entities: body.entities,
        duration_secs: body.duration_secs,
    };

    if !state.cache.add_conversation_turn(&call_id, turn).await {
        return Err(ApiError::call_not_found(&call_id));
    }
    summary(&state, &call_id).await
}

async fn update_metadata(
    Path(call_id): Path<String>,
    State(state): State<ApiState>,
    Json(patch): Json<CallMetadataPatch>,
) -> ApiResult<Json<CallSummary>> {
    let call_id = CallId(call_id);
    if !state.cache.update_call_metadata(&call_id, patch).await {
        return Err(ApiError::call_not_found(&call_id));
    }
    summary(&state, &call_id).await
}

/// The body is an optional final metadata patch; an empty body ends the call
/// as-is.
async fn end_call(
    Path(call_id): Path<String>,
    State(state): State<ApiState>,
    body: Bytes,
) -> ApiResult<Json<CallSummary>> {
    let final_patch = if body.iter().all(u8::is_ascii_whitespace) {
        None
    } else {
        let patch = serde_json::from_slice::<CallMetadataPatch>(&body)
            .map_err(|error| ApiError::bad_request(format!("invalid metadata patch: {error}")))?;
        Some(patch)
    };

    let call_id = CallId(call_id);
    let conversation = state
        .cache
        .end_conversation(&call_id, final_patch)
        .await
        .ok_or_else(|| ApiError::call_not_found(&call_id))?;
    Ok(Json(CallSummary::from(&conversation)))
}

async fn sync_call(
    Path(call_id): Path<String>,
    State(state): State<ApiState>,
) -> ApiResult<Json<SyncResponse>> {
    let call_id = CallId(call_id);
    if state.cache.get_conversation(&call_id).await.is_none() {
        return Err(ApiError::call_not_found(&call_id));
    }

    let synced = state.cache.sync_conversation(&call_id).await;
    let sync_status = state
        .cache
        .get_conversation(&call_id)
        .await
        .map(|conversation| conversation.sync_status)
        .unwrap_or(SyncStatus::Pending);
    Ok(Json(SyncResponse { call_id, synced, sync_status }))
}

async fn analyze_call(
    Path(call_id): Path<String>,
    State(state): State<ApiState>,
) -> ApiResult<Json<DispatchReport>> {
    let call_id = CallId(call_id);
    let conversation = state
        .cache
        .get_conversation(&call_id)
        .await
        .ok_or_else(|| ApiError::call_not_found(&call_id))?;
    Ok(Json(state.runtime.assess(&conversation).await?))
}

async fn select_vendors(
    State(state): State<ApiState>,
    Json(request): Json<DispatchRequest>,
) -> ApiResult<Json<DispatchOutcome>> {
    if request.owner_id.trim().is_empty() {
        return Err(ApiError::bad_request("owner_id is required"));
    }
    Ok(Json(state.runtime.dispatch_service().dispatch(&request).await))
}

async fn summary(state: &ApiState, call_id: &CallId) -> ApiResult<Json<CallSummary>> {
    state
        .cache
        .get_conversation(call_id)
        .await
        .map(|conversation| Json(CallSummary::from(&conversation)))
        .ok_or_else(|| ApiError::call_not_found(call_id))
}
