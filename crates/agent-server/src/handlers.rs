//! HTTP/SSE Handlers

use std::convert::Infallible;

use axum::{
    extract::{rejection::JsonRejection, Path, Query, State},
    http::StatusCode,
    response::sse::{Event, KeepAlive, Sse},
    Json,
};
use futures::{Stream, StreamExt};
use serde::{Deserialize, Serialize};

use agent_core::{
    provider::ModelInfo, AgentError, Message, Thread, ThreadId, ThreadUpdate,
};

use crate::state::AppState;

/// Largest page `GET /api/threads` returns
const MAX_PAGE: usize = 100;

// ============================================================================
// Request / Response Types
// ============================================================================

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
    pub model_connected: bool,
}

#[derive(Debug, Serialize)]
pub struct ModelsResponse {
    pub models: Vec<ModelInfo>,
}

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub code: String,
}

#[derive(Debug, Deserialize)]
pub struct ListThreadsQuery {
    #[serde(default)]
    pub skip: usize,
    #[serde(default = "default_page")]
    pub limit: usize,
}

fn default_page() -> usize {
    MAX_PAGE
}

#[derive(Debug, Default, Deserialize)]
pub struct CreateThreadRequest {
    #[serde(default)]
    pub title: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct SendMessageRequest {
    pub content: String,
}

pub type ApiError = (StatusCode, Json<ErrorResponse>);

type ApiResult<T> = Result<T, ApiError>;

fn api_error(e: AgentError) -> ApiError {
    let (status, code) = match &e {
        AgentError::ThreadNotFound(_) => (StatusCode::NOT_FOUND, "THREAD_NOT_FOUND"),
        AgentError::Validation(_) => (StatusCode::BAD_REQUEST, "VALIDATION_ERROR"),
        e if e.is_model_error() => (StatusCode::INTERNAL_SERVER_ERROR, "MODEL_ERROR"),
        _ => (StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR"),
    };

    if status.is_server_error() {
        tracing::error!("Request failed: {}", e);
    } else {
        tracing::debug!("Request rejected: {}", e);
    }

    (
        status,
        Json(ErrorResponse {
            error: e.user_message(),
            code: code.into(),
        }),
    )
}

// ============================================================================
// Handlers
// ============================================================================

/// Health check endpoint
pub async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    let model_connected = state.provider.health_check().await.unwrap_or(false);

    Json(HealthResponse {
        status: "healthy",
        version: env!("CARGO_PKG_VERSION"),
        model_connected,
    })
}

/// List models offered by the model endpoint
pub async fn list_models(State(state): State<AppState>) -> ApiResult<Json<ModelsResponse>> {
    let models = state.provider.list_models().await.map_err(api_error)?;
    Ok(Json(ModelsResponse { models }))
}

/// Thread summaries, most recently active first
pub async fn list_threads(
    State(state): State<AppState>,
    Query(query): Query<ListThreadsQuery>,
) -> ApiResult<Json<Vec<Thread>>> {
    let threads = state
        .chat
        .list_threads(query.limit.min(MAX_PAGE), query.skip)
        .await
        .map_err(api_error)?;
    Ok(Json(threads))
}

pub async fn create_thread(
    State(state): State<AppState>,
    payload: Result<Json<CreateThreadRequest>, JsonRejection>,
) -> ApiResult<(StatusCode, Json<Thread>)> {
    let Json(request) = payload.unwrap_or_default();
    let thread = state.chat.create_thread(request.title).await.map_err(api_error)?;
    Ok((StatusCode::CREATED, Json(thread)))
}

pub async fn get_thread(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<Thread>> {
    let thread = state
        .chat
        .get_thread(&ThreadId::from_string(id))
        .await
        .map_err(api_error)?;
    Ok(Json(thread))
}

pub async fn update_thread(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(update): Json<ThreadUpdate>,
) -> ApiResult<Json<Thread>> {
    let thread = state
        .chat
        .update_thread(&ThreadId::from_string(id), update)
        .await
        .map_err(api_error)?;
    Ok(Json(thread))
}

pub async fn delete_thread(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<StatusCode> {
    state
        .chat
        .delete_thread(&ThreadId::from_string(id))
        .await
        .map_err(api_error)?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn list_messages(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<Vec<Message>>> {
    let messages = state
        .chat
        .messages(&ThreadId::from_string(id))
        .await
        .map_err(api_error)?;
    Ok(Json(messages))
}

/// Append a user message and stream the turn as server-sent events
///
/// Unknown threads and invalid content are answered with a plain error
/// response; once the stream starts, failures arrive as `{"error": ...}`.
pub async fn send_message(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(request): Json<SendMessageRequest>,
) -> ApiResult<Sse<impl Stream<Item = Result<Event, Infallible>>>> {
    let thread_id = ThreadId::from_string(id);
    let frames = state
        .chat
        .send_message(&thread_id, &request.content)
        .await
        .map_err(api_error)?;

    tracing::info!(thread_id = %thread_id, "Streaming turn");

    let events = frames
        .map(|frame| Ok::<_, Infallible>(Event::default().data(frame.payload().to_string())));
    Ok(Sse::new(events).keep_alive(KeepAlive::default()))
}
