//! REST API handlers
//!
//! Accepts user messages for a session and reports the assistant's answer.

use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};
use chrono::Local;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Instant;
use uuid::Uuid;

use crate::adapters::metrics_handler::MetricsCollector;
use crate::agents::core::{render_prompt, PromptInput, TurnEngine, TurnOutcome, TurnRequest};
use crate::agents::session::DEFAULT_SESSION;
use crate::config::PromptSettings;

/// Shared application state for API handlers
#[derive(Clone)]
pub struct ApiState {
    pub engine: Arc<TurnEngine>,
    pub metrics: Arc<MetricsCollector>,
    pub prompt: Arc<PromptSettings>,
}

// ============================================================================
// Response Types
// ============================================================================

#[derive(Serialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl<T: Serialize> ApiResponse<T> {
    pub fn success(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
        }
    }
}

impl<T> ApiResponse<T> {
    pub fn error(message: impl Into<String>) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(message.into()),
        }
    }
}

fn default_session() -> String {
    DEFAULT_SESSION.to_string()
}

#[derive(Debug, Deserialize)]
pub struct TurnPayload {
    #[serde(default = "default_session")]
    pub session_id: String,
    pub message: String,
    /// Knowledge store name or id to bind to the session
    #[serde(default)]
    pub knowledge_store: Option<String>,
    /// Who is speaking; used to address them in the prompt
    #[serde(default)]
    pub user: Option<String>,
    /// Extra task description appended to the prompt
    #[serde(default)]
    pub context: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct TurnResponse {
    pub turn_id: Uuid,
    pub session_id: String,
    pub response: Option<String>,
    pub status: &'static str,
    pub iterations: u32,
}

// ============================================================================
// Endpoints
// ============================================================================

/// POST /api/turns - Send a message and wait for the assistant's answer
pub async fn create_turn(
    State(state): State<ApiState>,
    Json(payload): Json<TurnPayload>,
) -> impl IntoResponse {
    if payload.message.trim().is_empty() {
        return (
            StatusCode::BAD_REQUEST,
            Json(ApiResponse::<TurnResponse>::error("message must not be empty")),
        );
    }
    if payload.session_id.trim().is_empty() {
        return (
            StatusCode::BAD_REQUEST,
            Json(ApiResponse::<TurnResponse>::error("session_id must not be empty")),
        );
    }

    let knowledge_store = match payload.knowledge_store.clone() {
        Some(store) => Some(store),
        None => state.engine.select_store(&payload.message).await,
    };

    let user = payload
        .user
        .clone()
        .unwrap_or_else(|| state.prompt.default_user.clone());
    let input = PromptInput::new(user, payload.message.as_str())
        .with_context(payload.context.clone())
        .with_store(knowledge_store.clone());
    let message = render_prompt(&state.prompt.template, &input, Local::now());

    let request = TurnRequest::new(payload.session_id.as_str(), message)
        .with_knowledge_store(knowledge_store.as_deref());

    // The turn owns its task so a dropped connection cannot cut a run short
    // while the session lock is held
    let engine = state.engine.clone();
    let metrics = state.metrics.clone();
    let turn = tokio::spawn(async move {
        let _in_flight = metrics.track_in_flight();
        let start = Instant::now();
        let report = engine.execute(request).await;
        metrics.record_turn(&report, start.elapsed());
        report
    });
    let report = match turn.await {
        Ok(report) => report,
        Err(e) => {
            tracing::error!("Turn task failed: {}", e);
            return (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ApiResponse::<TurnResponse>::error("turn did not complete")),
            );
        }
    };

    let status = match report.outcome {
        TurnOutcome::TransportFailure(_) => StatusCode::BAD_GATEWAY,
        TurnOutcome::InvalidRequest(_) => StatusCode::BAD_REQUEST,
        _ => StatusCode::OK,
    };
    let body = TurnResponse {
        turn_id: report.turn_id,
        session_id: report.session_id.clone(),
        status: report.outcome.label(),
        iterations: report.iterations,
        response: report.into_answer(),
    };
    (status, Json(ApiResponse::success(body)))
}

/// GET /api/sessions - List known sessions
pub async fn list_sessions(State(state): State<ApiState>) -> impl IntoResponse {
    let sessions = state.engine.sessions().list().await;
    (StatusCode::OK, Json(ApiResponse::success(sessions)))
}

/// GET /api/functions - List functions the assistant may call
pub async fn list_functions(State(state): State<ApiState>) -> impl IntoResponse {
    (
        StatusCode::OK,
        Json(ApiResponse::success(state.engine.registry().names())),
    )
}
