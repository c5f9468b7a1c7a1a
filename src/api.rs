//! REST API Server for the advisory coordinator
//!
//! Exposes sessions, turns and the paired-history chat surface over HTTP.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};
use uuid::Uuid;

use crate::error::CoordinatorError;
use crate::session::{history, ChatPair, HistoryEntry, SessionHost};

/// =============================
/// Request Models
/// =============================

#[derive(Debug, Deserialize)]
pub struct TurnRequest {
    pub message: String,
    pub success_criteria: Option<String>,
    #[serde(default)]
    pub history: Vec<HistoryEntry>,
}

#[derive(Debug, Deserialize)]
pub struct ChatRequest {
    pub session_id: Option<Uuid>,
    pub message: String,
    pub success_criteria: Option<String>,
    #[serde(default)]
    pub history: Vec<ChatPair>,
}

/// =============================
/// Response Wrapper
/// =============================

#[derive(Debug, Serialize, Deserialize)]
pub struct ApiResponse {
    pub success: bool,
    pub data: Option<serde_json::Value>,
    pub error: Option<String>,
    pub timestamp: String,
}

impl ApiResponse {
    pub fn success<T: Serialize>(data: T) -> Self {
        Self {
            success: true,
            data: serde_json::to_value(data).ok(),
            error: None,
            timestamp: chrono::Utc::now().to_rfc3339(),
        }
    }

    pub fn error(message: String) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(message),
            timestamp: chrono::Utc::now().to_rfc3339(),
        }
    }
}

type Reply = (StatusCode, Json<ApiResponse>);

fn ok<T: Serialize>(data: T) -> Reply {
    (StatusCode::OK, Json(ApiResponse::success(data)))
}

fn status_for(error: &CoordinatorError) -> StatusCode {
    match error {
        CoordinatorError::SessionNotFound(_) | CoordinatorError::AuditRecordNotFound(_) => StatusCode::NOT_FOUND,
        CoordinatorError::TurnTimeout(_) => StatusCode::GATEWAY_TIMEOUT,
        CoordinatorError::AgentFailure(_) | CoordinatorError::MalformedVerdict(_) => StatusCode::BAD_GATEWAY,
        CoordinatorError::InvalidRequest(_) => StatusCode::BAD_REQUEST,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

fn failed(error: CoordinatorError) -> Reply {
    let status = status_for(&error);
    if status.is_server_error() {
        warn!(status = %status, error = %error, "Request failed");
    }
    (status, Json(ApiResponse::error(error.to_string())))
}

/// =============================
/// API State
/// =============================

#[derive(Clone)]
pub struct ApiState {
    pub host: Arc<SessionHost>,
}

/// =============================
/// Handlers
/// =============================

async fn health() -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "status": "healthy",
        "timestamp": chrono::Utc::now().to_rfc3339()
    }))
}

async fn list_tools(State(state): State<ApiState>) -> Reply {
    ok(state.host.coordinator().engine().descriptors())
}

async fn list_agents(State(state): State<ApiState>) -> Reply {
    let profiles: Vec<_> = state.host.coordinator().roster().profiles().cloned().collect();
    ok(profiles)
}

async fn start_session(State(state): State<ApiState>) -> Reply {
    match state.host.start_session().await {
        Ok(session_id) => ok(serde_json::json!({ "session_id": session_id })),
        Err(e) => failed(e),
    }
}

async fn submit_turn(
    State(state): State<ApiState>,
    Path(session_id): Path<Uuid>,
    Json(req): Json<TurnRequest>,
) -> Reply {
    info!(session_id = %session_id, "Received turn");

    match state
        .host
        .submit_turn_with_history(session_id, &req.message, req.success_criteria.as_deref(), &req.history)
        .await
    {
        Ok(report) => {
            let entries: Vec<_> = report
                .events
                .iter()
                .map(|event| HistoryEntry::new(event.role, event.content.clone()))
                .collect();

            let mut data = serde_json::to_value(&report).unwrap_or_default();
            data["pairs"] = serde_json::json!(history::entries_to_pairs(&entries));
            ok(data)
        }
        Err(e) => failed(e),
    }
}

async fn reset_session(State(state): State<ApiState>, Path(session_id): Path<Uuid>) -> Reply {
    match state.host.reset_session(session_id).await {
        Ok(session_id) => ok(serde_json::json!({ "session_id": session_id })),
        Err(e) => failed(e),
    }
}

async fn close_session(State(state): State<ApiState>, Path(session_id): Path<Uuid>) -> Reply {
    match state.host.close_session(session_id).await {
        Ok(()) => ok(serde_json::json!({ "session_id": session_id, "closed": true })),
        Err(e) => failed(e),
    }
}

async fn session_audit(State(state): State<ApiState>, Path(session_id): Path<Uuid>) -> Reply {
    match state.host.audit(session_id).await {
        Ok(records) => ok(records),
        Err(e) => failed(e),
    }
}

async fn verify_audit(
    State(state): State<ApiState>,
    Path((session_id, audit_id)): Path<(Uuid, Uuid)>,
) -> Reply {
    match state.host.verify_audit(session_id, audit_id).await {
        Ok(check) => ok(check),
        Err(e) => failed(e),
    }
}

async fn chat_handler(State(state): State<ApiState>, Json(req): Json<ChatRequest>) -> Reply {
    match state
        .host
        .chat(req.session_id, &req.message, req.success_criteria.as_deref(), &req.history)
        .await
    {
        Ok(exchange) => ok(serde_json::json!({
            "session_id": exchange.session_id,
            "history": exchange.history,
            "report": exchange.report,
        })),
        Err(e) => failed(e),
    }
}

/// =============================
/// Router
/// =============================

pub fn create_router(host: Arc<SessionHost>) -> Router {
    let state = ApiState { host };

    Router::new()
        .route("/health", get(health))
        .route("/api/tools", get(list_tools))
        .route("/api/agents", get(list_agents))
        .route("/api/sessions", post(start_session))
        .route("/api/sessions/:id", axum::routing::delete(close_session))
        .route("/api/sessions/:id/turns", post(submit_turn))
        .route("/api/sessions/:id/reset", post(reset_session))
        .route("/api/sessions/:id/audit", get(session_audit))
        .route("/api/sessions/:id/audit/:audit_id", get(verify_audit))
        .route("/api/chat", post(chat_handler))
        .with_state(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
}

/// =============================
/// Server Startup
/// =============================

pub async fn start_server(
    host: Arc<SessionHost>,
    port: u16,
) -> std::result::Result<(), Box<dyn std::error::Error>> {
    let router = create_router(host);

    let listener = tokio::net::TcpListener::bind(format!("0.0.0.0:{}", port)).await?;

    info!("API Server listening on http://0.0.0.0:{}", port);
    info!("Local: http://127.0.0.1:{}", port);

    axum::serve(listener, router).await?;

    Ok(())
}
