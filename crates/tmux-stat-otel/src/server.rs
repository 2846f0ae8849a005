//! HTTP transport: OTLP/JSON ingestion plus pane registration endpoints.
//!
//! Endpoints:
//! - `POST /v1/logs`, `POST /v1/traces`, `POST /`: OTLP/JSON export
//! - `POST /register`, `POST /unregister`: pane to conversation bindings
//! - `GET /health`: mapping count and idle seconds
//!
//! Unknown `GET` paths answer 404; unknown `POST` paths are accepted and ignored.

use std::sync::Arc;

use axum::body::Bytes;
use axum::extract::State;
use axum::http::{Method, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use chrono::Utc;
use serde::Deserialize;
use serde_json::error::Category;
use serde_json::json;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;

use tmux_stat_tmux::TmuxCommandRunner;

use crate::otlp::{DecodeError, ExportPayload};
use crate::receiver::ReceiverState;

type SharedState<R> = Arc<ReceiverState<R>>;

/// Fields stay untyped so a wrong-typed `pane_id` reads as missing.
#[derive(Debug, Default, Deserialize)]
struct RegisterRequest {
    #[serde(default)]
    pane_id: Option<serde_json::Value>,
    #[serde(default)]
    conversation_id: Option<serde_json::Value>,
}

impl RegisterRequest {
    fn pane_id(&self) -> Option<&str> {
        non_empty_str(self.pane_id.as_ref())
    }

    fn conversation_id(&self) -> Option<&str> {
        non_empty_str(self.conversation_id.as_ref())
    }
}

fn non_empty_str(value: Option<&serde_json::Value>) -> Option<&str> {
    value.and_then(serde_json::Value::as_str).filter(|s| !s.is_empty())
}

pub fn router<R: TmuxCommandRunner + 'static>(state: SharedState<R>) -> Router {
    Router::new()
        .route("/", post(handle_export::<R>).fallback(handle_fallback))
        .route("/v1/logs", post(handle_export::<R>).fallback(handle_fallback))
        .route("/v1/traces", post(handle_export::<R>).fallback(handle_fallback))
        .route("/register", post(handle_register::<R>).fallback(handle_fallback))
        .route("/unregister", post(handle_unregister::<R>).fallback(handle_fallback))
        .route("/health", get(handle_health::<R>).fallback(handle_fallback))
        .fallback(handle_fallback)
        .with_state(state)
}

/// Serve until `shutdown` is cancelled; in-flight requests are allowed to finish.
pub async fn serve<R: TmuxCommandRunner + 'static>(
    listener: TcpListener,
    state: SharedState<R>,
    shutdown: CancellationToken,
) -> anyhow::Result<()> {
    axum::serve(listener, router(state))
        .with_graceful_shutdown(async move { shutdown.cancelled().await })
        .await?;
    Ok(())
}

// ─── Handlers ────────────────────────────────────────────────────

pub(crate) async fn handle_export<R: TmuxCommandRunner + 'static>(
    State(state): State<SharedState<R>>,
    body: Bytes,
) -> Response {
    match ExportPayload::decode(&body) {
        Ok(payload) => {
            let summary = state.ingest(&payload, Utc::now()).await;
            tracing::debug!(records = summary.records, applied = summary.applied, "export processed");
        }
        Err(DecodeError::Syntax(e)) => {
            tracing::debug!(error = %e, "rejected export body");
            return error_response(StatusCode::BAD_REQUEST, "invalid JSON");
        }
        Err(e @ DecodeError::Shape(_)) => {
            tracing::warn!(error = %e, "ignoring export body");
        }
    }
    ok_response(json!({"status": "ok"}))
}

pub(crate) async fn handle_register<R: TmuxCommandRunner + 'static>(
    State(state): State<SharedState<R>>,
    body: Bytes,
) -> Response {
    let request = match parse_request(&body) {
        Ok(request) => request,
        Err(resp) => return resp,
    };
    let Some(pane_id) = request.pane_id() else {
        return error_response(StatusCode::BAD_REQUEST, "pane_id required");
    };

    match state.register(pane_id, request.conversation_id(), Utc::now()) {
        Ok(key) => ok_response(json!({"status": "registered", "mapping_key": key.to_string()})),
        Err(e) => error_response(StatusCode::BAD_REQUEST, &e.to_string()),
    }
}

pub(crate) async fn handle_unregister<R: TmuxCommandRunner + 'static>(
    State(state): State<SharedState<R>>,
    body: Bytes,
) -> Response {
    let request = match parse_request(&body) {
        Ok(request) => request,
        Err(resp) => return resp,
    };
    let Some(pane_id) = request.pane_id() else {
        return error_response(StatusCode::BAD_REQUEST, "pane_id required");
    };

    match state.unregister(pane_id, Utc::now()).await {
        Ok(()) => ok_response(json!({"status": "unregistered"})),
        Err(e) => error_response(StatusCode::BAD_REQUEST, &e.to_string()),
    }
}

/// Introspection only; does not count as activity.
pub(crate) async fn handle_health<R: TmuxCommandRunner + 'static>(
    State(state): State<SharedState<R>>,
) -> Response {
    let idle = state.registry.idle_for(Utc::now());
    ok_response(json!({
        "status": "ok",
        "mappings": state.registry.count(),
        "idle_seconds": idle.num_seconds(),
    }))
}

pub(crate) async fn handle_fallback(method: Method) -> Response {
    if method == Method::GET {
        error_response(StatusCode::NOT_FOUND, "not found")
    } else {
        ok_response(json!({"status": "ok"}))
    }
}

// ─── Helpers ─────────────────────────────────────────────────────

fn parse_request(body: &[u8]) -> Result<RegisterRequest, Response> {
    if body.is_empty() {
        return Ok(RegisterRequest::default());
    }
    serde_json::from_slice(body).map_err(|e| match e.classify() {
        Category::Data => error_response(StatusCode::BAD_REQUEST, &format!("invalid request: {e}")),
        Category::Syntax | Category::Eof | Category::Io => {
            error_response(StatusCode::BAD_REQUEST, "invalid JSON")
        }
    })
}

fn ok_response(body: serde_json::Value) -> Response {
    (StatusCode::OK, Json(body)).into_response()
}

fn error_response(status: StatusCode, message: &str) -> Response {
    (status, Json(json!({"error": message}))).into_response()
}
