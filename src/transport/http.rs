//! Stateless HTTP transport.
//!
//! One `POST /mcp` endpoint carries the protocol; `GET /health` and
//! `GET /metrics` serve operations. Every POST gets a fresh session bound
//! to the shared registry: distinct clients may reuse the same correlation
//! ids, and a shared session could route a response to the wrong
//! connection. The session dies with the response.

use std::sync::Arc;

use axum::Router;
use axum::extract::State;
use axum::http::{HeaderMap, StatusCode, header};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};

use crate::config::AuthMode;
use crate::error::{Error, JsonRpcError, Result};
use crate::jsonrpc::JsonRpcService;
use crate::metrics::MetricsRegistry;
use crate::protocol::{JsonRpcMessage, JsonRpcResponse, JsonRpcResponseMessage};
use crate::router::McpRouter;
use crate::session::SessionPhase;
use crate::transport::shutdown_signal;

pub struct HttpTransport {
    router: McpRouter,
    metrics: MetricsRegistry,
    auth_mode: AuthMode,
    auth_secret: Option<String>,
}

struct AppState {
    router: McpRouter,
    metrics: MetricsRegistry,
    auth_mode: AuthMode,
    auth_secret: Option<String>,
}

impl HttpTransport {
    pub fn new(router: McpRouter, metrics: MetricsRegistry) -> Self {
        Self {
            router,
            metrics,
            auth_mode: AuthMode::None,
            auth_secret: None,
        }
    }

    /// Enable request authentication on `/mcp`.
    pub fn with_auth(mut self, mode: AuthMode, secret: Option<String>) -> Self {
        self.auth_mode = mode;
        self.auth_secret = secret;
        self
    }

    /// Build the axum router.
    pub fn into_router(self) -> Router {
        let state = Arc::new(AppState {
            router: self.router,
            metrics: self.metrics,
            auth_mode: self.auth_mode,
            auth_secret: self.auth_secret,
        });
        Router::new()
            .route("/mcp", post(handle_mcp))
            .route("/health", get(handle_health))
            .route("/metrics", get(handle_metrics))
            .with_state(state)
    }

    /// Bind and serve until a termination signal.
    pub async fn serve(self, addr: &str) -> Result<()> {
        let listener = tokio::net::TcpListener::bind(addr)
            .await
            .map_err(|e| Error::Transport(format!("Failed to bind {}: {}", addr, e)))?;
        tracing::info!(%addr, "HTTP transport listening");

        axum::serve(listener, self.into_router())
            .with_graceful_shutdown(shutdown_signal())
            .await
            .map_err(|e| Error::Transport(format!("Server error: {}", e)))?;
        Ok(())
    }
}

/// Check the configured auth header. Returns a response on failure.
fn check_auth(state: &AppState, headers: &HeaderMap) -> Option<Response> {
    match state.auth_mode {
        AuthMode::None => None,
        AuthMode::ApiKey => {
            let presented = headers.get("x-api-key").and_then(|v| v.to_str().ok());
            if presented == state.auth_secret.as_deref() {
                None
            } else {
                Some((StatusCode::UNAUTHORIZED, "Invalid or missing API key").into_response())
            }
        }
        AuthMode::Jwt => {
            let token = headers
                .get(header::AUTHORIZATION)
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.strip_prefix("Bearer "));
            let Some(token) = token else {
                return Some(
                    (StatusCode::UNAUTHORIZED, "Missing bearer token").into_response(),
                );
            };
            let secret = state.auth_secret.as_deref().unwrap_or_default();
            let key = jsonwebtoken::DecodingKey::from_secret(secret.as_bytes());
            let validation = jsonwebtoken::Validation::new(jsonwebtoken::Algorithm::HS256);
            match jsonwebtoken::decode::<serde_json::Value>(token, &key, &validation) {
                Ok(_) => None,
                Err(_) => Some((StatusCode::UNAUTHORIZED, "Invalid token").into_response()),
            }
        }
    }
}

async fn handle_mcp(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    body: String,
) -> Response {
    if let Some(rejection) = check_auth(&state, &headers) {
        return rejection;
    }

    let parsed: serde_json::Value = match serde_json::from_str(&body) {
        Ok(v) => v,
        Err(e) => {
            return json_error(JsonRpcError::parse_error(format!("Invalid JSON: {}", e)));
        }
    };

    // Notifications are acknowledged without a body. A stateless session
    // has nothing to remember, so nothing else happens.
    if parsed.is_object() && parsed.get("id").is_none() {
        return StatusCode::ACCEPTED.into_response();
    }

    let message: JsonRpcMessage = match serde_json::from_value(parsed) {
        Ok(m) => m,
        Err(e) => {
            return json_error(JsonRpcError::invalid_request(format!(
                "Invalid request: {}",
                e
            )));
        }
    };

    // Fresh session per request over the shared registry. Single-shot
    // requests are expected, so the session starts ready.
    let session_router = state.router.with_fresh_session();
    session_router
        .session()
        .set_phase(SessionPhase::Initializing);

    let mut service = JsonRpcService::new(session_router);
    match service.call_message(message).await {
        Ok(response) => axum::Json(response).into_response(),
        Err(e) => {
            tracing::error!(error = %e, "Error processing HTTP request");
            json_error(JsonRpcError::internal_error("Internal server error"))
        }
    }
}

async fn handle_health() -> Response {
    axum::Json(serde_json::json!({"status": "ok", "transport": "http"})).into_response()
}

async fn handle_metrics(State(state): State<Arc<AppState>>) -> Response {
    (
        [(header::CONTENT_TYPE, "text/plain; charset=utf-8")],
        state.metrics.render(),
    )
        .into_response()
}

fn json_error(error: JsonRpcError) -> Response {
    axum::Json(JsonRpcResponseMessage::Single(JsonRpcResponse::error(
        None, error,
    )))
    .into_response()
}
