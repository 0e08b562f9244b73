//! HTTP surface: the setup endpoint, a liveness check and the shared middleware stack.
use std::sync::Arc;

use axum::{
    Json, Router,
    body::Bytes,
    extract::{DefaultBodyLimit, State},
    http::{HeaderMap, StatusCode},
    middleware,
    response::{IntoResponse, Response},
    routing::{get, post},
};
use serde_json::json;
use tower_http::trace::TraceLayer;

use crate::{
    adapters::middleware::{
        X_REQUEST_ID, request_id_middleware, request_timing_middleware,
        security_headers_middleware,
    },
    core::{Coordinator, PipelineReport, ProvisionError, signature::SIGNATURE_HEADER},
};

pub const SETUP_PATH: &str = "/api/custom-domains/setup";
pub const HEALTH_PATH: &str = "/health";

/// Request bodies are a few hundred bytes; anything near this is not a real caller.
pub const MAX_BODY_BYTES: usize = 64 * 1024;

/// Shared state for the HTTP handlers
#[derive(Clone)]
pub struct HttpHandler {
    coordinator: Arc<Coordinator>,
}

impl HttpHandler {
    pub fn new(coordinator: Arc<Coordinator>) -> Self {
        Self { coordinator }
    }

    /// Build the axum router with every route and layer attached.
    pub fn router(self) -> Router {
        Router::new()
            .route(SETUP_PATH, post(setup_custom_domain))
            .route(HEALTH_PATH, get(health))
            .layer(DefaultBodyLimit::max(MAX_BODY_BYTES))
            .layer(middleware::from_fn(security_headers_middleware))
            .layer(middleware::from_fn(request_timing_middleware))
            .layer(TraceLayer::new_for_http())
            .layer(middleware::from_fn(request_id_middleware))
            .with_state(self)
    }
}

async fn setup_custom_domain(
    State(handler): State<HttpHandler>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let request_id = headers
        .get(X_REQUEST_ID)
        .and_then(|value| value.to_str().ok())
        .unwrap_or_default()
        .to_string();
    let signature = headers
        .get(SIGNATURE_HEADER)
        .and_then(|value| value.to_str().ok())
        .map(str::to_string);

    let report = handler
        .coordinator
        .handle(&request_id, body, signature)
        .await;
    report_response(report)
}

/// Map a finished run onto the status codes and bodies callers rely on.
pub fn report_response(report: PipelineReport) -> Response {
    match report.result {
        Ok(success) => (
            StatusCode::OK,
            Json(json!({
                "success": true,
                "domain": success.domain,
                "message": success.message,
            })),
        )
            .into_response(),
        Err(ProvisionError::Authentication(message)) => {
            (StatusCode::UNAUTHORIZED, Json(json!({ "error": message }))).into_response()
        }
        Err(ProvisionError::Validation(message)) => {
            (StatusCode::BAD_REQUEST, Json(json!({ "error": message }))).into_response()
        }
        Err(other) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({ "success": false, "error": other.to_string() })),
        )
            .into_response(),
    }
}

async fn health() -> impl IntoResponse {
    Json(json!({
        "status": "ok",
        "timestamp": chrono::Utc::now().to_rfc3339(),
    }))
}
