use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Json, Response},
    routing::get,
    Router,
};
use serde::Serialize;
use std::time::Instant;

use crate::{errors::ServiceError, handlers::AppState};

/// Component health status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ComponentStatus {
    Up,
    Down,
}

/// Individual component health details
#[derive(Debug, Clone, Serialize)]
pub struct ComponentHealth {
    pub status: ComponentStatus,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub latency_ms: Option<u64>,
}

/// Health check response
#[derive(Debug, Clone, Serialize)]
pub struct HealthResponse {
    pub status: ComponentStatus,
    pub version: String,
    pub tenant: String,
    pub timestamp: String,
    pub uptime_secs: u64,
    pub store: ComponentHealth,
}

/// Tracks application start time for uptime calculation
static START_TIME: std::sync::OnceLock<Instant> = std::sync::OnceLock::new();

/// Initialize the start time (call this on application startup)
pub fn init_start_time() {
    let _ = START_TIME.get_or_init(Instant::now);
}

fn get_uptime_secs() -> u64 {
    START_TIME.get().map(|t| t.elapsed().as_secs()).unwrap_or(0)
}

pub fn health_routes() -> Router<AppState> {
    Router::new().route("/", get(health_check))
}

/// Probes the document store with a live read; 503 when it cannot be reached
pub async fn health_check(State(state): State<AppState>) -> Response {
    let start = Instant::now();
    let store = match state.services.columns.has_any().await {
        Ok(_) => ComponentHealth {
            status: ComponentStatus::Up,
            message: "Document store reachable".to_string(),
            latency_ms: Some(start.elapsed().as_millis() as u64),
        },
        Err(ServiceError::StoreError(e)) => ComponentHealth {
            status: ComponentStatus::Down,
            message: e.to_string(),
            latency_ms: None,
        },
        Err(e) => ComponentHealth {
            status: ComponentStatus::Down,
            message: e.response_message(),
            latency_ms: None,
        },
    };

    let status = store.status;
    let body = HealthResponse {
        status,
        version: env!("CARGO_PKG_VERSION").to_string(),
        tenant: state.config.tenant.clone(),
        timestamp: chrono::Utc::now().to_rfc3339(),
        uptime_secs: get_uptime_secs(),
        store,
    };
    let code = match status {
        ComponentStatus::Up => StatusCode::OK,
        ComponentStatus::Down => StatusCode::SERVICE_UNAVAILABLE,
    };
    (code, Json(body)).into_response()
}
