//! Shopfloor API Library
//!
//! Production order board, quotations, suppliers, tasks and company settings
//! for a small manufacturer, served as a JSON API over a document store.
#![forbid(unsafe_code)]
#![deny(rust_2018_idioms)]
#![allow(elided_lifetimes_in_paths)]
#![warn(clippy::all, clippy::perf, clippy::dbg_macro)]

// Core modules
pub mod common;
pub mod config;
pub mod errors;
pub mod events;
pub mod export;
pub mod handlers;
pub mod middleware_helpers;
pub mod models;
pub mod services;
pub mod store;
pub mod tracing;

use axum::{http::HeaderValue, response::Json, routing::get, Router};
use chrono::Utc;
use serde::Serialize;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};

// The local `tracing` module shadows the crate at the root
use ::tracing::{info, warn};

use crate::store::{DocumentStore, TenantStore};

// App state definition
#[derive(Clone)]
pub struct AppState {
    pub config: config::AppConfig,
    pub event_sender: Arc<events::EventSender>,
    pub services: handlers::AppServices,
}

impl AppState {
    /// Builds every service against the configured tenant of `store`.
    pub fn new(
        config: config::AppConfig,
        store: Arc<dyn DocumentStore>,
        event_sender: Arc<events::EventSender>,
    ) -> Self {
        let tenant_store = TenantStore::new(store, config.tenant.clone());
        let services = handlers::AppServices::new(tenant_store, &config, event_sender.clone());
        Self {
            config,
            event_sender,
            services,
        }
    }
}

// Common response wrappers
#[derive(Debug, Serialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    pub data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub meta: Option<ResponseMeta>,
}

#[derive(Debug, Serialize)]
pub struct ResponseMeta {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub request_id: Option<String>,
    pub timestamp: String,
}

impl ResponseMeta {
    fn capture() -> Self {
        Self {
            request_id: crate::tracing::current_request_id().map(|rid| rid.as_str().to_string()),
            timestamp: Utc::now().to_rfc3339(),
        }
    }
}

impl<T> ApiResponse<T> {
    pub fn success(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            message: None,
            meta: Some(ResponseMeta::capture()),
        }
    }

    pub fn error(message: String) -> Self {
        Self {
            success: false,
            data: None,
            message: Some(message),
            meta: Some(ResponseMeta::capture()),
        }
    }
}


/// Standard API result type for JSON responses
pub type ApiResult<T> = Result<Json<ApiResponse<T>>, errors::ServiceError>;

/// Every `/api/v1` route group
pub fn api_v1_routes() -> Router<AppState> {
    Router::new()
        .nest("/health", handlers::health::health_routes())
        .nest("/orders", handlers::orders::order_routes())
        .route("/board", get(handlers::orders::board))
        .nest("/quotations", handlers::quotations::quotation_routes())
        .nest("/columns", handlers::columns::column_routes())
        .nest("/suppliers", handlers::suppliers::supplier_routes())
        .nest("/tasks", handlers::tasks::task_routes())
        .nest("/settings", handlers::settings::settings_routes())
}

/// Explicit origins when configured, permissive in development, same-origin otherwise
pub fn cors_layer(cfg: &config::AppConfig) -> CorsLayer {
    let origins: Vec<HeaderValue> = cfg
        .cors_origins()
        .iter()
        .filter_map(|origin| HeaderValue::from_str(origin).ok())
        .collect();

    if !origins.is_empty() {
        CorsLayer::new()
            .allow_origin(origins)
            .allow_methods(Any)
            .allow_headers(Any)
    } else if cfg.is_development() {
        info!("Using permissive CORS because explicit origins were not configured (development environment)");
        CorsLayer::permissive()
    } else {
        warn!("No CORS origins configured; cross-origin requests will be rejected. Set APP__CORS_ALLOWED_ORIGINS to allow them");
        CorsLayer::new()
    }
}

/// Full application router with tracing, CORS and request ids applied
pub fn build_router(state: AppState) -> Router {
    let cors = cors_layer(&state.config);
    Router::<AppState>::new()
        .route("/", get(|| async { "shopfloor-api up" }))
        .nest("/api/v1", api_v1_routes())
        // HTTP tracing layer for consistent request/response telemetry
        .layer(crate::tracing::configure_http_tracing())
        .layer(cors)
        // Ensure every request carries a request id for traceability
        .layer(axum::middleware::from_fn(
            middleware_helpers::request_id::request_id_middleware,
        ))
        .with_state(state)
}

pub mod prelude {
    pub use crate::errors::{ErrorResponse, ServiceError};
    pub use crate::events::{Event, EventSender};
    pub use crate::store::{DocumentStore, InMemoryDocumentStore, TenantStore};
    pub use crate::{build_router, ApiResponse, ApiResult, AppState};
}
