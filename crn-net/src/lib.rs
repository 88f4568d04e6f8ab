//! crn-net library interface
//!
//! Exposes the router, services and store access for the binary and for
//! integration tests.

pub mod api;
pub mod db;
pub mod error;
pub mod models;
pub mod services;
pub mod utils;

pub use crate::error::{ApiError, ApiResult};

use axum::Router;
use chrono::{DateTime, Utc};
use crn_common::config::TomlConfig;
use sqlx::SqlitePool;
use std::sync::Arc;
use tower_http::trace::TraceLayer;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    /// Database connection pool
    pub db: SqlitePool,
    /// Bootstrap configuration (batch settings, batch secret)
    pub config: Arc<TomlConfig>,
    /// Service startup timestamp for uptime tracking
    pub startup_time: DateTime<Utc>,
}

impl AppState {
    pub fn new(db: SqlitePool, config: TomlConfig) -> Self {
        Self {
            db,
            config: Arc::new(config),
            startup_time: Utc::now(),
        }
    }
}

/// Build application router
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .merge(api::health_routes())
        .merge(api::network_routes())
        .merge(api::customer_routes())
        .merge(api::batch_routes(state.clone()))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
