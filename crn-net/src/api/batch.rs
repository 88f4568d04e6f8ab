//! Batch job handlers
//!
//! POST /batch/resync, POST /batch/bootstrap, POST /batch/rebuild/{identity_id}
//!
//! All routes sit behind the batch secret guard.

use axum::{
    extract::{Path, State},
    middleware,
    routing::post,
    Json, Router,
};
use serde::Deserialize;

use crate::api::auth::batch_secret_guard;
use crate::error::ApiResult;
use crate::models::{BootstrapReport, IdentitySummary, ResyncReport};
use crate::services::{NetworkSync, PropertyBootstrap, ReputationAggregator};
use crate::AppState;

/// POST /batch/resync request
#[derive(Debug, Default, Deserialize)]
pub struct ResyncRequest {
    /// Restrict to one opted-in business
    #[serde(default)]
    pub business_id: Option<String>,
    #[serde(default)]
    pub limit: Option<usize>,
}

/// POST /batch/bootstrap request
#[derive(Debug, Default, Deserialize)]
pub struct BootstrapRequest {
    #[serde(default)]
    pub limit: Option<usize>,
    #[serde(default)]
    pub county: Option<String>,
}

/// POST /batch/resync
pub async fn resync(
    State(state): State<AppState>,
    Json(request): Json<ResyncRequest>,
) -> ApiResult<Json<ResyncReport>> {
    let limit = request.limit.unwrap_or(state.config.batch.default_limit);
    let sync = NetworkSync::new(state.db.clone(), state.config.batch.page_size);

    let report = sync.run(request.business_id.as_deref(), limit).await?;
    Ok(Json(report))
}

/// POST /batch/bootstrap
pub async fn bootstrap(
    State(state): State<AppState>,
    Json(request): Json<BootstrapRequest>,
) -> ApiResult<Json<BootstrapReport>> {
    let limit = request.limit.unwrap_or(state.config.batch.default_limit);
    let bootstrap = PropertyBootstrap::new(
        state.db.clone(),
        state.config.batch.page_size,
        state.config.batch.residential_classes.clone(),
    );

    let report = bootstrap.run(limit, request.county.as_deref()).await?;
    Ok(Json(report))
}

/// POST /batch/rebuild/{identity_id}
///
/// Recompute an identity's counters from its event ledger.
pub async fn rebuild(
    State(state): State<AppState>,
    Path(identity_id): Path<String>,
) -> ApiResult<Json<IdentitySummary>> {
    let aggregator = ReputationAggregator::new(state.db.clone());
    let identity = aggregator.rebuild(&identity_id).await?;
    Ok(Json(IdentitySummary::from(identity)))
}

/// Build batch routes
pub fn batch_routes(state: AppState) -> Router<AppState> {
    Router::new()
        .route("/batch/resync", post(resync))
        .route("/batch/bootstrap", post(bootstrap))
        .route("/batch/rebuild/:identity_id", post(rebuild))
        .route_layer(middleware::from_fn_with_state(state, batch_secret_guard))
}
