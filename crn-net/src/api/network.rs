//! Network API handlers
//!
//! POST /network/resolve, POST /network/events, POST /network/contributions,
//! GET /network/search

use axum::{
    extract::{Query, State},
    routing::{get, post},
    Json, Router,
};
use crn_common::reputation::Severity;
use serde::{Deserialize, Serialize};

use crate::db::{businesses, identities};
use crate::error::{ApiError, ApiResult};
use crate::models::IdentitySummary;
use crate::services::{network_search, ContributionOutcome, IdentityResolver, ReputationAggregator};
use crate::AppState;

/// POST /network/resolve request
#[derive(Debug, Deserialize)]
pub struct ResolveRequest {
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    /// Business performing the lookup; counted once per identity
    #[serde(default)]
    pub business_id: Option<String>,
}

/// POST /network/resolve response
#[derive(Debug, Serialize)]
pub struct ResolveResponse {
    pub created: bool,
    #[serde(flatten)]
    pub identity: IdentitySummary,
}

/// POST /network/events request
#[derive(Debug, Deserialize)]
pub struct ApplyEventRequest {
    pub identity_id: String,
    pub severity: i64,
}

/// POST /network/contributions request
#[derive(Debug, Deserialize)]
pub struct ContributionRequest {
    pub business_id: String,
    pub event_id: String,
}

/// GET /network/search query
#[derive(Debug, Deserialize)]
pub struct SearchQuery {
    #[serde(default)]
    pub q: String,
}

/// POST /network/resolve
///
/// Find-or-create the identity for a phone and/or email.
pub async fn resolve_identity(
    State(state): State<AppState>,
    Json(request): Json<ResolveRequest>,
) -> ApiResult<Json<ResolveResponse>> {
    if let Some(business_id) = request.business_id.as_deref() {
        if businesses::find_by_id(&state.db, business_id).await?.is_none() {
            return Err(ApiError::NotFound(format!("Business {}", business_id)));
        }
    }

    let resolver = IdentityResolver::new(state.db.clone());
    let resolved = resolver
        .resolve_contact(
            request.phone.as_deref(),
            request.email.as_deref(),
            request.business_id.as_deref(),
        )
        .await?;

    let identity = identities::find_by_id(&state.db, &resolved.identity_id)
        .await?
        .ok_or_else(|| ApiError::Internal("Resolved identity vanished".to_string()))?;

    Ok(Json(ResolveResponse {
        created: resolved.created,
        identity: IdentitySummary::from(identity),
    }))
}

/// POST /network/events
///
/// Apply one severity directly to an identity.
pub async fn apply_event(
    State(state): State<AppState>,
    Json(request): Json<ApplyEventRequest>,
) -> ApiResult<Json<IdentitySummary>> {
    let severity = Severity::new(request.severity)?;

    let aggregator = ReputationAggregator::new(state.db.clone());
    let identity = aggregator.apply_event(&request.identity_id, severity).await?;

    Ok(Json(IdentitySummary::from(identity)))
}

/// POST /network/contributions
///
/// Contribute a business event to the network. Idempotent per event.
pub async fn contribute_event(
    State(state): State<AppState>,
    Json(request): Json<ContributionRequest>,
) -> ApiResult<Json<ContributionOutcome>> {
    let aggregator = ReputationAggregator::new(state.db.clone());
    let outcome = aggregator
        .contribute_event(&request.business_id, &request.event_id)
        .await?;

    Ok(Json(outcome))
}

/// GET /network/search?q=
pub async fn search(
    State(state): State<AppState>,
    Query(query): Query<SearchQuery>,
) -> ApiResult<Json<IdentitySummary>> {
    let summary = network_search::search(&state.db, &query.q).await?;
    Ok(Json(summary))
}

/// Build network routes
pub fn network_routes() -> Router<AppState> {
    Router::new()
        .route("/network/resolve", post(resolve_identity))
        .route("/network/events", post(apply_event))
        .route("/network/contributions", post(contribute_event))
        .route("/network/search", get(search))
}
