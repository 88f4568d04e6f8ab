//! Per-business customer handlers
//!
//! GET /businesses/{business_id}/customers/{customer_id}/score,
//! POST /businesses/{business_id}/customers/import

use axum::{
    extract::{Path, State},
    routing::{get, post},
    Json, Router,
};
use chrono::Utc;
use crn_common::reputation::Severity;
use crn_common::scoring::{score_customer, CustomerScore, ScoredEvent};
use serde::{Deserialize, Serialize};

use crate::db::customers::{self, NewCustomer};
use crate::db::events;
use crate::error::{ApiError, ApiResult};
use crate::models::ImportReport;
use crate::services::CustomerImporter;
use crate::AppState;

/// Customer score response
#[derive(Debug, Serialize)]
pub struct ScoreResponse {
    pub customer_id: String,
    #[serde(flatten)]
    pub score: CustomerScore,
}

/// POST /businesses/{business_id}/customers/import request
#[derive(Debug, Deserialize)]
pub struct ImportRequest {
    pub rows: Vec<NewCustomer>,
}

/// GET /businesses/{business_id}/customers/{customer_id}/score
///
/// Recomputed on every read from the business's own events.
pub async fn customer_score(
    State(state): State<AppState>,
    Path((business_id, customer_id)): Path<(String, String)>,
) -> ApiResult<Json<ScoreResponse>> {
    let customer = customers::find_for_business(&state.db, &business_id, &customer_id)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("Customer {}", customer_id)))?;

    let scored = events::for_customer(&state.db, &business_id, &customer_id)
        .await?
        .into_iter()
        .map(|event| {
            Ok(ScoredEvent {
                severity: Severity::new(event.severity)?,
                occurred_at: event.occurred_at,
            })
        })
        .collect::<crn_common::Result<Vec<_>>>()?;

    let score = score_customer(&scored, Some(customer.created_at), Utc::now());

    Ok(Json(ScoreResponse {
        customer_id: customer.id,
        score,
    }))
}

/// POST /businesses/{business_id}/customers/import
pub async fn import_customers(
    State(state): State<AppState>,
    Path(business_id): Path<String>,
    Json(request): Json<ImportRequest>,
) -> ApiResult<Json<ImportReport>> {
    let importer = CustomerImporter::new(state.db.clone());
    let report = importer.import(&business_id, &request.rows).await?;
    Ok(Json(report))
}

/// Build customer routes
pub fn customer_routes() -> Router<AppState> {
    Router::new()
        .route(
            "/businesses/:business_id/customers/:customer_id/score",
            get(customer_score),
        )
        .route("/businesses/:business_id/customers/import", post(import_customers))
}
