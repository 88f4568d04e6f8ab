//! Shared-secret guard for batch endpoints
//!
//! Batch jobs are operator tools. Requests must carry the configured secret
//! in the `x-batch-secret` header. With no secret configured every batch
//! request is refused.

use axum::{
    extract::{Request, State},
    http::StatusCode,
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;

use crate::AppState;

/// Header carrying the batch secret
pub const BATCH_SECRET_HEADER: &str = "x-batch-secret";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthError {
    /// No batch secret configured on this server
    Disabled,
    MissingSecret,
    InvalidSecret,
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        let (status, code, message) = match self {
            AuthError::Disabled => (
                StatusCode::FORBIDDEN,
                "BATCH_DISABLED",
                "Batch endpoints are disabled: no batch secret configured",
            ),
            AuthError::MissingSecret => (
                StatusCode::UNAUTHORIZED,
                "MISSING_SECRET",
                "Header 'x-batch-secret' is required",
            ),
            AuthError::InvalidSecret => (
                StatusCode::UNAUTHORIZED,
                "INVALID_SECRET",
                "Batch secret does not match",
            ),
        };

        let body = Json(json!({
            "error": {
                "code": code,
                "message": message,
            }
        }));

        (status, body).into_response()
    }
}

/// Middleware for `route_layer(from_fn_with_state(..))`
pub async fn batch_secret_guard(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Result<Response, AuthError> {
    check_secret(
        state.config.batch_secret.as_deref(),
        request
            .headers()
            .get(BATCH_SECRET_HEADER)
            .and_then(|v| v.to_str().ok()),
    )
    .map_err(|e| {
        tracing::warn!(path = %request.uri().path(), error = ?e, "Rejected batch request");
        e
    })?;

    Ok(next.run(request).await)
}

fn check_secret(configured: Option<&str>, provided: Option<&str>) -> Result<(), AuthError> {
    let configured = configured
        .filter(|s| !s.is_empty())
        .ok_or(AuthError::Disabled)?;
    let provided = provided.ok_or(AuthError::MissingSecret)?;

    if constant_time_eq(configured.as_bytes(), provided.as_bytes()) {
        Ok(())
    } else {
        Err(AuthError::InvalidSecret)
    }
}

fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    a.len() == b.len() && a.iter().zip(b).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_check_secret() {
        assert_eq!(check_secret(None, Some("s3cret")), Err(AuthError::Disabled));
        assert_eq!(check_secret(Some(""), Some("")), Err(AuthError::Disabled));
        assert_eq!(check_secret(Some("s3cret"), None), Err(AuthError::MissingSecret));
        assert_eq!(check_secret(Some("s3cret"), Some("s3cre")), Err(AuthError::InvalidSecret));
        assert_eq!(check_secret(Some("s3cret"), Some("s3crex")), Err(AuthError::InvalidSecret));
        assert_eq!(check_secret(Some("s3cret"), Some("s3cret")), Ok(()));
    }

    #[test]
    fn test_auth_error_status() {
        assert_eq!(AuthError::Disabled.into_response().status(), StatusCode::FORBIDDEN);
        assert_eq!(AuthError::InvalidSecret.into_response().status(), StatusCode::UNAUTHORIZED);
    }
}
