//! Administrative endpoints, authenticated with the configured admin token.

use axum::{extract::State, http::HeaderMap, Json};
use serde::Serialize;
use std::sync::Arc;
use subtle::ConstantTimeEq;
use tracing::warn;

use crate::AppState;

use super::auth::bearer_token;
use super::error::ApiError;

#[derive(Debug, Serialize)]
pub struct ClearResponse {
    pub deleted: u64,
}

/// Compare a presented token with the configured one in constant time
fn is_admin_token(config_token: &str, provided: &str) -> bool {
    let expected = config_token.as_bytes();
    let provided = provided.as_bytes();
    !expected.is_empty() && expected.len() == provided.len() && expected.ct_eq(provided).into()
}

/// Delete every item row. Uploaded files are left on disk.
pub async fn clear_items(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> Result<Json<ClearResponse>, ApiError> {
    let authorized = bearer_token(&headers)
        .map(|t| is_admin_token(&state.config.auth.admin_token, &t))
        .unwrap_or(false);
    if !authorized {
        warn!("Rejected admin request with missing or invalid token");
        return Err(ApiError::unauthorized("Invalid admin token"));
    }

    let deleted = state
        .engine
        .clear_all()
        .await
        .map_err(|e| ApiError::from_engine(e, false))?;
    Ok(Json(ClearResponse { deleted }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_admin_token() {
        assert!(is_admin_token("secret-token", "secret-token"));
        assert!(!is_admin_token("secret-token", "secret-tokeN"));
        assert!(!is_admin_token("secret-token", "secret"));
        assert!(!is_admin_token("", ""));
    }
}
