use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use axum::{
    async_trait,
    extract::FromRequestParts,
    http::{header, request::Parts, HeaderMap},
};
use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use chrono::Utc;
use rand::Rng;
use std::future::Future;
use std::sync::Arc;
use tracing::{debug, info};

use crate::db::{format_timestamp, Session, User};
use crate::engine::{hash_token, timed};
use crate::store::StoreError;
use crate::AppState;

use super::error::ApiError;

/// Cookie carrying the session token for browser clients
pub const SESSION_COOKIE: &str = "lostfound_session";

/// Hash a password using Argon2
pub fn hash_password(password: &str) -> Result<String, argon2::password_hash::Error> {
    let salt = SaltString::generate(&mut OsRng);
    let argon2 = Argon2::default();
    let hash = argon2.hash_password(password.as_bytes(), &salt)?;
    Ok(hash.to_string())
}

/// Verify a password against a hash
pub fn verify_password(password: &str, hash: &str) -> bool {
    let parsed_hash = match PasswordHash::new(hash) {
        Ok(h) => h,
        Err(_) => return false,
    };
    Argon2::default()
        .verify_password(password.as_bytes(), &parsed_hash)
        .is_ok()
}

/// Generate a random session token: 32 bytes, hex encoded
pub fn generate_token() -> String {
    let mut rng = rand::rng();
    let bytes: [u8; 32] = rng.random();
    hex::encode(bytes)
}

/// Read the bearer token from the `Authorization` header
pub fn bearer_token(headers: &HeaderMap) -> Option<String> {
    headers
        .get(header::AUTHORIZATION)
        .and_then(|h| h.to_str().ok())
        .and_then(|h| h.strip_prefix("Bearer "))
        .map(|t| t.trim().to_string())
}

/// Session token from the cookie, falling back to a bearer header
pub fn extract_token(headers: &HeaderMap) -> Option<String> {
    let jar = CookieJar::from_headers(headers);
    jar.get(SESSION_COOKIE)
        .map(|c| c.value().to_string())
        .or_else(|| bearer_token(headers))
}

/// Build the session cookie handed to the browser after login
pub fn session_cookie(token: String, secure: bool) -> Cookie<'static> {
    Cookie::build((SESSION_COOKIE, token))
        .path("/")
        .http_only(true)
        .secure(secure)
        .same_site(SameSite::Lax)
        .build()
}

/// Cookie that removes the session on the client
pub fn removal_cookie() -> Cookie<'static> {
    Cookie::build(SESSION_COOKIE).path("/").build()
}

/// Run an account store call under the configured store timeout. A stall
/// surfaces as 503; the store's own error is left for the caller.
pub async fn bounded<T, F>(state: &AppState, fut: F) -> Result<Result<T, StoreError>, ApiError>
where
    F: Future<Output = Result<T, StoreError>>,
{
    timed(state.config.store.timeout(), fut)
        .await
        .map_err(|e| ApiError::from_engine(e, false))
}

/// Issue a new session for `user_id` and return the raw token
pub async fn start_session(state: &AppState, user_id: i64) -> Result<String, ApiError> {
    let token = generate_token();
    let now = Utc::now();
    let session = Session {
        id: uuid::Uuid::new_v4().to_string(),
        user_id,
        token_hash: hash_token(&token),
        expires_at: format_timestamp(&(now + state.config.auth.session_ttl())),
        created_at: format_timestamp(&now),
    };
    bounded(state, state.users.create_session(&session)).await??;
    info!(user_id, "Session started");
    Ok(token)
}

/// Revoke the session behind `token`, if any
pub async fn end_session(state: &AppState, token: &str) -> Result<(), ApiError> {
    let digest = hash_token(token);
    bounded(state, state.users.delete_session(&digest)).await??;
    debug!("Session ended");
    Ok(())
}

/// The signed-in user, or `None` for an anonymous request.
///
/// A missing, malformed or expired token is anonymous. Only storage failures
/// reject the request.
pub struct CurrentUser(pub Option<User>);

impl CurrentUser {
    pub fn user(&self) -> Option<&User> {
        self.0.as_ref()
    }
}

#[async_trait]
impl FromRequestParts<Arc<AppState>> for CurrentUser {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<AppState>,
    ) -> Result<Self, Self::Rejection> {
        let token = extract_token(&parts.headers);
        let user = state
            .identity
            .resolve_optional(token.as_deref())
            .await
            .map_err(|e| ApiError::from_engine(e, false))?;
        Ok(CurrentUser(user))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn test_password_round_trip() {
        let hash = hash_password("correct horse").unwrap();
        assert!(hash.starts_with("$argon2"));
        assert!(verify_password("correct horse", &hash));
        assert!(!verify_password("wrong horse", &hash));
        assert!(!verify_password("correct horse", "not a phc string"));
    }

    #[test]
    fn test_generate_token_shape() {
        let token = generate_token();
        assert_eq!(token.len(), 64);
        assert!(token.chars().all(|c| c.is_ascii_hexdigit() && !c.is_ascii_uppercase()));
        assert_ne!(token, generate_token());
    }

    #[test]
    fn test_extract_token_prefers_cookie() {
        let mut headers = HeaderMap::new();
        headers.insert(header::AUTHORIZATION, HeaderValue::from_static("Bearer from-header"));
        assert_eq!(extract_token(&headers).as_deref(), Some("from-header"));

        headers.insert(
            header::COOKIE,
            HeaderValue::from_static("theme=dark; lostfound_session=from-cookie"),
        );
        assert_eq!(extract_token(&headers).as_deref(), Some("from-cookie"));
    }

    #[test]
    fn test_bearer_token_requires_scheme() {
        let mut headers = HeaderMap::new();
        headers.insert(header::AUTHORIZATION, HeaderValue::from_static("Basic abc"));
        assert!(bearer_token(&headers).is_none());
        assert!(extract_token(&HeaderMap::new()).is_none());
    }

    #[test]
    fn test_session_cookie_attributes() {
        let cookie = session_cookie("abc".to_string(), true);
        assert_eq!(cookie.name(), SESSION_COOKIE);
        assert_eq!(cookie.http_only(), Some(true));
        assert_eq!(cookie.secure(), Some(true));
        assert_eq!(cookie.same_site(), Some(SameSite::Lax));
        assert_eq!(cookie.path(), Some("/"));
    }
}
