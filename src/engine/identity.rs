use sha2::{Digest, Sha256};
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

use crate::db::User;
use crate::store::UserStore;

use super::{timed, EngineError};

/// Length of an issued token: 32 random bytes, hex encoded
pub const TOKEN_LEN: usize = 64;

/// Hash a token for storage
pub fn hash_token(token: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(token.as_bytes());
    hex::encode(hasher.finalize())
}

fn is_well_formed(token: &str) -> bool {
    token.len() == TOKEN_LEN
        && token
            .bytes()
            .all(|b| b.is_ascii_digit() || (b'a'..=b'f').contains(&b))
}

/// Maps an opaque session token to the user it was issued to.
///
/// Lookups are read-only and safe to repeat on every request.
pub struct IdentityResolver {
    users: Arc<dyn UserStore>,
    timeout: Duration,
}

impl IdentityResolver {
    pub fn new(users: Arc<dyn UserStore>, timeout: Duration) -> Self {
        Self { users, timeout }
    }

    pub async fn resolve(&self, token: Option<&str>) -> Result<User, EngineError> {
        let token = token.ok_or(EngineError::Unauthenticated)?;
        if !is_well_formed(token) {
            debug!("Rejected malformed session token");
            return Err(EngineError::Unauthenticated);
        }

        let digest = hash_token(token);
        let lookup = self.users.find_session_user(&digest, chrono::Utc::now());
        let user = timed(self.timeout, lookup).await??;

        user.ok_or(EngineError::Unauthenticated)
    }

    /// Like [`resolve`](Self::resolve), but an unauthenticated caller is
    /// anonymous rather than an error
    pub async fn resolve_optional(&self, token: Option<&str>) -> Result<Option<User>, EngineError> {
        match self.resolve(token).await {
            Ok(user) => Ok(Some(user)),
            Err(EngineError::Unauthenticated) => Ok(None),
            Err(e) => Err(e),
        }
    }
}
