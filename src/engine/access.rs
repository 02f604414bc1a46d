use crate::config::AuthConfig;
use crate::db::{Item, User};

use super::EngineError;

/// The single ownership rule: only the recorded owner may mutate an item.
pub fn can_mutate(actor: &User, item: &Item) -> bool {
    item.owner_id == Some(actor.id)
}

/// Deployment-level switches for who may post and who may mutate
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AccessPolicy {
    pub require_login_to_post: bool,
    pub enforce_ownership: bool,
}

impl Default for AccessPolicy {
    fn default() -> Self {
        Self {
            require_login_to_post: true,
            enforce_ownership: true,
        }
    }
}

impl From<&AuthConfig> for AccessPolicy {
    fn from(config: &AuthConfig) -> Self {
        Self {
            require_login_to_post: config.require_login_to_post,
            enforce_ownership: config.enforce_ownership,
        }
    }
}

impl AccessPolicy {
    /// Decide the owner of a new item, or reject an anonymous poster
    pub fn authorize_post(&self, actor: Option<&User>) -> Result<Option<i64>, EngineError> {
        match actor {
            Some(user) => Ok(Some(user.id)),
            None if self.require_login_to_post => Err(EngineError::Unauthenticated),
            None => Ok(None),
        }
    }

    /// Gate an edit or resolution of an existing item
    pub fn authorize_mutation(&self, actor: Option<&User>, item: &Item) -> Result<(), EngineError> {
        if !self.enforce_ownership {
            return Ok(());
        }
        let actor = actor.ok_or(EngineError::Unauthenticated)?;
        if can_mutate(actor, item) {
            Ok(())
        } else {
            Err(EngineError::Forbidden(item.id))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::ItemStatus;
    use chrono::Utc;

    fn user(id: i64) -> User {
        User {
            id,
            username: format!("user{}", id),
            email: format!("user{}@example.com", id),
            password_hash: String::new(),
            created_at: String::new(),
        }
    }

    fn item(owner_id: Option<i64>) -> Item {
        Item {
            id: 10,
            title: "Keys".to_string(),
            description: String::new(),
            contact: "555-0100".to_string(),
            status: ItemStatus::Lost,
            image: None,
            created_at: Utc::now(),
            resolved_at: None,
            owner_id,
        }
    }

    #[test]
    fn test_can_mutate_compares_owner_id() {
        assert!(can_mutate(&user(1), &item(Some(1))));
        assert!(!can_mutate(&user(2), &item(Some(1))));
        assert!(!can_mutate(&user(1), &item(None)));
    }

    #[test]
    fn test_authorize_post() {
        let strict = AccessPolicy::default();
        assert_eq!(strict.authorize_post(Some(&user(4))).unwrap(), Some(4));
        assert!(matches!(
            strict.authorize_post(None),
            Err(EngineError::Unauthenticated)
        ));

        let open = AccessPolicy {
            require_login_to_post: false,
            ..strict
        };
        assert_eq!(open.authorize_post(None).unwrap(), None);
        assert_eq!(open.authorize_post(Some(&user(4))).unwrap(), Some(4));
    }

    #[test]
    fn test_authorize_mutation() {
        let strict = AccessPolicy::default();
        assert!(strict.authorize_mutation(Some(&user(1)), &item(Some(1))).is_ok());
        assert!(matches!(
            strict.authorize_mutation(Some(&user(2)), &item(Some(1))),
            Err(EngineError::Forbidden(10))
        ));
        assert!(matches!(
            strict.authorize_mutation(None, &item(Some(1))),
            Err(EngineError::Unauthenticated)
        ));

        let open = AccessPolicy {
            enforce_ownership: false,
            ..strict
        };
        assert!(open.authorize_mutation(None, &item(Some(1))).is_ok());
        assert!(open.authorize_mutation(Some(&user(2)), &item(None)).is_ok());
    }
}
