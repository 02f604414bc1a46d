//! Persistence boundary for items and accounts.
//!
//! The traits carry no business rules. The one exception to plain CRUD is
//! [`ItemStore::mark_found`], a compare-and-swap on status that lets the
//! lifecycle engine close the race between two concurrent resolutions.

mod sqlite;

pub use sqlite::SqliteStore;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::db::{Item, NewItem, NewUser, Session, User};
use crate::engine::SearchFilter;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("record not found")]
    NotFound,
    #[error("unique constraint violated: {0}")]
    Conflict(String),
    #[error("stored row is invalid: {0}")]
    Corrupt(String),
    #[error("attachment write failed: {0}")]
    Attachment(#[from] std::io::Error),
    #[error("database error: {0}")]
    Database(sqlx::Error),
}

impl From<sqlx::Error> for StoreError {
    fn from(err: sqlx::Error) -> Self {
        if matches!(err, sqlx::Error::RowNotFound) {
            return StoreError::NotFound;
        }
        if let sqlx::Error::Database(db_err) = &err {
            let msg = db_err.message();
            if msg.contains("UNIQUE constraint failed") {
                return StoreError::Conflict(msg.to_string());
            }
        }
        StoreError::Database(err)
    }
}

#[async_trait]
pub trait ItemStore: Send + Sync {
    /// Insert a new item and return its assigned id
    async fn create_item(&self, item: &NewItem) -> Result<i64, StoreError>;
    async fn get_item(&self, id: i64) -> Result<Item, StoreError>;
    /// Overwrite the editable fields of an item.
    ///
    /// Ownership and creation time are never written. A row that is already
    /// `found` keeps its status and resolution time whatever `item` says.
    async fn update_item(&self, item: &Item) -> Result<(), StoreError>;
    /// Move a `lost` item to `found`. Returns `false` when no `lost` row with
    /// that id existed at write time.
    async fn mark_found(&self, id: i64, resolved_at: DateTime<Utc>) -> Result<bool, StoreError>;
    async fn list_items(&self, filter: &SearchFilter) -> Result<Vec<Item>, StoreError>;
    /// Delete every item row. Returns the number of rows removed.
    async fn delete_all_items(&self) -> Result<u64, StoreError>;
}

#[async_trait]
pub trait UserStore: Send + Sync {
    async fn create_user(&self, user: &NewUser) -> Result<i64, StoreError>;
    async fn get_user(&self, id: i64) -> Result<User, StoreError>;
    /// Look a user up by username or email
    async fn find_user_by_login(&self, login: &str) -> Result<Option<User>, StoreError>;
    async fn create_session(&self, session: &Session) -> Result<(), StoreError>;
    /// Resolve an unexpired session to its user
    async fn find_session_user(
        &self,
        token_hash: &str,
        now: DateTime<Utc>,
    ) -> Result<Option<User>, StoreError>;
    async fn delete_session(&self, token_hash: &str) -> Result<(), StoreError>;
}
