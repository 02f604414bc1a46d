use std::collections::HashMap;
use std::future::Future;
use std::time::Duration;
use thiserror::Error;
use tracing::warn;

use crate::db::ItemStatus;
use crate::store::StoreError;

/// Per-field validation messages, keyed by form field name
pub type FieldErrors = HashMap<String, Vec<String>>;

/// Outcome of a rejected engine operation. None of these are fatal to the
/// process; each one ends the current request only.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("validation failed for {} field(s)", .0.len())]
    Validation(FieldErrors),
    #[error("item {0} not found")]
    NotFound(i64),
    #[error("not allowed to modify item {0}")]
    Forbidden(i64),
    #[error("item {id} is already {status}")]
    InvalidTransition { id: i64, status: ItemStatus },
    #[error("authentication required")]
    Unauthenticated,
    #[error("storage call timed out after {0:?}")]
    Timeout(Duration),
    #[error("storage error: {0}")]
    Storage(#[from] StoreError),
}

impl EngineError {
    /// Map a store error for a lookup of `id`, turning a missing row into `NotFound`
    pub fn for_item(id: i64, err: StoreError) -> Self {
        match err {
            StoreError::NotFound => EngineError::NotFound(id),
            other => EngineError::Storage(other),
        }
    }
}

/// Await a store call for at most `limit`. The store's own result is
/// returned untouched so callers can still inspect `StoreError` variants.
pub async fn timed<T, F>(limit: Duration, fut: F) -> Result<Result<T, StoreError>, EngineError>
where
    F: Future<Output = Result<T, StoreError>>,
{
    tokio::time::timeout(limit, fut).await.map_err(|_| {
        warn!(timeout = ?limit, "Storage call timed out");
        EngineError::Timeout(limit)
    })
}

/// Collects validation failures for a submission
#[derive(Debug, Default)]
pub struct FieldErrorsBuilder {
    errors: FieldErrors,
}

impl FieldErrorsBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, field: impl Into<String>, message: impl Into<String>) -> &mut Self {
        self.errors
            .entry(field.into())
            .or_default()
            .push(message.into());
        self
    }

    pub fn is_empty(&self) -> bool {
        self.errors.is_empty()
    }

    /// Return Ok(()) if no errors, or the collected errors themselves
    pub fn into_result(self) -> Result<(), FieldErrors> {
        if self.errors.is_empty() {
            Ok(())
        } else {
            Err(self.errors)
        }
    }

    /// Return Ok(()) if no errors, or a `Validation` error carrying them
    pub fn finish(self) -> Result<(), EngineError> {
        self.into_result().map_err(EngineError::Validation)
    }
}
