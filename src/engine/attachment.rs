//! Storage naming and persistence for uploaded item images.

use async_trait::async_trait;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use std::path::{Path, PathBuf};
use tracing::debug;

use crate::db::Upload;
use crate::store::StoreError;

impl Upload {
    /// Wrap a received file part. Returns `None` when the client sent no file,
    /// which browsers signal with an empty file name.
    pub fn new(file_name: &str, bytes: Bytes) -> Option<Self> {
        let base = base_name(file_name);
        if base.is_empty() {
            return None;
        }
        Some(Self {
            file_name: base.to_string(),
            bytes,
        })
    }
}

/// Keep only the last path component of a client-supplied file name
fn base_name(file_name: &str) -> &str {
    file_name
        .rsplit(['/', '\\'])
        .next()
        .unwrap_or_default()
        .trim()
}

/// Derive the storage name for an upload: `<unix nanos>_<original name>`
pub fn storage_name(original: &str, now: DateTime<Utc>) -> String {
    let nanos = now
        .timestamp_nanos_opt()
        .unwrap_or_else(|| now.timestamp_micros().saturating_mul(1_000));
    format!("{}_{}", nanos, base_name(original))
}

/// Image reference after an edit: a new upload always wins, otherwise the
/// existing reference is kept.
pub fn replace_image(existing: Option<String>, uploaded: Option<String>) -> Option<String> {
    uploaded.or(existing)
}

/// Destination for uploaded bytes
#[async_trait]
pub trait AttachmentSink: Send + Sync {
    async fn save(&self, name: &str, bytes: &[u8]) -> Result<(), StoreError>;
}

/// Writes uploads into a directory on local disk
#[derive(Debug, Clone)]
pub struct UploadDir {
    root: PathBuf,
}

impl UploadDir {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }
}

#[async_trait]
impl AttachmentSink for UploadDir {
    async fn save(&self, name: &str, bytes: &[u8]) -> Result<(), StoreError> {
        tokio::fs::create_dir_all(&self.root).await?;
        let path = self.root.join(name);
        tokio::fs::write(&path, bytes).await?;
        debug!(path = %path.display(), size = bytes.len(), "Saved upload");
        Ok(())
    }
}
