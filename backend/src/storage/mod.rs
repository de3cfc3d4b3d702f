//! Blob storage backends.
//!
//! Artifacts are addressed by a storage key such as
//! `artifacts/2024/05/<uuid>/<filename>`; the logical filename is the key's
//! basename.

pub mod filesystem;

#[cfg(test)]
pub mod memory;

use async_trait::async_trait;
use bytes::Bytes;
use chrono::{DateTime, Datelike, Utc};
use uuid::Uuid;

use crate::error::Result;

/// Storage backend trait
#[async_trait]
pub trait StorageBackend: Send + Sync {
    /// Store content with the given key
    async fn put(&self, key: &str, content: Bytes) -> Result<()>;

    /// Retrieve content by key
    async fn get(&self, key: &str) -> Result<Bytes>;

    /// Check if key exists
    async fn exists(&self, key: &str) -> Result<bool>;

    /// Delete content by key
    async fn delete(&self, key: &str) -> Result<()>;
}

/// Build the storage key for a new upload. The per-upload id keeps keys
/// unique while preserving the original filename as the basename.
pub fn artifact_storage_key(uploaded_at: DateTime<Utc>, id: Uuid, filename: &str) -> String {
    format!(
        "artifacts/{:04}/{:02}/{}/{}",
        uploaded_at.year(),
        uploaded_at.month(),
        id.simple(),
        sanitize_filename(filename)
    )
}

/// Strip path separators and control characters from a client-supplied
/// filename, keeping non-ASCII letters intact.
pub fn sanitize_filename(filename: &str) -> String {
    let base = filename
        .rsplit(['/', '\\'])
        .next()
        .unwrap_or(filename)
        .trim();
    let cleaned: String = base.chars().filter(|c| !c.is_control()).collect();
    match cleaned.as_str() {
        "" | "." | ".." => "upload".to_string(),
        _ => cleaned,
    }
}
