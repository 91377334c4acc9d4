//! Durable publication of extracted files
//!
//! The pipeline only needs "store these bytes under this key, overwriting".
//! [`crate::storage::Storage`] does that against an S3-compatible bucket and
//! [`crate::storage::LocalStore`] against a local directory.

use async_trait::async_trait;
use serde::Serialize;
use std::path::Path;

use crate::error::{IngestError, Result};

/// What was stored
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PublishReceipt {
    pub key: String,
    pub size: u64,
    /// Hex SHA-256 of the published bytes
    pub checksum: String,
}

/// Durable object store
#[async_trait]
pub trait Publisher: Send + Sync {
    /// Upload `local_path` under `key`, replacing any existing object
    async fn publish(&self, local_path: &Path, key: &str) -> Result<PublishReceipt>;

    /// Human-readable target, for logs
    fn describe(&self) -> String;
}

/// Object key for an extracted file: `<prefix>/<year>/<name>`
pub fn object_key(prefix: &str, year: u16, name: &str) -> String {
    format!(
        "{}/{}/{}",
        prefix.trim_end_matches('/'),
        year,
        name.trim_start_matches('/')
    )
}

/// Size and SHA-256 of a local file, hashed on the blocking pool
pub async fn file_digest(path: &Path, key: &str) -> Result<(u64, String)> {
    let owned = path.to_path_buf();
    let size = tokio::fs::metadata(path)
        .await
        .map_err(|e| IngestError::publish(key, e))?
        .len();

    let checksum = tokio::task::spawn_blocking(move || aisync_common::checksum::sha256_file(owned))
        .await
        .map_err(|e| IngestError::publish(key, e))?
        .map_err(|e| IngestError::publish(key, e))?;

    Ok((size, checksum))
}
