//! Directory-backed publisher mirroring the object key layout

use async_trait::async_trait;
use std::path::{Component, Path, PathBuf};
use tracing::{debug, instrument};

use crate::error::{IngestError, Result};
use crate::publisher::{file_digest, PublishReceipt, Publisher};

/// Publishes by copying into `<root>/<key>`
#[derive(Debug, Clone)]
pub struct LocalStore {
    root: PathBuf,
}

impl LocalStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Where `key` lives on disk; keys with `..` or absolute parts are refused
    pub fn path_for(&self, key: &str) -> Result<PathBuf> {
        let relative = Path::new(key);
        let safe = relative
            .components()
            .all(|c| matches!(c, Component::Normal(_)));

        if key.is_empty() || !safe {
            return Err(IngestError::publish(key, "key is not a relative path"));
        }

        Ok(self.root.join(relative))
    }
}

#[async_trait]
impl Publisher for LocalStore {
    #[instrument(skip(self, local_path), fields(root = %self.root.display()))]
    async fn publish(&self, local_path: &Path, key: &str) -> Result<PublishReceipt> {
        let target = self.path_for(key)?;
        let (size, checksum) = file_digest(local_path, key).await?;

        if let Some(parent) = target.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| IngestError::publish(key, e))?;
        }

        tokio::fs::copy(local_path, &target)
            .await
            .map_err(|e| IngestError::publish(key, e))?;

        let verify_target = target.clone();
        let expected = checksum.clone();
        tokio::task::spawn_blocking(move || {
            aisync_common::checksum::verify_sha256(&verify_target, &expected)
        })
        .await
        .map_err(|e| IngestError::publish(key, e))?
        .map_err(|e| IngestError::publish(key, e))?;

        debug!(key, size, "Published to local store");

        Ok(PublishReceipt {
            key: key.to_string(),
            size,
            checksum,
        })
    }

    fn describe(&self) -> String {
        format!("file://{}", self.root.display())
    }
}
