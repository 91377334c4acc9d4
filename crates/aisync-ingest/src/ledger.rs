//! Processed-set ledger
//!
//! The ledger is the only source of truth for "this archive is done". An id
//! is appended once every extracted file of its archive has been published;
//! it is never removed by the pipeline. Recovering from a bad entry means
//! editing the file by hand.

use async_trait::async_trait;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;
use tracing::debug;

use crate::error::{IngestError, Result};

/// Durable record of completed units of work
#[async_trait]
pub trait Ledger: Send + Sync {
    /// Whether `id` has been recorded
    async fn contains(&self, id: &str) -> Result<bool>;

    /// Record `id`; durable once this returns
    async fn append(&self, id: &str) -> Result<()>;
}

/// Text-file ledger, one identifier per line
///
/// A missing file is an empty ledger. Appends and reads are serialised by a
/// mutex so concurrent workers never interleave or observe partial lines.
pub struct FileLedger {
    path: PathBuf,
    lock: Mutex<()>,
}

impl FileLedger {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// All recorded identifiers in file order
    pub async fn entries(&self) -> Result<Vec<String>> {
        let _guard = self.lock.lock().await;
        self.read_entries().await
    }

    async fn read_text(&self) -> Result<String> {
        match tokio::fs::read_to_string(&self.path).await {
            Ok(text) => Ok(text),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(String::new()),
            Err(source) => Err(IngestError::LedgerRead {
                path: self.path.display().to_string(),
                source,
            }),
        }
    }

    async fn read_entries(&self) -> Result<Vec<String>> {
        Ok(parse_entries(&self.read_text().await?)
            .map(str::to_string)
            .collect())
    }

    fn write_error(&self, source: std::io::Error) -> IngestError {
        IngestError::LedgerWrite {
            path: self.path.display().to_string(),
            source,
        }
    }
}

fn parse_entries(text: &str) -> impl Iterator<Item = &str> {
    text.lines().map(str::trim).filter(|line| !line.is_empty())
}

#[async_trait]
impl Ledger for FileLedger {
    async fn contains(&self, id: &str) -> Result<bool> {
        let _guard = self.lock.lock().await;
        let id = id.trim();
        Ok(parse_entries(&self.read_text().await?).any(|entry| entry == id))
    }

    async fn append(&self, id: &str) -> Result<()> {
        let id = id.trim();
        if id.is_empty() || id.contains(['\n', '\r']) {
            return Err(self.write_error(std::io::Error::new(
                ErrorKind::InvalidInput,
                format!("invalid ledger id {:?}", id),
            )));
        }

        let _guard = self.lock.lock().await;

        let existing = self.read_text().await?;
        if parse_entries(&existing).any(|entry| entry == id) {
            debug!(id, "Already in ledger");
            return Ok(());
        }

        // A hand-edited file may lack the trailing newline
        let line = if existing.is_empty() || existing.ends_with('\n') {
            format!("{}\n", id)
        } else {
            format!("\n{}\n", id)
        };

        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| self.write_error(e))?;
        }

        let mut file = tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .await
            .map_err(|e| self.write_error(e))?;

        file.write_all(line.as_bytes())
            .await
            .map_err(|e| self.write_error(e))?;
        file.sync_all().await.map_err(|e| self.write_error(e))?;

        debug!(id, path = %self.path.display(), "Recorded in ledger");
        Ok(())
    }
}
