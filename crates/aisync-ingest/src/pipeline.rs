//! Unit-of-work pipeline
//!
//! One archive goes `Pending → Fetched → Extracted → Published → Recorded`,
//! or ends early as `Skipped` (already in the ledger) or `Failed` at a named
//! step. Failures never escape [`ArchivePipeline::process`]: they are logged
//! and reported in the returned [`UnitOutcome`] so the rest of the year keeps
//! going. Scratch files are removed on every exit path.

use serde::Serialize;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, error, info, instrument, warn};

use crate::catalog::ArchiveRef;
use crate::config::IngestConfig;
use crate::error::IngestError;
use crate::extractor;
use crate::fetcher::ArchiveFetcher;
use crate::ledger::Ledger;
use crate::publisher::{object_key, Publisher};
use crate::retry::RetryPolicy;

/// Where a unit of work stopped
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Step {
    Ledger,
    Fetch,
    Extract,
    Publish,
    Record,
    /// The unit's task panicked or was cancelled
    Internal,
}

impl Step {
    pub fn as_str(&self) -> &'static str {
        match self {
            Step::Ledger => "ledger",
            Step::Fetch => "fetch",
            Step::Extract => "extract",
            Step::Publish => "publish",
            Step::Record => "record",
            Step::Internal => "internal",
        }
    }
}

impl fmt::Display for Step {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum UnitState {
    Pending,
    Fetched,
    Extracted,
    Published,
    Recorded,
    Skipped,
    Failed { step: Step },
}

impl UnitState {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            UnitState::Recorded | UnitState::Skipped | UnitState::Failed { .. }
        )
    }
}

/// Result of processing one archive
#[derive(Debug, Clone, Serialize)]
pub struct UnitOutcome {
    pub id: String,
    pub state: UnitState,
    pub files_published: usize,
    pub bytes_fetched: u64,
    pub error: Option<String>,
}

impl UnitOutcome {
    fn pending(id: &str) -> Self {
        Self {
            id: id.to_string(),
            state: UnitState::Pending,
            files_published: 0,
            bytes_fetched: 0,
            error: None,
        }
    }

    fn fail(mut self, step: Step, err: impl fmt::Display) -> Self {
        error!(id = %self.id, step = %step, error = %err, "Unit of work failed");
        self.state = UnitState::Failed { step };
        self.error = Some(err.to_string());
        self
    }

    /// Outcome for a unit whose task never returned
    pub fn internal_failure(id: &str, reason: impl fmt::Display) -> Self {
        Self::pending(id).fail(Step::Internal, reason)
    }

    pub fn failed_step(&self) -> Option<Step> {
        match self.state {
            UnitState::Failed { step } => Some(step),
            _ => None,
        }
    }
}

/// Scratch files owned by one unit of work
///
/// Holds the downloaded archive (`<work_dir>/<id>`) and the extraction
/// directory (`<scratch_root>/<year>/<id>/`). [`ScratchSpace::cleanup`]
/// removes both on the blocking pool; `Drop` repeats it synchronously if the
/// unit never got that far.
#[derive(Debug)]
pub struct ScratchSpace {
    archive_path: PathBuf,
    extract_dir: PathBuf,
    year_dir: PathBuf,
    cleaned: bool,
}

impl ScratchSpace {
    pub fn new(config: &IngestConfig, year: u16, id: &str) -> Self {
        let year_dir = config.scratch_root.join(year.to_string());

        Self {
            archive_path: config.work_dir.join(id),
            extract_dir: year_dir.join(id),
            year_dir,
            cleaned: false,
        }
    }

    pub fn archive_path(&self) -> &Path {
        &self.archive_path
    }

    pub fn extract_dir(&self) -> &Path {
        &self.extract_dir
    }

    /// Remove the archive and extraction directory
    pub async fn cleanup(mut self) {
        if let Err(e) = tokio::task::spawn_blocking(move || self.remove_all()).await {
            warn!(error = %e, "Scratch cleanup task did not complete");
        }
    }

    fn remove_all(&mut self) {
        if self.cleaned {
            return;
        }
        self.cleaned = true;

        match std::fs::remove_file(&self.archive_path) {
            Ok(()) => debug!(path = %self.archive_path.display(), "Removed scratch archive"),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {},
            Err(e) => warn!(path = %self.archive_path.display(), error = %e, "Failed to remove scratch archive"),
        }

        match std::fs::remove_dir_all(&self.extract_dir) {
            Ok(()) => debug!(path = %self.extract_dir.display(), "Removed scratch directory"),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {},
            Err(e) => warn!(path = %self.extract_dir.display(), error = %e, "Failed to remove scratch directory"),
        }

        // Only succeeds once the last unit of the year is gone
        let _ = std::fs::remove_dir(&self.year_dir);
    }
}

impl Drop for ScratchSpace {
    fn drop(&mut self) {
        self.remove_all();
    }
}

/// Runs single archives through fetch, extract, publish and record
pub struct ArchivePipeline {
    config: IngestConfig,
    ledger: Arc<dyn Ledger>,
    publisher: Arc<dyn Publisher>,
    fetcher: ArchiveFetcher,
    retry: RetryPolicy,
}

impl ArchivePipeline {
    pub fn new(
        config: IngestConfig,
        ledger: Arc<dyn Ledger>,
        publisher: Arc<dyn Publisher>,
        fetcher: ArchiveFetcher,
    ) -> Self {
        let retry = config.retry_policy();
        Self {
            config,
            ledger,
            publisher,
            fetcher,
            retry,
        }
    }

    /// Process one archive to a terminal state
    #[instrument(skip(self, archive), fields(id = %archive.id))]
    pub async fn process(&self, archive: &ArchiveRef, year: u16) -> UnitOutcome {
        let start_time = Instant::now();
        let mut outcome = UnitOutcome::pending(&archive.id);

        match self.ledger.contains(&archive.id).await {
            Ok(true) => {
                info!("Already processed, skipping");
                outcome.state = UnitState::Skipped;
                return outcome;
            },
            Ok(false) => {},
            Err(e) => return outcome.fail(Step::Ledger, e),
        }

        let scratch = ScratchSpace::new(&self.config, year, &archive.id);
        let result = self.run_steps(archive, year, &scratch, &mut outcome).await;
        scratch.cleanup().await;

        match result {
            Ok(()) => {
                info!(
                    "Recorded {} ({} files, {} bytes) in {:.2}s",
                    archive.id,
                    outcome.files_published,
                    outcome.bytes_fetched,
                    start_time.elapsed().as_secs_f64()
                );
                outcome
            },
            Err((step, e)) => outcome.fail(step, e),
        }
    }

    async fn run_steps(
        &self,
        archive: &ArchiveRef,
        year: u16,
        scratch: &ScratchSpace,
        outcome: &mut UnitOutcome,
    ) -> std::result::Result<(), (Step, IngestError)> {
        // Step 1: Fetch
        let fetched = self
            .fetcher
            .fetch(&archive.url, scratch.archive_path())
            .await
            .map_err(|e| (Step::Fetch, e))?;
        outcome.bytes_fetched = fetched.bytes;
        outcome.state = UnitState::Fetched;

        // Step 2: Extract
        let mut files = extractor::extract(&fetched.path, scratch.extract_dir())
            .await
            .map_err(|e| (Step::Extract, e))?;
        files.sort_by(|a, b| a.name.cmp(&b.name));
        outcome.state = UnitState::Extracted;

        // Step 3: Publish every file; the id is recorded only if all succeed
        for file in &files {
            let key = object_key(&self.config.key_prefix, year, &file.name);
            let receipt = self
                .retry
                .run("publish", || self.publisher.publish(&file.path, &key))
                .await
                .map_err(|e| (Step::Publish, e))?;

            info!(
                key = %receipt.key,
                size = receipt.size,
                checksum = %receipt.checksum,
                "Published {}",
                file.name
            );
            outcome.files_published += 1;
        }
        outcome.state = UnitState::Published;

        // Step 4: Record
        self.ledger
            .append(&archive.id)
            .await
            .map_err(|e| (Step::Record, e))?;
        outcome.state = UnitState::Recorded;

        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn config(root: &Path) -> IngestConfig {
        IngestConfig::builder()
            .work_dir(root.join("work"))
            .scratch_root(root.join("unzipped"))
            .build()
            .unwrap()
    }

    #[test]
    fn test_scratch_layout() {
        let config = config(Path::new("/data"));
        let scratch = ScratchSpace::new(&config, 2020, "AIS_2020_01_05.zip");

        assert_eq!(scratch.archive_path(), Path::new("/data/work/AIS_2020_01_05.zip"));
        assert_eq!(
            scratch.extract_dir(),
            Path::new("/data/unzipped/2020/AIS_2020_01_05.zip")
        );
    }

    #[test]
    fn test_ids_differing_in_case_get_separate_directories() {
        let config = config(Path::new("/data"));
        let lower = ScratchSpace::new(&config, 2020, "a.zip");
        let upper = ScratchSpace::new(&config, 2020, "a.ZIP");

        assert_ne!(lower.extract_dir(), upper.extract_dir());
        assert_ne!(lower.archive_path(), upper.archive_path());
    }

    #[tokio::test]
    async fn test_sibling_cleanup_keeps_case_variant_extraction() {
        let dir = tempfile::tempdir().unwrap();
        let config = config(dir.path());
        let lower = ScratchSpace::new(&config, 2020, "a.zip");
        let upper = ScratchSpace::new(&config, 2020, "a.ZIP");
        std::fs::create_dir_all(lower.extract_dir()).unwrap();
        std::fs::create_dir_all(upper.extract_dir()).unwrap();
        std::fs::write(upper.extract_dir().join("a.csv"), b"x").unwrap();
        let upper_file = upper.extract_dir().join("a.csv");

        lower.cleanup().await;

        assert!(upper_file.exists());
        upper.cleanup().await;
    }

    #[tokio::test(flavor = "current_thread")]
    async fn test_scratch_cleanup_removes_everything() {
        let dir = tempfile::tempdir().unwrap();
        let config = config(dir.path());
        let scratch = ScratchSpace::new(&config, 2020, "a.zip");

        std::fs::create_dir_all(scratch.extract_dir().join("nested")).unwrap();
        std::fs::write(scratch.extract_dir().join("nested/a.csv"), b"x").unwrap();
        std::fs::create_dir_all(scratch.archive_path().parent().unwrap()).unwrap();
        std::fs::write(scratch.archive_path(), b"PK").unwrap();
        let archive_path = scratch.archive_path().to_path_buf();

        scratch.cleanup().await;

        assert!(!archive_path.exists());
        assert!(!dir.path().join("unzipped/2020").exists());
    }

    #[test]
    fn test_scratch_drop_cleans_up() {
        let dir = tempfile::tempdir().unwrap();
        let config = config(dir.path());
        let extract_dir;
        {
            let scratch = ScratchSpace::new(&config, 2021, "b.zip");
            extract_dir = scratch.extract_dir().to_path_buf();
            std::fs::create_dir_all(&extract_dir).unwrap();
        }
        assert!(!extract_dir.exists());
    }

    #[tokio::test]
    async fn test_year_dir_kept_while_siblings_remain() {
        let dir = tempfile::tempdir().unwrap();
        let config = config(dir.path());
        let first = ScratchSpace::new(&config, 2020, "a.zip");
        let second = ScratchSpace::new(&config, 2020, "b.zip");
        std::fs::create_dir_all(first.extract_dir()).unwrap();
        std::fs::create_dir_all(second.extract_dir()).unwrap();
        let second_dir = second.extract_dir().to_path_buf();

        first.cleanup().await;
        assert!(second_dir.exists());

        second.cleanup().await;
        assert!(!dir.path().join("unzipped/2020").exists());
    }

    #[test]
    fn test_terminal_states() {
        assert!(UnitState::Skipped.is_terminal());
        assert!(UnitState::Failed { step: Step::Fetch }.is_terminal());
        assert!(!UnitState::Extracted.is_terminal());
    }

    #[test]
    fn test_internal_failure_outcome() {
        let outcome = UnitOutcome::internal_failure("a.zip", "task panicked");
        assert_eq!(outcome.failed_step(), Some(Step::Internal));
        assert_eq!(outcome.error.as_deref(), Some("task panicked"));
    }
}
