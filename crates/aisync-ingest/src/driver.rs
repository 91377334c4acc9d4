//! Run driver: years in ascending order, one at a time

use serde::Serialize;
use std::sync::Arc;
use std::time::Instant;
use tracing::{info, warn};

use crate::catalog::CatalogLister;
use crate::config::IngestConfig;
use crate::error::{IngestError, Result};
use crate::fetcher::ArchiveFetcher;
use crate::ledger::Ledger;
use crate::orchestrator::{YearOrchestrator, YearReport};
use crate::pipeline::ArchivePipeline;
use crate::publisher::Publisher;

/// Sums across all years of a run
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RunTotals {
    pub listed: usize,
    pub recorded: usize,
    pub skipped: usize,
    pub failed: usize,
    pub listing_errors: usize,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct RunSummary {
    pub years: Vec<YearReport>,
    pub totals: RunTotals,
}

impl RunSummary {
    fn push(&mut self, report: YearReport) {
        self.totals.listed += report.listed;
        self.totals.recorded += report.recorded;
        self.totals.skipped += report.skipped;
        self.totals.failed += report.failed();
        if report.listing_error.is_some() {
            self.totals.listing_errors += 1;
        }
        self.years.push(report);
    }

    /// Any failed unit or listing in any year
    pub fn has_failures(&self) -> bool {
        self.totals.failed > 0 || self.totals.listing_errors > 0
    }
}

pub struct RunDriver {
    orchestrator: YearOrchestrator,
}

impl RunDriver {
    /// Wire the components for a run; the publisher is shared by every unit
    pub fn new(
        config: IngestConfig,
        ledger: Arc<dyn Ledger>,
        publisher: Arc<dyn Publisher>,
    ) -> Result<Self> {
        config.validate()?;

        let client = config.http_client()?;
        let lister = CatalogLister::with_client(client.clone(), config.clone());
        let fetcher = ArchiveFetcher::with_client(client, &config);
        let concurrency = config.concurrency;
        let pipeline = ArchivePipeline::new(config, ledger, publisher, fetcher);

        Ok(Self {
            orchestrator: YearOrchestrator::new(lister, pipeline, concurrency),
        })
    }

    /// Process `year_start..=year_end`
    ///
    /// `resume_from` is handed to every year; only the year it names uses it.
    pub async fn run(
        &self,
        year_start: u16,
        year_end: u16,
        resume_from: Option<&str>,
    ) -> Result<RunSummary> {
        if year_start > year_end {
            return Err(IngestError::Config(format!(
                "year_start ({}) is after year_end ({})",
                year_start, year_end
            )));
        }

        let start_time = Instant::now();
        let mut summary = RunSummary::default();

        info!("Starting run for years {}..={}", year_start, year_end);

        for year in year_start..=year_end {
            let report = self.orchestrator.run_year(year, resume_from).await;
            summary.push(report);
        }

        let totals = &summary.totals;
        info!(
            "Run complete: {} years, {} listed, {} recorded, {} skipped, {} failed in {:.2}s",
            summary.years.len(),
            totals.listed,
            totals.recorded,
            totals.skipped,
            totals.failed,
            start_time.elapsed().as_secs_f64()
        );

        if summary.has_failures() {
            warn!(
                "{} archives failed and {} listings could not be fetched; rerun to retry them",
                totals.failed, totals.listing_errors
            );
        }

        Ok(summary)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::ledger::FileLedger;
    use crate::orchestrator::UnitFailure;
    use crate::pipeline::Step;
    use crate::storage::LocalStore;

    #[tokio::test]
    async fn test_rejects_inverted_range() {
        let dir = tempfile::tempdir().unwrap();
        let config = IngestConfig::builder().show_progress(false).build().unwrap();
        let driver = RunDriver::new(
            config,
            Arc::new(FileLedger::new(dir.path().join("ledger.txt"))),
            Arc::new(LocalStore::new(dir.path().join("store"))),
        )
        .unwrap();

        let result = driver.run(2021, 2020, None).await;
        assert!(matches!(result, Err(IngestError::Config(_))));
    }

    #[test]
    fn test_summary_totals() {
        let mut summary = RunSummary::default();
        summary.push(YearReport {
            year: 2020,
            listed: 3,
            recorded: 2,
            failures: vec![UnitFailure {
                id: "b.zip".to_string(),
                step: Step::Extract,
                error: "bad".to_string(),
            }],
            ..Default::default()
        });
        summary.push(YearReport {
            year: 2021,
            listing_error: Some("404".to_string()),
            ..Default::default()
        });

        assert_eq!(summary.totals.listed, 3);
        assert_eq!(summary.totals.recorded, 2);
        assert_eq!(summary.totals.failed, 1);
        assert_eq!(summary.totals.listing_errors, 1);
        assert!(summary.has_failures());
        assert!(!RunSummary::default().has_failures());
    }
}
