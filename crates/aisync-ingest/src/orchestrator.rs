// Year orchestrator
//
// Lists one year's archives and runs them through the unit-of-work pipeline
// with a bounded number in flight. Each unit is its own spawned task so a
// panic is confined to that archive.

use futures::stream::{self, StreamExt};
use serde::Serialize;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{error, info, instrument};

use crate::catalog::CatalogLister;
use crate::pipeline::{ArchivePipeline, Step, UnitOutcome, UnitState};

/// One archive that did not make it into the ledger
#[derive(Debug, Clone, Serialize)]
pub struct UnitFailure {
    pub id: String,
    pub step: Step,
    pub error: String,
}

/// Completion accounting for one year
#[derive(Debug, Clone, Default, Serialize)]
pub struct YearReport {
    pub year: u16,
    /// Archives returned by the listing, after resume filtering
    pub listed: usize,
    pub recorded: usize,
    pub skipped: usize,
    pub failures: Vec<UnitFailure>,
    /// Set when the listing itself could not be fetched
    pub listing_error: Option<String>,
    pub duration: Duration,
}

impl YearReport {
    fn new(year: u16) -> Self {
        Self {
            year,
            ..Default::default()
        }
    }

    fn add(&mut self, outcome: UnitOutcome) {
        match outcome.state {
            UnitState::Recorded => self.recorded += 1,
            UnitState::Skipped => self.skipped += 1,
            UnitState::Failed { step } => self.failures.push(UnitFailure {
                id: outcome.id,
                step,
                error: outcome.error.unwrap_or_default(),
            }),
            // process() only returns terminal states
            other => self.failures.push(UnitFailure {
                id: outcome.id,
                step: Step::Internal,
                error: format!("unit ended in non-terminal state {:?}", other),
            }),
        }
    }

    pub fn failed(&self) -> usize {
        self.failures.len()
    }

    pub fn has_failures(&self) -> bool {
        !self.failures.is_empty() || self.listing_error.is_some()
    }
}

pub struct YearOrchestrator {
    lister: CatalogLister,
    pipeline: Arc<ArchivePipeline>,
    concurrency: usize,
}

impl YearOrchestrator {
    pub fn new(lister: CatalogLister, pipeline: ArchivePipeline, concurrency: usize) -> Self {
        Self {
            lister,
            pipeline: Arc::new(pipeline),
            concurrency: concurrency.max(1),
        }
    }

    /// List and process every archive of `year`
    #[instrument(skip(self))]
    pub async fn run_year(&self, year: u16, resume_after: Option<&str>) -> YearReport {
        let start_time = Instant::now();
        let mut report = YearReport::new(year);

        info!("Processing year {}", year);

        // Step 1: Discover archives
        let refs = match self.lister.list(year, resume_after).await {
            Ok(refs) => refs,
            Err(e) => {
                error!("Failed to list year {}: {}", year, e);
                report.listing_error = Some(e.to_string());
                report.duration = start_time.elapsed();
                return report;
            },
        };
        report.listed = refs.len();

        info!(
            "Processing {} archives for {} (concurrency={})",
            refs.len(),
            year,
            self.concurrency
        );

        // Step 2: Run units with bounded parallelism
        let outcomes: Vec<UnitOutcome> = stream::iter(refs)
            .map(|archive| {
                let pipeline = Arc::clone(&self.pipeline);
                let id = archive.id.clone();

                async move {
                    let handle =
                        tokio::spawn(async move { pipeline.process(&archive, year).await });

                    match handle.await {
                        Ok(outcome) => outcome,
                        Err(e) => UnitOutcome::internal_failure(&id, e),
                    }
                }
            })
            .buffer_unordered(self.concurrency)
            .collect()
            .await;

        // Step 3: Aggregate
        for outcome in outcomes {
            report.add(outcome);
        }
        report.duration = start_time.elapsed();

        info!(
            "Year {} complete: {} listed, {} recorded, {} skipped, {} failed in {:.2}s",
            year,
            report.listed,
            report.recorded,
            report.skipped,
            report.failed(),
            report.duration.as_secs_f64()
        );

        report
    }
}
