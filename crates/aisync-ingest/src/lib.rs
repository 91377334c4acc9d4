//! aisync ingestion library
//!
//! Mirrors NOAA's yearly AIS archives into object storage.
//!
//! # Flow
//!
//! For every year in a range, one after another:
//!
//! - **Catalog**: scrape the year's listing page for `.zip` links
//! - **Ledger**: skip archives already recorded as processed
//! - **Fetch**: stream the archive to a scratch file
//! - **Extract**: unpack it into a year- and archive-scoped directory
//! - **Publish**: upload each file to `<prefix>/<year>/<name>`
//! - **Record**: append the archive id to the ledger
//!
//! Up to `concurrency` archives of a year run at once. A failed archive is
//! logged and left out of the ledger, so the next run picks it up again.
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use aisync_ingest::{config::IngestConfig, driver::RunDriver, ledger::FileLedger, storage::LocalStore};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = IngestConfig::from_env()?;
//!     let ledger = Arc::new(FileLedger::new(&config.ledger_path));
//!     let store = Arc::new(LocalStore::new("./mirror"));
//!
//!     let summary = RunDriver::new(config, ledger, store)?.run(2020, 2021, None).await?;
//!     println!("{} archives recorded", summary.totals.recorded);
//!     Ok(())
//! }
//! ```

#![deny(clippy::unwrap_used, clippy::expect_used)]

pub mod catalog;
pub mod cli;
pub mod config;
pub mod driver;
pub mod error;
pub mod extractor;
pub mod fetcher;
pub mod ledger;
pub mod orchestrator;
pub mod pipeline;
pub mod progress;
pub mod publisher;
pub mod retry;
pub mod storage;

// Re-export commonly used types
pub use error::{IngestError, Result};
