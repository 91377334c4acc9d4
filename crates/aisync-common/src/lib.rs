//! aisync common library
//!
//! Shared plumbing for the aisync workspace members:
//!
//! - **Error Handling**: [`CommonError`] and the [`Result`] alias
//! - **Logging**: `tracing` subscriber setup driven by [`logging::LogConfig`]
//! - **Checksums**: streaming SHA-256 of files handed to object storage
//!
//! # Example
//!
//! ```no_run
//! use aisync_common::checksum::sha256_file;
//! use aisync_common::logging::{init_logging, LogConfig};
//!
//! fn main() -> anyhow::Result<()> {
//!     let _guard = init_logging(&LogConfig::from_env()?)?;
//!     let digest = sha256_file("AIS_2020_01_01.csv")?;
//!     tracing::info!(%digest, "hashed");
//!     Ok(())
//! }
//! ```

#![deny(clippy::unwrap_used, clippy::expect_used)]

pub mod checksum;
pub mod error;
pub mod logging;

pub use error::{CommonError, Result};
