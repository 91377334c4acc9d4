//! Ingestion configuration
//!
//! Defaults mirror the public NOAA AIS layout. Every field can be overridden
//! from the environment (`AISYNC_*`, optionally via a `.env` file) and the CLI
//! overrides the environment.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

use crate::error::{IngestError, Result};
use crate::retry::RetryPolicy;

// ============================================================================
// Defaults
// ============================================================================

/// Per-year listing page; `{year}` is substituted.
pub const DEFAULT_LISTING_URL_TEMPLATE: &str =
    "https://coast.noaa.gov/htdata/CMSP/AISDataHandler/{year}/";

/// Prefix of every durable object key.
pub const DEFAULT_KEY_PREFIX: &str = "raw_data";

pub const DEFAULT_LEDGER_PATH: &str = "processed_files.txt";

/// Where downloaded archives land while a unit is running.
pub const DEFAULT_WORK_DIR: &str = ".";

/// Root of the per-year, per-archive extraction directories.
pub const DEFAULT_SCRATCH_ROOT: &str = "./unzipped";

/// Units of work in flight per year.
pub const DEFAULT_CONCURRENCY: usize = 4;

/// Whole-request timeout. Yearly archives run to several hundred MB.
pub const DEFAULT_TIMEOUT_SECS: u64 = 600;

pub const DEFAULT_CONNECT_TIMEOUT_SECS: u64 = 30;

pub const DEFAULT_MAX_ATTEMPTS: u32 = 3;

pub const DEFAULT_RETRY_BASE_DELAY_MS: u64 = 2_000;

pub const USER_AGENT: &str = concat!("aisync-ingest/", env!("CARGO_PKG_VERSION"));

/// Main ingestion configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IngestConfig {
    /// Listing URL template containing `{year}`
    pub listing_url_template: String,

    /// Object key prefix (`<prefix>/<year>/<file>`)
    pub key_prefix: String,

    /// Processed-set ledger file
    pub ledger_path: PathBuf,

    /// Directory receiving downloaded archives
    pub work_dir: PathBuf,

    /// Root for extracted content
    pub scratch_root: PathBuf,

    /// Maximum concurrent units of work within a year
    pub concurrency: usize,

    /// HTTP request timeout in seconds
    pub timeout_secs: u64,

    pub connect_timeout_secs: u64,

    /// Attempts per network operation (1 = no retry)
    pub max_attempts: u32,

    /// First backoff delay; doubles on every further attempt
    pub retry_base_delay_ms: u64,

    /// Draw download progress bars
    pub show_progress: bool,
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            listing_url_template: DEFAULT_LISTING_URL_TEMPLATE.to_string(),
            key_prefix: DEFAULT_KEY_PREFIX.to_string(),
            ledger_path: PathBuf::from(DEFAULT_LEDGER_PATH),
            work_dir: PathBuf::from(DEFAULT_WORK_DIR),
            scratch_root: PathBuf::from(DEFAULT_SCRATCH_ROOT),
            concurrency: DEFAULT_CONCURRENCY,
            timeout_secs: DEFAULT_TIMEOUT_SECS,
            connect_timeout_secs: DEFAULT_CONNECT_TIMEOUT_SECS,
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            retry_base_delay_ms: DEFAULT_RETRY_BASE_DELAY_MS,
            show_progress: true,
        }
    }
}

impl IngestConfig {
    pub fn builder() -> IngestConfigBuilder {
        IngestConfigBuilder::default()
    }

    /// Load configuration from environment and defaults
    ///
    /// - `AISYNC_LISTING_URL`: listing URL template containing `{year}`
    /// - `AISYNC_KEY_PREFIX`
    /// - `AISYNC_LEDGER_PATH`
    /// - `AISYNC_WORK_DIR`, `AISYNC_SCRATCH_ROOT`
    /// - `AISYNC_CONCURRENCY`
    /// - `AISYNC_TIMEOUT_SECS`, `AISYNC_CONNECT_TIMEOUT_SECS`
    /// - `AISYNC_MAX_ATTEMPTS`, `AISYNC_RETRY_BASE_DELAY_MS`
    /// - `AISYNC_SHOW_PROGRESS`: true/false
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok();

        let defaults = Self::default();
        let config = Self {
            listing_url_template: env_or("AISYNC_LISTING_URL", defaults.listing_url_template),
            key_prefix: env_or("AISYNC_KEY_PREFIX", defaults.key_prefix),
            ledger_path: std::env::var("AISYNC_LEDGER_PATH")
                .map(PathBuf::from)
                .unwrap_or(defaults.ledger_path),
            work_dir: std::env::var("AISYNC_WORK_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.work_dir),
            scratch_root: std::env::var("AISYNC_SCRATCH_ROOT")
                .map(PathBuf::from)
                .unwrap_or(defaults.scratch_root),
            concurrency: env_parse("AISYNC_CONCURRENCY", defaults.concurrency),
            timeout_secs: env_parse("AISYNC_TIMEOUT_SECS", defaults.timeout_secs),
            connect_timeout_secs: env_parse(
                "AISYNC_CONNECT_TIMEOUT_SECS",
                defaults.connect_timeout_secs,
            ),
            max_attempts: env_parse("AISYNC_MAX_ATTEMPTS", defaults.max_attempts),
            retry_base_delay_ms: env_parse(
                "AISYNC_RETRY_BASE_DELAY_MS",
                defaults.retry_base_delay_ms,
            ),
            show_progress: env_parse("AISYNC_SHOW_PROGRESS", defaults.show_progress),
        };

        config.validate()?;
        Ok(config)
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        if !self.listing_url_template.contains("{year}") {
            return Err(IngestError::Config(format!(
                "Listing URL template must contain {{year}}: {}",
                self.listing_url_template
            )));
        }

        if url::Url::parse(&self.listing_url(2000)).is_err() {
            return Err(IngestError::Config(format!(
                "Listing URL template is not a valid URL: {}",
                self.listing_url_template
            )));
        }

        if self.key_prefix.trim_matches('/').is_empty() {
            return Err(IngestError::Config("Key prefix cannot be empty".to_string()));
        }

        if self.concurrency == 0 {
            return Err(IngestError::Config("Concurrency must be greater than 0".to_string()));
        }

        if self.timeout_secs == 0 {
            return Err(IngestError::Config("Timeout must be greater than 0".to_string()));
        }

        if self.max_attempts == 0 {
            return Err(IngestError::Config("Max attempts must be at least 1".to_string()));
        }

        Ok(())
    }

    /// Listing page URL for `year`
    pub fn listing_url(&self, year: u16) -> String {
        self.listing_url_template.replace("{year}", &year.to_string())
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::new(self.max_attempts, Duration::from_millis(self.retry_base_delay_ms))
    }

    /// HTTP client shared by the lister and the fetcher
    pub fn http_client(&self) -> Result<reqwest::Client> {
        reqwest::Client::builder()
            .timeout(Duration::from_secs(self.timeout_secs))
            .connect_timeout(Duration::from_secs(self.connect_timeout_secs))
            .user_agent(USER_AGENT)
            .build()
            .map_err(|e| IngestError::Config(format!("Failed to build HTTP client: {}", e)))
    }
}

fn env_or(key: &str, default: String) -> String {
    std::env::var(key).unwrap_or(default)
}

fn env_parse<T: std::str::FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or(default)
}

/// Builder for IngestConfig
#[derive(Debug, Default)]
pub struct IngestConfigBuilder {
    config: IngestConfig,
}

impl IngestConfigBuilder {
    pub fn listing_url_template(mut self, template: impl Into<String>) -> Self {
        self.config.listing_url_template = template.into();
        self
    }

    pub fn key_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.config.key_prefix = prefix.into();
        self
    }

    pub fn ledger_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.ledger_path = path.into();
        self
    }

    pub fn work_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.config.work_dir = dir.into();
        self
    }

    pub fn scratch_root(mut self, dir: impl Into<PathBuf>) -> Self {
        self.config.scratch_root = dir.into();
        self
    }

    pub fn concurrency(mut self, concurrency: usize) -> Self {
        self.config.concurrency = concurrency;
        self
    }

    pub fn timeout_secs(mut self, secs: u64) -> Self {
        self.config.timeout_secs = secs;
        self
    }

    pub fn max_attempts(mut self, attempts: u32) -> Self {
        self.config.max_attempts = attempts;
        self
    }

    pub fn retry_base_delay_ms(mut self, millis: u64) -> Self {
        self.config.retry_base_delay_ms = millis;
        self
    }

    pub fn show_progress(mut self, show: bool) -> Self {
        self.config.show_progress = show;
        self
    }

    pub fn build(self) -> Result<IngestConfig> {
        self.config.validate()?;
        Ok(self.config)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let config = IngestConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.concurrency, 4);
        assert_eq!(config.key_prefix, "raw_data");
    }

    #[test]
    fn test_listing_url() {
        let config = IngestConfig::default();
        assert_eq!(
            config.listing_url(2020),
            "https://coast.noaa.gov/htdata/CMSP/AISDataHandler/2020/"
        );
    }

    #[test]
    fn test_builder_rejects_invalid() {
        assert!(IngestConfig::builder().concurrency(0).build().is_err());
        assert!(IngestConfig::builder()
            .listing_url_template("https://example.org/static/")
            .build()
            .is_err());
        assert!(IngestConfig::builder().key_prefix("/").build().is_err());
        assert!(IngestConfig::builder().max_attempts(0).build().is_err());
    }

    #[test]
    fn test_retry_policy_from_config() {
        let config = IngestConfig::builder()
            .max_attempts(5)
            .retry_base_delay_ms(10)
            .build()
            .unwrap();
        let policy = config.retry_policy();
        assert_eq!(policy.max_attempts(), 5);
        assert_eq!(policy.delay_for(1), Duration::from_millis(10));
    }
}
