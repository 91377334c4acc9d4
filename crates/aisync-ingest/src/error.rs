//! Error taxonomy for the ingestion pipeline

use reqwest::StatusCode;
use thiserror::Error;

/// Result type for ingestion operations
pub type Result<T> = std::result::Result<T, IngestError>;

/// Errors raised by the pipeline components
///
/// Everything that happens inside one unit of work is caught by
/// [`crate::pipeline::ArchivePipeline`] and turned into a failed outcome; only
/// configuration errors ever reach the caller of the run driver.
#[derive(Debug, Error)]
pub enum IngestError {
    #[error("Failed to fetch listing {url}: {reason}")]
    ListingFetch {
        url: String,
        status: Option<StatusCode>,
        reason: String,
    },

    #[error("Listing page {url} is not a directory listing: {reason}")]
    ListingParse { url: String, reason: String },

    #[error("Failed to fetch archive {url}: {reason}")]
    Fetch {
        url: String,
        status: Option<StatusCode>,
        reason: String,
    },

    #[error("Failed to extract {archive}: {reason}")]
    Extract { archive: String, reason: String },

    #[error("Failed to publish {key}: {reason}")]
    Publish { key: String, reason: String },

    #[error("Failed to read ledger {path}: {source}")]
    LedgerRead {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to append to ledger {path}: {source}")]
    LedgerWrite {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl IngestError {
    pub(crate) fn listing_fetch(url: &str, err: reqwest::Error) -> Self {
        IngestError::ListingFetch {
            url: url.to_string(),
            status: err.status(),
            reason: err.to_string(),
        }
    }

    pub(crate) fn fetch(url: &str, err: impl std::fmt::Display) -> Self {
        IngestError::Fetch {
            url: url.to_string(),
            status: None,
            reason: err.to_string(),
        }
    }

    pub(crate) fn extract(archive: impl std::fmt::Display, reason: impl std::fmt::Display) -> Self {
        IngestError::Extract {
            archive: archive.to_string(),
            reason: reason.to_string(),
        }
    }

    pub(crate) fn publish(key: &str, reason: impl std::fmt::Display) -> Self {
        IngestError::Publish {
            key: key.to_string(),
            reason: reason.to_string(),
        }
    }

    /// HTTP status attached to a network error, if the server answered
    pub fn status(&self) -> Option<StatusCode> {
        match self {
            IngestError::ListingFetch { status, .. } | IngestError::Fetch { status, .. } => *status,
            _ => None,
        }
    }

    /// Whether another attempt could plausibly succeed
    ///
    /// Client errors are permanent except request timeout and rate limiting.
    /// Extraction, ledger and configuration errors are never retried.
    pub fn is_retryable(&self) -> bool {
        match self {
            IngestError::ListingFetch { .. } | IngestError::Fetch { .. } => match self.status() {
                Some(status) if status.is_client_error() => {
                    status == StatusCode::REQUEST_TIMEOUT || status == StatusCode::TOO_MANY_REQUESTS
                },
                _ => true,
            },
            IngestError::Publish { .. } => true,
            _ => false,
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn fetch_with_status(status: StatusCode) -> IngestError {
        IngestError::Fetch {
            url: "https://example.org/AIS_2020_01_01.zip".to_string(),
            status: Some(status),
            reason: status.to_string(),
        }
    }

    #[test]
    fn test_client_errors_are_permanent() {
        assert!(!fetch_with_status(StatusCode::NOT_FOUND).is_retryable());
        assert!(!fetch_with_status(StatusCode::FORBIDDEN).is_retryable());
    }

    #[test]
    fn test_transient_statuses_are_retryable() {
        assert!(fetch_with_status(StatusCode::SERVICE_UNAVAILABLE).is_retryable());
        assert!(fetch_with_status(StatusCode::TOO_MANY_REQUESTS).is_retryable());
        assert!(fetch_with_status(StatusCode::REQUEST_TIMEOUT).is_retryable());
    }

    #[test]
    fn test_local_failures_are_not_retried() {
        assert!(!IngestError::extract("a.zip", "bad header").is_retryable());
        assert!(!IngestError::Config("no bucket".to_string()).is_retryable());
        assert!(IngestError::publish("raw_data/2020/a.csv", "timeout").is_retryable());
    }
}
