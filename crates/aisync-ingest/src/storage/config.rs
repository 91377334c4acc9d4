use serde::{Deserialize, Serialize};
use std::env;
use std::fmt;

use crate::error::{IngestError, Result};

/// Google Cloud Storage XML API, S3-compatible with HMAC keys
pub const GCS_ENDPOINT: &str = "https://storage.googleapis.com";

/// Which object store the `S3_*` settings point at
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    #[default]
    S3,
    /// Cloud Storage through its interoperability endpoint
    Gcs,
}

impl std::str::FromStr for StorageBackend {
    type Err = IngestError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "s3" | "minio" => Ok(StorageBackend::S3),
            "gcs" | "gs" => Ok(StorageBackend::Gcs),
            other => Err(IngestError::Config(format!("Unknown storage backend: {}", other))),
        }
    }
}

#[derive(Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    #[serde(default)]
    pub backend: StorageBackend,
    pub endpoint: Option<String>,
    pub region: String,
    pub bucket: String,
    /// Static credentials; when absent the default AWS provider chain is used
    pub access_key: Option<String>,
    #[serde(skip_serializing)]
    pub secret_key: Option<String>,
    pub path_style: bool,
}

impl fmt::Debug for StorageConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StorageConfig")
            .field("backend", &self.backend)
            .field("endpoint", &self.endpoint)
            .field("region", &self.region)
            .field("bucket", &self.bucket)
            .field("access_key", &self.access_key)
            .field("secret_key", &self.secret_key.as_ref().map(|_| "<redacted>"))
            .field("path_style", &self.path_style)
            .finish()
    }
}

impl StorageConfig {
    /// Read storage settings from the environment; `S3_BUCKET` is required
    ///
    /// - `AISYNC_STORAGE_BACKEND`: `s3` (default) or `gcs`
    /// - `S3_BUCKET`, `S3_ENDPOINT`, `S3_REGION`, `S3_PATH_STYLE`
    /// - `S3_ACCESS_KEY` / `AWS_ACCESS_KEY_ID`, `S3_SECRET_KEY` / `AWS_SECRET_ACCESS_KEY`
    ///   (HMAC key and secret for `gcs`)
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Same as [`StorageConfig::from_env`] over an arbitrary variable source
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let backend = match lookup("AISYNC_STORAGE_BACKEND") {
            Some(value) => value.parse()?,
            None => StorageBackend::default(),
        };

        let bucket = lookup("S3_BUCKET")
            .filter(|b| !b.trim().is_empty())
            .ok_or_else(|| IngestError::Config("S3_BUCKET must be set".to_string()))?;

        let access_key = lookup("S3_ACCESS_KEY").or_else(|| lookup("AWS_ACCESS_KEY_ID"));
        let secret_key = lookup("S3_SECRET_KEY").or_else(|| lookup("AWS_SECRET_ACCESS_KEY"));
        let path_style = lookup("S3_PATH_STYLE").and_then(|v| v.parse().ok());

        let config = match backend {
            StorageBackend::S3 => Self {
                backend,
                endpoint: lookup("S3_ENDPOINT"),
                region: lookup("S3_REGION").unwrap_or_else(|| "us-east-1".to_string()),
                bucket,
                access_key,
                secret_key,
                path_style: path_style.unwrap_or(false),
            },
            StorageBackend::Gcs => Self {
                backend,
                endpoint: Some(lookup("S3_ENDPOINT").unwrap_or_else(|| GCS_ENDPOINT.to_string())),
                region: lookup("S3_REGION").unwrap_or_else(|| "auto".to_string()),
                bucket,
                access_key,
                secret_key,
                path_style: path_style.unwrap_or(true),
            },
        };

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.bucket.trim().is_empty() {
            return Err(IngestError::Config("Bucket name cannot be empty".to_string()));
        }

        if self.access_key.is_some() != self.secret_key.is_some() {
            return Err(IngestError::Config(
                "S3 access key and secret key must be set together".to_string(),
            ));
        }

        if self.backend == StorageBackend::Gcs && self.access_key.is_none() {
            return Err(IngestError::Config(
                "GCS interoperability requires an HMAC key in S3_ACCESS_KEY and S3_SECRET_KEY"
                    .to_string(),
            ));
        }

        Ok(())
    }
}
