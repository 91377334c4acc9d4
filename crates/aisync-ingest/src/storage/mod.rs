use async_trait::async_trait;
use aws_sdk_s3::{
    config::{Credentials, Region},
    error::DisplayErrorContext,
    primitives::ByteStream,
    Client,
};
use std::path::Path;
use tracing::{debug, info, instrument};

use crate::error::{IngestError, Result};
use crate::publisher::{file_digest, PublishReceipt, Publisher};

pub mod config;
pub mod local;

pub use config::{StorageBackend, StorageConfig};
pub use local::LocalStore;

/// S3-compatible bucket
#[derive(Clone)]
pub struct Storage {
    client: Client,
    bucket: String,
}

impl Storage {
    pub async fn new(config: StorageConfig) -> Result<Self> {
        config.validate()?;
        debug!("Initializing storage with config: {:?}", config);

        let region = Region::new(config.region.clone());
        let sdk_config = aws_config::defaults(aws_config::BehaviorVersion::latest())
            .region(region.clone())
            .load()
            .await;

        let mut s3_config_builder = aws_sdk_s3::config::Builder::from(&sdk_config)
            .region(region)
            .force_path_style(config.path_style);

        if let (Some(access_key), Some(secret_key)) = (&config.access_key, &config.secret_key) {
            let credentials = Credentials::new(access_key, secret_key, None, None, "aisync-storage");
            s3_config_builder = s3_config_builder.credentials_provider(credentials);
        }

        if let Some(endpoint) = &config.endpoint {
            s3_config_builder = s3_config_builder.endpoint_url(endpoint);
        }

        let client = Client::from_conf(s3_config_builder.build());

        info!("Storage client initialized for bucket: {}", config.bucket);

        Ok(Self {
            client,
            bucket: config.bucket,
        })
    }

    pub fn bucket(&self) -> &str {
        &self.bucket
    }

    /// Stream a local file into `key`
    #[instrument(skip(self, path), fields(bucket = %self.bucket))]
    pub async fn upload_file(&self, path: &Path, key: &str) -> Result<PublishReceipt> {
        let (size, checksum) = file_digest(path, key).await?;

        debug!("Uploading {} bytes to s3://{}/{}", size, self.bucket, key);

        let body = ByteStream::from_path(path)
            .await
            .map_err(|e| IngestError::publish(key, e))?;

        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(key)
            .content_length(size as i64)
            .content_type(content_type_for(key))
            .body(body)
            .send()
            .await
            .map_err(|e| IngestError::publish(key, DisplayErrorContext(&e)))?;

        info!(
            checksum = %checksum,
            "Successfully uploaded to s3://{}/{}", self.bucket, key
        );

        Ok(PublishReceipt {
            key: key.to_string(),
            size,
            checksum,
        })
    }
}

#[async_trait]
impl Publisher for Storage {
    async fn publish(&self, local_path: &Path, key: &str) -> Result<PublishReceipt> {
        self.upload_file(local_path, key).await
    }

    fn describe(&self) -> String {
        format!("s3://{}", self.bucket)
    }
}

fn content_type_for(key: &str) -> &'static str {
    let lower = key.to_ascii_lowercase();
    if lower.ends_with(".csv") {
        "text/csv"
    } else if lower.ends_with(".txt") {
        "text/plain"
    } else {
        "application/octet-stream"
    }
}
