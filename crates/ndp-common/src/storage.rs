//! Object storage for build artifacts and mapping report files
//!
//! Thin wrapper over the S3 API. The ETL pipeline publishes database
//! snapshots under `db/<basename>` (dated archive) plus `<basename>` at the
//! bucket root for the "latest" copy; mapping workers upload their run
//! output under `<report_slug>/<trait_slug>/<filename>`.

use anyhow::{anyhow, Context, Result};
use aws_sdk_s3::{
    config::{Credentials, Region},
    primitives::ByteStream,
    Client,
};
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::{debug, info, instrument};

/// Object storage configuration, read from the environment
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    pub bucket: String,
    pub region: String,
    pub access_key: String,
    pub secret_key: String,
    /// Custom endpoint for S3-compatible stores (minio etc.)
    pub endpoint: Option<String>,
    /// Path-style addressing, required by most S3-compatible stores
    pub path_style: bool,
}

impl StorageConfig {
    /// Load from `NDP_STORAGE_*` environment variables.
    ///
    /// Returns `None` when no bucket is configured; pipelines treat that as
    /// "publishing disabled" rather than an error.
    pub fn from_env() -> Option<Self> {
        let bucket = std::env::var("NDP_STORAGE_BUCKET").ok()?;
        Some(Self {
            bucket,
            region: std::env::var("NDP_STORAGE_REGION").unwrap_or_else(|_| "us-east-1".into()),
            access_key: std::env::var("NDP_STORAGE_ACCESS_KEY").unwrap_or_default(),
            secret_key: std::env::var("NDP_STORAGE_SECRET_KEY").unwrap_or_default(),
            endpoint: std::env::var("NDP_STORAGE_ENDPOINT").ok(),
            path_style: std::env::var("NDP_STORAGE_PATH_STYLE")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(false),
        })
    }
}

#[derive(Clone)]
pub struct Storage {
    client: Client,
    bucket: String,
}

impl Storage {
    pub async fn new(config: StorageConfig) -> Result<Self> {
        let credentials = Credentials::new(
            &config.access_key,
            &config.secret_key,
            None,
            None,
            "ndp-storage",
        );

        let mut s3_config_builder = aws_sdk_s3::Config::builder()
            .credentials_provider(credentials)
            .region(Region::new(config.region.clone()))
            .force_path_style(config.path_style);

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

    #[instrument(skip(self, data))]
    pub async fn upload(&self, key: &str, data: Vec<u8>) -> Result<()> {
        debug!("Uploading {} bytes to s3://{}/{}", data.len(), self.bucket, key);

        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(key)
            .body(ByteStream::from(data))
            .send()
            .await
            .context("Failed to upload to S3")?;

        info!("Uploaded s3://{}/{}", self.bucket, key);
        Ok(())
    }

    /// Upload a local file under the given key
    pub async fn upload_file(&self, key: &str, path: &Path) -> Result<()> {
        let data = tokio::fs::read(path)
            .await
            .with_context(|| format!("Failed to read {}", path.display()))?;
        self.upload(key, data).await
    }

    #[instrument(skip(self))]
    pub async fn download(&self, key: &str) -> Result<Vec<u8>> {
        debug!("Downloading from s3://{}/{}", self.bucket, key);

        let response = self
            .client
            .get_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await
            .context(format!("Failed to download from S3: {}", key))?;

        let data = response
            .body
            .collect()
            .await
            .context("Failed to read S3 response body")?
            .into_bytes()
            .to_vec();

        debug!("Downloaded {} bytes from s3://{}/{}", data.len(), self.bucket, key);
        Ok(data)
    }

    #[instrument(skip(self))]
    pub async fn exists(&self, key: &str) -> Result<bool> {
        match self
            .client
            .head_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await
        {
            Ok(_) => Ok(true),
            Err(e) => {
                if e.to_string().contains("NotFound") || e.to_string().contains("404") {
                    Ok(false)
                } else {
                    Err(anyhow!("Failed to check S3 object existence: {}", e))
                }
            },
        }
    }

    /// Archive key for a database snapshot
    pub fn db_archive_key(basename: &str) -> String {
        format!("db/{}", basename)
    }

    /// Key for the "latest" copy of a database snapshot
    pub fn db_latest_key(basename: &str) -> String {
        basename.to_string()
    }

    /// Key for a mapping-report output file
    pub fn report_key(report_slug: &str, trait_slug: &str, filename: &str) -> String {
        format!("{}/{}/{}", report_slug, trait_slug, filename)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_db_keys() {
        assert_eq!(Storage::db_archive_key("ndp.20260801.WS276.db"), "db/ndp.20260801.WS276.db");
        assert_eq!(Storage::db_latest_key("ndp.20260801.WS276.db"), "ndp.20260801.WS276.db");
    }

    #[test]
    fn test_report_key() {
        let key = Storage::report_key("heat-tolerance", "survival-25c", "peak_summary.tsv.gz");
        assert_eq!(key, "heat-tolerance/survival-25c/peak_summary.tsv.gz");
    }
}
