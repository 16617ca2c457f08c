//! Retrieval of the holiday dataset into a local staging path.

use std::path::{Path, PathBuf};

use aws_sdk_s3::Client as S3Client;
use tracing::info;

use crate::models::BlobLocator;
use crate::{Error, Result};

/// Copies a dataset from its blob-store location to a local file.
#[allow(async_fn_in_trait)]
pub trait DatasetFetcher {
    async fn fetch(&self, locator: &BlobLocator, destination: &Path) -> Result<()>;
}

/// Downloads from S3.
#[derive(Debug, Clone)]
pub struct S3Fetcher {
    client: S3Client,
}

impl S3Fetcher {
    pub fn new(client: S3Client) -> Self {
        Self { client }
    }
}

impl DatasetFetcher for S3Fetcher {
    async fn fetch(&self, locator: &BlobLocator, destination: &Path) -> Result<()> {
        let object = self
            .client
            .get_object()
            .bucket(&locator.bucket)
            .key(&locator.key)
            .send()
            .await
            .map_err(|e| Error::Aws(format!("Failed to get {}: {}", locator, e)))?;

        let bytes = object
            .body
            .collect()
            .await
            .map_err(|e| Error::Aws(format!("Failed to read {}: {}", locator, e)))?
            .into_bytes();

        write_local(destination, &bytes).await?;
        info!("Downloaded {} ({} bytes) to {}", locator, bytes.len(), destination.display());
        Ok(())
    }
}

/// Serves `<root>/<bucket>/<key>` from the local filesystem. Used by the tests
/// and by callers that embed the batch with datasets on disk.
#[derive(Debug, Clone)]
pub struct LocalDirFetcher {
    root: PathBuf,
}

impl LocalDirFetcher {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }
}

impl DatasetFetcher for LocalDirFetcher {
    async fn fetch(&self, locator: &BlobLocator, destination: &Path) -> Result<()> {
        let source = self.root.join(&locator.bucket).join(&locator.key);
        let bytes = tokio::fs::read(&source)
            .await
            .map_err(|e| Error::Import(format!("Failed to open {}: {}", source.display(), e)))?;

        write_local(destination, &bytes).await
    }
}

async fn write_local(destination: &Path, bytes: &[u8]) -> Result<()> {
    if let Some(parent) = destination.parent() {
        tokio::fs::create_dir_all(parent)
            .await
            .map_err(|e| Error::Import(format!("Failed to create {}: {}", parent.display(), e)))?;
    }
    tokio::fs::write(destination, bytes)
        .await
        .map_err(|e| Error::Import(format!("Failed to write {}: {}", destination.display(), e)))
}
