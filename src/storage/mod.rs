//! Blob storage backends for generated media.

mod local;
#[cfg(feature = "cloud")]
mod s3;

pub use crate::domain::ports::Storage;
pub use local::LocalStorage;
#[cfg(feature = "cloud")]
pub use s3::S3Storage;

use crate::config::{GangliaConfig, StorageBackend};
use crate::utils::error::{GangliaError, Result};
use std::path::Path;
use std::time::Duration;

pub const VIDEO_CONTENT_TYPE: &str = "video/mp4";

/// Signed GET URL for streaming a rendered video, valid for `expiration_minutes`.
pub async fn video_stream_url<S: Storage>(
    storage: &S,
    key: &str,
    expiration_minutes: u64,
) -> Result<String> {
    let url = storage
        .signed_url(
            key,
            Duration::from_secs(expiration_minutes.saturating_mul(60)),
            VIDEO_CONTENT_TYPE,
        )
        .await?;
    tracing::info!(
        "✓ Generated stream URL (valid for {} minutes)",
        expiration_minutes
    );
    Ok(url)
}

/// The backend chosen by `[storage] backend`.
pub enum ConfiguredStorage {
    Local(LocalStorage),
    #[cfg(feature = "cloud")]
    S3(S3Storage),
}

impl ConfiguredStorage {
    pub async fn from_config(config: &GangliaConfig) -> Result<Self> {
        match config.storage.backend {
            StorageBackend::Local => {
                let root = match &config.storage.local_root {
                    Some(root) => root.clone(),
                    None => config.workspace()?.root().join("storage"),
                };
                tracing::debug!("Using local storage at {}", root.display());
                Ok(Self::Local(LocalStorage::new(root)))
            }
            #[cfg(feature = "cloud")]
            StorageBackend::S3 => Ok(Self::S3(S3Storage::from_config(&config.storage).await?)),
            #[cfg(not(feature = "cloud"))]
            StorageBackend::S3 => Err(GangliaError::config(
                "storage.backend = \"s3\" requires the `cloud` feature",
            )),
        }
    }
}

impl Storage for ConfiguredStorage {
    async fn read_file(&self, key: &str) -> Result<Vec<u8>> {
        match self {
            Self::Local(s) => s.read_file(key).await,
            #[cfg(feature = "cloud")]
            Self::S3(s) => s.read_file(key).await,
        }
    }

    async fn write_file(&self, key: &str, data: &[u8]) -> Result<()> {
        match self {
            Self::Local(s) => s.write_file(key, data).await,
            #[cfg(feature = "cloud")]
            Self::S3(s) => s.write_file(key, data).await,
        }
    }

    async fn upload_file(&self, local_path: &Path, dest: Option<&str>) -> Result<String> {
        if !local_path.is_file() {
            return Err(GangliaError::storage(format!(
                "{} is not a file",
                local_path.display()
            )));
        }
        match self {
            Self::Local(s) => s.upload_file(local_path, dest).await,
            #[cfg(feature = "cloud")]
            Self::S3(s) => s.upload_file(local_path, dest).await,
        }
    }

    async fn download_file(&self, key: &str, local_path: &Path) -> Result<()> {
        match self {
            Self::Local(s) => s.download_file(key, local_path).await,
            #[cfg(feature = "cloud")]
            Self::S3(s) => s.download_file(key, local_path).await,
        }
    }

    async fn signed_url(
        &self,
        key: &str,
        expires_in: Duration,
        content_type: &str,
    ) -> Result<String> {
        match self {
            Self::Local(s) => s.signed_url(key, expires_in, content_type).await,
            #[cfg(feature = "cloud")]
            Self::S3(s) => s.signed_url(key, expires_in, content_type).await,
        }
    }
}
