use super::local::default_key;
use crate::config::StorageConfig;
use crate::domain::ports::Storage;
use crate::utils::error::{GangliaError, Result};
use crate::utils::validation::{validate_non_empty_string, validate_required_field};
use aws_config::BehaviorVersion;
use aws_sdk_s3::config::Region;
use aws_sdk_s3::error::DisplayErrorContext;
use aws_sdk_s3::presigning::PresigningConfig;
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::Client as S3Client;
use std::path::Path;
use std::time::Duration;

/// S3-compatible bucket storage. With the default endpoint this talks to
/// Google Cloud Storage through its interoperability API (HMAC keys in the
/// usual `AWS_ACCESS_KEY_ID` / `AWS_SECRET_ACCESS_KEY` variables).
pub struct S3Storage {
    client: S3Client,
    bucket: String,
}

impl S3Storage {
    pub fn new(client: S3Client, bucket: String) -> Self {
        Self { client, bucket }
    }

    pub async fn from_config(config: &StorageConfig) -> Result<Self> {
        let bucket = validate_required_field("storage.bucket", &config.bucket)?.clone();
        validate_non_empty_string("storage.bucket", &bucket)?;

        let sdk_config = aws_config::load_defaults(BehaviorVersion::latest()).await;
        let mut builder = aws_sdk_s3::config::Builder::from(&sdk_config)
            .region(Region::new(config.region.clone()))
            .force_path_style(true);
        if let Some(endpoint) = &config.endpoint {
            builder = builder.endpoint_url(endpoint);
        }
        if let Some(project) = &config.project {
            tracing::debug!("Using bucket {} in project {}", bucket, project);
        }

        Ok(Self::new(S3Client::from_conf(builder.build()), bucket))
    }

    pub fn bucket(&self) -> &str {
        &self.bucket
    }
}

fn storage_error<E>(action: &str, err: E) -> GangliaError
where
    E: std::error::Error,
{
    GangliaError::storage(format!("{}: {}", action, DisplayErrorContext(&err)))
}

impl Storage for S3Storage {
    async fn read_file(&self, key: &str) -> Result<Vec<u8>> {
        let resp = self
            .client
            .get_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await
            .map_err(|e| storage_error("Failed to read from bucket", e))?;

        let data = resp
            .body
            .collect()
            .await
            .map_err(|e| storage_error("Failed to collect object data", e))?;

        Ok(data.into_bytes().to_vec())
    }

    async fn write_file(&self, key: &str, data: &[u8]) -> Result<()> {
        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(key)
            .body(ByteStream::from(data.to_vec()))
            .send()
            .await
            .map_err(|e| storage_error("Failed to write to bucket", e))?;
        Ok(())
    }

    async fn upload_file(&self, local_path: &Path, dest: Option<&str>) -> Result<String> {
        let key = default_key(local_path, dest)?;
        let body = ByteStream::from_path(local_path)
            .await
            .map_err(|e| storage_error("Failed to open upload source", e))?;

        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(&key)
            .body(body)
            .send()
            .await
            .map_err(|e| {
                let err = storage_error("Failed to upload file", e);
                tracing::error!("Error uploading file to cloud: {}", err);
                err
            })?;

        tracing::info!(
            "Uploaded {} to bucket {} as {}",
            local_path.display(),
            self.bucket,
            key
        );
        Ok(key)
    }

    async fn download_file(&self, key: &str, local_path: &Path) -> Result<()> {
        let data = self.read_file(key).await?;
        if let Some(parent) = local_path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(local_path, data).await?;
        Ok(())
    }

    async fn signed_url(
        &self,
        key: &str,
        expires_in: Duration,
        content_type: &str,
    ) -> Result<String> {
        let presigning = PresigningConfig::expires_in(expires_in)
            .map_err(|e| storage_error("Invalid URL expiry", e))?;

        let request = self
            .client
            .get_object()
            .bucket(&self.bucket)
            .key(key)
            .response_content_type(content_type)
            .presigned(presigning)
            .await
            .map_err(|e| storage_error("Failed to generate signed URL", e))?;

        Ok(request.uri().to_string())
    }
}
