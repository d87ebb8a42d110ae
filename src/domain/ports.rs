use crate::utils::error::Result;
use std::future::Future;
use std::path::Path;
use std::time::Duration;

/// Blob storage backend (local directory, S3-compatible bucket).
pub trait Storage: Send + Sync {
    fn read_file(&self, key: &str) -> impl Future<Output = Result<Vec<u8>>> + Send;

    fn write_file(&self, key: &str, data: &[u8]) -> impl Future<Output = Result<()>> + Send;

    /// Uploads a local file; `dest` defaults to the file name. Returns the key.
    fn upload_file(
        &self,
        local_path: &Path,
        dest: Option<&str>,
    ) -> impl Future<Output = Result<String>> + Send;

    fn download_file(&self, key: &str, local_path: &Path) -> impl Future<Output = Result<()>> + Send;

    /// Time-limited GET URL for `key`, served with `content_type`.
    fn signed_url(
        &self,
        key: &str,
        expires_in: Duration,
        content_type: &str,
    ) -> impl Future<Output = Result<String>> + Send;
}
