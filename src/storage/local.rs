use crate::domain::ports::Storage;
use crate::utils::error::{GangliaError, Result};
use std::fs;
use std::path::{Component, Path, PathBuf};
use std::time::Duration;
use url::Url;

/// Directory-backed storage. Keys are relative paths under `base_path`.
#[derive(Debug, Clone)]
pub struct LocalStorage {
    base_path: PathBuf,
}

impl LocalStorage {
    pub fn new(base_path: impl Into<PathBuf>) -> Self {
        Self {
            base_path: base_path.into(),
        }
    }

    pub fn base_path(&self) -> &Path {
        &self.base_path
    }

    fn resolve(&self, key: &str) -> Result<PathBuf> {
        let relative = Path::new(key);
        let escapes = relative
            .components()
            .any(|c| !matches!(c, Component::Normal(_) | Component::CurDir));
        if key.is_empty() || escapes {
            return Err(GangliaError::storage(format!(
                "invalid storage key '{}': must be a relative path inside the storage root",
                key
            )));
        }
        Ok(self.base_path.join(relative))
    }
}

fn ensure_parent(path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    Ok(())
}

pub(crate) fn default_key(local_path: &Path, dest: Option<&str>) -> Result<String> {
    match dest {
        Some(dest) => Ok(dest.to_string()),
        None => local_path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .ok_or_else(|| {
                GangliaError::storage(format!("{} has no file name", local_path.display()))
            }),
    }
}

impl Storage for LocalStorage {
    async fn read_file(&self, key: &str) -> Result<Vec<u8>> {
        let data = fs::read(self.resolve(key)?)?;
        Ok(data)
    }

    async fn write_file(&self, key: &str, data: &[u8]) -> Result<()> {
        let full_path = self.resolve(key)?;
        ensure_parent(&full_path)?;
        fs::write(full_path, data)?;
        Ok(())
    }

    async fn upload_file(&self, local_path: &Path, dest: Option<&str>) -> Result<String> {
        let key = default_key(local_path, dest)?;
        let target = self.resolve(&key)?;
        ensure_parent(&target)?;
        fs::copy(local_path, &target)?;
        tracing::info!("Uploaded {} to {}", local_path.display(), target.display());
        Ok(key)
    }

    async fn download_file(&self, key: &str, local_path: &Path) -> Result<()> {
        let source = self.resolve(key)?;
        ensure_parent(local_path)?;
        fs::copy(source, local_path)?;
        Ok(())
    }

    /// Local files have no expiry or content type; this is a plain `file://` URL.
    async fn signed_url(
        &self,
        key: &str,
        _expires_in: Duration,
        _content_type: &str,
    ) -> Result<String> {
        let path = fs::canonicalize(self.resolve(key)?)?;
        let url = Url::from_file_path(&path).map_err(|_| {
            GangliaError::storage(format!("cannot express {} as a URL", path.display()))
        })?;
        Ok(url.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_write_then_read_nested_key() {
        let tmp = TempDir::new().unwrap();
        let storage = LocalStorage::new(tmp.path());

        storage.write_file("videos/a/final.mp4", b"mp4").await.unwrap();
        assert_eq!(storage.read_file("videos/a/final.mp4").await.unwrap(), b"mp4");
    }

    #[tokio::test]
    async fn test_keys_cannot_escape_root() {
        let tmp = TempDir::new().unwrap();
        let storage = LocalStorage::new(tmp.path().join("root"));

        assert!(storage.write_file("../outside.txt", b"x").await.is_err());
        assert!(storage.read_file("/etc/passwd").await.is_err());
        assert!(storage.read_file("").await.is_err());
    }

    #[tokio::test]
    async fn test_upload_defaults_to_file_name() {
        let tmp = TempDir::new().unwrap();
        let source = tmp.path().join("clip.mp4");
        std::fs::write(&source, b"data").unwrap();
        let storage = LocalStorage::new(tmp.path().join("bucket"));

        let key = storage.upload_file(&source, None).await.unwrap();
        assert_eq!(key, "clip.mp4");

        let key = storage
            .upload_file(&source, Some("renders/clip.mp4"))
            .await
            .unwrap();
        assert_eq!(key, "renders/clip.mp4");
        assert!(tmp.path().join("bucket/renders/clip.mp4").exists());
    }

    #[tokio::test]
    async fn test_signed_url_is_file_url() {
        let tmp = TempDir::new().unwrap();
        let storage = LocalStorage::new(tmp.path());
        storage.write_file("final.mp4", b"mp4").await.unwrap();

        let url = storage
            .signed_url("final.mp4", Duration::from_secs(60), "video/mp4")
            .await
            .unwrap();
        assert!(url.starts_with("file://"));
        assert!(url.ends_with("/final.mp4"));
    }
}
