//! Upload storage with a pluggable backend.
//!
//! File fields on content records never reach the envelope store as bytes:
//! the bytes land in the upload store first and the record keeps the public
//! URL. The original system proxied to an FTP host; the transfer mechanics
//! sit behind [`StorageBackend`], and the shipped implementation writes to
//! the local filesystem.

use async_trait::async_trait;
use chrono::Utc;
use siteforms_core::{qualify_url, Error, Result};
use std::path::PathBuf;
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tracing::{debug, warn};

/// Storage backend trait for different storage implementations.
#[async_trait]
pub trait StorageBackend: Send + Sync {
    /// Write data to the specified path.
    async fn write(&self, path: &str, data: &[u8]) -> Result<()>;

    /// Read data from the specified path.
    async fn read(&self, path: &str) -> Result<Vec<u8>>;

    /// Delete data at the specified path.
    async fn delete(&self, path: &str) -> Result<()>;

    /// Check if data exists at the specified path.
    async fn exists(&self, path: &str) -> Result<bool>;
}

/// Filesystem storage backend.
///
/// Stores uploads flat under a base directory.
pub struct FilesystemBackend {
    base_path: PathBuf,
}

impl FilesystemBackend {
    /// Create a new filesystem backend with the given base directory.
    pub fn new(base_path: impl Into<PathBuf>) -> Self {
        Self {
            base_path: base_path.into(),
        }
    }

    fn full_path(&self, path: &str) -> PathBuf {
        self.base_path.join(path)
    }

    /// Validate that the storage backend can write, read, and delete files.
    ///
    /// Performs a full round-trip test at startup to catch filesystem issues
    /// (permission errors, missing directories) early.
    pub async fn validate(&self) -> std::result::Result<(), String> {
        let test_file = self.base_path.join(".health-check");

        fs::create_dir_all(&self.base_path)
            .await
            .map_err(|e| format!("create_dir_all({:?}): {}", self.base_path, e))?;

        let data = b"storage-health-check";
        fs::write(&test_file, data)
            .await
            .map_err(|e| format!("write({:?}): {}", test_file, e))?;

        let read_data = fs::read(&test_file)
            .await
            .map_err(|e| format!("read({:?}): {}", test_file, e))?;
        if read_data != data {
            return Err("read-back mismatch".to_string());
        }

        let _ = fs::remove_file(&test_file).await;

        Ok(())
    }
}

#[async_trait]
impl StorageBackend for FilesystemBackend {
    async fn write(&self, path: &str, data: &[u8]) -> Result<()> {
        let full_path = self.full_path(path);
        debug!(
            subsystem = "uploads",
            op = "write",
            upload_name = %path,
            bytes = data.len(),
            "uploads: write"
        );

        if let Some(parent) = full_path.parent() {
            fs::create_dir_all(parent).await.map_err(|e| {
                warn!(parent = %parent.display(), error = %e, "uploads: create_dir_all failed");
                e
            })?;
        }

        // Atomic write: temp file + rename
        let temp_path = full_path.with_extension("tmp");
        let mut file = fs::File::create(&temp_path).await.map_err(|e| {
            warn!(temp_path = %temp_path.display(), error = %e, "uploads: File::create failed");
            e
        })?;
        file.write_all(data).await?;
        file.sync_all().await?;
        drop(file);

        fs::rename(&temp_path, &full_path).await.map_err(|e| {
            warn!(from = %temp_path.display(), to = %full_path.display(), error = %e, "uploads: rename failed");
            e
        })?;

        Ok(())
    }

    async fn read(&self, path: &str) -> Result<Vec<u8>> {
        let full_path = self.full_path(path);
        Ok(fs::read(full_path).await?)
    }

    async fn delete(&self, path: &str) -> Result<()> {
        let full_path = self.full_path(path);
        if fs::try_exists(&full_path).await? {
            fs::remove_file(full_path).await?;
        }
        Ok(())
    }

    async fn exists(&self, path: &str) -> Result<bool> {
        let full_path = self.full_path(path);
        Ok(fs::try_exists(full_path).await?)
    }
}

/// Upload store: names stored files and qualifies them into public URLs.
///
/// Stored name format: `{unix_millis}-{sanitized original name}`.
pub struct UploadStore {
    backend: Box<dyn StorageBackend>,
    public_base: String,
}

impl UploadStore {
    pub fn new(backend: impl StorageBackend + 'static, public_base: impl Into<String>) -> Self {
        Self {
            backend: Box::new(backend),
            public_base: public_base.into(),
        }
    }

    /// Store one uploaded file and return the public URL the record should
    /// persist instead of the raw bytes.
    pub async fn store(&self, filename: &str, data: &[u8]) -> Result<String> {
        let stored_name = format!("{}-{}", Utc::now().timestamp_millis(), sanitize(filename));

        self.backend
            .write(&stored_name, data)
            .await
            .map_err(|e| Error::Upload(e.to_string()))?;

        debug!(
            subsystem = "uploads",
            op = "store",
            upload_name = %stored_name,
            bytes = data.len(),
            "Upload stored"
        );

        Ok(qualify_url(&self.public_base, &stored_name))
    }
}

/// Strip path components and whitespace from a client-supplied filename.
fn sanitize(filename: &str) -> String {
    let name = filename
        .rsplit(['/', '\\'])
        .next()
        .unwrap_or(filename)
        .trim();
    if name.is_empty() {
        "upload".to_string()
    } else {
        name.replace(char::is_whitespace, "_")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sanitize_strips_paths() {
        assert_eq!(sanitize("../../etc/passwd"), "passwd");
        assert_eq!(sanitize("C:\\temp\\pic.png"), "pic.png");
        assert_eq!(sanitize("my photo.jpg"), "my_photo.jpg");
        assert_eq!(sanitize(""), "upload");
    }

    #[tokio::test]
    async fn filesystem_backend_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let backend = FilesystemBackend::new(dir.path());

        backend.validate().await.unwrap();

        backend.write("a.bin", b"hello").await.unwrap();
        assert!(backend.exists("a.bin").await.unwrap());
        assert_eq!(backend.read("a.bin").await.unwrap(), b"hello");

        backend.delete("a.bin").await.unwrap();
        assert!(!backend.exists("a.bin").await.unwrap());
        // Deleting again is a no-op, not an error.
        backend.delete("a.bin").await.unwrap();
    }

    #[tokio::test]
    async fn upload_store_returns_public_url() {
        let dir = tempfile::tempdir().unwrap();
        let store = UploadStore::new(
            FilesystemBackend::new(dir.path()),
            "https://cdn.example.com",
        );

        let url = store.store("logo.png", b"png-bytes").await.unwrap();
        assert!(url.starts_with("https://cdn.example.com/"));
        assert!(url.ends_with("-logo.png"));
    }
}
