//! File-backed key-value store with atomic writes.
//!
//! Each key is stored as one JSON text file under a base directory.
//! Writes go through a temporary file followed by an atomic rename, so a
//! crash mid-write never leaves a half-written value behind.

use anyhow::{Context, Result};
use async_trait::async_trait;
use mentor_core::storage::KeyValueStore;
use std::path::{Path, PathBuf};
use tokio::fs;

/// A `KeyValueStore` storing one file per key.
///
/// Directory layout:
/// ```text
/// base_dir/
/// ├── chat_history.json
/// ├── assistant_session.json
/// └── rate_limit_fp1-ab12....json
/// ```
pub struct JsonFileStore {
    base_dir: PathBuf,
}

impl JsonFileStore {
    /// Creates a store rooted at the given directory.
    ///
    /// The directory is created lazily on the first write.
    pub fn new(base_dir: impl AsRef<Path>) -> Self {
        Self {
            base_dir: base_dir.as_ref().to_path_buf(),
        }
    }

    /// Creates a store at the default location (`~/.mentor/storage`).
    ///
    /// # Errors
    ///
    /// Returns an error if the home directory cannot be determined.
    pub fn default_location() -> Result<Self> {
        let home = dirs::home_dir().context("Failed to get home directory")?;
        Ok(Self::new(home.join(".mentor").join("storage")))
    }

    /// Returns the file path for a given key.
    ///
    /// Key characters outside `[A-Za-z0-9._-]` are replaced so namespaced
    /// keys like `rate_limit:fp1-...` map to safe file names.
    fn file_path(&self, key: &str) -> PathBuf {
        let safe: String = key
            .chars()
            .map(|c| {
                if c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-') {
                    c
                } else {
                    '_'
                }
            })
            .collect();
        self.base_dir.join(format!("{safe}.json"))
    }
}

#[async_trait]
impl KeyValueStore for JsonFileStore {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        let path = self.file_path(key);
        match fs::read_to_string(&path).await {
            Ok(content) => Ok(Some(content)),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(err) => Err(err).with_context(|| format!("Failed to read {}", path.display())),
        }
    }

    async fn set(&self, key: &str, value: &str) -> Result<()> {
        fs::create_dir_all(&self.base_dir)
            .await
            .context("Failed to create storage directory")?;

        let path = self.file_path(key);
        let file_name = path
            .file_name()
            .context("Storage path has no file name")?
            .to_string_lossy()
            .into_owned();
        let tmp_path = self.base_dir.join(format!(".{file_name}.tmp"));

        fs::write(&tmp_path, value)
            .await
            .with_context(|| format!("Failed to write {}", tmp_path.display()))?;

        // Atomic rename
        fs::rename(&tmp_path, &path)
            .await
            .with_context(|| format!("Failed to rename into {}", path.display()))?;

        Ok(())
    }

    async fn remove(&self, key: &str) -> Result<()> {
        let path = self.file_path(key);
        match fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(err) => Err(err).with_context(|| format!("Failed to remove {}", path.display())),
        }
    }
}
