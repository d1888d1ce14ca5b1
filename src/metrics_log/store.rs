//! Durable key-value storage for the metrics log snapshot.
//!
//! The log persists one JSON document under a fixed key. [`FileStore`] keeps
//! each key in its own file (default: `~/.cache/muninn/<key>.json`);
//! [`MemoryStore`] keeps everything in-process.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, PoisonError};

use async_trait::async_trait;

use crate::{MuninnError, Result};

/// Key-value storage used to persist the metrics log.
#[async_trait]
pub trait MetricsStore: Send + Sync {
    /// Read the value stored under `key`. `Ok(None)` when nothing is stored.
    async fn load(&self, key: &str) -> Result<Option<String>>;

    /// Replace the value stored under `key`.
    async fn save(&self, key: &str, value: &str) -> Result<()>;
}

/// In-process store. Contents are lost when the store is dropped.
#[derive(Debug, Default)]
pub struct MemoryStore {
    values: Mutex<HashMap<String, String>>,
}

impl MemoryStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Synchronous peek, handy in tests.
    pub fn get(&self, key: &str) -> Option<String> {
        self.values
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(key)
            .cloned()
    }
}

#[async_trait]
impl MetricsStore for MemoryStore {
    async fn load(&self, key: &str) -> Result<Option<String>> {
        Ok(self.get(key))
    }

    async fn save(&self, key: &str, value: &str) -> Result<()> {
        self.values
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(key.to_owned(), value.to_owned());
        Ok(())
    }
}

/// File-backed store: one `<key>.json` file per key inside a directory.
#[derive(Debug, Clone)]
pub struct FileStore {
    dir: PathBuf,
}

impl FileStore {
    /// Store files under `dir`. The directory is created on first save.
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Directory holding the stored files.
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Path of the file backing `key`.
    pub fn path_for(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{key}.json"))
    }
}

impl Default for FileStore {
    fn default() -> Self {
        Self::new(default_store_dir())
    }
}

/// Suffix counter for tmp files written by [`FileStore::save`].
static TMP_SEQ: AtomicU64 = AtomicU64::new(0);

/// Default store directory: `~/.cache/muninn`.
fn default_store_dir() -> PathBuf {
    dirs::cache_dir()
        .unwrap_or_else(|| PathBuf::from(".cache"))
        .join("muninn")
}

#[async_trait]
impl MetricsStore for FileStore {
    async fn load(&self, key: &str) -> Result<Option<String>> {
        let path = self.path_for(key);
        match tokio::fs::read_to_string(&path).await {
            Ok(content) => Ok(Some(content)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(MuninnError::Storage(format!(
                "failed to read {}: {e}",
                path.display()
            ))),
        }
    }

    async fn save(&self, key: &str, value: &str) -> Result<()> {
        tokio::fs::create_dir_all(&self.dir).await.map_err(|e| {
            MuninnError::Storage(format!(
                "failed to create store dir {}: {e}",
                self.dir.display()
            ))
        })?;

        // Write to tmp file first, then rename for atomicity. Tmp names are
        // unique per write so concurrent saves never share one.
        let path = self.path_for(key);
        let seq = TMP_SEQ.fetch_add(1, Ordering::Relaxed);
        let tmp_path = self
            .dir
            .join(format!("{key}.json.{}.{seq}.tmp", std::process::id()));
        tokio::fs::write(&tmp_path, value).await.map_err(|e| {
            MuninnError::Storage(format!("failed to write {}: {e}", tmp_path.display()))
        })?;
        if let Err(e) = tokio::fs::rename(&tmp_path, &path).await {
            let _ = tokio::fs::remove_file(&tmp_path).await;
            return Err(MuninnError::Storage(format!(
                "failed to rename {} → {}: {e}",
                tmp_path.display(),
                path.display()
            )));
        }
        Ok(())
    }
}
