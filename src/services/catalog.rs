//! In-memory snapshot store with best-effort disk persistence.
//!
//! This is the only shared-mutable boundary in the gateway. Readers clone
//! an `Arc` to the current snapshot; `publish` swaps that `Arc` in one
//! write-lock critical section, so a reader sees either the whole old
//! catalog or the whole new one, never a mix.

use anyhow::{Context, Result};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::fs::{self, File};
use tokio::io::AsyncWriteExt;
use tokio::sync::RwLock;

use crate::models::CacheSnapshot;

pub struct CatalogStore {
    current: RwLock<Arc<CacheSnapshot>>,
    cache_file: PathBuf,
}

impl CatalogStore {
    /// Create a store serving the empty snapshot until the first publish.
    pub fn new(cache_file: impl Into<PathBuf>) -> Self {
        Self {
            current: RwLock::new(Arc::new(CacheSnapshot::empty())),
            cache_file: cache_file.into(),
        }
    }

    /// Latest published snapshot. Never blocks beyond the momentary lock.
    pub async fn current(&self) -> Arc<CacheSnapshot> {
        Arc::clone(&*self.current.read().await)
    }

    /// Atomically replace the current snapshot.
    pub async fn publish(&self, snapshot: CacheSnapshot) {
        let mut current = self.current.write().await;
        *current = Arc::new(snapshot);
    }

    /// Write the current snapshot to disk so a restart starts from the last
    /// good catalog. Write-to-temp then rename, so a crash mid-write never
    /// corrupts the existing file.
    pub async fn persist(&self) -> Result<()> {
        let snapshot = self.current().await;
        let body = serde_json::to_vec(&*snapshot)?;

        let tmp_path = self.cache_file.with_extension("json.tmp");
        let mut file = File::create(&tmp_path)
            .await
            .with_context(|| format!("failed to create {}", tmp_path.display()))?;
        file.write_all(&body).await?;
        file.sync_all().await?;
        drop(file);

        let _ = fs::remove_file(&self.cache_file).await;
        fs::rename(&tmp_path, &self.cache_file)
            .await
            .with_context(|| format!("failed to replace {}", self.cache_file.display()))?;

        Ok(())
    }

    /// Restore the last persisted snapshot, if one exists. Returns whether
    /// anything was loaded; a missing or unreadable file is not an error.
    pub async fn load_from_disk(&self) -> Result<bool> {
        let raw = match fs::read(&self.cache_file).await {
            Ok(raw) => raw,
            Err(_) => return Ok(false),
        };

        let snapshot: CacheSnapshot = serde_json::from_slice(&raw)
            .with_context(|| format!("corrupt cache file {}", self.cache_file.display()))?;
        self.publish(snapshot).await;
        Ok(true)
    }
}
