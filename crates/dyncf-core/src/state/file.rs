// # File State Store
//
// File-based implementation of StateStore with crash recovery.
//
// ## Crash Recovery
//
// - Atomic writes: Uses write-then-rename for atomicity
// - Corruption detection: Validates JSON on load
// - Automatic backup: Keeps .backup of last known good state
// - Recovery: Falls back to backup if corruption detected
//
// ## File Format
//
// A flat JSON object of string values:
//
// ```json
// {
//   "previous_ip": "203.0.113.7"
// }
// ```

use async_trait::async_trait;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tokio::sync::RwLock;

use crate::Error;
use crate::traits::state_store::StateStore;

/// File-based state store with crash recovery
///
/// Every `set` is written through to disk before it returns.
///
/// # Example
///
/// ```rust,no_run
/// use dyncf_core::state::FileStateStore;
/// use dyncf_core::traits::StateStore;
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let store = FileStateStore::new("/app/logs/config.json").await?;
///
///     store.set("previous_ip", "203.0.113.7").await?;
///     assert_eq!(store.get("previous_ip").await?, Some("203.0.113.7".to_string()));
///
///     Ok(())
/// }
/// ```
#[derive(Debug)]
pub struct FileStateStore {
    path: PathBuf,
    state: Arc<RwLock<FileState>>,
}

#[derive(Debug)]
struct FileState {
    values: BTreeMap<String, String>,
    dirty: bool,
}

impl FileStateStore {
    /// Create or load a file state store
    ///
    /// This will:
    /// 1. Create parent directories if needed
    /// 2. Try to load the existing state file
    /// 3. If it is corrupted, load the backup instead
    /// 4. If both fail, start with empty state
    pub async fn new<P: AsRef<Path>>(path: P) -> Result<Self, Error> {
        let path = path.as_ref().to_path_buf();

        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
            && !parent.exists()
        {
            fs::create_dir_all(parent).await.map_err(|e| {
                Error::config(format!(
                    "Cannot create state directory {}: {}",
                    parent.display(),
                    e
                ))
            })?;
        }

        let values = Self::load_state_with_recovery(&path).await?;

        Ok(Self {
            path,
            state: Arc::new(RwLock::new(FileState {
                values,
                dirty: false,
            })),
        })
    }

    /// Path of the backing file
    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn load_state_with_recovery(path: &Path) -> Result<BTreeMap<String, String>, Error> {
        match Self::load_state(path).await {
            Ok(values) => {
                tracing::debug!("Loaded state from {}: {} keys", path.display(), values.len());
                Ok(values)
            }
            Err(Error::Json(e)) => {
                tracing::warn!(
                    "State file {} appears corrupted: {}. Attempting recovery from backup.",
                    path.display(),
                    e
                );

                let backup_path = Self::backup_path(path);
                if !backup_path.exists() {
                    tracing::warn!("No backup file found. Starting with empty state.");
                    return Ok(BTreeMap::new());
                }

                match Self::load_state(&backup_path).await {
                    Ok(values) => {
                        tracing::info!("Recovered state from backup: {} keys", values.len());
                        if let Err(restore_err) = Self::restore_from_backup(path, &backup_path).await {
                            tracing::error!(
                                "Failed to restore state file from backup: {}",
                                restore_err
                            );
                        }
                        Ok(values)
                    }
                    Err(backup_err) => {
                        tracing::error!(
                            "Backup also unreadable: {}. Starting with empty state.",
                            backup_err
                        );
                        Ok(BTreeMap::new())
                    }
                }
            }
            Err(e) => Err(e),
        }
    }

    async fn load_state(path: &Path) -> Result<BTreeMap<String, String>, Error> {
        if !path.exists() {
            tracing::debug!("State file does not exist: {}", path.display());
            return Ok(BTreeMap::new());
        }

        let content = fs::read_to_string(path).await.map_err(|e| {
            Error::state_store(format!("Failed to read state file {}: {}", path.display(), e))
        })?;

        if content.trim().is_empty() {
            return Ok(BTreeMap::new());
        }

        let values: BTreeMap<String, String> = serde_json::from_str(&content)?;
        Ok(values)
    }

    /// Write the given values atomically
    ///
    /// The previous file, if any, is copied to `.backup` just before the
    /// rename so a torn write can always be recovered.
    async fn write_state(&self, values: &BTreeMap<String, String>) -> Result<(), Error> {
        let json = serde_json::to_string_pretty(values)
            .map_err(|e| Error::state_store(format!("Failed to serialize state: {}", e)))?;

        let temp_path = self.temp_path();
        let io_err = |action: &str, e: std::io::Error| {
            Error::state_store(format!("Failed to {} {}: {}", action, temp_path.display(), e))
        };

        let mut file = fs::File::create(&temp_path)
            .await
            .map_err(|e| io_err("create", e))?;
        file.write_all(json.as_bytes())
            .await
            .map_err(|e| io_err("write", e))?;
        file.sync_all().await.map_err(|e| io_err("sync", e))?;
        drop(file);

        if self.path.exists()
            && let Err(e) = fs::copy(&self.path, Self::backup_path(&self.path)).await
        {
            tracing::warn!("Failed to back up {}: {}", self.path.display(), e);
        }

        fs::rename(&temp_path, &self.path)
            .await
            .map_err(|e| io_err(&format!("move into {}", self.path.display()), e))?;

        tracing::trace!("State written to {}", self.path.display());
        Ok(())
    }

    async fn restore_from_backup(path: &Path, backup_path: &Path) -> Result<(), Error> {
        fs::copy(backup_path, path).await.map_err(|e| {
            Error::state_store(format!(
                "Failed to restore from backup {} to {}: {}",
                backup_path.display(),
                path.display(),
                e
            ))
        })?;

        tracing::info!("Restored state file from backup");
        Ok(())
    }

    fn temp_path(&self) -> PathBuf {
        let mut temp = self.path.clone();
        temp.set_extension("tmp");
        temp
    }

    fn backup_path(path: &Path) -> PathBuf {
        let mut backup = path.to_path_buf();
        backup.set_extension("backup");
        backup
    }
}

#[async_trait]
impl StateStore for FileStateStore {
    async fn get(&self, key: &str) -> Result<Option<String>, Error> {
        let guard = self.state.read().await;
        Ok(guard.values.get(key).cloned())
    }

    async fn set(&self, key: &str, value: &str) -> Result<(), Error> {
        // Held across the write so concurrent sets land in order
        let mut guard = self.state.write().await;
        guard.values.insert(key.to_string(), value.to_string());
        guard.dirty = true;

        self.write_state(&guard.values).await?;
        guard.dirty = false;
        Ok(())
    }

    async fn keys(&self) -> Result<Vec<String>, Error> {
        let guard = self.state.read().await;
        Ok(guard.values.keys().cloned().collect())
    }

    async fn flush(&self) -> Result<(), Error> {
        let mut guard = self.state.write().await;
        if guard.dirty {
            self.write_state(&guard.values).await?;
            guard.dirty = false;
        }
        Ok(())
    }
}
