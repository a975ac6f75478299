//! Persistence of the configured root directories.
//!
//! [`SettingsStore`] is the storage seam; [`RootDirSettings`] owns the shared
//! root set on top of it and is the only writer.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::fs;
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, error, info};

use crate::error::{LibraryError, Result};
use crate::reconcile::{Reconciliation, reconcile};
use crate::root_dirs::{ChangeRequest, RootDirectory, RootDirectorySet};

/// Storage backend for the root directory rows.
#[async_trait]
pub trait SettingsStore: Send + Sync {
    /// The stored roots, in insertion order, exactly as persisted.
    async fn root_dirs(&self) -> Result<Vec<RootDirectory>>;

    /// Append roots that are not already stored.
    async fn add_root_dirs(&self, dirs: &[RootDirectory]) -> Result<()>;

    /// Remove every stored occurrence of the given roots. Unknown roots are ignored.
    async fn remove_root_dirs(&self, dirs: &[RootDirectory]) -> Result<()>;

    /// Make the stored roots exactly `dirs`. On error the stored roots must
    /// be left as they were.
    ///
    /// The default adds the new roots first and then removes the stale ones,
    /// withdrawing the additions again if the removal fails. Surviving roots
    /// keep their stored position.
    async fn replace_root_dirs(&self, dirs: &[RootDirectory]) -> Result<()> {
        let current = self.root_dirs().await?;
        let added = with_removed(dirs, &current);
        let stale = with_removed(&current, dirs);

        if !added.is_empty() {
            self.add_root_dirs(&added).await?;
        }
        if !stale.is_empty()
            && let Err(e) = self.remove_root_dirs(&stale).await
        {
            if !added.is_empty()
                && let Err(undo) = self.remove_root_dirs(&added).await
            {
                error!("Failed to withdraw roots added before a failed removal: {undo}");
            }
            return Err(e);
        }
        Ok(())
    }
}

fn with_added(current: &[RootDirectory], dirs: &[RootDirectory]) -> Vec<RootDirectory> {
    let mut next = current.to_vec();
    for dir in dirs {
        if !next.contains(dir) {
            next.push(dir.clone());
        }
    }
    next
}

fn with_removed(current: &[RootDirectory], dirs: &[RootDirectory]) -> Vec<RootDirectory> {
    current
        .iter()
        .filter(|d| !dirs.contains(d))
        .cloned()
        .collect()
}

/// In-memory settings store.
#[derive(Debug, Default)]
pub struct MemorySettingsStore {
    dirs: RwLock<Vec<RootDirectory>>,
}

impl MemorySettingsStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a store pre-populated with roots, stored as given.
    pub fn with_dirs(dirs: Vec<RootDirectory>) -> Self {
        Self {
            dirs: RwLock::new(dirs),
        }
    }
}

#[async_trait]
impl SettingsStore for MemorySettingsStore {
    async fn root_dirs(&self) -> Result<Vec<RootDirectory>> {
        Ok(self.dirs.read().await.clone())
    }

    async fn add_root_dirs(&self, dirs: &[RootDirectory]) -> Result<()> {
        let mut guard = self.dirs.write().await;
        *guard = with_added(&guard, dirs);
        Ok(())
    }

    async fn remove_root_dirs(&self, dirs: &[RootDirectory]) -> Result<()> {
        let mut guard = self.dirs.write().await;
        *guard = with_removed(&guard, dirs);
        Ok(())
    }

    async fn replace_root_dirs(&self, dirs: &[RootDirectory]) -> Result<()> {
        *self.dirs.write().await = dirs.to_vec();
        Ok(())
    }
}

/// On-disk layout of the settings file.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct SettingsFile {
    #[serde(default)]
    root_dirs: Vec<RootDirectory>,
}

/// Settings store persisted as a JSON file.
///
/// Every write replaces the file atomically through a temp file and rename.
/// The in-memory copy only changes once the write has succeeded.
pub struct JsonSettingsStore {
    path: PathBuf,
    state: RwLock<SettingsFile>,
}

impl JsonSettingsStore {
    /// Open the store at `path`, creating parent directories as needed.
    /// A missing file means no roots are configured yet.
    pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).await.map_err(|e| {
                LibraryError::Persistence(format!("{}: {e}", parent.display()))
            })?;
        }

        let state = match fs::read_to_string(&path).await {
            Ok(content) => serde_json::from_str(&content).map_err(|e| {
                LibraryError::Persistence(format!("{}: {e}", path.display()))
            })?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => SettingsFile::default(),
            Err(e) => {
                return Err(LibraryError::Persistence(format!(
                    "{}: {e}",
                    path.display()
                )));
            }
        };

        info!(
            "Loaded settings from {} ({} root directories)",
            path.display(),
            state.root_dirs.len()
        );

        Ok(Self {
            path,
            state: RwLock::new(state),
        })
    }

    /// Path of the backing file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn persist(&self, file: &SettingsFile) -> Result<()> {
        let content = serde_json::to_string_pretty(file)?;

        let temp_path = self.path.with_extension("json.tmp");
        fs::write(&temp_path, &content)
            .await
            .map_err(|e| LibraryError::Persistence(format!("{}: {e}", temp_path.display())))?;

        fs::rename(&temp_path, &self.path)
            .await
            .map_err(|e| LibraryError::Persistence(format!("{}: {e}", self.path.display())))?;

        debug!("Saved settings to {}", self.path.display());
        Ok(())
    }

    async fn update(&self, change: impl FnOnce(&[RootDirectory]) -> Vec<RootDirectory>) -> Result<()> {
        let mut guard = self.state.write().await;
        let next = SettingsFile {
            root_dirs: change(&guard.root_dirs),
        };
        self.persist(&next).await?;
        *guard = next;
        Ok(())
    }
}

#[async_trait]
impl SettingsStore for JsonSettingsStore {
    async fn root_dirs(&self) -> Result<Vec<RootDirectory>> {
        Ok(self.state.read().await.root_dirs.clone())
    }

    async fn add_root_dirs(&self, dirs: &[RootDirectory]) -> Result<()> {
        self.update(|current| with_added(current, dirs)).await
    }

    async fn remove_root_dirs(&self, dirs: &[RootDirectory]) -> Result<()> {
        self.update(|current| with_removed(current, dirs)).await
    }

    async fn replace_root_dirs(&self, dirs: &[RootDirectory]) -> Result<()> {
        self.update(|_| dirs.to_vec()).await
    }
}

/// Owner of the configured root set.
///
/// Reads and read-reconcile-write cycles are serialized, so a snapshot never
/// observes a half-applied change and concurrent updates each reconcile
/// against the result of the previous one.
pub struct RootDirSettings {
    store: Arc<dyn SettingsStore>,
    lock: Mutex<()>,
}

impl RootDirSettings {
    /// Wrap a settings store.
    pub fn new(store: Arc<dyn SettingsStore>) -> Self {
        Self {
            store,
            lock: Mutex::new(()),
        }
    }

    /// A consistent view of the configured roots.
    pub async fn snapshot(&self) -> Result<RootDirectorySet> {
        let _guard = self.lock.lock().await;
        Ok(RootDirectorySet::from_dirs(self.store.root_dirs().await?))
    }

    /// Reconcile `request` against the stored roots and persist the result.
    ///
    /// Nothing is written when the reconciliation reports no change. On a
    /// persistence error the stored roots are unchanged.
    pub async fn apply(&self, request: &ChangeRequest) -> Result<Reconciliation> {
        let _guard = self.lock.lock().await;

        let stored = self.store.root_dirs().await?;
        let previous = RootDirectorySet::from_dirs(stored.clone());
        let result = reconcile(&previous, request);

        if result.unchanged {
            debug!("Root directories unchanged");
            return Ok(result);
        }

        if stored.as_slice() != result.final_dirs.as_slice() {
            self.store.replace_root_dirs(result.final_dirs.as_slice()).await?;
        }

        info!(
            "Root directories updated: [{}] (purging {})",
            result.final_dirs.to_strings().join(", "),
            result.purge_dirs.len()
        );
        Ok(result)
    }
}
