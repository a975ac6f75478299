//! Glue between the directory watcher and the library.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::{Mutex, RwLock, mpsc};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use medley_directory_watcher::{
    DirectoryConfig, DirectoryWatcher, EventBatch, FileEvent, WatchMode,
};

use crate::catalog::{Catalog, MemoryCatalog};
use crate::error::Result;

/// Time to wait for more events before applying a batch.
const LIVE_UPDATE_DEBOUNCE: Duration = Duration::from_millis(200);

/// The filesystem watcher as the rebuild pipeline sees it.
#[async_trait]
pub trait LibraryWatcher: Send + Sync {
    /// Make the watch set exactly `roots`.
    async fn restart(&self, roots: &[PathBuf]) -> Result<()>;
}

/// [`LibraryWatcher`] backed by a [`DirectoryWatcher`].
pub struct WatcherHandle {
    watcher: Mutex<DirectoryWatcher>,
    events: Arc<RwLock<mpsc::Receiver<FileEvent>>>,
    mode: WatchMode,
    exclude_patterns: Vec<String>,
}

impl WatcherHandle {
    pub fn new(watcher: DirectoryWatcher) -> Self {
        let events = watcher.events().clone();
        Self {
            watcher: Mutex::new(watcher),
            events,
            mode: WatchMode::Realtime,
            exclude_patterns: Vec::new(),
        }
    }

    /// Watch mode applied to every root.
    pub fn with_mode(mut self, mode: WatchMode) -> Self {
        self.mode = mode;
        self
    }

    /// Extra exclude patterns applied to every root.
    pub fn with_excludes(mut self, patterns: Vec<String>) -> Self {
        self.exclude_patterns = patterns;
        self
    }

    /// Receiver for the watcher's events.
    pub fn events(&self) -> Arc<RwLock<mpsc::Receiver<FileEvent>>> {
        self.events.clone()
    }

    /// Directories currently registered with the OS watcher.
    pub async fn watched_paths(&self) -> Vec<PathBuf> {
        self.watcher.lock().await.watched_paths().to_vec()
    }

    fn config_for(&self, root: &Path) -> DirectoryConfig {
        self.exclude_patterns.iter().fold(
            DirectoryConfig::new(root).with_mode(self.mode),
            |config, pattern| config.exclude(pattern.clone()),
        )
    }
}

#[async_trait]
impl LibraryWatcher for WatcherHandle {
    async fn restart(&self, roots: &[PathBuf]) -> Result<()> {
        let configs = roots.iter().map(|root| self.config_for(root)).collect();
        self.watcher.lock().await.restart(configs).await?;
        Ok(())
    }
}

/// Feed watcher events into the catalog until the event channel closes.
///
/// Events are debounced into batches. Each batch holds `library_lock`
/// while it runs so that it never interleaves with a rebuild.
pub fn spawn_live_updates(
    events: Arc<RwLock<mpsc::Receiver<FileEvent>>>,
    catalog: Arc<MemoryCatalog>,
    library_lock: Arc<Mutex<()>>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        loop {
            let Some(batch) = next_batch(&events).await else {
                info!("Watcher event channel closed, live updates stopped");
                return;
            };

            let _guard = library_lock.lock().await;
            let mut changed = 0;
            for event in batch.events() {
                if catalog.apply_event(event).await {
                    changed += 1;
                }
            }
            if changed == 0 {
                continue;
            }

            debug!("Applied {changed} live track changes");
            if let Err(e) = catalog.process_folders().await {
                warn!("Failed to refresh folders after live update: {e}");
            }
            if let Err(e) = catalog.load_albums().await {
                warn!("Failed to refresh albums after live update: {e}");
            }
            if let Err(e) = catalog.load_artists().await {
                warn!("Failed to refresh artists after live update: {e}");
            }
        }
    })
}

async fn next_batch(events: &RwLock<mpsc::Receiver<FileEvent>>) -> Option<EventBatch> {
    let mut rx = events.write().await;
    let first = rx.recv().await?;

    tokio::time::sleep(LIVE_UPDATE_DEBOUNCE).await;

    let mut batch = EventBatch::new();
    batch.push(first);
    while let Ok(event) = rx.try_recv() {
        batch.push(event);
    }
    Some(batch)
}
