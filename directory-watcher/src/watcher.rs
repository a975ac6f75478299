//! OS-level watching of the root directories.

use std::path::PathBuf;
use std::sync::Arc;

use notify::{RecommendedWatcher, RecursiveMode, Watcher};
use tokio::sync::{RwLock, mpsc};
use tracing::{debug, error, info, warn};

use crate::config::DirectoryConfig;
use crate::error::Result;
use crate::event::{FileEvent, FileEventKind};

/// Capacity of the event channel between the notify callback and consumers.
const EVENT_CHANNEL_CAPACITY: usize = 1000;

/// Watches a set of root directories and forwards changes as [`FileEvent`]s.
///
/// The set is replaced wholesale with [`DirectoryWatcher::restart`]; the
/// event channel survives restarts so consumers subscribe once.
pub struct DirectoryWatcher {
    roots: Arc<RwLock<Vec<DirectoryConfig>>>,
    notify: Option<RecommendedWatcher>,
    watched: Vec<PathBuf>,
    event_tx: mpsc::Sender<FileEvent>,
    event_rx: Arc<RwLock<mpsc::Receiver<FileEvent>>>,
}

impl DirectoryWatcher {
    pub fn new() -> Self {
        let (event_tx, event_rx) = mpsc::channel(EVENT_CHANNEL_CAPACITY);

        Self {
            roots: Arc::new(RwLock::new(Vec::new())),
            notify: None,
            watched: Vec::new(),
            event_tx,
            event_rx: Arc::new(RwLock::new(event_rx)),
        }
    }

    /// Drop the current watches and watch `configs` instead.
    ///
    /// Roots that do not exist are skipped with a warning, as are roots the
    /// OS refuses to watch; the rest are still watched. Only a failure to
    /// create the OS watcher itself is an error.
    pub async fn restart(&mut self, configs: Vec<DirectoryConfig>) -> Result<()> {
        self.stop();

        let configs: Vec<DirectoryConfig> = configs
            .into_iter()
            .filter(|config| {
                let exists = config.path.is_dir();
                if !exists {
                    warn!("Not watching {}: directory does not exist", config.path.display());
                }
                exists
            })
            .collect();
        *self.roots.write().await = configs.clone();

        if !configs.iter().any(DirectoryConfig::is_realtime) {
            info!("Directory watcher idle ({} roots, none realtime)", configs.len());
            return Ok(());
        }

        let mut notify = self.create_notify()?;
        for config in configs.iter().filter(|c| c.is_realtime()) {
            let mode = if config.max_depth == Some(0) {
                RecursiveMode::NonRecursive
            } else {
                RecursiveMode::Recursive
            };

            match notify.watch(&config.path, mode) {
                Ok(()) => {
                    debug!("Watching {}", config.path.display());
                    self.watched.push(config.path.clone());
                }
                Err(e) => warn!("Failed to watch {}: {e}", config.path.display()),
            }
        }

        self.notify = Some(notify);
        info!("Directory watcher watching {} roots", self.watched.len());
        Ok(())
    }

    /// Drop every watch. Events already queued stay in the channel.
    pub fn stop(&mut self) {
        if self.notify.take().is_some() {
            debug!("Directory watcher stopped");
        }
        self.watched.clear();
    }

    pub fn is_running(&self) -> bool {
        self.notify.is_some()
    }

    /// Receiver for change events. Shared across restarts.
    pub fn events(&self) -> &Arc<RwLock<mpsc::Receiver<FileEvent>>> {
        &self.event_rx
    }

    /// Roots registered with the OS watcher.
    pub fn watched_paths(&self) -> &[PathBuf] {
        &self.watched
    }

    pub async fn stats(&self) -> WatcherStats {
        WatcherStats {
            roots: self.roots.read().await.len(),
            realtime_watches: self.watched.len(),
        }
    }

    fn create_notify(&self) -> Result<RecommendedWatcher> {
        let event_tx = self.event_tx.clone();
        let roots = self.roots.clone();

        let notify = notify::recommended_watcher(
            move |res: std::result::Result<notify::Event, notify::Error>| {
                let event = match res {
                    Ok(event) => event,
                    Err(e) => {
                        error!("Watch error: {e}");
                        return;
                    }
                };

                let kind = FileEventKind::from(event.kind);
                if kind == FileEventKind::Ignored {
                    return;
                }

                // The roots guard must be gone before a blocking send.
                let events: Vec<FileEvent> = {
                    let roots = roots.blocking_read();
                    event
                        .paths
                        .into_iter()
                        .filter(|path| {
                            !roots
                                .iter()
                                .any(|c| path.starts_with(&c.path) && c.should_exclude(path))
                        })
                        .map(|path| FileEvent::new(kind, path))
                        .collect()
                };

                for file_event in events {
                    if event_tx.blocking_send(file_event).is_err() {
                        debug!("Event receiver dropped");
                        return;
                    }
                }
            },
        )?;
        Ok(notify)
    }
}

impl Default for DirectoryWatcher {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WatcherStats {
    /// Roots that exist and are configured.
    pub roots: usize,

    /// Roots registered with the OS watcher.
    pub realtime_watches: usize,
}
