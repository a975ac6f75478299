//! Server wiring.

use std::sync::Arc;

use anyhow::Context;
use medley_directory_watcher::DirectoryWatcher;
use medley_library::{
    ArtworkEnricher, JsonSettingsStore, MemoryCatalog, RebuildOrchestrator, RebuildPipeline,
    RootDirSettings, WatcherHandle, spawn_live_updates,
};
use tokio::task::JoinHandle;
use tracing::info;

use crate::config::ServerConfig;
use crate::handler::SettingsHandler;

/// A running library: settings, catalog, watcher and rebuild worker.
pub struct App {
    handler: Arc<SettingsHandler>,
    live_updates: JoinHandle<()>,
}

impl App {
    /// Open the settings, start the background tasks and queue the initial
    /// library build. Must be called from within a tokio runtime.
    pub async fn start(config: &ServerConfig) -> anyhow::Result<Self> {
        let settings_path = config.settings_path();
        let store = JsonSettingsStore::open(&settings_path)
            .await
            .with_context(|| format!("failed to open settings {}", settings_path.display()))?;
        let settings = Arc::new(RootDirSettings::new(Arc::new(store)));

        let catalog = Arc::new(MemoryCatalog::new().with_excludes(config.exclude_patterns.clone()));
        let watcher = Arc::new(
            WatcherHandle::new(DirectoryWatcher::new())
                .with_mode(config.watch_mode)
                .with_excludes(config.exclude_patterns.clone()),
        );
        let events = watcher.events();

        let pipeline = RebuildPipeline::new(settings.clone(), catalog.clone(), &config.home_dir)
            .with_enricher(Arc::new(ArtworkEnricher::new(catalog.clone())))
            .with_watcher(watcher);
        let orchestrator = Arc::new(RebuildOrchestrator::spawn(pipeline));
        let live_updates =
            spawn_live_updates(events, catalog.clone(), orchestrator.library_lock());

        let roots = settings.snapshot().await?;
        info!("Loaded {} root directories from {}", roots.len(), settings_path.display());
        orchestrator.trigger(Vec::new(), roots);

        Ok(Self {
            handler: Arc::new(SettingsHandler::new(settings, orchestrator, catalog)),
            live_updates,
        })
    }

    pub fn handler(&self) -> Arc<SettingsHandler> {
        self.handler.clone()
    }
}

impl Drop for App {
    fn drop(&mut self) {
        self.live_updates.abort();
    }
}
