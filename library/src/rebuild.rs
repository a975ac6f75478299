//! Background library rebuild.
//!
//! A [`RebuildOrchestrator`] owns one worker task. Each trigger is queued and
//! answered with a ticket; the worker runs one rebuild at a time, folding
//! triggers that piled up meanwhile into a single run against the latest
//! persisted roots.
//!
//! ```text
//!  trigger ──► queue ──► worker ──► purge ─► load tracks ─► folders ─► albums
//!                                                       ─► artists ─► enrich ─► restart watcher
//! ```

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

use serde::Serialize;
use tokio::sync::{Mutex, mpsc, watch};
use tracing::{error, info, warn};

use crate::catalog::Catalog;
use crate::enrich::Enricher;
use crate::error::Result;
use crate::root_dirs::{RootDirectory, RootDirectorySet};
use crate::settings::RootDirSettings;
use crate::watch::LibraryWatcher;

/// The steps of a rebuild, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RebuildStep {
    Purge,
    LoadTracks,
    ProcessFolders,
    LoadAlbums,
    LoadArtists,
    Enrich,
    RestartWatcher,
}

impl fmt::Display for RebuildStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Purge => "purge",
            Self::LoadTracks => "load_tracks",
            Self::ProcessFolders => "process_folders",
            Self::LoadAlbums => "load_albums",
            Self::LoadArtists => "load_artists",
            Self::Enrich => "enrich",
            Self::RestartWatcher => "restart_watcher",
        };
        f.write_str(name)
    }
}

/// How a single step ended.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum StepResult {
    /// The step finished; `count` is step specific (tracks, albums, ...).
    Ok { count: usize },

    /// The step failed and was skipped.
    Failed { message: String },
}

/// Record of one executed step.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StepOutcome {
    pub step: RebuildStep,

    /// Enricher name for [`RebuildStep::Enrich`].
    pub detail: Option<String>,

    pub result: StepResult,
    pub elapsed_ms: u64,
}

/// What a rebuild did.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RebuildReport {
    /// Highest ticket covered by this run.
    pub ticket: u64,

    /// Roots the catalog and watcher were rebuilt against.
    pub roots: RootDirectorySet,

    /// Roots whose tracks were purged first.
    pub purged: Vec<RootDirectory>,

    /// Steps in execution order.
    pub steps: Vec<StepOutcome>,

    pub duration_ms: u64,
}

impl RebuildReport {
    fn new(ticket: u64, roots: RootDirectorySet, purged: Vec<RootDirectory>) -> Self {
        Self {
            ticket,
            roots,
            purged,
            steps: Vec::new(),
            duration_ms: 0,
        }
    }

    /// Steps that failed.
    pub fn failures(&self) -> impl Iterator<Item = &StepOutcome> {
        self.steps
            .iter()
            .filter(|s| matches!(s.result, StepResult::Failed { .. }))
    }

    /// Whether every step succeeded.
    pub fn is_clean(&self) -> bool {
        self.failures().next().is_none()
    }

    fn record(
        &mut self,
        step: RebuildStep,
        detail: Option<&str>,
        started: Instant,
        result: Result<usize>,
    ) {
        let elapsed_ms = started.elapsed().as_millis() as u64;
        let result = match result {
            Ok(count) => {
                info!("Rebuild step {step} done ({count}) in {elapsed_ms}ms");
                StepResult::Ok { count }
            }
            Err(e) => {
                error!("Rebuild step {step} failed: {e}");
                StepResult::Failed {
                    message: e.to_string(),
                }
            }
        };

        self.steps.push(StepOutcome {
            step,
            detail: detail.map(str::to_string),
            result,
            elapsed_ms,
        });
    }
}

/// Progress of the orchestrator.
#[derive(Debug, Clone, Default, Serialize)]
pub struct RebuildStatus {
    /// A rebuild is executing.
    pub running: bool,

    /// Highest ticket whose rebuild has finished.
    pub processed: u64,

    /// Report of the most recent rebuild.
    pub last_report: Option<RebuildReport>,
}

/// The collaborators a rebuild drives.
pub struct RebuildPipeline {
    settings: Arc<RootDirSettings>,
    catalog: Arc<dyn Catalog>,
    enrichers: Vec<Arc<dyn Enricher>>,
    watcher: Option<Arc<dyn LibraryWatcher>>,
    home: PathBuf,
}

impl RebuildPipeline {
    /// `home` is what the home sentinel resolves to.
    pub fn new(
        settings: Arc<RootDirSettings>,
        catalog: Arc<dyn Catalog>,
        home: impl AsRef<Path>,
    ) -> Self {
        Self {
            settings,
            catalog,
            enrichers: Vec::new(),
            watcher: None,
            home: home.as_ref().to_path_buf(),
        }
    }

    /// Add an enrichment pass; passes run in the order added.
    pub fn with_enricher(mut self, enricher: Arc<dyn Enricher>) -> Self {
        self.enrichers.push(enricher);
        self
    }

    /// Restart this watcher at the end of each rebuild.
    pub fn with_watcher(mut self, watcher: Arc<dyn LibraryWatcher>) -> Self {
        self.watcher = Some(watcher);
        self
    }

    /// Run every step once.
    ///
    /// A failing step is logged and recorded; later steps still run. Derived
    /// indexes and the watcher restart always follow the track load.
    pub async fn run(&self, request: RebuildRequest) -> RebuildReport {
        let started = Instant::now();
        info!("Rebuilding library...");

        let roots = match self.settings.snapshot().await {
            Ok(roots) => roots,
            Err(e) => {
                warn!("Cannot read root directories ({e}), using the requested set");
                request.final_dirs
            }
        };
        let resolved_roots = roots.resolve(&self.home);
        let purge: Vec<PathBuf> = request
            .purge_dirs
            .iter()
            .map(|dir| dir.resolve(&self.home))
            .collect();

        let mut report = RebuildReport::new(request.ticket, roots, request.purge_dirs);

        let t = Instant::now();
        let result = self.catalog.remove_tracks_under_dirs(&purge).await;
        report.record(RebuildStep::Purge, None, t, result);

        let t = Instant::now();
        let result = self
            .catalog
            .load_all_tracks(&resolved_roots)
            .await
            .map(|loaded| loaded.tracks_loaded);
        report.record(RebuildStep::LoadTracks, None, t, result);

        let t = Instant::now();
        let result = self.catalog.process_folders().await;
        report.record(RebuildStep::ProcessFolders, None, t, result);

        let t = Instant::now();
        let result = self.catalog.load_albums().await;
        report.record(RebuildStep::LoadAlbums, None, t, result);

        let t = Instant::now();
        let result = self.catalog.load_artists().await;
        report.record(RebuildStep::LoadArtists, None, t, result);

        for enricher in &self.enrichers {
            let t = Instant::now();
            let result = enricher.run().await;
            report.record(RebuildStep::Enrich, Some(enricher.name()), t, result);
        }

        if let Some(watcher) = &self.watcher {
            let t = Instant::now();
            let result = watcher
                .restart(&resolved_roots)
                .await
                .map(|()| resolved_roots.len());
            report.record(RebuildStep::RestartWatcher, None, t, result);
        }

        report.duration_ms = started.elapsed().as_millis() as u64;
        let failures = report.failures().count();
        if failures == 0 {
            info!("Rebuilding library... done in {}ms", report.duration_ms);
        } else {
            warn!(
                "Rebuilding library... done in {}ms with {failures} failed steps",
                report.duration_ms
            );
        }
        report
    }
}

/// A queued rebuild.
#[derive(Debug, Clone)]
pub struct RebuildRequest {
    pub ticket: u64,
    pub purge_dirs: Vec<RootDirectory>,

    /// Roots as of the trigger; used only if the persisted roots cannot be read.
    pub final_dirs: RootDirectorySet,
}

impl RebuildRequest {
    /// Fold a later request into this one.
    fn merge(&mut self, later: RebuildRequest) {
        self.ticket = self.ticket.max(later.ticket);
        for dir in later.purge_dirs {
            if !self.purge_dirs.contains(&dir) {
                self.purge_dirs.push(dir);
            }
        }
        self.final_dirs = later.final_dirs;
    }
}

/// Single-flight rebuild runner.
pub struct RebuildOrchestrator {
    tx: mpsc::UnboundedSender<RebuildRequest>,
    next_ticket: AtomicU64,
    status: watch::Receiver<RebuildStatus>,
    library_lock: Arc<Mutex<()>>,
}

impl RebuildOrchestrator {
    /// Start the worker task. Must be called from within a tokio runtime.
    pub fn spawn(pipeline: RebuildPipeline) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        let (status_tx, status) = watch::channel(RebuildStatus::default());
        let library_lock = Arc::new(Mutex::new(()));

        tokio::spawn(run_worker(
            Arc::new(pipeline),
            rx,
            status_tx,
            library_lock.clone(),
        ));

        Self {
            tx,
            next_ticket: AtomicU64::new(1),
            status,
            library_lock,
        }
    }

    /// Queue a rebuild and return its ticket without waiting.
    pub fn trigger(&self, purge_dirs: Vec<RootDirectory>, final_dirs: RootDirectorySet) -> u64 {
        let ticket = self.next_ticket.fetch_add(1, Ordering::SeqCst);
        let request = RebuildRequest {
            ticket,
            purge_dirs,
            final_dirs,
        };

        if self.tx.send(request).is_err() {
            error!("Rebuild worker is gone, dropping rebuild #{ticket}");
        } else {
            info!("Queued library rebuild #{ticket}");
        }
        ticket
    }

    /// Current progress.
    pub fn status(&self) -> RebuildStatus {
        self.status.borrow().clone()
    }

    /// Watch progress changes.
    pub fn subscribe(&self) -> watch::Receiver<RebuildStatus> {
        self.status.clone()
    }

    /// Wait until the rebuild covering `ticket` has finished and return its
    /// report. Returns `None` if the worker stopped first.
    pub async fn wait_for(&self, ticket: u64) -> Option<RebuildReport> {
        let mut status = self.status.clone();
        let done = status.wait_for(|s| s.processed >= ticket).await.ok()?;
        done.last_report.clone()
    }

    /// Lock held for the whole of every rebuild. Other catalog writers take
    /// it to stay out of a rebuild's way.
    pub fn library_lock(&self) -> Arc<Mutex<()>> {
        self.library_lock.clone()
    }
}

async fn run_worker(
    pipeline: Arc<RebuildPipeline>,
    mut rx: mpsc::UnboundedReceiver<RebuildRequest>,
    status: watch::Sender<RebuildStatus>,
    library_lock: Arc<Mutex<()>>,
) {
    while let Some(mut request) = rx.recv().await {
        while let Ok(later) = rx.try_recv() {
            request.merge(later);
        }

        let ticket = request.ticket;
        let roots = request.final_dirs.clone();
        let purged = request.purge_dirs.clone();
        status.send_modify(|s| s.running = true);

        let _guard = library_lock.lock().await;
        let run = tokio::spawn({
            let pipeline = pipeline.clone();
            async move { pipeline.run(request).await }
        });
        let report = match run.await {
            Ok(report) => report,
            Err(e) => {
                error!("Rebuild #{ticket} aborted: {e}");
                let mut report = RebuildReport::new(ticket, roots, purged);
                report.steps.push(StepOutcome {
                    step: RebuildStep::Purge,
                    detail: Some("aborted".to_string()),
                    result: StepResult::Failed {
                        message: e.to_string(),
                    },
                    elapsed_ms: 0,
                });
                report
            }
        };

        status.send_modify(|s| {
            s.running = false;
            s.processed = s.processed.max(ticket);
            s.last_report = Some(report);
        });
    }

    info!("Rebuild worker stopped");
}
