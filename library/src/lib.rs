//! # Medley Library
//!
//! Root directory configuration and catalog rebuilds for the medley server.
//!
//! An operator edits the set of root directories; [`reconcile`] decides the
//! new set and what must be purged, [`RootDirSettings`] persists it, and the
//! [`RebuildOrchestrator`] rebuilds the catalog in the background, one run at
//! a time.
//!
//! ```text
//! ChangeRequest ──► RootDirSettings::apply ──► Reconciliation
//!                         │ (reconcile)              │
//!                         ▼                          ▼
//!                   SettingsStore          RebuildOrchestrator::trigger
//!                                                    │
//!                                                    ▼
//!                                    Catalog ─► Enricher ─► LibraryWatcher
//! ```

pub mod catalog;
pub mod enrich;
pub mod error;
pub mod rebuild;
pub mod reconcile;
pub mod root_dirs;
pub mod settings;
pub mod track;
pub mod watch;

pub use catalog::{Catalog, CatalogStats, LoadReport, MemoryCatalog};
pub use enrich::{ArtworkEnricher, Enricher};
pub use error::{LibraryError, Result};
pub use rebuild::{
    RebuildOrchestrator, RebuildPipeline, RebuildReport, RebuildRequest, RebuildStatus,
    RebuildStep, StepOutcome, StepResult,
};
pub use reconcile::{Reconciliation, reconcile};
pub use root_dirs::{ChangeRequest, HOME_SENTINEL, RootDirectory, RootDirectorySet};
pub use settings::{JsonSettingsStore, MemorySettingsStore, RootDirSettings, SettingsStore};
pub use track::{Album, Artist, Folder, Track};
pub use watch::{LibraryWatcher, WatcherHandle, spawn_live_updates};
