//! Settings and library handler for the server.
//!
//! Owns the root directory settings, the rebuild orchestrator and the
//! catalog, and answers the HTTP surface in terms of them.

use std::sync::Arc;

use medley_library::{
    CatalogStats, ChangeRequest, MemoryCatalog, RebuildOrchestrator, RebuildStatus,
    RootDirSettings,
};
use serde::Serialize;
use tracing::info;

use crate::error::ApiError;

/// Message returned when a directory update changes nothing.
pub const NOT_CHANGED_MSG: &str = "Not changed!";

/// Reply to a directory update.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum AddRootDirsResponse {
    /// The new root set; a rebuild has been queued.
    Updated { root_dirs: Vec<String> },

    /// The request re-selected what was already configured.
    NotChanged { msg: String },
}

/// Reply to a root directory listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RootDirsResponse {
    pub dirs: Vec<String>,
}

/// Reply to a manual rebuild request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RebuildAccepted {
    pub ticket: u64,
}

/// Catalog counts and rebuild progress.
#[derive(Debug, Clone, Serialize)]
pub struct LibraryStats {
    pub catalog: CatalogStats,
    pub rebuild: RebuildStatus,
}

/// Handler for settings and library operations.
pub struct SettingsHandler {
    settings: Arc<RootDirSettings>,
    orchestrator: Arc<RebuildOrchestrator>,
    catalog: Arc<MemoryCatalog>,
}

impl SettingsHandler {
    pub fn new(
        settings: Arc<RootDirSettings>,
        orchestrator: Arc<RebuildOrchestrator>,
        catalog: Arc<MemoryCatalog>,
    ) -> Self {
        Self {
            settings,
            orchestrator,
            catalog,
        }
    }

    pub fn orchestrator(&self) -> &RebuildOrchestrator {
        &self.orchestrator
    }

    pub fn catalog(&self) -> &MemoryCatalog {
        &self.catalog
    }

    /// Apply a `{ "new_dirs": [..], "removed": [..] }` body.
    ///
    /// The new root set is persisted before this returns; the rebuild runs
    /// in the background. Nothing is persisted or rebuilt on error.
    pub async fn add_root_dirs(&self, body: &[u8]) -> Result<AddRootDirsResponse, ApiError> {
        let request = ChangeRequest::from_json_slice(body)?;
        let result = self.settings.apply(&request).await?;

        if result.unchanged {
            return Ok(AddRootDirsResponse::NotChanged {
                msg: NOT_CHANGED_MSG.to_string(),
            });
        }

        let root_dirs = result.final_dirs.to_strings();
        let ticket = self
            .orchestrator
            .trigger(result.purge_dirs, result.final_dirs);
        info!("Root directories set to {root_dirs:?}, rebuild #{ticket} queued");

        Ok(AddRootDirsResponse::Updated { root_dirs })
    }

    /// The persisted root set.
    pub async fn get_root_dirs(&self) -> Result<RootDirsResponse, ApiError> {
        let dirs = self.settings.snapshot().await?;
        Ok(RootDirsResponse {
            dirs: dirs.to_strings(),
        })
    }

    /// Queue a full rescan of the current roots.
    pub async fn rebuild(&self) -> Result<RebuildAccepted, ApiError> {
        let roots = self.settings.snapshot().await?;
        let ticket = self.orchestrator.trigger(Vec::new(), roots);
        info!("Manual rebuild #{ticket} queued");
        Ok(RebuildAccepted { ticket })
    }

    pub async fn stats(&self) -> LibraryStats {
        LibraryStats {
            catalog: self.catalog.stats().await,
            rebuild: self.orchestrator.status(),
        }
    }
}
