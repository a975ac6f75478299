//! Enrichment passes that run once the catalog is stable.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use tracing::debug;

use crate::catalog::MemoryCatalog;
use crate::error::{LibraryError, Result};
use crate::rebuild::RebuildStep;

/// A pass over the rebuilt catalog.
#[async_trait]
pub trait Enricher: Send + Sync {
    /// Name used in logs and rebuild reports.
    fn name(&self) -> &str;

    /// Run the pass. Returns how many items were enriched.
    async fn run(&self) -> Result<usize>;
}

const COVER_STEMS: &[&str] = &["cover", "folder", "front", "album"];
const COVER_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "webp"];

/// Finds cover images next to tracks and records them in the catalog.
pub struct ArtworkEnricher {
    catalog: Arc<MemoryCatalog>,
}

impl ArtworkEnricher {
    pub fn new(catalog: Arc<MemoryCatalog>) -> Self {
        Self { catalog }
    }
}

fn is_cover_image(path: &Path) -> bool {
    let stem = path.file_stem().and_then(|s| s.to_str());
    let ext = path.extension().and_then(|e| e.to_str());

    match (stem, ext) {
        (Some(stem), Some(ext)) => {
            COVER_STEMS.iter().any(|s| stem.eq_ignore_ascii_case(s))
                && COVER_EXTENSIONS.iter().any(|e| ext.eq_ignore_ascii_case(e))
        }
        _ => false,
    }
}

/// First cover image in `folder` by name, or `None` when there is none or
/// the folder cannot be read.
fn find_cover(folder: &Path) -> Option<PathBuf> {
    let entries = match std::fs::read_dir(folder) {
        Ok(entries) => entries,
        Err(e) => {
            debug!("Cannot read {} for artwork: {e}", folder.display());
            return None;
        }
    };

    let mut covers: Vec<PathBuf> = entries
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|path| path.is_file() && is_cover_image(path))
        .collect();
    covers.sort();
    covers.into_iter().next()
}

#[async_trait]
impl Enricher for ArtworkEnricher {
    fn name(&self) -> &str {
        "artwork"
    }

    async fn run(&self) -> Result<usize> {
        let folders = self.catalog.track_folders().await;

        let found = tokio::task::spawn_blocking(move || {
            folders
                .into_iter()
                .map(|folder| {
                    let cover = find_cover(&folder);
                    (folder, cover)
                })
                .collect::<Vec<_>>()
        })
        .await
        .map_err(|e| LibraryError::step(RebuildStep::Enrich, e.to_string()))?;

        let mut enriched = 0;
        for (folder, cover) in found {
            let has_cover = cover.is_some();
            let updated = self.catalog.set_folder_artwork(&folder, cover).await;
            if has_cover {
                enriched += updated;
            }
        }

        debug!("Artwork found for {enriched} tracks");
        Ok(enriched)
    }
}
