//! The track catalog and its derived indexes.

use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use serde::Serialize;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

use medley_directory_watcher::{
    DirectoryConfig, FileEvent, FileIndexer, IndexedFile, WatcherError,
};

use crate::error::{LibraryError, Result};
use crate::rebuild::RebuildStep;
use crate::track::{Album, Artist, Folder, Track};

/// Operations the rebuild pipeline performs on the catalog.
///
/// Derived-index operations read the tracks left by the last
/// [`Catalog::load_all_tracks`].
#[async_trait]
pub trait Catalog: Send + Sync {
    /// Drop every track under any of `dirs`. Returns how many were dropped.
    async fn remove_tracks_under_dirs(&self, dirs: &[PathBuf]) -> Result<usize>;

    /// Rescan `roots` and make the track set match what is on disk.
    async fn load_all_tracks(&self, roots: &[PathBuf]) -> Result<LoadReport>;

    /// Recompute folder bookkeeping. Returns the number of folders.
    async fn process_folders(&self) -> Result<usize>;

    /// Recompute album groupings. Returns the number of albums.
    async fn load_albums(&self) -> Result<usize>;

    /// Recompute artist groupings. Returns the number of artists.
    async fn load_artists(&self) -> Result<usize>;
}

/// Summary of a full track load.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct LoadReport {
    /// Roots that were walked.
    pub roots_scanned: usize,

    /// Roots that no longer exist; their tracks were dropped.
    pub roots_missing: Vec<PathBuf>,

    /// Tracks in the catalog after the load.
    pub tracks_loaded: usize,

    /// Entries skipped because they could not be read.
    pub skipped: usize,
}

/// Counts across the catalog.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CatalogStats {
    pub tracks: usize,
    pub folders: usize,
    pub albums: usize,
    pub artists: usize,
}

#[derive(Debug, Default)]
struct CatalogIndexes {
    tracks: BTreeMap<PathBuf, Track>,
    folders: BTreeMap<PathBuf, Folder>,
    albums: Vec<Album>,
    artists: Vec<Artist>,
    roots: Vec<PathBuf>,
}

/// In-memory catalog.
///
/// Readers may observe a partially rebuilt catalog while a rebuild runs.
#[derive(Debug, Default)]
pub struct MemoryCatalog {
    indexes: RwLock<CatalogIndexes>,
    exclude_patterns: Vec<String>,
}

impl MemoryCatalog {
    /// Create an empty catalog.
    pub fn new() -> Self {
        Self::default()
    }

    /// Skip paths matching these patterns on top of the default excludes.
    pub fn with_excludes(mut self, patterns: Vec<String>) -> Self {
        self.exclude_patterns = patterns;
        self
    }

    fn scan_config(&self, root: &Path) -> DirectoryConfig {
        self.exclude_patterns
            .iter()
            .fold(DirectoryConfig::new(root), |config, pattern| {
                config.exclude(pattern.clone())
            })
    }

    /// All tracks, in path order.
    pub async fn tracks(&self) -> Vec<Track> {
        self.indexes.read().await.tracks.values().cloned().collect()
    }

    /// A single track.
    pub async fn track(&self, path: &Path) -> Option<Track> {
        self.indexes.read().await.tracks.get(path).cloned()
    }

    /// Folders with track counts, in path order.
    pub async fn folders(&self) -> Vec<Folder> {
        self.indexes.read().await.folders.values().cloned().collect()
    }

    /// Albums, ordered by artist then title.
    pub async fn albums(&self) -> Vec<Album> {
        self.indexes.read().await.albums.clone()
    }

    /// Artists, ordered by name.
    pub async fn artists(&self) -> Vec<Artist> {
        self.indexes.read().await.artists.clone()
    }

    /// Distinct folders that hold tracks.
    pub async fn track_folders(&self) -> Vec<PathBuf> {
        let indexes = self.indexes.read().await;
        let folders: BTreeSet<PathBuf> =
            indexes.tracks.values().map(|t| t.folder.clone()).collect();
        folders.into_iter().collect()
    }

    /// Record the cover image for every track and album in `folder`.
    pub async fn set_folder_artwork(&self, folder: &Path, artwork: Option<PathBuf>) -> usize {
        let mut indexes = self.indexes.write().await;
        let mut updated = 0;

        for track in indexes.tracks.values_mut().filter(|t| t.folder == folder) {
            track.artwork = artwork.clone();
            updated += 1;
        }
        for album in indexes.albums.iter_mut().filter(|a| a.folder == folder) {
            album.artwork = artwork.clone();
        }

        updated
    }

    /// Counts across the catalog.
    pub async fn stats(&self) -> CatalogStats {
        let indexes = self.indexes.read().await;
        CatalogStats {
            tracks: indexes.tracks.len(),
            folders: indexes.folders.len(),
            albums: indexes.albums.len(),
            artists: indexes.artists.len(),
        }
    }

    /// Apply a single watcher event to the track set.
    ///
    /// Returns whether a track was added, replaced or removed. Derived
    /// indexes are left for the caller to recompute.
    pub async fn apply_event(&self, event: &FileEvent) -> bool {
        if !event.is_audio() {
            return false;
        }

        let mut indexes = self.indexes.write().await;
        if !indexes.roots.iter().any(|root| event.path.starts_with(root)) {
            return false;
        }

        if event.is_removal() || !event.path.is_file() {
            let removed = indexes.tracks.remove(&event.path).is_some();
            if removed {
                debug!("Removed track {}", event.path.display());
            }
            return removed;
        }

        if self.scan_config(&event.path).should_exclude(&event.path) {
            return false;
        }

        let track = Track::from_indexed(&IndexedFile::from_path(&event.path));
        debug!("Indexed track {}", track.path.display());
        indexes.tracks.insert(track.path.clone(), track);
        true
    }
}

#[async_trait]
impl Catalog for MemoryCatalog {
    async fn remove_tracks_under_dirs(&self, dirs: &[PathBuf]) -> Result<usize> {
        if dirs.is_empty() {
            return Ok(0);
        }

        let mut indexes = self.indexes.write().await;
        let before = indexes.tracks.len();
        indexes
            .tracks
            .retain(|_, track| !dirs.iter().any(|dir| track.is_under(dir)));
        let removed = before - indexes.tracks.len();

        info!("Removed {removed} tracks under {} directories", dirs.len());
        Ok(removed)
    }

    async fn load_all_tracks(&self, roots: &[PathBuf]) -> Result<LoadReport> {
        let mut report = LoadReport::default();
        let mut scanned: Vec<(PathBuf, Vec<IndexedFile>)> = Vec::new();

        // Walk outside the lock; readers keep the previous tracks meanwhile.
        for root in roots {
            let config = self.scan_config(root);
            let outcome = tokio::task::spawn_blocking(move || FileIndexer::new(config).scan())
                .await
                .map_err(|e| LibraryError::step(RebuildStep::LoadTracks, e.to_string()))?;

            match outcome {
                Ok(result) => {
                    report.roots_scanned += 1;
                    report.skipped += result.skipped;
                    scanned.push((root.clone(), result.files));
                }
                Err(WatcherError::DirectoryNotFound(_) | WatcherError::NotADirectory(_)) => {
                    warn!("Root directory {} is gone, dropping its tracks", root.display());
                    report.roots_missing.push(root.clone());
                }
                Err(e) => {
                    warn!("Failed to scan {}: {e}", root.display());
                    report.skipped += 1;
                }
            }
        }

        let mut indexes = self.indexes.write().await;
        indexes
            .tracks
            .retain(|path, _| roots.iter().any(|root| path.starts_with(root)));
        for root in &report.roots_missing {
            indexes.tracks.retain(|path, _| !path.starts_with(root));
        }
        for (root, files) in scanned {
            indexes.tracks.retain(|path, _| !path.starts_with(&root));
            for file in &files {
                indexes
                    .tracks
                    .insert(file.path.clone(), Track::from_indexed(file));
            }
        }
        indexes.roots = roots.to_vec();

        report.tracks_loaded = indexes.tracks.len();
        info!(
            "Loaded {} tracks from {} roots ({} missing, {} skipped)",
            report.tracks_loaded,
            report.roots_scanned,
            report.roots_missing.len(),
            report.skipped
        );
        Ok(report)
    }

    async fn process_folders(&self) -> Result<usize> {
        let mut indexes = self.indexes.write().await;
        let mut folders: BTreeMap<PathBuf, Folder> = BTreeMap::new();

        for track in indexes.tracks.values() {
            let root = indexes
                .roots
                .iter()
                .find(|root| track.path.starts_with(root));

            let mut current = Some(track.folder.as_path());
            let mut direct = true;
            while let Some(dir) = current {
                let entry = folders.entry(dir.to_path_buf()).or_insert_with(|| Folder {
                    path: dir.to_path_buf(),
                    direct_tracks: 0,
                    total_tracks: 0,
                });
                entry.total_tracks += 1;
                if direct {
                    entry.direct_tracks += 1;
                    direct = false;
                }

                if root.is_some_and(|root| dir == root.as_path()) {
                    break;
                }
                current = dir.parent();
            }
        }

        let count = folders.len();
        indexes.folders = folders;
        debug!("Processed {count} folders");
        Ok(count)
    }

    async fn load_albums(&self) -> Result<usize> {
        let mut indexes = self.indexes.write().await;
        let mut albums: BTreeMap<(String, String), Album> = BTreeMap::new();

        for track in indexes.tracks.values() {
            albums
                .entry((track.artist.clone(), track.album.clone()))
                .or_insert_with(|| Album {
                    title: track.album.clone(),
                    artist: track.artist.clone(),
                    folder: track.folder.clone(),
                    tracks: Vec::new(),
                    artwork: track.artwork.clone(),
                })
                .tracks
                .push(track.path.clone());
        }

        indexes.albums = albums.into_values().collect();
        debug!("Loaded {} albums", indexes.albums.len());
        Ok(indexes.albums.len())
    }

    async fn load_artists(&self) -> Result<usize> {
        let mut indexes = self.indexes.write().await;
        let mut artists: BTreeMap<String, Artist> = BTreeMap::new();

        for track in indexes.tracks.values() {
            artists
                .entry(track.artist.clone())
                .or_insert_with(|| Artist {
                    name: track.artist.clone(),
                    album_count: 0,
                    track_count: 0,
                })
                .track_count += 1;
        }
        for album in &indexes.albums {
            if let Some(artist) = artists.get_mut(&album.artist) {
                artist.album_count += 1;
            }
        }

        indexes.artists = artists.into_values().collect();
        debug!("Loaded {} artists", indexes.artists.len());
        Ok(indexes.artists.len())
    }
}
