//! Catalog records: tracks and the groupings derived from them.

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use medley_directory_watcher::IndexedFile;

/// Album name used when a track has no enclosing folder.
pub const UNKNOWN_ALBUM: &str = "Unknown Album";

/// Artist name used when a track has no grandparent folder.
pub const UNKNOWN_ARTIST: &str = "Unknown Artist";

/// A single audio file in the catalog.
///
/// Names come from the `Artist/Album/NN Title.ext` folder convention.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Track {
    /// Full path to the audio file.
    pub path: PathBuf,

    /// Title, from the file stem with any leading track number removed.
    pub title: String,

    /// Album, from the enclosing folder name.
    pub album: String,

    /// Artist, from the folder above the album.
    pub artist: String,

    /// Folder holding the file.
    pub folder: PathBuf,

    /// Lowercased extension.
    pub extension: String,

    /// Size in bytes.
    pub size: u64,

    /// Last modification time.
    pub modified: Option<DateTime<Utc>>,

    /// Cover image found next to the file, set by the enrichment pass.
    pub artwork: Option<PathBuf>,
}

impl Track {
    /// Build a track from an indexed file.
    pub fn from_indexed(file: &IndexedFile) -> Self {
        let path = file.path.clone();
        let folder = path.parent().map(Path::to_path_buf).unwrap_or_default();

        Self {
            title: title_from_stem(&path),
            album: dir_name(path.parent()).unwrap_or_else(|| UNKNOWN_ALBUM.to_string()),
            artist: dir_name(path.parent().and_then(Path::parent))
                .unwrap_or_else(|| UNKNOWN_ARTIST.to_string()),
            folder,
            extension: file.attributes.extension.clone().unwrap_or_default(),
            size: file.attributes.size.unwrap_or(0),
            modified: file.modified,
            artwork: None,
            path,
        }
    }

    /// Whether the track lives under `dir`.
    pub fn is_under(&self, dir: &Path) -> bool {
        self.path.starts_with(dir)
    }
}

fn dir_name(dir: Option<&Path>) -> Option<String> {
    dir.and_then(Path::file_name)
        .map(|name| name.to_string_lossy().into_owned())
}

/// `"03 - Song"` → `"Song"`, `"1. Song"` → `"Song"`, `"1999"` → `"1999"`.
fn title_from_stem(path: &Path) -> String {
    let stem = path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();

    let without_number = stem.trim_start_matches(|c: char| c.is_ascii_digit());
    if without_number.len() == stem.len() {
        return stem;
    }

    let title = without_number.trim_start_matches([' ', '-', '.', '_']);
    if title.is_empty() || title.len() == without_number.len() {
        stem
    } else {
        title.to_string()
    }
}

/// A folder that holds tracks, directly or beneath it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Folder {
    /// Folder path.
    pub path: PathBuf,

    /// Tracks directly inside the folder.
    pub direct_tracks: usize,

    /// Tracks anywhere beneath the folder.
    pub total_tracks: usize,
}

/// Tracks grouped by album title and artist.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Album {
    /// Album title.
    pub title: String,

    /// Album artist.
    pub artist: String,

    /// Folder of the first track, used for artwork lookup.
    pub folder: PathBuf,

    /// Track paths in path order.
    pub tracks: Vec<PathBuf>,

    /// Cover image, set by the enrichment pass.
    pub artwork: Option<PathBuf>,
}

/// Tracks grouped by artist.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Artist {
    /// Artist name.
    pub name: String,

    /// Number of albums.
    pub album_count: usize,

    /// Number of tracks.
    pub track_count: usize,
}
