//! Walks a root directory and lists the audio files under it.

use std::path::{Path, PathBuf};
use std::time::Instant;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};
use walkdir::WalkDir;

use crate::config::DirectoryConfig;
use crate::error::{Result, WatcherError};
use crate::event::is_audio_extension;

/// What the filesystem says about a path.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileAttributes {
    pub is_file: bool,

    /// Size in bytes, if the path could be stat'ed.
    pub size: Option<u64>,

    /// Lowercased extension.
    pub extension: Option<String>,
}

impl FileAttributes {
    pub fn from_path(path: &Path) -> Self {
        let metadata = path.metadata().ok();

        Self {
            is_file: metadata.as_ref().is_some_and(|m| m.is_file()),
            size: metadata.as_ref().map(|m| m.len()),
            extension: path
                .extension()
                .and_then(|e| e.to_str())
                .map(str::to_ascii_lowercase),
        }
    }

    pub fn is_audio(&self) -> bool {
        self.extension.as_deref().is_some_and(is_audio_extension)
    }
}

/// An audio file found by a scan.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexedFile {
    pub path: PathBuf,
    pub attributes: FileAttributes,
    pub modified: Option<DateTime<Utc>>,
}

impl IndexedFile {
    pub fn from_path(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let modified = path
            .metadata()
            .and_then(|m| m.modified())
            .ok()
            .map(DateTime::<Utc>::from);

        Self {
            attributes: FileAttributes::from_path(&path),
            path,
            modified,
        }
    }
}

/// Outcome of scanning one root.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IndexResult {
    /// Audio files, in path order.
    pub files: Vec<IndexedFile>,

    /// Entries that could not be read.
    pub skipped: usize,

    pub duration_ms: u64,
}

/// Scans a single root directory for audio files.
#[derive(Debug, Clone)]
pub struct FileIndexer {
    config: DirectoryConfig,
}

impl FileIndexer {
    pub fn new(config: DirectoryConfig) -> Self {
        Self { config }
    }

    pub fn root(&self) -> &Path {
        &self.config.path
    }

    /// Walk the root, honouring the exclude patterns, depth limit and
    /// symlink setting of the config.
    ///
    /// A missing root is an error. Entries that vanish or cannot be read
    /// mid-walk are counted in [`IndexResult::skipped`].
    pub fn scan(&self) -> Result<IndexResult> {
        let started = Instant::now();
        let root = self.root();

        if !root.exists() {
            return Err(WatcherError::DirectoryNotFound(root.display().to_string()));
        }
        if !root.is_dir() {
            return Err(WatcherError::NotADirectory(root.display().to_string()));
        }

        let config = &self.config;
        let mut result = IndexResult::default();
        let walker = WalkDir::new(root)
            .follow_links(config.follow_symlinks)
            .max_depth(config.max_depth.unwrap_or(usize::MAX))
            .sort_by_file_name()
            .into_iter()
            .filter_entry(|entry| !config.should_exclude(entry.path()));

        for entry in walker {
            let entry = match entry {
                Ok(entry) => entry,
                Err(e) => {
                    warn!("Skipping unreadable entry under {}: {e}", root.display());
                    result.skipped += 1;
                    continue;
                }
            };
            if entry.file_type().is_dir() {
                continue;
            }

            let file = IndexedFile::from_path(entry.path());
            if file.attributes.is_file && file.attributes.is_audio() {
                result.files.push(file);
            }
        }

        result.files.sort_by(|a, b| a.path.cmp(&b.path));
        result.duration_ms = started.elapsed().as_millis() as u64;
        debug!(
            "Found {} audio files under {} in {}ms ({} skipped)",
            result.files.len(),
            root.display(),
            result.duration_ms,
            result.skipped
        );
        Ok(result)
    }
}
