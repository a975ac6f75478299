//! Per-root scan and watch settings.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use wildmatch::WildMatch;

/// Paths no music library wants: VCS and NAS metadata, trash, partial
/// downloads. Matched against the full path with `*` and `?` wildcards.
const DEFAULT_EXCLUDES: &[&str] = &[
    "*/.git/*",
    "*/.svn/*",
    "*/@eaDir/*",
    "*/.AppleDouble/*",
    "*/.Trash*",
    "*/$RECYCLE.BIN/*",
    "*/._*",
    "*/node_modules/*",
    "*/.cache/*",
    "*.part",
    "*.crdownload",
    "*.tmp",
    "*~",
];

/// How a root is kept up to date between rebuilds.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WatchMode {
    /// Live OS watch; changes reach the catalog as they happen.
    #[default]
    Realtime,

    /// No watch. The root only changes in the catalog on a rebuild.
    Manual,
}

/// Settings for one root directory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DirectoryConfig {
    pub path: PathBuf,
    pub watch_mode: WatchMode,

    /// Built-in excludes plus any added with [`DirectoryConfig::exclude`].
    pub exclude_patterns: Vec<String>,

    /// `None` walks the whole tree.
    pub max_depth: Option<usize>,

    pub follow_symlinks: bool,
}

impl DirectoryConfig {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            watch_mode: WatchMode::default(),
            exclude_patterns: DEFAULT_EXCLUDES.iter().map(ToString::to_string).collect(),
            max_depth: None,
            follow_symlinks: false,
        }
    }

    pub fn with_mode(mut self, mode: WatchMode) -> Self {
        self.watch_mode = mode;
        self
    }

    pub fn exclude(mut self, pattern: impl Into<String>) -> Self {
        self.exclude_patterns.push(pattern.into());
        self
    }

    pub fn with_max_depth(mut self, depth: usize) -> Self {
        self.max_depth = Some(depth);
        self
    }

    pub fn follow_symlinks(mut self) -> Self {
        self.follow_symlinks = true;
        self
    }

    pub fn is_realtime(&self) -> bool {
        self.watch_mode == WatchMode::Realtime
    }

    /// Whether `path` matches any exclude pattern.
    pub fn should_exclude(&self, path: &Path) -> bool {
        let path = path.to_string_lossy();
        self.exclude_patterns
            .iter()
            .any(|pattern| WildMatch::new(pattern).matches(&path))
    }
}
