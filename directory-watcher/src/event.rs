//! Change events reported by the watcher.

use std::path::PathBuf;

use chrono::{DateTime, Utc};
use notify::event::{ModifyKind, RenameMode};
use serde::{Deserialize, Serialize};

/// File extensions the library treats as audio.
const AUDIO_EXTENSIONS: &[&str] = &[
    "aac", "aif", "aiff", "alac", "ape", "flac", "m4a", "mp3", "mpc", "oga", "ogg", "opus", "wav",
    "wma", "wv",
];

/// Whether `ext` (without the dot, any case) is an audio extension.
pub fn is_audio_extension(ext: &str) -> bool {
    let ext = ext.to_ascii_lowercase();
    AUDIO_EXTENSIONS.contains(&ext.as_str())
}

/// What happened to a path.
///
/// Renames arrive as a `Deleted` for the old name and a `Created` for the new
/// one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FileEventKind {
    Created,
    Modified,
    Deleted,

    /// Access and metadata-only changes. Never forwarded to consumers.
    Ignored,
}

impl From<notify::EventKind> for FileEventKind {
    fn from(kind: notify::EventKind) -> Self {
        match kind {
            notify::EventKind::Create(_) => Self::Created,
            notify::EventKind::Remove(_) => Self::Deleted,
            notify::EventKind::Modify(ModifyKind::Name(RenameMode::From)) => Self::Deleted,
            notify::EventKind::Modify(ModifyKind::Name(RenameMode::To)) => Self::Created,
            notify::EventKind::Modify(ModifyKind::Metadata(_)) => Self::Ignored,
            notify::EventKind::Modify(_) => Self::Modified,
            _ => Self::Ignored,
        }
    }
}

/// A change to a single path under a watched root.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileEvent {
    pub kind: FileEventKind,
    pub path: PathBuf,
    pub seen_at: DateTime<Utc>,
}

impl FileEvent {
    pub fn new(kind: FileEventKind, path: impl Into<PathBuf>) -> Self {
        Self {
            kind,
            path: path.into(),
            seen_at: Utc::now(),
        }
    }

    /// Whether the event concerns an audio file, judged by extension so that
    /// deletions (where the file is already gone) still qualify.
    pub fn is_audio(&self) -> bool {
        self.path
            .extension()
            .and_then(|e| e.to_str())
            .is_some_and(is_audio_extension)
    }

    /// Whether the path is gone from disk after this event.
    pub fn is_removal(&self) -> bool {
        self.kind == FileEventKind::Deleted
    }
}

/// Events collected over a debounce window, at most one per path.
#[derive(Debug, Clone, Default)]
pub struct EventBatch {
    events: Vec<FileEvent>,
}

impl EventBatch {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record `event`, superseding any earlier event for the same path.
    pub fn push(&mut self, event: FileEvent) {
        self.events.retain(|e| e.path != event.path);
        self.events.push(event);
    }

    /// Events in the order their latest occurrence arrived.
    pub fn events(&self) -> &[FileEvent] {
        &self.events
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }
}

impl Extend<FileEvent> for EventBatch {
    fn extend<I: IntoIterator<Item = FileEvent>>(&mut self, iter: I) {
        for event in iter {
            self.push(event);
        }
    }
}
