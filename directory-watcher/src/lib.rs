//! # Directory Watcher
//!
//! File system monitoring and audio file indexing for the medley library.
//! The watcher observes the configured root directories and reports changes;
//! the indexer walks a root and lists the audio files under it.
//!
//! ## Features
//!
//! - **Real-time Watching**: Monitor root directories for file changes
//! - **Restart**: Swap the whole watch set in one call after a reconfiguration
//! - **Exclusion Patterns**: Skip NAS metadata, trash folders, partial downloads
//! - **Audio Indexing**: Walk a root and collect audio files with their attributes
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                    Directory Watcher                            │
//! ├─────────────────────────────────────────────────────────────────┤
//! │  DirectoryConfig ──► DirectoryWatcher ──► FileEvent            │
//! │       │                                       │                 │
//! │       ▼                                       ▼                 │
//! │  FileIndexer ──► IndexedFile              EventBatch           │
//! └─────────────────────────────────────────────────────────────────┘
//! ```

pub mod config;
pub mod error;
pub mod event;
pub mod indexer;
pub mod watcher;

pub use config::{DirectoryConfig, WatchMode};
pub use error::{Result, WatcherError};
pub use event::{EventBatch, FileEvent, FileEventKind, is_audio_extension};
pub use indexer::{FileAttributes, FileIndexer, IndexResult, IndexedFile};
pub use watcher::{DirectoryWatcher, WatcherStats};
