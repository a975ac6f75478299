//! Error types for the library core.

use thiserror::Error;

use crate::rebuild::RebuildStep;

/// Result type alias for library operations.
pub type Result<T> = std::result::Result<T, LibraryError>;

/// Errors that can occur while reconfiguring or rebuilding the library.
#[derive(Error, Debug)]
pub enum LibraryError {
    /// The directory change payload could not be parsed.
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    /// The settings store could not be read or written.
    #[error("persistence error: {0}")]
    Persistence(String),

    /// A step of the background rebuild failed.
    #[error("rebuild step {step} failed: {message}")]
    RebuildStep {
        /// The step that failed.
        step: RebuildStep,
        /// What went wrong.
        message: String,
    },

    /// Directory watcher error.
    #[error("watcher error: {0}")]
    Watcher(#[from] medley_directory_watcher::WatcherError),

    /// IO error.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization error.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl LibraryError {
    /// Build a [`LibraryError::RebuildStep`].
    pub fn step(step: RebuildStep, message: impl Into<String>) -> Self {
        Self::RebuildStep {
            step,
            message: message.into(),
        }
    }
}
