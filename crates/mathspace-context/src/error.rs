//! Error types for the context layer
//!
//! Every filesystem boundary returns one of these; callers decide whether
//! to degrade (history reads) or propagate (workspace writes).

use std::path::PathBuf;

/// Errors reading or writing the conversation history file
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// History file does not exist yet
    #[error("history file not found: {path}")]
    Missing { path: PathBuf },

    /// History file exists but is not a valid history
    #[error("history file {path} is corrupt: {source}")]
    Corrupt {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    /// IO error during read or rewrite
    #[error("io error on history file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// History could not be encoded
    #[error("failed to encode history: {0}")]
    Encode(#[source] serde_json::Error),
}

impl StoreError {
    /// Create IO error for path
    pub fn io_error(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Whether this is an ordinary "no history yet" condition
    #[inline]
    #[must_use]
    pub fn is_missing(&self) -> bool {
        matches!(self, Self::Missing { .. })
    }
}

/// Errors managing the on-disk workspace layout
#[derive(Debug, thiserror::Error)]
pub enum WorkspaceError {
    #[error("failed to {action} {path}: {source}")]
    Io {
        action: &'static str,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl WorkspaceError {
    pub fn io(action: &'static str, path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            action,
            path: path.into(),
            source,
        }
    }
}
