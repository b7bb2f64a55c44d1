//! Durable conversation store
//!
//! The whole history lives in one JSON file. Appends reload the full
//! history, push, trim to capacity and rewrite the file atomically through
//! a temporary file in the same directory. There is no internal locking:
//! callers guarantee a single writer.

use crate::error::StoreError;
use crate::history::{ConversationHistory, Turn};
use std::io::Write;
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;

/// File-backed, capacity-bounded conversation log
#[derive(Debug, Clone)]
pub struct ConversationStore {
    path: PathBuf,
    capacity: usize,
}

impl ConversationStore {
    /// Create a store over `path` keeping at most `capacity` turns
    #[inline]
    #[must_use]
    pub fn new(path: impl Into<PathBuf>, capacity: usize) -> Self {
        Self {
            path: path.into(),
            capacity,
        }
    }

    #[inline]
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    #[inline]
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Read the history file, reporting exactly what went wrong
    ///
    /// # Errors
    /// - `StoreError::Missing` if the file does not exist
    /// - `StoreError::Corrupt` if it is not a valid history
    /// - `StoreError::Io` for any other read failure
    pub fn read_history(&self) -> Result<ConversationHistory, StoreError> {
        let raw = match std::fs::read_to_string(&self.path) {
            Ok(raw) => raw,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                return Err(StoreError::Missing {
                    path: self.path.clone(),
                });
            }
            Err(err) => return Err(StoreError::io_error(&self.path, err)),
        };

        serde_json::from_str(&raw).map_err(|source| StoreError::Corrupt {
            path: self.path.clone(),
            source,
        })
    }

    /// Load the full history; a missing or unreadable file yields an
    /// empty history.
    #[must_use]
    pub fn load_all(&self) -> ConversationHistory {
        match self.read_history() {
            Ok(history) => history,
            Err(err) if err.is_missing() => ConversationHistory::new(),
            Err(err) => {
                tracing::warn!("Discarding unreadable conversation history: {}", err);
                ConversationHistory::new()
            }
        }
    }

    /// Append a turn and rewrite the file
    ///
    /// # Errors
    /// Returns `StoreError` if the history cannot be encoded or written.
    pub fn append(&self, turn: Turn) -> Result<(), StoreError> {
        let mut history = self.load_all();
        history.push_bounded(turn, self.capacity);
        self.write_atomic(&history)?;
        tracing::debug!("Stored turn ({} in history)", history.len());
        Ok(())
    }

    fn write_atomic(&self, history: &ConversationHistory) -> Result<(), StoreError> {
        let dir = match self.path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => PathBuf::from("."),
        };
        std::fs::create_dir_all(&dir).map_err(|e| StoreError::io_error(&dir, e))?;

        let encoded = serde_json::to_vec_pretty(history).map_err(StoreError::Encode)?;

        let mut tmp = NamedTempFile::new_in(&dir).map_err(|e| StoreError::io_error(&dir, e))?;
        tmp.write_all(&encoded)
            .and_then(|()| tmp.as_file().sync_all())
            .map_err(|e| StoreError::io_error(tmp.path(), e))?;
        tmp.persist(&self.path)
            .map_err(|e| StoreError::io_error(&self.path, e.error))?;
        Ok(())
    }
}
