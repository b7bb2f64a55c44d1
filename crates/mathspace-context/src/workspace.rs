//! On-disk workspace layout
//!
//! ```text
//! <static_dir>/            published videos, served under /static
//! <work_dir>/
//!   current_scene.py      live scene file
//!   conversation.json     conversation history
//!   videos/...            renderer media tree
//! ```

use crate::error::WorkspaceError;
use std::path::{Path, PathBuf};

/// Sentinel returned when there is no live scene file
pub const NO_CURRENT_CODE: &str = "no current code";

const SCENE_FILE: &str = "current_scene.py";
const HISTORY_FILE: &str = "conversation.json";
const PUBLISHED_EXTENSION: &str = "mp4";
const STATIC_ROUTE: &str = "/static";

/// Paths shared by the pipeline, the store and the renderer
#[derive(Debug, Clone)]
pub struct Workspace {
    static_dir: PathBuf,
    work_dir: PathBuf,
}

impl Workspace {
    #[must_use]
    pub fn new(static_dir: impl Into<PathBuf>, work_dir: impl Into<PathBuf>) -> Self {
        Self {
            static_dir: static_dir.into(),
            work_dir: work_dir.into(),
        }
    }

    #[inline]
    #[must_use]
    pub fn static_dir(&self) -> &Path {
        &self.static_dir
    }

    #[inline]
    #[must_use]
    pub fn work_dir(&self) -> &Path {
        &self.work_dir
    }

    /// Live scene file
    #[must_use]
    pub fn scene_path(&self) -> PathBuf {
        self.work_dir.join(SCENE_FILE)
    }

    /// Conversation history file
    #[must_use]
    pub fn history_path(&self) -> PathBuf {
        self.work_dir.join(HISTORY_FILE)
    }

    /// Root of the renderer's media tree
    #[must_use]
    pub fn media_dir(&self) -> PathBuf {
        self.work_dir.clone()
    }

    /// Create both directories if missing
    ///
    /// # Errors
    /// Returns `WorkspaceError` if a directory cannot be created.
    pub fn ensure_layout(&self) -> Result<(), WorkspaceError> {
        for dir in [&self.static_dir, &self.work_dir] {
            std::fs::create_dir_all(dir).map_err(|e| WorkspaceError::io("create", dir, e))?;
        }
        Ok(())
    }

    /// Remove the live scene, history, media tree and published videos,
    /// then recreate the empty layout. Running it twice is a no-op.
    ///
    /// # Errors
    /// Returns `WorkspaceError` on any removal or creation failure other
    /// than the target already being absent.
    pub fn reset(&self) -> Result<(), WorkspaceError> {
        match std::fs::remove_dir_all(&self.work_dir) {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => return Err(WorkspaceError::io("remove", &self.work_dir, e)),
        }

        let mut removed = 0usize;
        match std::fs::read_dir(&self.static_dir) {
            Ok(entries) => {
                for entry in entries {
                    let path = entry
                        .map_err(|e| WorkspaceError::io("list", &self.static_dir, e))?
                        .path();
                    let is_video = path.is_file()
                        && path.extension().is_some_and(|ext| ext == PUBLISHED_EXTENSION);
                    if is_video {
                        std::fs::remove_file(&path)
                            .map_err(|e| WorkspaceError::io("remove", &path, e))?;
                        removed += 1;
                    }
                }
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => return Err(WorkspaceError::io("list", &self.static_dir, e)),
        }

        self.ensure_layout()?;
        tracing::info!("Workspace reset ({} published video(s) removed)", removed);
        Ok(())
    }

    /// Current scene source, `None` when no scene has been written
    ///
    /// # Errors
    /// Returns `WorkspaceError` if the file exists but cannot be read.
    pub fn read_current_code(&self) -> Result<Option<String>, WorkspaceError> {
        let path = self.scene_path();
        match std::fs::read_to_string(&path) {
            Ok(code) => Ok(Some(code)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(WorkspaceError::io("read", path, e)),
        }
    }

    /// Overwrite the live scene file
    ///
    /// # Errors
    /// Returns `WorkspaceError` if the file cannot be written.
    pub fn write_scene(&self, source: &str) -> Result<PathBuf, WorkspaceError> {
        std::fs::create_dir_all(&self.work_dir)
            .map_err(|e| WorkspaceError::io("create", &self.work_dir, e))?;
        let path = self.scene_path();
        std::fs::write(&path, source).map_err(|e| WorkspaceError::io("write", &path, e))?;
        Ok(path)
    }

    /// Move a rendered file into the static directory as
    /// `<output_name>.mp4` and return its public locator.
    ///
    /// # Errors
    /// Returns `WorkspaceError` if the file can be neither renamed nor
    /// copied into place.
    pub fn publish_output(&self, located: &Path, output_name: &str) -> Result<String, WorkspaceError> {
        std::fs::create_dir_all(&self.static_dir)
            .map_err(|e| WorkspaceError::io("create", &self.static_dir, e))?;

        let file_name = format!("{output_name}.{PUBLISHED_EXTENSION}");
        let target = self.static_dir.join(&file_name);

        if std::fs::rename(located, &target).is_err() {
            // Cross-device moves fall back to copy + remove
            std::fs::copy(located, &target).map_err(|e| WorkspaceError::io("copy", located, e))?;
            if let Err(e) = std::fs::remove_file(located) {
                tracing::debug!("Left rendered file {} in place: {}", located.display(), e);
            }
        }

        Ok(format!("{STATIC_ROUTE}/{file_name}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn workspace_in(dir: &tempfile::TempDir) -> Workspace {
        Workspace::new(dir.path().join("static"), dir.path().join("temp_gen"))
    }

    #[test]
    fn current_code_absent_then_present() {
        let dir = tempfile::tempdir().unwrap();
        let workspace = workspace_in(&dir);
        workspace.ensure_layout().unwrap();

        assert_eq!(workspace.read_current_code().unwrap(), None);
        workspace.write_scene("x = 1\n").unwrap();
        assert_eq!(workspace.read_current_code().unwrap().as_deref(), Some("x = 1\n"));
    }

    #[test]
    fn reset_clears_work_dir_and_videos_only() {
        let dir = tempfile::tempdir().unwrap();
        let workspace = workspace_in(&dir);
        workspace.ensure_layout().unwrap();
        workspace.write_scene("x = 1\n").unwrap();
        std::fs::write(workspace.history_path(), "[]").unwrap();
        std::fs::write(workspace.static_dir().join("video_a.mp4"), b"v").unwrap();
        std::fs::write(workspace.static_dir().join("index.html"), b"<html>").unwrap();

        workspace.reset().unwrap();

        assert!(workspace.work_dir().is_dir());
        assert!(!workspace.scene_path().exists());
        assert!(!workspace.history_path().exists());
        assert!(!workspace.static_dir().join("video_a.mp4").exists());
        assert!(workspace.static_dir().join("index.html").exists());
    }

    #[test]
    fn reset_without_layout_creates_it() {
        let dir = tempfile::tempdir().unwrap();
        let workspace = workspace_in(&dir);

        workspace.reset().unwrap();
        assert!(workspace.static_dir().is_dir());
        assert!(workspace.work_dir().is_dir());
    }

    #[test]
    fn publish_moves_file_and_returns_locator() {
        let dir = tempfile::tempdir().unwrap();
        let workspace = workspace_in(&dir);
        workspace.ensure_layout().unwrap();
        let rendered = workspace.media_dir().join("render.mp4");
        std::fs::write(&rendered, b"frames").unwrap();

        let locator = workspace.publish_output(&rendered, "video_1234abcd").unwrap();

        assert_eq!(locator, "/static/video_1234abcd.mp4");
        assert!(!rendered.exists());
        assert_eq!(
            std::fs::read(workspace.static_dir().join("video_1234abcd.mp4")).unwrap(),
            b"frames"
        );
    }

    #[test]
    fn publish_missing_file_fails() {
        let dir = tempfile::tempdir().unwrap();
        let workspace = workspace_in(&dir);

        let err = workspace
            .publish_output(&dir.path().join("nope.mp4"), "video_x")
            .unwrap_err();
        assert!(err.to_string().starts_with("failed to copy"));
    }
}
