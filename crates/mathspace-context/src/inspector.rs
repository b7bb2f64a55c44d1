//! Live snapshot of the current scene file

use mathspace_artifact::{analyze, extract_objects, truncate_with_ellipsis, StructuralAnalysis};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Contents of a readable scene file
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LiveArtifact {
    pub preview: String,
    pub analysis: StructuralAnalysis,
    pub objects: Vec<String>,
    pub object_count: usize,
    pub has_axes: bool,
}

/// Freshly computed state of the live scene file
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum CurrentArtifactSnapshot {
    NoArtifact,
    HasArtifact(LiveArtifact),
    ReadError { message: String },
}

impl CurrentArtifactSnapshot {
    #[must_use]
    pub fn objects(&self) -> &[String] {
        match self {
            Self::HasArtifact(live) => &live.objects,
            _ => &[],
        }
    }

    #[must_use]
    pub fn preview(&self) -> &str {
        match self {
            Self::HasArtifact(live) => &live.preview,
            _ => "",
        }
    }

    #[must_use]
    pub fn has_axes(&self) -> bool {
        matches!(self, Self::HasArtifact(live) if live.has_axes)
    }

    #[must_use]
    pub fn status(&self) -> &'static str {
        match self {
            Self::NoArtifact => "no_artifact",
            Self::HasArtifact(_) => "has_artifact",
            Self::ReadError { .. } => "read_error",
        }
    }
}

/// Reads and analyzes the live scene file on demand
#[derive(Debug, Clone)]
pub struct CurrentArtifactInspector {
    scene_path: PathBuf,
    preview_chars: usize,
}

impl CurrentArtifactInspector {
    #[must_use]
    pub fn new(scene_path: impl Into<PathBuf>, preview_chars: usize) -> Self {
        Self {
            scene_path: scene_path.into(),
            preview_chars,
        }
    }

    /// Take a snapshot. Never fails; read problems become `ReadError`.
    #[must_use]
    pub fn inspect(&self) -> CurrentArtifactSnapshot {
        let source = match std::fs::read_to_string(&self.scene_path) {
            Ok(source) => source,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                return CurrentArtifactSnapshot::NoArtifact;
            }
            Err(err) => {
                tracing::warn!("Failed to read {}: {}", self.scene_path.display(), err);
                return CurrentArtifactSnapshot::ReadError {
                    message: err.to_string(),
                };
            }
        };

        let analysis = analyze(&source);
        let objects = extract_objects(&source);
        CurrentArtifactSnapshot::HasArtifact(LiveArtifact {
            preview: truncate_with_ellipsis(&source, self.preview_chars),
            has_axes: analysis.has_axes(),
            object_count: objects.len(),
            analysis,
            objects,
        })
    }
}
