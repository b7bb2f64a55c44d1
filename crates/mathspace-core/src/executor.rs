//! External execution adapter
//!
//! Runs the renderer on the live scene file and locates the produced video.
//! The adapter never fails as a Rust error: spawn problems, non-zero exits
//! and timeouts all come back as an [`ExecutionReport`] the repair loop can
//! act on.

use crate::config::RenderConfig;
use async_trait::async_trait;
use mathspace_artifact::tail_chars;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;
use walkdir::WalkDir;

/// Exit code reported for a synthetic failure (timeout, spawn error)
pub const SYNTHETIC_EXIT_CODE: i32 = -1;

/// Diagnostic for a killed render
pub const TIMEOUT_MESSAGE: &str = "render timed out";

const OUTPUT_EXTENSION: &str = "mp4";
const UNKNOWN_ERROR: &str = "unknown error";

/// Raw result of one render attempt
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ExecutionReport {
    pub exit_code: i32,
    pub stdout: String,
    pub stderr: String,
    /// Located output file, if any
    pub output: Option<PathBuf>,
    pub timed_out: bool,
}

impl ExecutionReport {
    /// Successful render with a located output
    #[must_use]
    pub fn rendered(output: PathBuf) -> Self {
        Self {
            exit_code: 0,
            output: Some(output),
            ..Self::default()
        }
    }

    /// Process exited with `exit_code`
    #[must_use]
    pub fn exited(exit_code: i32, stdout: impl Into<String>, stderr: impl Into<String>) -> Self {
        Self {
            exit_code,
            stdout: stdout.into(),
            stderr: stderr.into(),
            ..Self::default()
        }
    }

    /// Process killed after the timeout
    #[must_use]
    pub fn timed_out() -> Self {
        Self {
            exit_code: SYNTHETIC_EXIT_CODE,
            stderr: TIMEOUT_MESSAGE.to_string(),
            timed_out: true,
            ..Self::default()
        }
    }

    /// Classify the attempt. `Ok` carries the located output.
    ///
    /// # Errors
    /// Returns a `RenderFailure` for timeouts, non-zero exits and clean
    /// exits without a located output. Diagnostics keep the last `tail`
    /// characters of the relevant stream.
    pub fn into_outcome(self, tail: usize) -> Result<PathBuf, RenderFailure> {
        if self.timed_out {
            return Err(RenderFailure::TimedOut {
                diagnostic: TIMEOUT_MESSAGE.to_string(),
            });
        }
        if self.exit_code != 0 {
            return Err(RenderFailure::Exited {
                exit_code: self.exit_code,
                diagnostic: stream_tail(&self.stderr, &self.stdout, tail),
            });
        }
        match self.output {
            Some(path) => Ok(path),
            None => {
                let detail = stream_tail(&self.stderr, &self.stdout, tail);
                Err(RenderFailure::OutputMissing {
                    diagnostic: format!("render exited cleanly but produced no video: {detail}"),
                })
            }
        }
    }
}

fn stream_tail(stderr: &str, stdout: &str, tail: usize) -> String {
    let stream = if stderr.trim().is_empty() { stdout } else { stderr };
    if stream.trim().is_empty() {
        UNKNOWN_ERROR.to_string()
    } else {
        tail_chars(stream, tail).to_string()
    }
}

/// Why a render attempt did not produce a video
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, thiserror::Error)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RenderFailure {
    #[error("render exited with code {exit_code}: {diagnostic}")]
    Exited { exit_code: i32, diagnostic: String },

    #[error("{diagnostic}")]
    TimedOut { diagnostic: String },

    #[error("{diagnostic}")]
    OutputMissing { diagnostic: String },
}

impl RenderFailure {
    /// Text handed to the repair stage and returned to the caller
    #[must_use]
    pub fn diagnostic(&self) -> &str {
        match self {
            Self::Exited { diagnostic, .. }
            | Self::TimedOut { diagnostic }
            | Self::OutputMissing { diagnostic } => diagnostic,
        }
    }
}

/// Runs a scene script and locates its output
#[async_trait]
pub trait ExecutionAdapter: Send + Sync {
    /// Render `script`, looking for an output whose name contains
    /// `output_name`
    async fn execute(&self, script: &Path, output_name: &str) -> ExecutionReport;
}

/// Manim subprocess renderer
#[derive(Debug, Clone)]
pub struct ManimRenderer {
    python: String,
    quality_flag: String,
    scene_name: String,
    media_dir: PathBuf,
    timeout: Duration,
}

impl ManimRenderer {
    #[must_use]
    pub fn new(config: &RenderConfig, media_dir: impl Into<PathBuf>) -> Self {
        Self {
            python: config.python.clone(),
            quality_flag: config.quality_flag.clone(),
            scene_name: config.scene_name.clone(),
            media_dir: media_dir.into(),
            timeout: config.timeout(),
        }
    }

    /// Arguments passed to the interpreter
    #[must_use]
    pub fn args(&self, script: &Path, output_name: &str) -> Vec<String> {
        vec![
            "-m".to_string(),
            "manim".to_string(),
            self.quality_flag.clone(),
            "--media_dir".to_string(),
            self.media_dir.display().to_string(),
            "-o".to_string(),
            output_name.to_string(),
            script.display().to_string(),
            self.scene_name.clone(),
        ]
    }
}

#[async_trait]
impl ExecutionAdapter for ManimRenderer {
    async fn execute(&self, script: &Path, output_name: &str) -> ExecutionReport {
        let child = tokio::process::Command::new(&self.python)
            .args(self.args(script, output_name))
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn();

        let child = match child {
            Ok(child) => child,
            Err(e) => {
                tracing::error!("Failed to spawn {}: {}", self.python, e);
                return ExecutionReport::exited(
                    SYNTHETIC_EXIT_CODE,
                    "",
                    format!("failed to start renderer: {e}"),
                );
            }
        };

        // Dropping the wait future on timeout drops the child, which kills it
        let output = match tokio::time::timeout(self.timeout, child.wait_with_output()).await {
            Ok(Ok(output)) => output,
            Ok(Err(e)) => {
                return ExecutionReport::exited(
                    SYNTHETIC_EXIT_CODE,
                    "",
                    format!("failed to wait on renderer: {e}"),
                );
            }
            Err(_) => {
                tracing::warn!("Render exceeded {}s, killed", self.timeout.as_secs());
                return ExecutionReport::timed_out();
            }
        };

        let mut report = ExecutionReport::exited(
            output.status.code().unwrap_or(SYNTHETIC_EXIT_CODE),
            String::from_utf8_lossy(&output.stdout),
            String::from_utf8_lossy(&output.stderr),
        );
        if report.exit_code == 0 {
            report.output = locate_output(&self.media_dir, output_name);
        }
        report
    }
}

/// First `.mp4` under `root` whose file name contains `hint`, in sorted
/// walk order
#[must_use]
pub fn locate_output(root: &Path, hint: &str) -> Option<PathBuf> {
    WalkDir::new(root)
        .sort_by_file_name()
        .into_iter()
        .filter_map(Result::ok)
        .filter(|entry| entry.file_type().is_file())
        .filter(|entry| entry.path().extension().is_some_and(|ext| ext == OUTPUT_EXTENSION))
        .find(|entry| entry.file_name().to_string_lossy().contains(hint))
        .map(walkdir::DirEntry::into_path)
}
