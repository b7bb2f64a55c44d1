//! Error types for the pipeline
//!
//! - [`LlmError`]: a single model call failed
//! - [`StageFailure`]: a stage could not produce its output, with a reason code
//! - [`PipelineError`]: why a whole request failed
//! - [`PipelineFailure`]: the error plus whatever partial context exists

use crate::stages::Stage;
use mathspace_artifact::IntentClassification;
use mathspace_context::WorkspaceError;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Errors from one language-model call
#[derive(Debug, thiserror::Error)]
pub enum LlmError {
    /// Request could not be sent or the body could not be read
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    /// Vendor answered with a non-success status
    #[error("vendor returned {status}: {body}")]
    Status { status: u16, body: String },

    /// Call exceeded the request timeout
    #[error("request timed out after {secs}s")]
    Timeout { secs: u64 },

    /// Response carried no message content
    #[error("empty response")]
    EmptyResponse,

    /// No API key configured
    #[error("no API key configured")]
    MissingApiKey,

    /// Model backend unavailable for another reason
    #[error("model unavailable: {0}")]
    Unavailable(String),
}

impl LlmError {
    /// Reason code for a stage that failed on this error
    #[must_use]
    pub fn reason(&self) -> FailureReason {
        match self {
            Self::Timeout { .. } => FailureReason::Timeout,
            Self::EmptyResponse => FailureReason::EmptyResponse,
            Self::Http(err) if err.is_timeout() => FailureReason::Timeout,
            Self::Http(err) if err.is_decode() => FailureReason::Malformed,
            Self::Http(_) | Self::Status { .. } | Self::MissingApiKey | Self::Unavailable(_) => {
                FailureReason::Transport
            }
        }
    }
}

/// Why a stage produced no usable output
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureReason {
    Transport,
    Timeout,
    EmptyResponse,
    /// Extraction yielded an empty script
    EmptyArtifact,
    /// Response did not contain the expected structure
    Malformed,
}

impl FailureReason {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Transport => "transport",
            Self::Timeout => "timeout",
            Self::EmptyResponse => "empty_response",
            Self::EmptyArtifact => "empty_artifact",
            Self::Malformed => "malformed",
        }
    }
}

impl fmt::Display for FailureReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A stage failed
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{stage} stage failed ({reason}): {message}")]
pub struct StageFailure {
    pub stage: Stage,
    pub reason: FailureReason,
    pub message: String,
}

impl StageFailure {
    pub fn new(stage: Stage, reason: FailureReason, message: impl Into<String>) -> Self {
        Self {
            stage,
            reason,
            message: message.into(),
        }
    }

    /// Failure caused by a model call
    #[must_use]
    pub fn from_llm(stage: Stage, error: &LlmError) -> Self {
        Self::new(stage, error.reason(), error.to_string())
    }

    /// Whether this failure aborts the request
    #[inline]
    #[must_use]
    pub fn is_fatal(&self) -> bool {
        self.stage.is_fatal_on_failure()
    }
}

/// Request-level errors
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    /// Instruction empty after trimming
    #[error("instruction must not be empty")]
    InvalidInstruction,

    /// A fatal stage failed
    #[error(transparent)]
    Stage(#[from] StageFailure),

    /// Live scene or output directory could not be written
    #[error("workspace error: {0}")]
    Workspace(#[from] WorkspaceError),

    /// Unexpected failure, including a panicked or cancelled request task
    #[error("internal error: {0}")]
    Internal(String),
}

impl PipelineError {
    /// Whether the caller sent a bad request
    #[inline]
    #[must_use]
    pub fn is_client_error(&self) -> bool {
        matches!(self, Self::InvalidInstruction)
    }

    /// Stage that failed, if any
    #[must_use]
    pub fn stage(&self) -> Option<Stage> {
        match self {
            Self::Stage(failure) => Some(failure.stage),
            _ => None,
        }
    }
}

/// A failed request with the context gathered before the failure
#[derive(Debug, thiserror::Error)]
#[error("{error}")]
pub struct PipelineFailure {
    #[source]
    pub error: PipelineError,
    pub intent: Option<IntentClassification>,
    pub critique: Option<String>,
}

impl PipelineFailure {
    #[must_use]
    pub fn bare(error: impl Into<PipelineError>) -> Self {
        Self {
            error: error.into(),
            intent: None,
            critique: None,
        }
    }

    #[inline]
    #[must_use]
    pub fn with_intent(mut self, intent: Option<IntentClassification>) -> Self {
        self.intent = intent;
        self
    }

    #[inline]
    #[must_use]
    pub fn with_critique(mut self, critique: Option<String>) -> Self {
        self.critique = critique;
        self
    }
}

impl From<PipelineError> for PipelineFailure {
    fn from(error: PipelineError) -> Self {
        Self::bare(error)
    }
}
