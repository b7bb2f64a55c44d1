//! Pipeline result types

use crate::executor::RenderFailure;
use mathspace_artifact::{IntentClassification, Rating, StructuralAnalysis};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Per-request identifier: first 8 hex chars of a v4 UUID
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RequestId(String);

impl RequestId {
    /// Generate new request ID
    #[must_use]
    pub fn new() -> Self {
        let mut id = uuid::Uuid::new_v4().simple().to_string();
        id.truncate(8);
        Self(id)
    }

    #[inline]
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Output name hint handed to the renderer
    #[must_use]
    pub fn output_name(&self) -> String {
        format!("video_{}", self.0)
    }
}

impl Default for RequestId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for RequestId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Wall-clock seconds spent in each drafting stage
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct StageTimings {
    pub generator: f64,
    pub critic: f64,
    pub reviser: f64,
    /// From the start of the generator to the end of the render loop
    pub total: f64,
}

impl StageTimings {
    pub(crate) fn secs(duration: Duration) -> f64 {
        duration.as_secs_f64()
    }
}

/// How the render loop ended
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum RunOutcome {
    /// A video was published
    Rendered { locator: String },
    /// Every attempt failed; carries the last failure
    Exhausted { failure: RenderFailure },
}

impl RunOutcome {
    #[must_use]
    pub fn locator(&self) -> Option<&str> {
        match self {
            Self::Rendered { locator } => Some(locator),
            Self::Exhausted { .. } => None,
        }
    }

    #[must_use]
    pub fn diagnostic(&self) -> Option<&str> {
        match self {
            Self::Rendered { .. } => None,
            Self::Exhausted { failure } => Some(failure.diagnostic()),
        }
    }

    #[inline]
    #[must_use]
    pub fn is_rendered(&self) -> bool {
        matches!(self, Self::Rendered { .. })
    }
}

/// Everything one request produced
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineRunResult {
    pub request_id: RequestId,
    pub draft: String,
    pub critique: String,
    pub rating: Rating,
    /// Last attempted script
    pub final_artifact: String,
    pub outcome: RunOutcome,
    pub intent: Option<IntentClassification>,
    /// Objects in the final script
    pub objects: Vec<String>,
    /// Analysis of the final script
    pub analysis: StructuralAnalysis,
    /// Repair-stage invocations
    pub repairs: usize,
    /// Render attempts made
    pub attempts: usize,
    pub timings: StageTimings,
}

impl PipelineRunResult {
    #[inline]
    #[must_use]
    pub fn succeeded(&self) -> bool {
        self.outcome.is_rendered()
    }
}
