//! Stage contracts
//!
//! Each stage is one model call with a fixed system prompt, a user message
//! assembled from the pipeline state, and a fixed sampling temperature.
//! The builders here only format text; extraction of the stage output
//! happens in the controller.

use crate::error::StageFailure;
use crate::llm::CompletionRequest;
use crate::prompts;
use mathspace_artifact::{IntentClassification, Rating};
use mathspace_context::{ContextDigest, CurrentArtifactSnapshot};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Placeholder passed downstream when intent classification failed
pub const UNANALYZED: &str = "unanalyzed";

const NO_EXISTING_CODE: &str = "(no existing code)";
const NO_OBJECTS: &str = "(none)";

/// The five model-backed stages
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Intent,
    Generator,
    Critic,
    Reviser,
    Repair,
}

impl Stage {
    pub const ALL: [Stage; 5] = [
        Self::Intent,
        Self::Generator,
        Self::Critic,
        Self::Reviser,
        Self::Repair,
    ];

    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Intent => "intent",
            Self::Generator => "generator",
            Self::Critic => "critic",
            Self::Reviser => "reviser",
            Self::Repair => "repair",
        }
    }

    /// Sampling temperature; `None` leaves the vendor default
    #[must_use]
    pub fn temperature(&self) -> Option<f32> {
        match self {
            Self::Intent | Self::Critic => Some(0.1),
            Self::Generator => Some(0.7),
            Self::Reviser => Some(0.3),
            Self::Repair => None,
        }
    }

    #[must_use]
    pub fn system_prompt(&self) -> &'static str {
        match self {
            Self::Intent => prompts::INTENT_SYSTEM,
            Self::Generator => prompts::GENERATOR_SYSTEM,
            Self::Critic => prompts::CRITIC_SYSTEM,
            Self::Reviser => prompts::REVISER_SYSTEM,
            Self::Repair => prompts::REPAIR_SYSTEM,
        }
    }

    /// Intent failures degrade; repair failures end the render loop.
    /// Everything else aborts the request.
    #[must_use]
    pub fn is_fatal_on_failure(&self) -> bool {
        matches!(self, Self::Generator | Self::Critic | Self::Reviser)
    }

    /// Build the request for this stage
    #[must_use]
    pub fn request(&self, user: String) -> CompletionRequest {
        CompletionRequest {
            stage: *self,
            system: self.system_prompt().to_string(),
            user,
            temperature: self.temperature(),
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Result of running one stage
#[derive(Debug, Clone, PartialEq)]
pub enum StageOutcome<T> {
    Completed(T),
    Failed(StageFailure),
}

impl<T> StageOutcome<T> {
    /// Convert to a `Result`
    ///
    /// # Errors
    /// Returns the `StageFailure` of a failed stage.
    pub fn into_result(self) -> Result<T, StageFailure> {
        match self {
            Self::Completed(value) => Ok(value),
            Self::Failed(failure) => Err(failure),
        }
    }

    #[inline]
    #[must_use]
    pub fn is_completed(&self) -> bool {
        matches!(self, Self::Completed(_))
    }
}

impl<T> From<Result<T, StageFailure>> for StageOutcome<T> {
    fn from(result: Result<T, StageFailure>) -> Self {
        match result {
            Ok(value) => Self::Completed(value),
            Err(failure) => Self::Failed(failure),
        }
    }
}

/// Read-only state shared by the context-aware stages of one request
#[derive(Debug, Clone, Copy)]
pub struct StageContext<'a> {
    pub instruction: &'a str,
    pub snapshot: &'a CurrentArtifactSnapshot,
    pub digest: &'a ContextDigest,
    pub intent: Option<&'a IntentClassification>,
}

impl StageContext<'_> {
    fn intent_text(&self) -> String {
        self.intent
            .and_then(|intent| serde_json::to_string(intent).ok())
            .unwrap_or_else(|| UNANALYZED.to_string())
    }

    fn preview_text(&self) -> &str {
        match self.snapshot.preview() {
            "" => NO_EXISTING_CODE,
            preview => preview,
        }
    }

    fn objects_text(&self) -> String {
        match self.snapshot.objects() {
            [] => NO_OBJECTS.to_string(),
            objects => objects.join(", "),
        }
    }

    /// Intent stage: instruction, snapshot and digest
    #[must_use]
    pub fn intent_message(&self) -> String {
        let snapshot = serde_json::to_string(self.snapshot).unwrap_or_default();
        format!(
            "[Instruction]\n{}\n\n[Current state]\n{}\n\n[Context digest]\n{}\n\nClassify the real intent of the instruction.",
            self.instruction, snapshot, self.digest.text
        )
    }

    /// Generator stage: instruction, intent, preview, objects and digest
    #[must_use]
    pub fn generator_message(&self) -> String {
        format!(
            "[Instruction]\n{}\n\n[Intent]\n{}\n\n[Current code]\n{}\n\n[Existing objects]\n{}\n\n[Context digest]\n{}\n\n\
             Modify or extend the current code for MODIFY and ADD requests. \
             Rewrite from scratch only for CREATE. Keep every object inside the frame.",
            self.instruction,
            self.intent_text(),
            self.preview_text(),
            self.objects_text(),
            self.digest.text
        )
    }

    /// Critic stage: instruction, intent, snapshot, objects and draft
    #[must_use]
    pub fn critic_message(&self, draft: &str) -> String {
        format!(
            "[Instruction]\n{}\n\n[Intent]\n{}\n\n[Current code]\n{}\n\n[Existing objects]\n{}\n\n[Draft]\n{}\n\n\
             Review the draft against the instruction and the existing scene.",
            self.instruction,
            self.intent_text(),
            self.preview_text(),
            self.objects_text(),
            draft
        )
    }

    /// Reviser stage: instruction, intent, snapshot, draft, critique and rating
    #[must_use]
    pub fn reviser_message(&self, draft: &str, critique: &str, rating: Rating) -> String {
        format!(
            "[Instruction]\n{}\n\n[Intent]\n{}\n\n[Current code]\n{}\n\n[Draft]\n{}\n\n[Review]\n{}\n\n[Rating]\n{}\n\n\
             Produce the final scene code.",
            self.instruction,
            self.intent_text(),
            self.preview_text(),
            draft,
            critique,
            rating
        )
    }
}

/// Repair stage: the diagnostic tail and the failing script
#[must_use]
pub fn repair_message(diagnostic: &str, script: &str) -> String {
    format!(
        "Fix the errors in the following code.\n\n[Error]\n{diagnostic}\n\n[Code]\n{script}\n\n\
         Make the smallest change that keeps the original intent. Output the complete fixed Python code only."
    )
}
