//! Turn records and the bounded conversation history

use chrono::{DateTime, Utc};
use mathspace_artifact::{IntentClassification, Rating, StructuralAnalysis};
use serde::{Deserialize, Serialize};

/// One stored instruction/response cycle
///
/// Built once at the end of a request and never mutated after it is
/// appended. `success` is derived from the locator, so a successful turn
/// always carries one. Loading recomputes it and ignores the stored flag.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(from = "StoredTurn")]
pub struct Turn {
    pub timestamp: DateTime<Utc>,
    pub instruction: String,
    /// Generator draft, possibly truncated for storage
    pub draft: String,
    pub critique: String,
    #[serde(default)]
    pub rating: Rating,
    pub final_artifact: String,
    success: bool,
    artifact_locator: Option<String>,
    pub analysis: StructuralAnalysis,
    pub objects: Vec<String>,
    pub intent: Option<IntentClassification>,
    /// Repair-stage invocations during this turn
    #[serde(default)]
    pub repairs: usize,
}

impl Turn {
    /// Start a failed turn for `instruction` whose last attempted script
    /// was `final_artifact`. Fields default to empty.
    #[must_use]
    pub fn new(instruction: impl Into<String>, final_artifact: impl Into<String>) -> Self {
        Self {
            timestamp: Utc::now(),
            instruction: instruction.into(),
            draft: String::new(),
            critique: String::new(),
            rating: Rating::Unknown,
            final_artifact: final_artifact.into(),
            success: false,
            artifact_locator: None,
            analysis: StructuralAnalysis::unparseable(),
            objects: Vec::new(),
            intent: None,
            repairs: 0,
        }
    }

    /// With stored draft
    #[inline]
    #[must_use]
    pub fn with_draft(mut self, draft: impl Into<String>) -> Self {
        self.draft = draft.into();
        self
    }

    /// With critique and its rating
    #[inline]
    #[must_use]
    pub fn with_critique(mut self, critique: impl Into<String>, rating: Rating) -> Self {
        self.critique = critique.into();
        self.rating = rating;
        self
    }

    /// With analysis of the final artifact
    #[inline]
    #[must_use]
    pub fn with_analysis(mut self, analysis: StructuralAnalysis, objects: Vec<String>) -> Self {
        self.analysis = analysis;
        self.objects = objects;
        self
    }

    #[inline]
    #[must_use]
    pub fn with_intent(mut self, intent: Option<IntentClassification>) -> Self {
        self.intent = intent;
        self
    }

    #[inline]
    #[must_use]
    pub fn with_repairs(mut self, repairs: usize) -> Self {
        self.repairs = repairs;
        self
    }

    /// Set the produced-output locator; success follows from it
    #[inline]
    #[must_use]
    pub fn with_locator(mut self, locator: Option<String>) -> Self {
        self.success = locator.is_some();
        self.artifact_locator = locator;
        self
    }

    #[inline]
    #[must_use]
    pub fn success(&self) -> bool {
        self.success
    }

    #[inline]
    #[must_use]
    pub fn artifact_locator(&self) -> Option<&str> {
        self.artifact_locator.as_deref()
    }
}

/// On-disk shape of a [`Turn`]; any stored `success` flag is dropped
#[derive(Deserialize)]
struct StoredTurn {
    timestamp: DateTime<Utc>,
    instruction: String,
    draft: String,
    critique: String,
    #[serde(default)]
    rating: Rating,
    final_artifact: String,
    artifact_locator: Option<String>,
    analysis: StructuralAnalysis,
    objects: Vec<String>,
    intent: Option<IntentClassification>,
    #[serde(default)]
    repairs: usize,
}

impl From<StoredTurn> for Turn {
    fn from(stored: StoredTurn) -> Self {
        Self {
            timestamp: stored.timestamp,
            instruction: stored.instruction,
            draft: stored.draft,
            critique: stored.critique,
            rating: stored.rating,
            final_artifact: stored.final_artifact,
            success: stored.artifact_locator.is_some(),
            artifact_locator: stored.artifact_locator,
            analysis: stored.analysis,
            objects: stored.objects,
            intent: stored.intent,
            repairs: stored.repairs,
        }
    }
}

/// Chronological, capacity-bounded sequence of turns
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ConversationHistory {
    turns: Vec<Turn>,
}

impl ConversationHistory {
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a turn, evicting the oldest entries beyond `capacity`
    pub fn push_bounded(&mut self, turn: Turn, capacity: usize) {
        self.turns.push(turn);
        if self.turns.len() > capacity {
            let overflow = self.turns.len() - capacity;
            self.turns.drain(..overflow);
        }
    }

    /// Newest `count` turns, oldest first
    #[must_use]
    pub fn recent(&self, count: usize) -> &[Turn] {
        let start = self.turns.len().saturating_sub(count);
        &self.turns[start..]
    }

    #[inline]
    #[must_use]
    pub fn turns(&self) -> &[Turn] {
        &self.turns
    }

    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.turns.len()
    }

    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }

    #[inline]
    #[must_use]
    pub fn last(&self) -> Option<&Turn> {
        self.turns.last()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Turn> {
        self.turns.iter()
    }
}

impl FromIterator<Turn> for ConversationHistory {
    fn from_iter<I: IntoIterator<Item = Turn>>(iter: I) -> Self {
        Self {
            turns: iter.into_iter().collect(),
        }
    }
}

impl<'a> IntoIterator for &'a ConversationHistory {
    type Item = &'a Turn;
    type IntoIter = std::slice::Iter<'a, Turn>;

    fn into_iter(self) -> Self::IntoIter {
        self.turns.iter()
    }
}
