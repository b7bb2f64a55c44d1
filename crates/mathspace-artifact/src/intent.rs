//! Typed results of the intent and critique stages

use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;

/// What the user wants done to the scene
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum IntentKind {
    /// Start a fresh scene
    #[serde(alias = "create", alias = "Create")]
    Create,
    /// Change properties of existing objects
    #[serde(alias = "modify", alias = "Modify")]
    Modify,
    /// Add new elements to the existing scene
    #[serde(alias = "add", alias = "Add")]
    Add,
    /// Add animation or polish
    #[serde(alias = "enhance", alias = "Enhance")]
    Enhance,
    /// Interaction between several objects
    #[serde(alias = "compose", alias = "Compose")]
    Compose,
}

impl fmt::Display for IntentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            IntentKind::Create => "CREATE",
            IntentKind::Modify => "MODIFY",
            IntentKind::Add => "ADD",
            IntentKind::Enhance => "ENHANCE",
            IntentKind::Compose => "COMPOSE",
        };
        f.write_str(name)
    }
}

/// Relation of the instruction to the previous turn
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContextRelation {
    #[default]
    #[serde(alias = "Independent", alias = "独立")]
    Independent,
    #[serde(alias = "Continuous", alias = "连续")]
    Continuous,
}

/// Structured output of the intent stage
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IntentClassification {
    pub intent: IntentKind,
    #[serde(default)]
    pub target_objects: Vec<String>,
    #[serde(default)]
    pub context_relation: ContextRelation,
    #[serde(default)]
    pub layout_hints: Vec<String>,
    #[serde(default)]
    pub explicit_requirements: Vec<String>,
    #[serde(default)]
    pub implicit_needs: Vec<String>,
    /// Clamped to `[0, 1]` on deserialization
    #[serde(default, deserialize_with = "clamped_confidence")]
    pub confidence: f64,
}

impl IntentClassification {
    /// Create a classification with empty detail lists
    #[inline]
    #[must_use]
    pub fn new(intent: IntentKind, confidence: f64) -> Self {
        Self {
            intent,
            target_objects: Vec::new(),
            context_relation: ContextRelation::Independent,
            layout_hints: Vec::new(),
            explicit_requirements: Vec::new(),
            implicit_needs: Vec::new(),
            confidence: confidence.clamp(0.0, 1.0),
        }
    }

    /// With referenced objects
    #[inline]
    #[must_use]
    pub fn with_targets(mut self, targets: Vec<String>) -> Self {
        self.target_objects = targets;
        self
    }

    /// With relation to the previous turn
    #[inline]
    #[must_use]
    pub fn with_relation(mut self, relation: ContextRelation) -> Self {
        self.context_relation = relation;
        self
    }
}

fn clamped_confidence<'de, D>(deserializer: D) -> Result<f64, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = f64::deserialize(deserializer)?;
    if raw.is_nan() {
        return Ok(0.0);
    }
    Ok(raw.clamp(0.0, 1.0))
}

/// Advisory verdict of the critique stage
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Rating {
    Pass,
    Warn,
    Fail,
    /// No recognizable marker in the critique
    #[default]
    Unknown,
}

impl Rating {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Rating::Pass => "PASS",
            Rating::Warn => "WARN",
            Rating::Fail => "FAIL",
            Rating::Unknown => "UNKNOWN",
        }
    }
}

impl fmt::Display for Rating {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
