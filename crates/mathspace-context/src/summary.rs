//! Context digest over the newest turns
//!
//! The digest is a compact, derived view used to prime the intent and
//! generator stages. It only ever looks at the last [`DIGEST_WINDOW`]
//! turns and is recomputed on every request.

use crate::history::{ConversationHistory, Turn};
use indexmap::IndexSet;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Number of newest turns a digest considers
pub const DIGEST_WINDOW: usize = 3;

/// Digest text for an empty history
pub const NO_HISTORY_TEXT: &str = "no prior conversation";

/// Object names listed in the digest text before eliding the rest
const MAX_LISTED_OBJECTS: usize = 5;

/// Dominant stylistic feature across recent turns
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StyleMarker {
    CoordinateAxes,
}

impl StyleMarker {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::CoordinateAxes => "uses coordinate axes",
        }
    }
}

impl fmt::Display for StyleMarker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Instruction verb category inferred from keywords
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IntentTrend {
    Add,
    Modify,
    Create,
}

impl IntentTrend {
    /// Categories in match priority order
    pub const ALL: [IntentTrend; 3] = [Self::Add, Self::Modify, Self::Create];

    #[must_use]
    pub fn keywords(&self) -> &'static [&'static str] {
        match self {
            Self::Add => &["add", "another", "also", "添加", "再加", "增加"],
            Self::Modify => &["modify", "change", "make it", "recolor", "move", "修改", "改变", "调整"],
            Self::Create => &["create", "new ", "start over", "新建", "创建", "画"],
        }
    }

    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Add => "adding elements",
            Self::Modify => "modifying elements",
            Self::Create => "creating new scenes",
        }
    }

    /// First category whose keywords occur in `instruction`
    #[must_use]
    pub fn classify(instruction: &str) -> Option<Self> {
        let lowered = instruction.to_lowercase();
        Self::ALL
            .into_iter()
            .find(|trend| trend.keywords().iter().any(|kw| lowered.contains(kw)))
    }
}

impl fmt::Display for IntentTrend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Compact summary of recent conversation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContextDigest {
    pub text: String,
    /// Object names seen in the window, first-seen order
    pub objects: Vec<String>,
    pub style: Option<StyleMarker>,
    /// Distinct trends in the window, first-seen order
    pub intent_trends: Vec<IntentTrend>,
    pub dominant_trend: Option<IntentTrend>,
    pub turns_considered: usize,
}

impl ContextDigest {
    /// Digest for an empty history
    #[must_use]
    pub fn empty() -> Self {
        Self {
            text: NO_HISTORY_TEXT.to_string(),
            objects: Vec::new(),
            style: None,
            intent_trends: Vec::new(),
            dominant_trend: None,
            turns_considered: 0,
        }
    }

    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.turns_considered == 0
    }
}

impl Default for ContextDigest {
    fn default() -> Self {
        Self::empty()
    }
}

/// Summarize the newest [`DIGEST_WINDOW`] turns of `history`
#[must_use]
pub fn summarize(history: &ConversationHistory) -> ContextDigest {
    summarize_window(history.recent(DIGEST_WINDOW))
}

/// Summarize an explicit window of turns, oldest first
#[must_use]
pub fn summarize_window(window: &[Turn]) -> ContextDigest {
    if window.is_empty() {
        return ContextDigest::empty();
    }

    let objects: IndexSet<&str> = window
        .iter()
        .flat_map(|turn| turn.objects.iter().map(String::as_str))
        .collect();

    let style = window
        .iter()
        .any(|turn| turn.analysis.has_axes())
        .then_some(StyleMarker::CoordinateAxes);

    let per_turn: Vec<IntentTrend> = window
        .iter()
        .filter_map(|turn| IntentTrend::classify(&turn.instruction))
        .collect();
    let dominant_trend = dominant(&per_turn);
    let intent_trends: Vec<IntentTrend> = per_turn
        .iter()
        .copied()
        .collect::<IndexSet<_>>()
        .into_iter()
        .collect();

    let text = render_text(window.len(), &objects, style, dominant_trend);

    ContextDigest {
        text,
        objects: objects.into_iter().map(str::to_string).collect(),
        style,
        intent_trends,
        dominant_trend,
        turns_considered: window.len(),
    }
}

/// Most frequent trend; ties go to the one seen most recently
fn dominant(trends: &[IntentTrend]) -> Option<IntentTrend> {
    let mut best: Option<(IntentTrend, usize, usize)> = None;
    for trend in IntentTrend::ALL {
        let count = trends.iter().filter(|t| **t == trend).count();
        if count == 0 {
            continue;
        }
        let last_seen = trends.iter().rposition(|t| *t == trend).unwrap_or(0);
        let better = match best {
            None => true,
            Some((_, best_count, best_seen)) => {
                count > best_count || (count == best_count && last_seen > best_seen)
            }
        };
        if better {
            best = Some((trend, count, last_seen));
        }
    }
    best.map(|(trend, _, _)| trend)
}

fn render_text(
    turns: usize,
    objects: &IndexSet<&str>,
    style: Option<StyleMarker>,
    trend: Option<IntentTrend>,
) -> String {
    let mut parts = vec![format!("{turns} recent turn(s)")];

    if !objects.is_empty() {
        let listed: Vec<&str> = objects.iter().take(MAX_LISTED_OBJECTS).copied().collect();
        let mut line = format!("objects: {}", listed.join(", "));
        if objects.len() > MAX_LISTED_OBJECTS {
            line.push_str(" and more");
        }
        parts.push(line);
    }
    if let Some(style) = style {
        parts.push(style.to_string());
    }
    if let Some(trend) = trend {
        parts.push(format!("mostly {trend}"));
    }

    parts.join("; ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use mathspace_artifact::analyze;
    use pretty_assertions::assert_eq;

    fn turn(instruction: &str, objects: &[&str]) -> Turn {
        Turn::new(instruction, "").with_analysis(
            analyze("x = 1\n"),
            objects.iter().map(|o| o.to_string()).collect(),
        )
    }

    #[test]
    fn empty_history_yields_fixed_digest() {
        let digest = summarize(&ConversationHistory::new());
        assert_eq!(digest.text, NO_HISTORY_TEXT);
        assert!(digest.objects.is_empty());
        assert!(digest.intent_trends.is_empty());
        assert!(digest.style.is_none());
        assert!(digest.is_empty());
    }

    #[test]
    fn only_newest_window_is_considered() {
        let history: ConversationHistory = vec![
            turn("draw a circle", &["old"]),
            turn("add a square", &["a"]),
            turn("add a dot", &["b", "a"]),
            turn("change color", &["c"]),
        ]
        .into_iter()
        .collect();

        let digest = summarize(&history);
        assert_eq!(digest.turns_considered, 3);
        assert_eq!(digest.objects, vec!["a", "b", "c"]);
    }

    #[test]
    fn add_wins_over_modify_within_a_turn() {
        assert_eq!(IntentTrend::classify("Add and change the circle"), Some(IntentTrend::Add));
        assert_eq!(IntentTrend::classify("修改颜色"), Some(IntentTrend::Modify));
        assert_eq!(IntentTrend::classify("hello"), None);
    }

    #[test]
    fn dominant_trend_ties_go_to_most_recent() {
        let window = vec![turn("add a dot", &[]), turn("move the dot", &[])];
        let digest = summarize_window(&window);
        assert_eq!(digest.dominant_trend, Some(IntentTrend::Modify));
        assert_eq!(digest.intent_trends, vec![IntentTrend::Add, IntentTrend::Modify]);
    }

    #[test]
    fn dominant_trend_prefers_frequency() {
        let window = vec![turn("add a", &[]), turn("add b", &[]), turn("move b", &[])];
        assert_eq!(summarize_window(&window).dominant_trend, Some(IntentTrend::Add));
    }

    #[test]
    fn axes_in_any_turn_sets_style() {
        let with_axes = Turn::new("plot", "").with_analysis(
            analyze("class S(Scene):\n    def construct(self):\n        ax = Axes()\n"),
            vec!["ax".to_string()],
        );
        let digest = summarize_window(&[turn("add a dot", &[]), with_axes]);
        assert_eq!(digest.style, Some(StyleMarker::CoordinateAxes));
        assert!(digest.text.contains("uses coordinate axes"));
    }

    #[test]
    fn text_elides_long_object_lists() {
        let window = vec![turn("x", &["a", "b", "c", "d", "e", "f"])];
        let digest = summarize_window(&window);
        assert!(digest.text.contains("objects: a, b, c, d, e and more"));
        assert_eq!(digest.objects.len(), 6);
    }
}
