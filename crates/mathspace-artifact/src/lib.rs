//! MathSpace Artifact Analysis
//!
//! Pure, I/O-free inspection of generated Manim scene scripts and of the
//! raw text returned by the LLM stages.
//!
//! # Core Concepts
//!
//! - [`analyze`]: grammar-level pass over the script (tree-sitter Python)
//! - [`extract_objects`]: looser textual pass for named scene objects
//! - [`extract_code_block`], [`extract_intent`], [`extract_rating`]: shared
//!   extraction rules applied to LLM responses
//!
//! The two script passes are intentionally independent. They trade
//! precision for recall differently and only feed contextual data.
//!
//! # Example
//!
//! ```rust
//! use mathspace_artifact::{analyze, extract_objects};
//!
//! let source = "class MathScene(Scene):\n    def construct(self):\n        c = Circle()\n        self.add(c)\n";
//! let analysis = analyze(source);
//! assert_eq!(analysis.structure().and_then(|s| s.scene_class.as_deref()), Some("MathScene"));
//! assert_eq!(extract_objects(source), vec!["c".to_string()]);
//! ```

#![warn(unreachable_pub)]
#![allow(missing_docs)]

mod intent;
mod objects;
mod response;
mod structure;

pub use intent::{ContextRelation, IntentClassification, IntentKind, Rating};
pub use objects::{extract_objects, RESERVED_NAMES};
pub use response::{extract_code_block, extract_intent, extract_rating, RATING_MARKER};
pub use structure::{
    analyze, SceneStructure, StructuralAnalysis, AXES_CONSTRUCTOR, KNOWN_ANIMATIONS,
    SCENE_BASE_MARKER, UNPARSEABLE_MESSAGE,
};

/// Truncate `text` to at most `max_chars` characters, appending `...`
/// when anything was cut.
#[must_use]
pub fn truncate_with_ellipsis(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((byte_idx, _)) => format!("{}...", &text[..byte_idx]),
        None => text.to_string(),
    }
}

/// Last `max_chars` characters of `text`.
#[must_use]
pub fn tail_chars(text: &str, max_chars: usize) -> &str {
    let total = text.chars().count();
    if total <= max_chars {
        return text;
    }
    let skip = total - max_chars;
    match text.char_indices().nth(skip) {
        Some((byte_idx, _)) => &text[byte_idx..],
        None => "",
    }
}

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn truncate_keeps_short_text() {
        assert_eq!(truncate_with_ellipsis("abc", 5), "abc");
        assert_eq!(truncate_with_ellipsis("abcde", 5), "abcde");
    }

    #[test]
    fn truncate_cuts_on_char_boundary() {
        assert_eq!(truncate_with_ellipsis("abcdef", 3), "abc...");
        assert_eq!(truncate_with_ellipsis("圆形正方形", 2), "圆形...");
    }

    #[test]
    fn tail_returns_suffix() {
        assert_eq!(tail_chars("hello world", 5), "world");
        assert_eq!(tail_chars("hi", 5), "hi");
        assert_eq!(tail_chars("错误信息", 2), "信息");
    }
}
