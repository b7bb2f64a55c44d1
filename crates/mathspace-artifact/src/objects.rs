//! Textual object extraction
//!
//! A deliberately loose pass over the raw script text. It catches object
//! names the grammar pass does not track (objects passed to `self.add`,
//! animated inside `self.play`). False positives are acceptable: the
//! result only feeds context digests and history.

use indexmap::IndexSet;
use once_cell::sync::Lazy;
use regex::Regex;

/// Names never reported as scene objects
pub const RESERVED_NAMES: [&str; 2] = ["self", "Scene"];

/// Ordered extraction rules. When a rule has two groups the first
/// non-empty one wins.
static OBJECT_RULES: Lazy<Vec<Regex>> = Lazy::new(|| {
    [
        r"(\w+)\s*=\s*(Circle|Square|Triangle|Rectangle|Line|Dot|Text|MathTex)\b",
        r"self\.add\((\w+)\)",
        r"self\.play\(\s*\w+\(\s*(\w+)",
        r"def construct\(self\):[\s\S]*?(\w+)\s*=",
    ]
    .iter()
    .map(|pattern| Regex::new(pattern).expect("object rule must compile"))
    .collect()
});

/// Extract scene object names in first-seen order.
#[must_use]
pub fn extract_objects(source: &str) -> Vec<String> {
    let mut objects: IndexSet<String> = IndexSet::new();

    for rule in OBJECT_RULES.iter() {
        for captures in rule.captures_iter(source) {
            let name = captures
                .iter()
                .skip(1)
                .flatten()
                .map(|m| m.as_str())
                .find(|text| !text.is_empty());

            if let Some(name) = name {
                if !RESERVED_NAMES.contains(&name) {
                    objects.insert(name.to_string());
                }
            }
        }
    }

    objects.into_iter().collect()
}
