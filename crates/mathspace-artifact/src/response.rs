//! Extraction rules shared by the LLM stages
//!
//! - code blocks (generator, reviser and repair outputs)
//! - intent JSON (intent stage)
//! - rating marker (critique stage)

use crate::intent::{IntentClassification, Rating};
use once_cell::sync::Lazy;
use regex::Regex;

/// Literal section marker the critique stage is asked to emit
pub const RATING_MARKER: &str = "[Overall Rating]";

/// Fence patterns in priority order: python-tagged, any fence, inline code tag
static CODE_PATTERNS: Lazy<[Regex; 3]> = Lazy::new(|| {
    [
        Regex::new(r"(?s)```python(.*?)```").expect("python fence pattern"),
        Regex::new(r"(?s)```(.*?)```").expect("generic fence pattern"),
        Regex::new(r"(?s)<code>(.*?)</code>").expect("code tag pattern"),
    ]
});

static LANGUAGE_TAG: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)^python(?:\s+|$)").expect("language tag pattern"));

static JSON_OBJECT: Lazy<Regex> = Lazy::new(|| Regex::new(r"\{[\s\S]*\}").expect("json pattern"));

static RATING: Lazy<Regex> = Lazy::new(|| {
    Regex::new(&format!(
        r"(?i){}\s*(PASS|WARN|FAIL)",
        regex::escape(RATING_MARKER)
    ))
    .expect("rating pattern")
});

/// Pull the script out of a raw LLM response.
///
/// Falls back to the whole trimmed response with fence markers removed
/// when no block is found.
#[must_use]
pub fn extract_code_block(response: &str) -> String {
    for pattern in CODE_PATTERNS.iter() {
        if let Some(captures) = pattern.captures(response) {
            let body = captures.get(1).map_or("", |m| m.as_str()).trim();
            return LANGUAGE_TAG.replace(body, "").into_owned();
        }
    }
    response.trim().replace("```", "")
}

/// Parse the first brace-delimited span of a response as an intent
/// classification. Any failure yields `None`.
#[must_use]
pub fn extract_intent(response: &str) -> Option<IntentClassification> {
    let candidate = JSON_OBJECT.find(response)?;
    serde_json::from_str(candidate.as_str()).ok()
}

/// Read the advisory rating from critique text.
#[must_use]
pub fn extract_rating(critique: &str) -> Rating {
    let Some(captures) = RATING.captures(critique) else {
        return Rating::Unknown;
    };
    match captures[1].to_ascii_uppercase().as_str() {
        "PASS" => Rating::Pass,
        "WARN" => Rating::Warn,
        "FAIL" => Rating::Fail,
        _ => Rating::Unknown,
    }
}
