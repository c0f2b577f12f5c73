//! Rubric documents: parsing, validation and score sheets.
//!
//! A rubric is a JSON object of `rubric_N` keys. Each value is either the
//! question text (simple form) or `{"question": ..., "tag": ...}` (structured
//! form). Both forms may be mixed within one document.
//!
//! - `validation`: authoring-time checks for a submitted rubric
//! - `scores`: Yes/No score sheets and their validation against a rubric

pub mod scores;
pub mod validation;

pub use scores::{validate_scores_json, Score, ScoreSheet, ScoreValidation};
pub use validation::{validate_rubric_json, RubricValidation};

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::OnceLock;
use thiserror::Error;

/// Minimum number of items in a rubric.
pub const MIN_RUBRIC_ITEMS: usize = 15;

/// Maximum number of items in a rubric.
pub const MAX_RUBRIC_ITEMS: usize = 50;

/// Minimum question length in characters.
pub const MIN_QUESTION_CHARS: usize = 10;

/// Maximum tag length in characters (structured form).
pub const MAX_TAG_CHARS: usize = 20;

#[derive(Debug, Error)]
pub enum RubricError {
    #[error("Invalid rubric JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Rubric must be a JSON object")]
    NotAnObject,
}

fn rubric_key_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^rubric_(\d+)$").expect("rubric key pattern is valid"))
}

/// Whether `key` has the `rubric_N` shape.
pub fn is_rubric_key(key: &str) -> bool {
    rubric_key_regex().is_match(key)
}

/// Numeric part of a `rubric_N` key.
pub fn rubric_index(key: &str) -> Option<u32> {
    rubric_key_regex()
        .captures(key)
        .and_then(|caps| caps.get(1))
        .and_then(|m| m.as_str().parse().ok())
}

/// Order two keys by rubric number, falling back to lexical order for
/// anything that is not a `rubric_N` key.
pub(crate) fn compare_keys(a: &str, b: &str) -> std::cmp::Ordering {
    match (rubric_index(a), rubric_index(b)) {
        (Some(x), Some(y)) => x.cmp(&y),
        (Some(_), None) => std::cmp::Ordering::Less,
        (None, Some(_)) => std::cmp::Ordering::Greater,
        (None, None) => a.cmp(b),
    }
}

/// One rubric question.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RubricItem {
    pub key: String,
    pub question: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tag: Option<String>,
}

/// A parsed rubric document, items ordered by rubric number.
///
/// Parsing does not enforce authoring rules (item count, lengths); use
/// [`validate_rubric_json`] for that before accepting a submission.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rubric {
    pub items: Vec<RubricItem>,
}

impl Rubric {
    /// Parse a rubric document.
    ///
    /// Values that are neither a string nor an object with a string
    /// `question` are kept with an empty question so key sets stay intact.
    pub fn from_json(raw: &str) -> Result<Self, RubricError> {
        let value: serde_json::Value = serde_json::from_str(raw)?;
        let object = value.as_object().ok_or(RubricError::NotAnObject)?;

        let mut items: Vec<RubricItem> = object
            .iter()
            .map(|(key, value)| {
                let (question, tag) = match value {
                    serde_json::Value::String(text) => (text.clone(), None),
                    serde_json::Value::Object(fields) => (
                        fields
                            .get("question")
                            .and_then(|q| q.as_str())
                            .unwrap_or_default()
                            .to_string(),
                        fields
                            .get("tag")
                            .and_then(|t| t.as_str())
                            .map(|t| t.to_string()),
                    ),
                    _ => (String::new(), None),
                };
                RubricItem {
                    key: key.clone(),
                    question,
                    tag,
                }
            })
            .collect();
        items.sort_by(|a, b| compare_keys(&a.key, &b.key));

        Ok(Self { items })
    }

    /// Keys in rubric order.
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.items.iter().map(|item| item.key.as_str())
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.items.iter().any(|item| item.key == key)
    }

    /// Question text for `key`, if the rubric has a non-empty one.
    pub fn question(&self, key: &str) -> Option<&str> {
        self.items
            .iter()
            .find(|item| item.key == key)
            .map(|item| item.question.as_str())
            .filter(|q| !q.is_empty())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rubric_key_shape() {
        assert!(is_rubric_key("rubric_1"));
        assert!(is_rubric_key("rubric_42"));
        assert!(!is_rubric_key("rubric_"));
        assert!(!is_rubric_key("Rubric_1"));
        assert!(!is_rubric_key("rubric_1a"));
        assert!(!is_rubric_key("question_1"));
        assert_eq!(rubric_index("rubric_17"), Some(17));
        assert_eq!(rubric_index("other"), None);
    }

    #[test]
    fn test_from_json_orders_numerically_and_reads_both_forms() {
        let raw = r#"{
            "rubric_10": "Does the answer cite sources?",
            "rubric_2": {"question": "Is the tone professional?", "tag": "style"},
            "rubric_1": "Is the response factually correct?"
        }"#;
        let rubric = Rubric::from_json(raw).unwrap();
        let keys: Vec<&str> = rubric.keys().collect();
        assert_eq!(keys, vec!["rubric_1", "rubric_2", "rubric_10"]);
        assert_eq!(rubric.items[1].tag.as_deref(), Some("style"));
        assert_eq!(
            rubric.question("rubric_2"),
            Some("Is the tone professional?")
        );
        assert_eq!(rubric.question("rubric_99"), None);
    }

    #[test]
    fn test_from_json_rejects_non_object() {
        assert!(matches!(
            Rubric::from_json("[1, 2]"),
            Err(RubricError::NotAnObject)
        ));
        assert!(matches!(Rubric::from_json("{"), Err(RubricError::Json(_))));
    }
}
