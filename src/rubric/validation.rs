//! Authoring-time validation of rubric documents.
//!
//! All problems are collected into one list so a single submission shows the
//! trainer everything that needs fixing.

use regex::Regex;
use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::OnceLock;

use super::{
    compare_keys, is_rubric_key, rubric_index, MAX_RUBRIC_ITEMS, MAX_TAG_CHARS,
    MIN_QUESTION_CHARS, MIN_RUBRIC_ITEMS,
};

/// Outcome of [`validate_rubric_json`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RubricValidation {
    pub is_valid: bool,
    pub errors: Vec<String>,
    /// Number of `rubric_N` keys found (valid or not).
    pub rubric_count: usize,
}

impl RubricValidation {
    fn from_errors(errors: Vec<String>, rubric_count: usize) -> Self {
        Self {
            is_valid: errors.is_empty(),
            errors,
            rubric_count,
        }
    }
}

fn quoted_key_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r#""(rubric_\d+)"\s*:"#).expect("quoted key pattern is valid"))
}

/// `rubric_N` keys that occur more than once in the raw text, in order of
/// first repetition.
///
/// This runs on the raw text because a JSON parser keeps only the last
/// occurrence of a repeated key.
fn duplicate_keys(raw: &str) -> Vec<String> {
    let mut seen: BTreeMap<&str, usize> = BTreeMap::new();
    let mut duplicates = Vec::new();
    for caps in quoted_key_regex().captures_iter(raw) {
        let Some(key) = caps.get(1).map(|m| m.as_str()) else {
            continue;
        };
        let count = seen.entry(key).or_insert(0);
        *count += 1;
        if *count == 2 {
            duplicates.push(key.to_string());
        }
    }
    duplicates
}

fn char_len(text: &str) -> usize {
    text.trim().chars().count()
}

fn validate_item(key: &str, value: &serde_json::Value, errors: &mut Vec<String>) {
    match value {
        serde_json::Value::String(question) => {
            if char_len(question) < MIN_QUESTION_CHARS {
                errors.push(format!(
                    "{}: question must be at least {} characters",
                    key, MIN_QUESTION_CHARS
                ));
            }
        }
        serde_json::Value::Object(fields) => {
            match fields.get("question").and_then(|q| q.as_str()) {
                Some(question) if char_len(question) >= MIN_QUESTION_CHARS => {}
                _ => errors.push(format!(
                    "{}: \"question\" must be a string of at least {} characters",
                    key, MIN_QUESTION_CHARS
                )),
            }
            match fields.get("tag").and_then(|t| t.as_str()) {
                Some(tag) if (1..=MAX_TAG_CHARS).contains(&char_len(tag)) => {}
                _ => errors.push(format!(
                    "{}: \"tag\" must be a string of 1-{} characters",
                    key, MAX_TAG_CHARS
                )),
            }
        }
        _ => errors.push(format!(
            "{}: value must be a question string or an object with \"question\" and \"tag\"",
            key
        )),
    }
}

/// Warn (without rejecting) when rubric numbers are not exactly 1..=N.
fn check_sequential(keys: &[&str]) {
    let mut numbers: Vec<u32> = keys.iter().filter_map(|k| rubric_index(k)).collect();
    numbers.sort_unstable();
    let sequential = numbers
        .iter()
        .enumerate()
        .all(|(i, n)| *n as usize == i + 1);
    if !sequential {
        tracing::warn!(
            numbers = ?numbers,
            "Rubric keys are not numbered sequentially from rubric_1"
        );
    }
}

/// Validate a submitted rubric document.
pub fn validate_rubric_json(raw: &str) -> RubricValidation {
    if raw.trim().is_empty() {
        return RubricValidation::from_errors(vec!["Rubric JSON cannot be empty".to_string()], 0);
    }

    let mut errors: Vec<String> = duplicate_keys(raw)
        .into_iter()
        .map(|key| {
            format!(
                "Duplicate key \"{}\" found. Each rubric item must have a unique key",
                key
            )
        })
        .collect();

    let value: serde_json::Value = match serde_json::from_str(raw) {
        Ok(value) => value,
        Err(e) => {
            errors.push(format!("Invalid JSON format: {}", e));
            return RubricValidation::from_errors(errors, 0);
        }
    };

    let Some(object) = value.as_object() else {
        errors.push("Rubric must be a JSON object".to_string());
        return RubricValidation::from_errors(errors, 0);
    };

    let mut keys: Vec<&str> = object.keys().map(String::as_str).collect();
    keys.sort_by(|a, b| compare_keys(a, b));

    let (rubric_keys, foreign_keys): (Vec<&str>, Vec<&str>) =
        keys.into_iter().partition(|key| is_rubric_key(key));

    for key in &foreign_keys {
        errors.push(format!(
            "Invalid key \"{}\". Keys must follow the pattern rubric_N (e.g. rubric_1)",
            key
        ));
    }

    let rubric_count = rubric_keys.len();
    if !(MIN_RUBRIC_ITEMS..=MAX_RUBRIC_ITEMS).contains(&rubric_count) {
        errors.push(format!(
            "Rubric must contain between {} and {} items (found {})",
            MIN_RUBRIC_ITEMS, MAX_RUBRIC_ITEMS, rubric_count
        ));
    }

    for key in &rubric_keys {
        if let Some(value) = object.get(*key) {
            validate_item(key, value, &mut errors);
        }
    }

    check_sequential(&rubric_keys);

    RubricValidation::from_errors(errors, rubric_count)
}
