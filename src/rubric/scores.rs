//! Yes/No score sheets and their validation against a rubric.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use super::{compare_keys, Rubric, RubricError};

/// A single rubric verdict.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Score {
    Yes,
    No,
}

impl Score {
    pub fn as_str(&self) -> &'static str {
        match self {
            Score::Yes => "Yes",
            Score::No => "No",
        }
    }

    fn parse(value: &str) -> Option<Self> {
        match value {
            "Yes" => Some(Score::Yes),
            "No" => Some(Score::No),
            _ => None,
        }
    }
}

impl std::fmt::Display for Score {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Scores keyed by rubric key.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ScoreSheet(BTreeMap<String, Score>);

impl ScoreSheet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse a score document; any value other than "Yes"/"No" is an error.
    pub fn from_json(raw: &str) -> Result<Self, RubricError> {
        Ok(serde_json::from_str(raw)?)
    }

    pub fn insert(&mut self, key: impl Into<String>, score: Score) {
        self.0.insert(key.into(), score);
    }

    pub fn get(&self, key: &str) -> Option<Score> {
        self.0.get(key).copied()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Entries in rubric order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, Score)> {
        let mut entries: Vec<(&str, Score)> =
            self.0.iter().map(|(k, v)| (k.as_str(), *v)).collect();
        entries.sort_by(|a, b| compare_keys(a.0, b.0));
        entries.into_iter()
    }

    pub fn to_json(&self) -> String {
        serde_json::to_string(&self.0).unwrap_or_else(|_| "{}".to_string())
    }
}

impl FromIterator<(String, Score)> for ScoreSheet {
    fn from_iter<I: IntoIterator<Item = (String, Score)>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

/// Outcome of [`validate_scores_json`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ScoreValidation {
    pub is_valid: bool,
    pub errors: Vec<String>,
}

const MALFORMED_INPUT: &str = "Invalid JSON format in scores or rubric";

/// Validate a score document against the rubric it grades.
///
/// Every rubric key needs a "Yes"/"No" score and no other keys are allowed.
pub fn validate_scores_json(scores_raw: &str, rubric_raw: &str) -> ScoreValidation {
    let parsed = serde_json::from_str::<serde_json::Value>(scores_raw)
        .ok()
        .and_then(|v| match v {
            serde_json::Value::Object(map) => Some(map),
            _ => None,
        })
        .zip(Rubric::from_json(rubric_raw).ok());

    let Some((scores, rubric)) = parsed else {
        return ScoreValidation {
            is_valid: false,
            errors: vec![MALFORMED_INPUT.to_string()],
        };
    };

    let mut errors = Vec::new();

    for key in rubric.keys() {
        match scores.get(key) {
            None => errors.push(format!("Missing score for {}", key)),
            Some(value) => {
                if value.as_str().and_then(Score::parse).is_none() {
                    errors.push(format!(
                        "Invalid score for {}: must be \"Yes\" or \"No\"",
                        key
                    ));
                }
            }
        }
    }

    let mut extras: Vec<&String> = scores
        .keys()
        .filter(|key| !rubric.contains_key(key))
        .collect();
    extras.sort_by(|a, b| compare_keys(a, b));
    for key in extras {
        errors.push(format!("Unexpected score key {} is not in the rubric", key));
    }

    ScoreValidation {
        is_valid: errors.is_empty(),
        errors,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const RUBRIC: &str = r#"{
        "rubric_1": "Is the response factually accurate?",
        "rubric_2": "Does the response answer the question?",
        "rubric_3": {"question": "Is the response concise enough?", "tag": "style"}
    }"#;

    #[test]
    fn test_complete_scores_are_valid() {
        let result = validate_scores_json(
            r#"{"rubric_1": "Yes", "rubric_2": "No", "rubric_3": "Yes"}"#,
            RUBRIC,
        );
        assert!(result.is_valid, "{:?}", result.errors);
    }

    #[test]
    fn test_missing_key_is_named() {
        let result = validate_scores_json(r#"{"rubric_1": "Yes", "rubric_3": "No"}"#, RUBRIC);
        assert!(!result.is_valid);
        assert_eq!(result.errors, vec!["Missing score for rubric_2".to_string()]);
    }

    #[test]
    fn test_extra_key_is_named() {
        let result = validate_scores_json(
            r#"{"rubric_1": "Yes", "rubric_2": "No", "rubric_3": "Yes", "rubric_4": "No"}"#,
            RUBRIC,
        );
        assert!(!result.is_valid);
        assert_eq!(result.errors.len(), 1);
        assert!(result.errors[0].contains("rubric_4"));
    }

    #[test]
    fn test_values_must_be_exactly_yes_or_no() {
        let result = validate_scores_json(
            r#"{"rubric_1": "yes", "rubric_2": true, "rubric_3": "No"}"#,
            RUBRIC,
        );
        assert!(!result.is_valid);
        assert_eq!(result.errors.len(), 2);
        assert!(result.errors[0].contains("rubric_1"));
        assert!(result.errors[1].contains("rubric_2"));
    }

    #[test]
    fn test_malformed_json_is_one_generic_error() {
        for (scores, rubric) in [("{", RUBRIC), ("{}", "not json"), ("[]", RUBRIC)] {
            let result = validate_scores_json(scores, rubric);
            assert!(!result.is_valid);
            assert_eq!(result.errors, vec![MALFORMED_INPUT.to_string()]);
        }
    }

    #[test]
    fn test_score_sheet_parses_and_orders() {
        let sheet =
            ScoreSheet::from_json(r#"{"rubric_10": "No", "rubric_2": "Yes"}"#).unwrap();
        assert_eq!(sheet.get("rubric_2"), Some(Score::Yes));
        let keys: Vec<&str> = sheet.iter().map(|(k, _)| k).collect();
        assert_eq!(keys, vec!["rubric_2", "rubric_10"]);
        assert!(ScoreSheet::from_json(r#"{"rubric_1": "Maybe"}"#).is_err());
    }
}
