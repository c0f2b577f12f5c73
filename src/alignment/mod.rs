//! Human vs. model agreement on a rubric.
//!
//! The human score sheet defines which items are compared. An item is aligned
//! when the model gave the same verdict for the same key.

pub mod history;

pub use history::{AlignmentEntry, AlignmentHistory};

use serde::{Deserialize, Serialize};

use crate::rubric::{Rubric, RubricError, ScoreSheet};

/// Alignment at or above this percentage clears the Gemini phase.
pub const ALIGNMENT_THRESHOLD: u8 = 80;

/// Placeholder for a verdict the model did not give.
const MISSING_SCORE: &str = "N/A";

/// A rubric item the two graders disagreed on.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MisalignedItem {
    pub id: String,
    pub question: String,
    pub human_score: String,
    pub model_score: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AlignmentResult {
    /// `round(aligned / total * 100)`, or 0 when nothing was compared.
    pub percentage: u8,
    pub aligned: usize,
    pub total: usize,
    pub misaligned_items: Vec<MisalignedItem>,
}

impl AlignmentResult {
    pub fn meets_threshold(&self) -> bool {
        self.percentage >= ALIGNMENT_THRESHOLD
    }
}

fn percentage(aligned: usize, total: usize) -> u8 {
    if total == 0 {
        return 0;
    }
    ((aligned as f64 / total as f64) * 100.0).round() as u8
}

/// Compare human and model verdicts item by item.
pub fn calculate_alignment(human: &ScoreSheet, model: &ScoreSheet, rubric: &Rubric) -> AlignmentResult {
    let mut aligned = 0;
    let mut misaligned_items = Vec::new();

    for (key, human_score) in human.iter() {
        let model_score = model.get(key);
        if model_score == Some(human_score) {
            aligned += 1;
            continue;
        }
        misaligned_items.push(MisalignedItem {
            id: key.to_string(),
            question: rubric
                .question(key)
                .map(|q| q.to_string())
                .unwrap_or_else(|| format!("Rubric item {}", key)),
            human_score: human_score.to_string(),
            model_score: model_score
                .map(|s| s.to_string())
                .unwrap_or_else(|| MISSING_SCORE.to_string()),
        });
    }

    let total = human.len();
    AlignmentResult {
        percentage: percentage(aligned, total),
        aligned,
        total,
        misaligned_items,
    }
}

/// [`calculate_alignment`] over raw JSON documents.
pub fn calculate_alignment_json(
    human_raw: &str,
    model_raw: &str,
    rubric_raw: &str,
) -> Result<AlignmentResult, RubricError> {
    let human = ScoreSheet::from_json(human_raw)?;
    let model = ScoreSheet::from_json(model_raw)?;
    let rubric = Rubric::from_json(rubric_raw)?;
    Ok(calculate_alignment(&human, &model, &rubric))
}
