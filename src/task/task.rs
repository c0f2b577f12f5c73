//! The task record: one trainer-submitted evaluation unit.
//!
//! # Invariants
//! - `current_rubric_version` names an existing rubric snapshot once
//!   `status` is past `Task_Creation`
//! - rubric snapshots are append-only (see [`RubricVersions`])

use serde::{Deserialize, Serialize};

use super::status::TaskStatus;
use super::versions::{rubric_field_name, RubricVersion, RubricVersions};
use crate::alignment::{AlignmentHistory, MisalignedItem};
use crate::rubric::ScoreSheet;

/// The two models whose responses are graded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EvalModel {
    Gemini,
    #[serde(rename = "GPT")]
    Gpt,
}

impl EvalModel {
    /// Suffix used in record-store field names (`Human_Eval_Gemini`).
    pub fn field_suffix(&self) -> &'static str {
        match self {
            EvalModel::Gemini => "Gemini",
            EvalModel::Gpt => "GPT",
        }
    }
}

impl std::fmt::Display for EvalModel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.field_suffix())
    }
}

impl std::str::FromStr for EvalModel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "gemini" => Ok(EvalModel::Gemini),
            "gpt" => Ok(EvalModel::Gpt),
            other => Err(format!("Unknown model: {}", other)),
        }
    }
}

/// Professional sector of the prompt author.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ProfessionalSector {
    Healthcare,
    Finance,
    Legal,
    Education,
    Engineering,
    Technology,
    Science,
    Business,
    Government,
    Other,
}

impl ProfessionalSector {
    pub const ALL: [ProfessionalSector; 10] = [
        ProfessionalSector::Healthcare,
        ProfessionalSector::Finance,
        ProfessionalSector::Legal,
        ProfessionalSector::Education,
        ProfessionalSector::Engineering,
        ProfessionalSector::Technology,
        ProfessionalSector::Science,
        ProfessionalSector::Business,
        ProfessionalSector::Government,
        ProfessionalSector::Other,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ProfessionalSector::Healthcare => "Healthcare",
            ProfessionalSector::Finance => "Finance",
            ProfessionalSector::Legal => "Legal",
            ProfessionalSector::Education => "Education",
            ProfessionalSector::Engineering => "Engineering",
            ProfessionalSector::Technology => "Technology",
            ProfessionalSector::Science => "Science",
            ProfessionalSector::Business => "Business",
            ProfessionalSector::Government => "Government",
            ProfessionalSector::Other => "Other",
        }
    }
}

impl std::str::FromStr for ProfessionalSector {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ProfessionalSector::ALL
            .into_iter()
            .find(|sector| sector.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| format!("Unknown professional sector: {}", s))
    }
}

/// Licensing metadata for the submitted prompt and responses.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Licensing {
    /// License name, e.g. "CC-BY-4.0" or "Original work".
    pub license: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub attribution: Option<String>,
}

/// Human and model grading of one model's response.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelEvaluation {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub human_scores: Option<ScoreSheet>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model_scores: Option<ScoreSheet>,
    /// Agreement percentage (0-100).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub alignment: Option<u8>,
    #[serde(default)]
    pub misaligned: Vec<MisalignedItem>,
}

/// Content supplied when a task is created.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskContent {
    pub prompt: String,
    pub gpt_response: String,
    pub gemini_response: String,
    pub professional_sector: ProfessionalSector,
    pub licensing: Licensing,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Task {
    pub task_id: String,
    pub trainer_email: String,
    pub prompt: String,
    pub gpt_response: String,
    pub gemini_response: String,
    pub professional_sector: ProfessionalSector,
    pub licensing: Licensing,
    pub status: TaskStatus,
    pub current_rubric_version: u32,
    #[serde(default)]
    pub rubrics: RubricVersions,
    #[serde(default)]
    pub gemini: ModelEvaluation,
    #[serde(default)]
    pub gpt: ModelEvaluation,
    #[serde(default)]
    pub alignment_history: AlignmentHistory,
    /// Storage folder created for this task's attachments.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub folder: Option<String>,
    #[serde(default)]
    pub attachments: Vec<String>,
    pub created_at: String,
    pub updated_at: String,
}

impl Task {
    /// A freshly created task in `Task_Creation`.
    pub fn new(task_id: String, trainer_email: String, content: TaskContent) -> Self {
        let now = crate::util::now_string();
        Self {
            task_id,
            trainer_email,
            prompt: content.prompt,
            gpt_response: content.gpt_response,
            gemini_response: content.gemini_response,
            professional_sector: content.professional_sector,
            licensing: content.licensing,
            status: TaskStatus::TaskCreation,
            current_rubric_version: 1,
            rubrics: RubricVersions::new(),
            gemini: ModelEvaluation::default(),
            gpt: ModelEvaluation::default(),
            alignment_history: AlignmentHistory::new(),
            folder: None,
            attachments: Vec::new(),
            created_at: now.clone(),
            updated_at: now,
        }
    }

    /// Field name of the active rubric, `Rubric_V{current_rubric_version}`.
    pub fn current_rubric_field_name(&self) -> String {
        rubric_field_name(self.current_rubric_version)
    }

    /// The active rubric snapshot, if one has been written.
    pub fn current_rubric(&self) -> Option<&RubricVersion> {
        self.rubrics.get(self.current_rubric_version)
    }

    /// Version the next rubric submission will be stored as.
    pub fn next_rubric_version(&self) -> u32 {
        if self.rubrics.is_empty() {
            1
        } else {
            self.current_rubric_version + 1
        }
    }

    pub fn evaluation(&self, model: EvalModel) -> &ModelEvaluation {
        match model {
            EvalModel::Gemini => &self.gemini,
            EvalModel::Gpt => &self.gpt,
        }
    }

    pub fn evaluation_mut(&mut self, model: EvalModel) -> &mut ModelEvaluation {
        match model {
            EvalModel::Gemini => &mut self.gemini,
            EvalModel::Gpt => &mut self.gpt,
        }
    }

    /// Whether the Gemini phase has already cleared the alignment bar.
    pub fn gemini_aligned(&self) -> bool {
        self.gemini
            .alignment
            .map(|a| a >= crate::alignment::ALIGNMENT_THRESHOLD)
            .unwrap_or(false)
    }

    pub fn touch(&mut self) {
        self.updated_at = crate::util::now_string();
    }
}
