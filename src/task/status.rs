//! Task status state machine.
//!
//! # State Machine
//! ```text
//! Task_Creation -> Rubric_V1 -> Rubric_V2 -> Model_Eval_Gemini --(>= 80)--> Human_Eval_GPT
//!                                   ^              |                              |
//!                                   |           (< 80)                            v
//!                         Human_Eval_Gemini <- Rubric_Enhancing            Model_Eval_GPT
//!                                                                                 |
//!                                                                                 v
//!                                                                             Completed
//! ```
//!
//! From `Human_Eval_Gemini` onward a status names the step that is due. Each
//! [`WorkflowStep`] accepts a fixed whitelist of current statuses; anything
//! else is rejected, never corrected.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::task::EvalModel;
use crate::alignment::AlignmentResult;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TaskStatus {
    #[serde(rename = "Task_Creation")]
    TaskCreation,
    #[serde(rename = "Rubric_V1")]
    RubricV1,
    #[serde(rename = "Rubric_V2")]
    RubricV2,
    #[serde(rename = "Human_Eval_Gemini")]
    HumanEvalGemini,
    #[serde(rename = "Rubric_Enhancing")]
    RubricEnhancing,
    #[serde(rename = "Model_Eval_Gemini")]
    ModelEvalGemini,
    #[serde(rename = "Human_Eval_GPT")]
    HumanEvalGpt,
    #[serde(rename = "Model_Eval_GPT")]
    ModelEvalGpt,
    #[serde(rename = "Completed")]
    Completed,
}

impl TaskStatus {
    pub const ALL: [TaskStatus; 9] = [
        TaskStatus::TaskCreation,
        TaskStatus::RubricV1,
        TaskStatus::RubricV2,
        TaskStatus::HumanEvalGemini,
        TaskStatus::RubricEnhancing,
        TaskStatus::ModelEvalGemini,
        TaskStatus::HumanEvalGpt,
        TaskStatus::ModelEvalGpt,
        TaskStatus::Completed,
    ];

    /// Stored/wire name.
    pub fn as_str(&self) -> &'static str {
        match self {
            TaskStatus::TaskCreation => "Task_Creation",
            TaskStatus::RubricV1 => "Rubric_V1",
            TaskStatus::RubricV2 => "Rubric_V2",
            TaskStatus::HumanEvalGemini => "Human_Eval_Gemini",
            TaskStatus::RubricEnhancing => "Rubric_Enhancing",
            TaskStatus::ModelEvalGemini => "Model_Eval_Gemini",
            TaskStatus::HumanEvalGpt => "Human_Eval_GPT",
            TaskStatus::ModelEvalGpt => "Model_Eval_GPT",
            TaskStatus::Completed => "Completed",
        }
    }

    /// Human-readable label for the UI.
    pub fn label(&self) -> &'static str {
        match self {
            TaskStatus::TaskCreation => "Task created",
            TaskStatus::RubricV1 => "Rubric V1 submitted",
            TaskStatus::RubricV2 => "Rubric V2 submitted",
            TaskStatus::HumanEvalGemini => "Gemini human evaluation due",
            TaskStatus::RubricEnhancing => "Rubric enhancement required",
            TaskStatus::ModelEvalGemini => "Gemini model evaluation due",
            TaskStatus::HumanEvalGpt => "GPT human evaluation due",
            TaskStatus::ModelEvalGpt => "GPT model evaluation due",
            TaskStatus::Completed => "Completed",
        }
    }

    /// The step a trainer should perform next.
    pub fn next_step(&self) -> Option<WorkflowStep> {
        match self {
            TaskStatus::TaskCreation => Some(WorkflowStep::RubricV1),
            TaskStatus::RubricV1 | TaskStatus::RubricEnhancing => {
                Some(WorkflowStep::RubricEnhanced)
            }
            TaskStatus::RubricV2 | TaskStatus::HumanEvalGemini => {
                Some(WorkflowStep::HumanEval(EvalModel::Gemini))
            }
            TaskStatus::ModelEvalGemini => Some(WorkflowStep::ModelEval(EvalModel::Gemini)),
            TaskStatus::HumanEvalGpt => Some(WorkflowStep::HumanEval(EvalModel::Gpt)),
            TaskStatus::ModelEvalGpt => Some(WorkflowStep::ModelEval(EvalModel::Gpt)),
            TaskStatus::Completed => None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, TaskStatus::Completed)
    }
}

impl std::fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Unknown task status: {0}")]
pub struct UnknownStatus(pub String);

impl std::str::FromStr for TaskStatus {
    type Err = UnknownStatus;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        TaskStatus::ALL
            .into_iter()
            .find(|status| status.as_str() == s)
            .ok_or_else(|| UnknownStatus(s.to_string()))
    }
}

/// A task mutation, as named by the API.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "step", content = "model", rename_all = "camelCase")]
pub enum WorkflowStep {
    RubricV1,
    RubricEnhanced,
    HumanEval(EvalModel),
    ModelEval(EvalModel),
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Cannot {step} while task status is {current}. Allowed statuses: {}", allowed_list(.allowed))]
pub struct TransitionError {
    pub step: &'static str,
    pub current: TaskStatus,
    pub allowed: &'static [TaskStatus],
}

fn allowed_list(allowed: &[TaskStatus]) -> String {
    allowed
        .iter()
        .map(TaskStatus::as_str)
        .collect::<Vec<_>>()
        .join(", ")
}

impl WorkflowStep {
    pub fn name(&self) -> &'static str {
        match self {
            WorkflowStep::RubricV1 => "updateRubricV1",
            WorkflowStep::RubricEnhanced => "updateRubricEnhanced",
            WorkflowStep::HumanEval(EvalModel::Gemini) => "updateHumanEvalGemini",
            WorkflowStep::HumanEval(EvalModel::Gpt) => "updateHumanEvalGPT",
            WorkflowStep::ModelEval(EvalModel::Gemini) => "updateModelEvalGemini",
            WorkflowStep::ModelEval(EvalModel::Gpt) => "updateModelEvalGPT",
        }
    }

    /// Statuses from which this step may run.
    pub fn allowed_statuses(&self) -> &'static [TaskStatus] {
        match self {
            WorkflowStep::RubricV1 => &[TaskStatus::TaskCreation],
            WorkflowStep::RubricEnhanced => &[TaskStatus::RubricV1, TaskStatus::RubricEnhancing],
            WorkflowStep::HumanEval(EvalModel::Gemini) => &[
                TaskStatus::RubricV2,
                TaskStatus::HumanEvalGemini,
                TaskStatus::ModelEvalGemini,
            ],
            WorkflowStep::ModelEval(EvalModel::Gemini) => &[TaskStatus::ModelEvalGemini],
            WorkflowStep::HumanEval(EvalModel::Gpt) => {
                &[TaskStatus::HumanEvalGpt, TaskStatus::ModelEvalGpt]
            }
            WorkflowStep::ModelEval(EvalModel::Gpt) => &[TaskStatus::ModelEvalGpt],
        }
    }

    pub fn check(&self, current: TaskStatus) -> Result<(), TransitionError> {
        let allowed = self.allowed_statuses();
        if allowed.contains(&current) {
            Ok(())
        } else {
            Err(TransitionError {
                step: self.name(),
                current,
                allowed,
            })
        }
    }
}

/// Status after an enhanced rubric is saved from `from`.
///
/// The first enhancement produces V2; later ones send the trainer back to
/// human evaluation against the new version.
pub fn after_rubric_enhanced(from: TaskStatus) -> TaskStatus {
    match from {
        TaskStatus::RubricV1 => TaskStatus::RubricV2,
        _ => TaskStatus::HumanEvalGemini,
    }
}

/// Status after human scores for `model` are saved.
pub fn after_human_eval(model: EvalModel) -> TaskStatus {
    match model {
        EvalModel::Gemini => TaskStatus::ModelEvalGemini,
        EvalModel::Gpt => TaskStatus::ModelEvalGpt,
    }
}

/// Status after model scores for `model` are saved.
///
/// Only the Gemini phase is gated on alignment; the GPT phase always
/// completes.
pub fn after_model_eval(model: EvalModel, alignment: &AlignmentResult) -> TaskStatus {
    match model {
        EvalModel::Gemini if alignment.meets_threshold() => TaskStatus::HumanEvalGpt,
        EvalModel::Gemini => TaskStatus::RubricEnhancing,
        EvalModel::Gpt => TaskStatus::Completed,
    }
}
