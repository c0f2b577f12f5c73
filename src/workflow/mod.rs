//! Task workflow operations.
//!
//! Every mutation follows the same sequence: load the caller's task, check
//! the status whitelist for the step, validate the input against the current
//! rubric, derive the new state, then write the record once.

use std::collections::HashSet;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use crate::alignment::{calculate_alignment, AlignmentEntry, AlignmentHistory};
use crate::files::{Attachment, FileStorage, FileStorageError, FolderRole};
use crate::rubric::{
    validate_rubric_json, validate_scores_json, Rubric, RubricValidation, ScoreSheet,
    ScoreValidation,
};
use crate::store::{StoreError, TaskStore};
use crate::task::status::{after_human_eval, after_model_eval, after_rubric_enhanced};
use crate::task::{
    EvalModel, Licensing, ProfessionalSector, Task, TaskContent, TaskStatus, TransitionError,
    VersionError, WorkflowStep,
};
use crate::util::{now_string, sanitize_filename};

#[derive(Debug, Error)]
pub enum WorkflowError {
    #[error("Validation failed: {}", .0.join("; "))]
    Validation(Vec<String>),

    #[error(transparent)]
    InvalidState(#[from] TransitionError),

    #[error("Gemini alignment is already {0}%; no further rubric versions are accepted")]
    AlreadyAligned(u8),

    #[error("Human {0} scores must be submitted before model scores")]
    MissingHumanScores(EvalModel),

    #[error("Task {task_id} has no rubric version {version}")]
    MissingRubric { task_id: String, version: u32 },

    #[error("Task {0} not found")]
    NotFound(String),

    #[error("INCOMPLETE_TASK_EXISTS:{task_id}:{}:{}", .status.as_str(), .status.label())]
    IncompleteTaskExists { task_id: String, status: TaskStatus },

    #[error(transparent)]
    Version(#[from] VersionError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Files(#[from] FileStorageError),
}

/// Input for creating a task.
#[derive(Debug, Clone, Deserialize)]
pub struct CreateTaskInput {
    pub prompt: String,
    pub gpt_response: String,
    pub gemini_response: String,
    pub professional_sector: ProfessionalSector,
    pub licensing: Licensing,
    #[serde(default)]
    pub attachments: Vec<Attachment>,
}

impl CreateTaskInput {
    fn validate(&self) -> Result<(), WorkflowError> {
        let mut errors = Vec::new();
        for (name, value) in [
            ("prompt", &self.prompt),
            ("gpt_response", &self.gpt_response),
            ("gemini_response", &self.gemini_response),
            ("licensing.license", &self.licensing.license),
        ] {
            if value.trim().is_empty() {
                errors.push(format!("{} is required", name));
            }
        }
        let mut names = HashSet::new();
        for attachment in &self.attachments {
            if attachment.file_name.trim().is_empty() {
                errors.push("Attachment file_name is required".to_string());
            } else if !names.insert(sanitize_filename(&attachment.file_name)) {
                errors.push(format!(
                    "Attachment {} would overwrite another attachment",
                    attachment.file_name
                ));
            }
        }
        if errors.is_empty() {
            Ok(())
        } else {
            Err(WorkflowError::Validation(errors))
        }
    }
}

/// Result of a successful mutation.
#[derive(Debug, Clone, Serialize)]
pub struct TaskMutation {
    pub success: bool,
    pub message: String,
    /// What the trainer should do next; `None` once the task is completed.
    pub next_step: Option<WorkflowStep>,
    pub task: Task,
}

impl TaskMutation {
    fn new(message: String, task: Task) -> Self {
        Self {
            success: true,
            message,
            next_step: task.status.next_step(),
            task,
        }
    }
}

pub struct TaskService {
    store: Arc<dyn TaskStore>,
    files: Arc<dyn FileStorage>,
}

impl TaskService {
    pub fn new(store: Arc<dyn TaskStore>, files: Arc<dyn FileStorage>) -> Self {
        Self { store, files }
    }

    pub fn store(&self) -> &Arc<dyn TaskStore> {
        &self.store
    }

    async fn load(&self, trainer_email: &str, task_id: &str) -> Result<Task, WorkflowError> {
        self.store
            .find_task(task_id, trainer_email)
            .await?
            .ok_or_else(|| WorkflowError::NotFound(task_id.to_string()))
    }

    /// Create a task for `trainer_email`.
    ///
    /// Refused while the trainer has another task that is not `Completed`.
    pub async fn create(
        &self,
        trainer_email: &str,
        input: CreateTaskInput,
    ) -> Result<TaskMutation, WorkflowError> {
        input.validate()?;

        if let Some(open) = self.store.find_incomplete_task(trainer_email).await? {
            return Err(WorkflowError::IncompleteTaskExists {
                task_id: open.task_id,
                status: open.status,
            });
        }

        let task_id = Uuid::new_v4().to_string();
        let folder = self
            .files
            .create_task_folder(trainer_email, &task_id)
            .await?;

        let mut uploaded = Vec::with_capacity(input.attachments.len());
        for attachment in &input.attachments {
            uploaded.push(self.files.upload_file(&folder, attachment).await?);
        }
        self.files
            .set_folder_permissions(&folder, trainer_email, FolderRole::Writer)
            .await?;

        let content = TaskContent {
            prompt: input.prompt,
            gpt_response: input.gpt_response,
            gemini_response: input.gemini_response,
            professional_sector: input.professional_sector,
            licensing: input.licensing,
        };
        let mut task = Task::new(task_id, trainer_email.to_string(), content);
        task.folder = Some(folder);
        task.attachments = uploaded;

        self.store.create_task(&task).await?;
        tracing::info!(task_id = %task.task_id, trainer = %trainer_email, "Task created");
        Ok(TaskMutation::new("Task created".to_string(), task))
    }

    pub async fn get(&self, trainer_email: &str, task_id: &str) -> Result<Task, WorkflowError> {
        self.load(trainer_email, task_id).await
    }

    pub async fn list(&self, trainer_email: &str) -> Result<Vec<Task>, WorkflowError> {
        Ok(self.store.list_tasks(trainer_email).await?)
    }

    pub async fn alignment_history(
        &self,
        trainer_email: &str,
        task_id: &str,
    ) -> Result<AlignmentHistory, WorkflowError> {
        Ok(self.load(trainer_email, task_id).await?.alignment_history)
    }

    pub fn validate_rubric(&self, rubric_raw: &str) -> RubricValidation {
        validate_rubric_json(rubric_raw)
    }

    pub fn validate_scores(&self, scores_raw: &str, rubric_raw: &str) -> ScoreValidation {
        validate_scores_json(scores_raw, rubric_raw)
    }

    /// Save the first rubric version.
    pub async fn update_rubric_v1(
        &self,
        trainer_email: &str,
        task_id: &str,
        rubric_raw: &str,
    ) -> Result<TaskMutation, WorkflowError> {
        let mut task = self.load(trainer_email, task_id).await?;
        WorkflowStep::RubricV1.check(task.status)?;
        check_rubric(rubric_raw)?;

        let version = task.next_rubric_version();
        self.append_rubric(&mut task, version, rubric_raw).await?;
        task.status = TaskStatus::RubricV1;
        self.save(&mut task).await?;

        Ok(TaskMutation::new("Rubric V1 saved".to_string(), task))
    }

    /// Save an enhanced rubric as the next version.
    pub async fn update_rubric_enhanced(
        &self,
        trainer_email: &str,
        task_id: &str,
        rubric_raw: &str,
    ) -> Result<TaskMutation, WorkflowError> {
        let mut task = self.load(trainer_email, task_id).await?;
        WorkflowStep::RubricEnhanced.check(task.status)?;
        if let Some(alignment) = task.gemini.alignment.filter(|_| task.gemini_aligned()) {
            return Err(WorkflowError::AlreadyAligned(alignment));
        }
        check_rubric(rubric_raw)?;

        let version = task.next_rubric_version();
        self.append_rubric(&mut task, version, rubric_raw).await?;
        task.status = after_rubric_enhanced(task.status);
        self.save(&mut task).await?;

        Ok(TaskMutation::new(
            format!("Rubric V{} saved", version),
            task,
        ))
    }

    /// Save the trainer's scores for `model` against the current rubric.
    pub async fn update_human_eval(
        &self,
        trainer_email: &str,
        task_id: &str,
        model: EvalModel,
        scores_raw: &str,
    ) -> Result<TaskMutation, WorkflowError> {
        let mut task = self.load(trainer_email, task_id).await?;
        WorkflowStep::HumanEval(model).check(task.status)?;
        let scores = parse_scores(&task, scores_raw)?;

        task.evaluation_mut(model).human_scores = Some(scores);
        task.status = after_human_eval(model);
        self.save(&mut task).await?;

        Ok(TaskMutation::new(
            format!("Human {} scores saved", model),
            task,
        ))
    }

    /// Save the model's scores for `model` and compute alignment against
    /// the trainer's scores.
    pub async fn update_model_eval(
        &self,
        trainer_email: &str,
        task_id: &str,
        model: EvalModel,
        scores_raw: &str,
    ) -> Result<TaskMutation, WorkflowError> {
        let mut task = self.load(trainer_email, task_id).await?;
        WorkflowStep::ModelEval(model).check(task.status)?;
        let model_scores = parse_scores(&task, scores_raw)?;
        let human_scores = task
            .evaluation(model)
            .human_scores
            .clone()
            .ok_or(WorkflowError::MissingHumanScores(model))?;

        let rubric = Rubric::from_json(&current_rubric_content(&task)?)
            .map_err(|e| WorkflowError::Validation(vec![e.to_string()]))?;
        let result = calculate_alignment(&human_scores, &model_scores, &rubric);

        let eval = task.evaluation_mut(model);
        eval.model_scores = Some(model_scores);
        eval.alignment = Some(result.percentage);
        eval.misaligned = result.misaligned_items.clone();

        if model == EvalModel::Gemini {
            task.alignment_history.record(AlignmentEntry {
                version: task.current_rubric_version,
                alignment: result.percentage,
                timestamp: now_string(),
                misaligned_count: result.misaligned_items.len(),
            });
        }
        task.status = after_model_eval(model, &result);
        self.save(&mut task).await?;

        tracing::info!(
            task_id = %task.task_id,
            model = %model,
            alignment = result.percentage,
            next = %task.status,
            "Model scores evaluated"
        );
        Ok(TaskMutation::new(
            format!(
                "{} alignment {}% ({}/{}); next: {}",
                model,
                result.percentage,
                result.aligned,
                result.total,
                task.status.label()
            ),
            task,
        ))
    }

    async fn append_rubric(
        &self,
        task: &mut Task,
        version: u32,
        rubric_raw: &str,
    ) -> Result<(), WorkflowError> {
        self.store.prepare_rubric_version(version).await?;
        task.rubrics.append(version, rubric_raw, now_string())?;
        task.current_rubric_version = version;
        tracing::info!(task_id = %task.task_id, version, "Rubric version added");
        Ok(())
    }

    async fn save(&self, task: &mut Task) -> Result<(), WorkflowError> {
        task.touch();
        self.store.update_task(task).await?;
        tracing::info!(task_id = %task.task_id, status = %task.status, "Task updated");
        Ok(())
    }
}

fn check_rubric(rubric_raw: &str) -> Result<(), WorkflowError> {
    let validation = validate_rubric_json(rubric_raw);
    if validation.is_valid {
        Ok(())
    } else {
        Err(WorkflowError::Validation(validation.errors))
    }
}

fn current_rubric_content(task: &Task) -> Result<String, WorkflowError> {
    task.current_rubric()
        .map(|r| r.content.clone())
        .ok_or_else(|| WorkflowError::MissingRubric {
            task_id: task.task_id.clone(),
            version: task.current_rubric_version,
        })
}

/// Validate `scores_raw` against the task's current rubric and parse it.
fn parse_scores(task: &Task, scores_raw: &str) -> Result<ScoreSheet, WorkflowError> {
    let rubric_raw = current_rubric_content(task)?;
    let validation = validate_scores_json(scores_raw, &rubric_raw);
    if !validation.is_valid {
        return Err(WorkflowError::Validation(validation.errors));
    }
    ScoreSheet::from_json(scores_raw).map_err(|e| WorkflowError::Validation(vec![e.to_string()]))
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::files::LocalFileStorage;
    use crate::rubric::validation::tests::simple_rubric;
    use crate::rubric::Score;
    use crate::store::{InMemoryTaskStore, SqliteTaskStore};
    use base64::{engine::general_purpose::STANDARD, Engine as _};
    use tempfile::TempDir;

    const TRAINER: &str = "trainer@example.com";

    pub(crate) fn create_input() -> CreateTaskInput {
        CreateTaskInput {
            prompt: "Explain the tax implications of a Roth conversion.".to_string(),
            gpt_response: "A Roth conversion is taxed as ordinary income...".to_string(),
            gemini_response: "Converting to a Roth IRA means...".to_string(),
            professional_sector: ProfessionalSector::Finance,
            licensing: Licensing {
                license: "Original work".to_string(),
                source_url: None,
                attribution: None,
            },
            attachments: Vec::new(),
        }
    }

    /// Scores for a 15-item rubric, "Yes" for the first `yes` items.
    pub(crate) fn scores(yes: usize) -> String {
        scores_n(15, yes)
    }

    fn scores_n(n: usize, yes: usize) -> String {
        (1..=n)
            .map(|i| {
                let score = if i <= yes { Score::Yes } else { Score::No };
                (format!("rubric_{}", i), score)
            })
            .collect::<ScoreSheet>()
            .to_json()
    }

    fn service() -> (TaskService, TempDir) {
        let tmp = TempDir::new().unwrap();
        let service = TaskService::new(
            Arc::new(InMemoryTaskStore::new()),
            Arc::new(LocalFileStorage::new(tmp.path())),
        );
        (service, tmp)
    }

    async fn sqlite_service() -> (TaskService, TempDir) {
        let tmp = TempDir::new().unwrap();
        let store = SqliteTaskStore::new(tmp.path().join("db")).await.unwrap();
        let service = TaskService::new(
            Arc::new(store),
            Arc::new(LocalFileStorage::new(tmp.path().join("files"))),
        );
        (service, tmp)
    }

    /// A task at `Model_Eval_Gemini` with an `n`-item V2 rubric and all-Yes
    /// human scores.
    async fn task_at_model_eval_gemini(service: &TaskService, n: usize) -> String {
        let id = service.create(TRAINER, create_input()).await.unwrap().task.task_id;
        service.update_rubric_v1(TRAINER, &id, &simple_rubric(15)).await.unwrap();
        service
            .update_rubric_enhanced(TRAINER, &id, &simple_rubric(n))
            .await
            .unwrap();
        service
            .update_human_eval(TRAINER, &id, EvalModel::Gemini, &scores_n(n, n))
            .await
            .unwrap();
        id
    }

    #[tokio::test]
    async fn test_create_writes_folder_and_attachments() {
        let (service, tmp) = service();
        let mut input = create_input();
        input.attachments.push(Attachment {
            file_name: "source.pdf".to_string(),
            content_base64: STANDARD.encode(b"%PDF"),
            mime_type: Some("application/pdf".to_string()),
        });

        let created = service.create(TRAINER, input).await.unwrap();
        assert!(created.success);
        let task = created.task;
        assert_eq!(task.status, TaskStatus::TaskCreation);
        assert_eq!(task.current_rubric_version, 1);
        assert_eq!(task.attachments, vec!["source.pdf".to_string()]);

        let folder = task.folder.unwrap();
        assert!(tmp.path().join(&folder).join("source.pdf").exists());
        assert!(tmp.path().join(&folder).join(".permissions.json").exists());
    }

    #[tokio::test]
    async fn test_create_refused_while_task_incomplete() {
        let (service, _tmp) = service();
        let first = service.create(TRAINER, create_input()).await.unwrap().task;

        let err = service.create(TRAINER, create_input()).await.unwrap_err();
        assert_eq!(
            err.to_string(),
            format!("INCOMPLETE_TASK_EXISTS:{}:Task_Creation:Task created", first.task_id)
        );

        // Other trainers are unaffected.
        assert!(service.create("other@example.com", create_input()).await.is_ok());
    }

    #[tokio::test]
    async fn test_create_validates_input() {
        let (service, _tmp) = service();
        let mut input = create_input();
        input.prompt = "  ".to_string();
        input.licensing.license = String::new();
        match service.create(TRAINER, input).await {
            Err(WorkflowError::Validation(errors)) => assert_eq!(errors.len(), 2),
            other => panic!("expected validation error, got {:?}", other.map(|m| m.message)),
        }
    }

    #[tokio::test]
    async fn test_create_rejects_colliding_attachment_names() {
        let (service, _tmp) = service();
        let mut input = create_input();
        for name in ["a b.txt", "a_b.txt"] {
            input.attachments.push(Attachment {
                file_name: name.to_string(),
                content_base64: STANDARD.encode(name),
                mime_type: None,
            });
        }
        match service.create(TRAINER, input).await {
            Err(WorkflowError::Validation(errors)) => {
                assert_eq!(errors, vec!["Attachment a_b.txt would overwrite another attachment"])
            }
            other => panic!("expected validation error, got {:?}", other.map(|m| m.message)),
        }
        assert!(service.list(TRAINER).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_rubric_v1_then_enhanced_versions() {
        let (service, _tmp) = service();
        let id = service.create(TRAINER, create_input()).await.unwrap().task.task_id;

        let invalid = service.update_rubric_v1(TRAINER, &id, &simple_rubric(3)).await;
        assert!(matches!(invalid, Err(WorkflowError::Validation(_))));

        let v1 = service
            .update_rubric_v1(TRAINER, &id, &simple_rubric(15))
            .await
            .unwrap()
            .task;
        assert_eq!(v1.status, TaskStatus::RubricV1);
        assert_eq!(v1.current_rubric_version, 1);

        assert!(matches!(
            service.update_rubric_v1(TRAINER, &id, &simple_rubric(15)).await,
            Err(WorkflowError::InvalidState(_))
        ));

        let v2 = service
            .update_rubric_enhanced(TRAINER, &id, &simple_rubric(16))
            .await
            .unwrap()
            .task;
        assert_eq!(v2.status, TaskStatus::RubricV2);
        assert_eq!(v2.current_rubric_version, 2);
        assert_eq!(v2.rubrics.len(), 2);
        assert_eq!(v2.rubrics.get(1).unwrap().content, simple_rubric(15));
    }

    #[tokio::test]
    async fn test_human_eval_requires_rubric_v2() {
        let (service, _tmp) = service();
        let id = service.create(TRAINER, create_input()).await.unwrap().task.task_id;

        let err = service
            .update_human_eval(TRAINER, &id, EvalModel::Gemini, &scores(15))
            .await
            .unwrap_err();
        match err {
            WorkflowError::InvalidState(e) => assert_eq!(e.current, TaskStatus::TaskCreation),
            other => panic!("unexpected error: {}", other),
        }

        service.update_rubric_v1(TRAINER, &id, &simple_rubric(15)).await.unwrap();
        service
            .update_rubric_enhanced(TRAINER, &id, &simple_rubric(15))
            .await
            .unwrap();
        let task = service
            .update_human_eval(TRAINER, &id, EvalModel::Gemini, &scores(15))
            .await
            .unwrap()
            .task;
        assert_eq!(task.status, TaskStatus::ModelEvalGemini);
    }

    #[tokio::test]
    async fn test_scores_must_match_current_rubric() {
        let (service, _tmp) = service();
        let id = service.create(TRAINER, create_input()).await.unwrap().task.task_id;
        service.update_rubric_v1(TRAINER, &id, &simple_rubric(15)).await.unwrap();
        service
            .update_rubric_enhanced(TRAINER, &id, &simple_rubric(16))
            .await
            .unwrap();

        match service
            .update_human_eval(TRAINER, &id, EvalModel::Gemini, &scores(15))
            .await
        {
            Err(WorkflowError::Validation(errors)) => {
                assert_eq!(errors, vec!["Missing score for rubric_16".to_string()])
            }
            other => panic!("expected validation error, got {:?}", other.map(|m| m.message)),
        }
    }

    #[tokio::test]
    async fn test_gemini_alignment_at_threshold_advances() {
        let (service, _tmp) = service();
        let id = task_at_model_eval_gemini(&service, 15).await;

        // 12 of 15 agree: 80%.
        let task = service
            .update_model_eval(TRAINER, &id, EvalModel::Gemini, &scores(12))
            .await
            .unwrap()
            .task;
        assert_eq!(task.gemini.alignment, Some(80));
        assert_eq!(task.gemini.misaligned.len(), 3);
        assert_eq!(task.status, TaskStatus::HumanEvalGpt);

        let history = service.alignment_history(TRAINER, &id).await.unwrap();
        assert_eq!(history.len(), 1);
        assert_eq!(history.latest().unwrap().version, 2);
        assert_eq!(history.latest().unwrap().misaligned_count, 3);

        assert!(matches!(
            service
                .update_rubric_enhanced(TRAINER, &id, &simple_rubric(15))
                .await,
            Err(WorkflowError::InvalidState(_))
        ));
    }

    /// Drive a 79% Gemini round through enhancement to V3 and a passing round.
    async fn run_enhancement_loop(service: &TaskService) {
        let id = task_at_model_eval_gemini(service, 24).await;

        // 19 of 24 agree: 79%.
        let mutation = service
            .update_model_eval(TRAINER, &id, EvalModel::Gemini, &scores_n(24, 19))
            .await
            .unwrap();
        assert_eq!(mutation.next_step, Some(WorkflowStep::RubricEnhanced));
        let task = mutation.task;
        assert_eq!(task.gemini.alignment, Some(79));
        assert_eq!(task.status, TaskStatus::RubricEnhancing);

        let task = service
            .update_rubric_enhanced(TRAINER, &id, &simple_rubric(15))
            .await
            .unwrap()
            .task;
        assert_eq!(task.current_rubric_version, 3);
        assert_eq!(task.status, TaskStatus::HumanEvalGemini);

        service
            .update_human_eval(TRAINER, &id, EvalModel::Gemini, &scores(15))
            .await
            .unwrap();
        let task = service
            .update_model_eval(TRAINER, &id, EvalModel::Gemini, &scores(15))
            .await
            .unwrap()
            .task;
        assert_eq!(task.status, TaskStatus::HumanEvalGpt);

        let versions: Vec<u32> = task
            .alignment_history
            .entries()
            .iter()
            .map(|e| e.version)
            .collect();
        assert_eq!(versions, vec![2, 3]);

        // Every version survives a reload from the store.
        let stored = service.get(TRAINER, &id).await.unwrap();
        assert_eq!(stored.rubrics.len(), 3);
        assert_eq!(stored.rubrics.get(2).unwrap().content, simple_rubric(24));
        assert_eq!(stored.rubrics.get(3).unwrap().content, simple_rubric(15));
        assert_eq!(stored.alignment_history.len(), 2);
    }

    #[tokio::test]
    async fn test_gemini_below_threshold_loops_through_enhancement() {
        let (service, _tmp) = service();
        run_enhancement_loop(&service).await;
    }

    #[tokio::test]
    async fn test_enhancement_loop_on_sqlite() {
        let (service, _tmp) = sqlite_service().await;
        run_enhancement_loop(&service).await;
    }

    #[tokio::test]
    async fn test_human_scores_resubmitted_before_model_eval() {
        let (service, _tmp) = service();
        let id = task_at_model_eval_gemini(&service, 15).await;

        let mutation = service
            .update_human_eval(TRAINER, &id, EvalModel::Gemini, &scores(10))
            .await
            .unwrap();
        assert_eq!(mutation.task.status, TaskStatus::ModelEvalGemini);
        assert_eq!(
            mutation.next_step,
            Some(WorkflowStep::ModelEval(EvalModel::Gemini))
        );

        // The replacement sheet is the one compared: 10 of 15 agree.
        let task = service
            .update_model_eval(TRAINER, &id, EvalModel::Gemini, &scores(10))
            .await
            .unwrap()
            .task;
        assert_eq!(task.gemini.alignment, Some(100));
    }

    #[tokio::test]
    async fn test_model_eval_requires_human_scores() {
        let (service, _tmp) = service();
        let id = task_at_model_eval_gemini(&service, 15).await;

        // Enhancement is not offered while model scores are pending.
        assert!(matches!(
            service
                .update_rubric_enhanced(TRAINER, &id, &simple_rubric(15))
                .await,
            Err(WorkflowError::InvalidState(_))
        ));

        let mut task = service.get(TRAINER, &id).await.unwrap();
        task.gemini.human_scores = None;
        service.store().update_task(&task).await.unwrap();
        assert!(matches!(
            service
                .update_model_eval(TRAINER, &id, EvalModel::Gemini, &scores(15))
                .await,
            Err(WorkflowError::MissingHumanScores(EvalModel::Gemini))
        ));
    }

    #[tokio::test]
    async fn test_gpt_phase_always_completes() {
        let (service, _tmp) = service();
        let id = task_at_model_eval_gemini(&service, 15).await;
        service
            .update_model_eval(TRAINER, &id, EvalModel::Gemini, &scores(15))
            .await
            .unwrap();

        assert!(matches!(
            service
                .update_model_eval(TRAINER, &id, EvalModel::Gpt, &scores(15))
                .await,
            Err(WorkflowError::InvalidState(_))
        ));

        service
            .update_human_eval(TRAINER, &id, EvalModel::Gpt, &scores(15))
            .await
            .unwrap();
        let task = service
            .update_model_eval(TRAINER, &id, EvalModel::Gpt, &scores(0))
            .await
            .unwrap()
            .task;
        assert_eq!(task.gpt.alignment, Some(0));
        assert_eq!(task.status, TaskStatus::Completed);
        assert_eq!(task.alignment_history.len(), 1);

        // A completed task no longer blocks creation.
        assert!(service.create(TRAINER, create_input()).await.is_ok());
    }

    #[tokio::test]
    async fn test_tasks_are_scoped_to_owner() {
        let (service, _tmp) = service();
        let id = service.create(TRAINER, create_input()).await.unwrap().task.task_id;

        assert!(matches!(
            service.get("intruder@example.com", &id).await,
            Err(WorkflowError::NotFound(_))
        ));
        assert!(matches!(
            service
                .update_rubric_v1("intruder@example.com", &id, &simple_rubric(15))
                .await,
            Err(WorkflowError::NotFound(_))
        ));
        assert_eq!(service.list(TRAINER).await.unwrap().len(), 1);
        assert!(service.list("intruder@example.com").await.unwrap().is_empty());
    }
}
