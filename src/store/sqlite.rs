//! SQLite-based task store.
//!
//! Rubric versions live in a normalized `rubric_versions` child table keyed
//! by `(task_id, version)`, so a new version is an insert, never a schema
//! change.

use super::{check_rubric_append, StoreError, TaskStore};
use crate::alignment::AlignmentHistory;
use crate::task::{
    Licensing, ModelEvaluation, ProfessionalSector, RubricVersion, RubricVersions, Task, TaskStatus,
};
use async_trait::async_trait;
use rusqlite::{params, Connection, OptionalExtension};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::Mutex;

const SCHEMA: &str = r#"
PRAGMA journal_mode = WAL;
PRAGMA foreign_keys = ON;

CREATE TABLE IF NOT EXISTS tasks (
    task_id TEXT PRIMARY KEY NOT NULL,
    trainer_email TEXT NOT NULL,
    prompt TEXT NOT NULL,
    gpt_response TEXT NOT NULL,
    gemini_response TEXT NOT NULL,
    professional_sector TEXT NOT NULL,
    licensing TEXT NOT NULL,
    status TEXT NOT NULL DEFAULT 'Task_Creation',
    current_rubric_version INTEGER NOT NULL DEFAULT 1,
    gemini_eval TEXT NOT NULL DEFAULT '{}',
    gpt_eval TEXT NOT NULL DEFAULT '{}',
    alignment_history TEXT NOT NULL DEFAULT '[]',
    folder TEXT,
    attachments TEXT NOT NULL DEFAULT '[]',
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_tasks_trainer_created ON tasks(trainer_email, created_at DESC);
CREATE INDEX IF NOT EXISTS idx_tasks_trainer_status ON tasks(trainer_email, status);

CREATE TABLE IF NOT EXISTS rubric_versions (
    task_id TEXT NOT NULL,
    version INTEGER NOT NULL,
    content TEXT NOT NULL,
    created_at TEXT NOT NULL,
    PRIMARY KEY (task_id, version),
    FOREIGN KEY (task_id) REFERENCES tasks(task_id) ON DELETE CASCADE
);
"#;

const TASK_COLUMNS: &str = "task_id, trainer_email, prompt, gpt_response, gemini_response,
     professional_sector, licensing, status, current_rubric_version, gemini_eval, gpt_eval,
     alignment_history, folder, attachments, created_at, updated_at";

pub struct SqliteTaskStore {
    conn: Arc<Mutex<Connection>>,
}

/// Column values as stored, before JSON decoding.
struct TaskRow {
    task_id: String,
    trainer_email: String,
    prompt: String,
    gpt_response: String,
    gemini_response: String,
    professional_sector: String,
    licensing: String,
    status: String,
    current_rubric_version: u32,
    gemini_eval: String,
    gpt_eval: String,
    alignment_history: String,
    folder: Option<String>,
    attachments: String,
    created_at: String,
    updated_at: String,
}

impl TaskRow {
    fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            task_id: row.get(0)?,
            trainer_email: row.get(1)?,
            prompt: row.get(2)?,
            gpt_response: row.get(3)?,
            gemini_response: row.get(4)?,
            professional_sector: row.get(5)?,
            licensing: row.get(6)?,
            status: row.get(7)?,
            current_rubric_version: row.get(8)?,
            gemini_eval: row.get(9)?,
            gpt_eval: row.get(10)?,
            alignment_history: row.get(11)?,
            folder: row.get(12)?,
            attachments: row.get(13)?,
            created_at: row.get(14)?,
            updated_at: row.get(15)?,
        })
    }

    fn into_task(self, rubrics: RubricVersions) -> Result<Task, StoreError> {
        let task_id = self.task_id.clone();
        let corrupt = |reason: String| StoreError::Corrupt {
            task_id: task_id.clone(),
            reason,
        };

        let status: TaskStatus = self.status.parse().map_err(|e| corrupt(format!("{}", e)))?;
        let professional_sector: ProfessionalSector =
            self.professional_sector.parse().map_err(corrupt)?;
        let licensing: Licensing = serde_json::from_str(&self.licensing)
            .map_err(|e| corrupt(format!("licensing: {}", e)))?;
        let gemini: ModelEvaluation = serde_json::from_str(&self.gemini_eval)
            .map_err(|e| corrupt(format!("gemini_eval: {}", e)))?;
        let gpt: ModelEvaluation = serde_json::from_str(&self.gpt_eval)
            .map_err(|e| corrupt(format!("gpt_eval: {}", e)))?;
        let alignment_history = AlignmentHistory::from_json(&self.alignment_history)
            .map_err(|e| corrupt(format!("alignment_history: {}", e)))?;
        let attachments: Vec<String> = serde_json::from_str(&self.attachments)
            .map_err(|e| corrupt(format!("attachments: {}", e)))?;

        Ok(Task {
            task_id: self.task_id,
            trainer_email: self.trainer_email,
            prompt: self.prompt,
            gpt_response: self.gpt_response,
            gemini_response: self.gemini_response,
            professional_sector,
            licensing,
            status,
            current_rubric_version: self.current_rubric_version,
            rubrics,
            gemini,
            gpt,
            alignment_history,
            folder: self.folder,
            attachments,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}

fn to_json<T: serde::Serialize>(value: &T) -> Result<String, StoreError> {
    serde_json::to_string(value).map_err(|e| StoreError::Database(e.to_string()))
}

fn load_rubrics(conn: &Connection, task_id: &str) -> Result<RubricVersions, StoreError> {
    let mut stmt = conn.prepare(
        "SELECT version, content, created_at FROM rubric_versions
         WHERE task_id = ?1 ORDER BY version ASC",
    )?;
    let snapshots = stmt
        .query_map(params![task_id], |row| {
            Ok(RubricVersion {
                version: row.get(0)?,
                content: row.get(1)?,
                created_at: row.get(2)?,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;
    RubricVersions::from_snapshots(snapshots).map_err(|e| StoreError::Corrupt {
        task_id: task_id.to_string(),
        reason: e.to_string(),
    })
}

fn hydrate(conn: &Connection, rows: Vec<TaskRow>) -> Result<Vec<Task>, StoreError> {
    rows.into_iter()
        .map(|row| {
            let rubrics = load_rubrics(conn, &row.task_id)?;
            row.into_task(rubrics)
        })
        .collect()
}

impl SqliteTaskStore {
    pub async fn new(base_dir: PathBuf) -> Result<Self, StoreError> {
        tokio::fs::create_dir_all(&base_dir)
            .await
            .map_err(|e| StoreError::Database(format!("Failed to create task store dir: {}", e)))?;
        let db_path = base_dir.join("tasks.db");

        let conn = tokio::task::spawn_blocking(move || {
            let conn = Connection::open(&db_path)?;
            conn.execute_batch(SCHEMA)?;
            tracing::info!("Opened task database at {}", db_path.display());
            Ok::<_, StoreError>(conn)
        })
        .await
        .map_err(|e| StoreError::Database(format!("Task join error: {}", e)))??;

        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    async fn query_tasks(
        &self,
        sql: String,
        trainer_email: String,
        task_id: Option<String>,
    ) -> Result<Vec<Task>, StoreError> {
        let conn = self.conn.clone();
        tokio::task::spawn_blocking(move || {
            let conn = conn.blocking_lock();
            let mut stmt = conn.prepare(&sql)?;
            let rows = match task_id {
                Some(id) => stmt
                    .query_map(params![trainer_email, id], TaskRow::from_row)?
                    .collect::<Result<Vec<_>, _>>()?,
                None => stmt
                    .query_map(params![trainer_email], TaskRow::from_row)?
                    .collect::<Result<Vec<_>, _>>()?,
            };
            hydrate(&conn, rows)
        })
        .await
        .map_err(|e| StoreError::Database(format!("Task join error: {}", e)))?
    }
}

#[async_trait]
impl TaskStore for SqliteTaskStore {
    fn is_persistent(&self) -> bool {
        true
    }

    async fn create_task(&self, task: &Task) -> Result<(), StoreError> {
        let conn = self.conn.clone();
        let task = task.clone();
        tokio::task::spawn_blocking(move || {
            let mut conn = conn.blocking_lock();
            let tx = conn.transaction()?;

            let exists = tx
                .query_row(
                    "SELECT 1 FROM tasks WHERE task_id = ?1",
                    params![&task.task_id],
                    |_| Ok(()),
                )
                .optional()?
                .is_some();
            if exists {
                return Err(StoreError::AlreadyExists(task.task_id.clone()));
            }

            tx.execute(
                &format!(
                    "INSERT INTO tasks ({}) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16)",
                    TASK_COLUMNS
                ),
                params![
                    &task.task_id,
                    &task.trainer_email,
                    &task.prompt,
                    &task.gpt_response,
                    &task.gemini_response,
                    task.professional_sector.as_str(),
                    to_json(&task.licensing)?,
                    task.status.as_str(),
                    task.current_rubric_version,
                    to_json(&task.gemini)?,
                    to_json(&task.gpt)?,
                    task.alignment_history.to_json(),
                    &task.folder,
                    to_json(&task.attachments)?,
                    &task.created_at,
                    &task.updated_at,
                ],
            )?;
            for snapshot in task.rubrics.iter() {
                tx.execute(
                    "INSERT INTO rubric_versions (task_id, version, content, created_at)
                     VALUES (?1, ?2, ?3, ?4)",
                    params![
                        &task.task_id,
                        snapshot.version,
                        &snapshot.content,
                        &snapshot.created_at
                    ],
                )?;
            }
            tx.commit()?;
            Ok(())
        })
        .await
        .map_err(|e| StoreError::Database(format!("Task join error: {}", e)))?
    }

    async fn find_task(
        &self,
        task_id: &str,
        trainer_email: &str,
    ) -> Result<Option<Task>, StoreError> {
        let sql = format!(
            "SELECT {} FROM tasks WHERE trainer_email = ?1 AND task_id = ?2",
            TASK_COLUMNS
        );
        let tasks = self
            .query_tasks(sql, trainer_email.to_string(), Some(task_id.to_string()))
            .await?;
        Ok(tasks.into_iter().next())
    }

    async fn find_incomplete_task(&self, trainer_email: &str) -> Result<Option<Task>, StoreError> {
        let sql = format!(
            "SELECT {} FROM tasks WHERE trainer_email = ?1 AND status != 'Completed'
             ORDER BY created_at DESC LIMIT 1",
            TASK_COLUMNS
        );
        let tasks = self
            .query_tasks(sql, trainer_email.to_string(), None)
            .await?;
        Ok(tasks.into_iter().next())
    }

    async fn list_tasks(&self, trainer_email: &str) -> Result<Vec<Task>, StoreError> {
        let sql = format!(
            "SELECT {} FROM tasks WHERE trainer_email = ?1 ORDER BY created_at DESC",
            TASK_COLUMNS
        );
        self.query_tasks(sql, trainer_email.to_string(), None).await
    }

    async fn update_task(&self, task: &Task) -> Result<(), StoreError> {
        let conn = self.conn.clone();
        let task = task.clone();
        tokio::task::spawn_blocking(move || {
            let mut conn = conn.blocking_lock();
            let tx = conn.transaction()?;

            let stored = load_rubrics(&tx, &task.task_id)?;
            check_rubric_append(&task.task_id, &stored, &task.rubrics)?;

            let updated = tx.execute(
                "UPDATE tasks SET
                    prompt = ?2, gpt_response = ?3, gemini_response = ?4,
                    professional_sector = ?5, licensing = ?6, status = ?7,
                    current_rubric_version = ?8, gemini_eval = ?9, gpt_eval = ?10,
                    alignment_history = ?11, folder = ?12, attachments = ?13, updated_at = ?14
                 WHERE task_id = ?1",
                params![
                    &task.task_id,
                    &task.prompt,
                    &task.gpt_response,
                    &task.gemini_response,
                    task.professional_sector.as_str(),
                    to_json(&task.licensing)?,
                    task.status.as_str(),
                    task.current_rubric_version,
                    to_json(&task.gemini)?,
                    to_json(&task.gpt)?,
                    task.alignment_history.to_json(),
                    &task.folder,
                    to_json(&task.attachments)?,
                    &task.updated_at,
                ],
            )?;
            if updated == 0 {
                return Err(StoreError::NotFound(task.task_id.clone()));
            }

            for snapshot in task.rubrics.iter().skip(stored.len()) {
                tx.execute(
                    "INSERT INTO rubric_versions (task_id, version, content, created_at)
                     VALUES (?1, ?2, ?3, ?4)",
                    params![
                        &task.task_id,
                        snapshot.version,
                        &snapshot.content,
                        &snapshot.created_at
                    ],
                )?;
                tracing::debug!(
                    task_id = %task.task_id,
                    version = snapshot.version,
                    "Stored rubric version"
                );
            }

            tx.commit()?;
            Ok(())
        })
        .await
        .map_err(|e| StoreError::Database(format!("Task join error: {}", e)))?
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::alignment::AlignmentEntry;
    use crate::rubric::{Score, ScoreSheet};
    use crate::task::task::tests::sample_content;
    use tempfile::TempDir;

    fn task(id: &str, email: &str) -> Task {
        Task::new(id.to_string(), email.to_string(), sample_content())
    }

    #[tokio::test]
    async fn test_round_trip_with_rubrics_and_evaluations() {
        let dir = TempDir::new().unwrap();
        let store = SqliteTaskStore::new(dir.path().to_path_buf()).await.unwrap();

        let mut t = task("t1", "a@example.com");
        store.create_task(&t).await.unwrap();

        t.rubrics.append(1, "{\"rubric_1\":\"First question here\"}", "t1").unwrap();
        t.rubrics.append(2, "{\"rubric_1\":\"Second question here\"}", "t2").unwrap();
        t.current_rubric_version = 2;
        t.status = TaskStatus::RubricEnhancing;
        let sheet: ScoreSheet = [("rubric_1".to_string(), Score::Yes)].into_iter().collect();
        t.gemini.human_scores = Some(sheet.clone());
        t.gemini.model_scores = Some(sheet);
        t.gemini.alignment = Some(100);
        t.alignment_history.record(AlignmentEntry {
            version: 2,
            alignment: 100,
            timestamp: "ts".to_string(),
            misaligned_count: 0,
        });
        store.update_task(&t).await.unwrap();

        let loaded = store.find_task("t1", "a@example.com").await.unwrap().unwrap();
        assert_eq!(loaded, t);
        assert!(store.find_task("t1", "b@example.com").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_persists_across_reopen() {
        let dir = TempDir::new().unwrap();
        {
            let store = SqliteTaskStore::new(dir.path().to_path_buf()).await.unwrap();
            store.create_task(&task("t1", "a@example.com")).await.unwrap();
        }
        let store = SqliteTaskStore::new(dir.path().to_path_buf()).await.unwrap();
        assert!(store.is_persistent());
        assert_eq!(store.list_tasks("a@example.com").await.unwrap().len(), 1);
        let open = store.find_incomplete_task("a@example.com").await.unwrap();
        assert_eq!(open.unwrap().task_id, "t1");
    }

    #[tokio::test]
    async fn test_rubric_versions_are_immutable() {
        let dir = TempDir::new().unwrap();
        let store = SqliteTaskStore::new(dir.path().to_path_buf()).await.unwrap();

        let mut t = task("t1", "a@example.com");
        store.create_task(&t).await.unwrap();
        t.rubrics.append(1, "{\"v\":1}", "t").unwrap();
        store.update_task(&t).await.unwrap();

        let mut rewritten = task("t1", "a@example.com");
        rewritten.rubrics.append(1, "{\"v\":2}", "t").unwrap();
        assert!(matches!(
            store.update_task(&rewritten).await,
            Err(StoreError::RubricOverwrite { .. })
        ));

        let loaded = store.find_task("t1", "a@example.com").await.unwrap().unwrap();
        assert_eq!(loaded.rubrics.get(1).unwrap().content, "{\"v\":1}");
    }

    #[tokio::test]
    async fn test_completed_tasks_are_not_incomplete() {
        let dir = TempDir::new().unwrap();
        let store = SqliteTaskStore::new(dir.path().to_path_buf()).await.unwrap();

        let mut t = task("t1", "a@example.com");
        store.create_task(&t).await.unwrap();
        t.status = TaskStatus::Completed;
        store.update_task(&t).await.unwrap();

        assert!(store
            .find_incomplete_task("a@example.com")
            .await
            .unwrap()
            .is_none());
        assert!(matches!(
            store.create_task(&t).await,
            Err(StoreError::AlreadyExists(_))
        ));
    }
}
