//! In-memory task store (non-persistent).

use super::{check_rubric_append, StoreError, TaskStore};
use crate::task::{Task, TaskStatus};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

#[derive(Clone)]
pub struct InMemoryTaskStore {
    tasks: Arc<RwLock<HashMap<String, Task>>>,
}

impl InMemoryTaskStore {
    pub fn new() -> Self {
        Self {
            tasks: Arc::new(RwLock::new(HashMap::new())),
        }
    }
}

impl Default for InMemoryTaskStore {
    fn default() -> Self {
        Self::new()
    }
}

fn newest_first(tasks: &mut [Task]) {
    tasks.sort_by(|a, b| b.created_at.cmp(&a.created_at));
}

#[async_trait]
impl TaskStore for InMemoryTaskStore {
    fn is_persistent(&self) -> bool {
        false
    }

    async fn create_task(&self, task: &Task) -> Result<(), StoreError> {
        let mut tasks = self.tasks.write().await;
        if tasks.contains_key(&task.task_id) {
            return Err(StoreError::AlreadyExists(task.task_id.clone()));
        }
        tasks.insert(task.task_id.clone(), task.clone());
        Ok(())
    }

    async fn find_task(
        &self,
        task_id: &str,
        trainer_email: &str,
    ) -> Result<Option<Task>, StoreError> {
        Ok(self
            .tasks
            .read()
            .await
            .get(task_id)
            .filter(|t| t.trainer_email == trainer_email)
            .cloned())
    }

    async fn find_incomplete_task(&self, trainer_email: &str) -> Result<Option<Task>, StoreError> {
        let mut tasks: Vec<Task> = self
            .tasks
            .read()
            .await
            .values()
            .filter(|t| t.trainer_email == trainer_email && t.status != TaskStatus::Completed)
            .cloned()
            .collect();
        newest_first(&mut tasks);
        Ok(tasks.into_iter().next())
    }

    async fn list_tasks(&self, trainer_email: &str) -> Result<Vec<Task>, StoreError> {
        let mut tasks: Vec<Task> = self
            .tasks
            .read()
            .await
            .values()
            .filter(|t| t.trainer_email == trainer_email)
            .cloned()
            .collect();
        newest_first(&mut tasks);
        Ok(tasks)
    }

    async fn update_task(&self, task: &Task) -> Result<(), StoreError> {
        let mut tasks = self.tasks.write().await;
        let stored = tasks
            .get_mut(&task.task_id)
            .ok_or_else(|| StoreError::NotFound(task.task_id.clone()))?;
        check_rubric_append(&task.task_id, &stored.rubrics, &task.rubrics)?;
        *stored = task.clone();
        Ok(())
    }
}
