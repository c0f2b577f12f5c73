//! Task storage with pluggable backends.
//!
//! Supports:
//! - `memory`: In-memory storage (non-persistent, for testing)
//! - `sqlite`: SQLite database, rubric versions in a child table
//! - `airtable`: Hosted Airtable table, one `Rubric_V{n}` column per version
//!
//! Every workflow step performs at most one `update_task` call. Stores refuse
//! updates that would rewrite an existing rubric version.

mod airtable;
mod memory;
mod sqlite;

pub use airtable::{AirtableTaskStore, Formula};
pub use memory::InMemoryTaskStore;
pub use sqlite::SqliteTaskStore;

use async_trait::async_trait;
use std::sync::Arc;
use thiserror::Error;

use crate::config::Config;
use crate::task::{RubricVersions, Task};

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Task {0} not found")]
    NotFound(String),

    #[error("Task {0} already exists")]
    AlreadyExists(String),

    #[error("Rubric version {version} of task {task_id} is immutable")]
    RubricOverwrite { task_id: String, version: u32 },

    #[error("Corrupt task record {task_id}: {reason}")]
    Corrupt { task_id: String, reason: String },

    #[error("Database error: {0}")]
    Database(String),

    #[error("Remote store error: {0}")]
    Remote(String),

    #[error("Failed to provision field {field}: {reason}")]
    Provisioning { field: String, reason: String },
}

impl From<rusqlite::Error> for StoreError {
    fn from(err: rusqlite::Error) -> Self {
        StoreError::Database(err.to_string())
    }
}

impl From<reqwest::Error> for StoreError {
    fn from(err: reqwest::Error) -> Self {
        StoreError::Remote(err.to_string())
    }
}

/// Task store trait - implemented by all storage backends.
#[async_trait]
pub trait TaskStore: Send + Sync {
    /// Whether this store persists data across restarts.
    fn is_persistent(&self) -> bool;

    /// Insert a new task record.
    async fn create_task(&self, task: &Task) -> Result<(), StoreError>;

    /// Look up a task by id, scoped to its owner.
    ///
    /// A task owned by someone else is reported as absent.
    async fn find_task(&self, task_id: &str, trainer_email: &str)
        -> Result<Option<Task>, StoreError>;

    /// The trainer's most recent task that is not `Completed`, if any.
    async fn find_incomplete_task(&self, trainer_email: &str) -> Result<Option<Task>, StoreError>;

    /// All of a trainer's tasks, newest first.
    async fn list_tasks(&self, trainer_email: &str) -> Result<Vec<Task>, StoreError>;

    /// Make room for rubric `version` before it is written.
    ///
    /// Must be idempotent. Backends with a fixed schema do nothing.
    async fn prepare_rubric_version(&self, version: u32) -> Result<(), StoreError> {
        let _ = version;
        Ok(())
    }

    /// Write the full task record in one update.
    async fn update_task(&self, task: &Task) -> Result<(), StoreError>;
}

/// Reject an update whose rubric list is not an extension of the stored one.
pub(crate) fn check_rubric_append(
    task_id: &str,
    stored: &RubricVersions,
    updated: &RubricVersions,
) -> Result<(), StoreError> {
    for existing in stored.iter() {
        match updated.get(existing.version) {
            Some(candidate) if candidate.content == existing.content => {}
            _ => {
                return Err(StoreError::RubricOverwrite {
                    task_id: task_id.to_string(),
                    version: existing.version,
                })
            }
        }
    }
    Ok(())
}

/// Task store type selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TaskStoreType {
    Memory,
    #[default]
    Sqlite,
    Airtable,
}

impl TaskStoreType {
    /// Parse from environment variable value.
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "memory" => Some(Self::Memory),
            "sqlite" | "db" => Some(Self::Sqlite),
            "airtable" => Some(Self::Airtable),
            _ => None,
        }
    }
}

/// Create a task store based on configuration.
pub async fn create_task_store(config: &Config) -> Result<Arc<dyn TaskStore>, StoreError> {
    match config.store_type {
        TaskStoreType::Memory => Ok(Arc::new(InMemoryTaskStore::new())),
        TaskStoreType::Sqlite => {
            let store = SqliteTaskStore::new(config.data_dir.clone()).await?;
            Ok(Arc::new(store))
        }
        TaskStoreType::Airtable => {
            let airtable = config.airtable.as_ref().ok_or_else(|| {
                StoreError::Remote("Airtable store selected without configuration".to_string())
            })?;
            Ok(Arc::new(AirtableTaskStore::new(airtable)))
        }
    }
}
