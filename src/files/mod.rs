//! Task attachment storage.
//!
//! Each task gets its own folder, created before the task record is written.
//! Attachments arrive base64-encoded and are written one at a time; a failure
//! aborts the remaining uploads and leaves already written files in place.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::util::sanitize_filename;

const PERMISSIONS_FILE: &str = ".permissions.json";

#[derive(Debug, Error)]
pub enum FileStorageError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid attachment {file_name}: {reason}")]
    InvalidAttachment { file_name: String, reason: String },

    #[error("Folder {0} does not exist")]
    FolderNotFound(String),

    #[error("Corrupt permissions file: {0}")]
    Permissions(#[from] serde_json::Error),
}

/// A file uploaded alongside a new task.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Attachment {
    pub file_name: String,
    /// File bytes, standard base64.
    pub content_base64: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mime_type: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FolderRole {
    Reader,
    Writer,
}

#[async_trait]
pub trait FileStorage: Send + Sync {
    /// Create the folder for `task_id` and return its identifier.
    async fn create_task_folder(
        &self,
        trainer_email: &str,
        task_id: &str,
    ) -> Result<String, FileStorageError>;

    /// Store one attachment in `folder`, returning the stored file name.
    async fn upload_file(
        &self,
        folder: &str,
        attachment: &Attachment,
    ) -> Result<String, FileStorageError>;

    /// Grant `email` the given role on `folder`.
    async fn set_folder_permissions(
        &self,
        folder: &str,
        email: &str,
        role: FolderRole,
    ) -> Result<(), FileStorageError>;
}

/// Folders on the local filesystem under a fixed root.
///
/// Folder identifiers are `<trainer>/<task_id>` relative to the root.
/// Permissions are recorded in a `.permissions.json` file inside the folder.
pub struct LocalFileStorage {
    root: PathBuf,
}

impl LocalFileStorage {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn folder_path(&self, folder: &str) -> PathBuf {
        folder
            .split('/')
            .map(sanitize_filename)
            .fold(self.root.clone(), |path, segment| path.join(segment))
    }

    async fn existing_folder(&self, folder: &str) -> Result<PathBuf, FileStorageError> {
        let path = self.folder_path(folder);
        if tokio::fs::metadata(&path).await.map(|m| m.is_dir()).unwrap_or(false) {
            Ok(path)
        } else {
            Err(FileStorageError::FolderNotFound(folder.to_string()))
        }
    }

    /// Current permission grants for `folder`.
    pub async fn permissions(
        &self,
        folder: &str,
    ) -> Result<BTreeMap<String, FolderRole>, FileStorageError> {
        let path = self.existing_folder(folder).await?.join(PERMISSIONS_FILE);
        match tokio::fs::read_to_string(&path).await {
            Ok(raw) => Ok(serde_json::from_str(&raw)?),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(BTreeMap::new()),
            Err(e) => Err(e.into()),
        }
    }
}

#[async_trait]
impl FileStorage for LocalFileStorage {
    async fn create_task_folder(
        &self,
        trainer_email: &str,
        task_id: &str,
    ) -> Result<String, FileStorageError> {
        let folder = format!(
            "{}/{}",
            sanitize_filename(trainer_email),
            sanitize_filename(task_id)
        );
        tokio::fs::create_dir_all(self.folder_path(&folder)).await?;
        tracing::debug!(folder = %folder, "Created task folder");
        Ok(folder)
    }

    async fn upload_file(
        &self,
        folder: &str,
        attachment: &Attachment,
    ) -> Result<String, FileStorageError> {
        let dir = self.existing_folder(folder).await?;
        // Sanitizing strips leading dots, so uploads cannot replace the sidecar.
        let name = sanitize_filename(&attachment.file_name);

        let bytes = STANDARD
            .decode(attachment.content_base64.trim())
            .map_err(|e| FileStorageError::InvalidAttachment {
                file_name: attachment.file_name.clone(),
                reason: e.to_string(),
            })?;

        tokio::fs::write(dir.join(&name), &bytes).await?;
        tracing::debug!(folder = %folder, file = %name, bytes = bytes.len(), "Uploaded attachment");
        Ok(name)
    }

    async fn set_folder_permissions(
        &self,
        folder: &str,
        email: &str,
        role: FolderRole,
    ) -> Result<(), FileStorageError> {
        let mut grants = self.permissions(folder).await?;
        grants.insert(email.to_string(), role);
        let path = self.folder_path(folder).join(PERMISSIONS_FILE);
        tokio::fs::write(&path, serde_json::to_string_pretty(&grants)?).await?;
        Ok(())
    }
}
