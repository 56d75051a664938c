//! Type definitions for the upload pipeline.
//!
//! Defines UploadTask, its status machine, UploadFile and queue constants.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::Path;
use uuid::Uuid;

// Maximum number of removed task ids remembered for discarding late completions
pub const MAX_REMOVED_TOMBSTONES: usize = 1_000;

pub const UPLOADING_PROGRESS: u8 = 50;
pub const PROCESSING_PROGRESS: u8 = 100;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UploadTaskStatus {
    Queued,
    Uploading,
    Processing,
    Completed,
    Failed,
}

impl UploadTaskStatus {
    /// Queued → Uploading → Processing → Completed, and any live state → Failed
    pub fn can_transition_to(&self, next: UploadTaskStatus) -> bool {
        use UploadTaskStatus::*;
        matches!(
            (self, next),
            (Queued, Uploading)
                | (Uploading, Processing)
                | (Processing, Completed)
                | (Queued | Uploading | Processing, Failed)
        )
    }

    fn progress_floor(&self) -> u8 {
        match self {
            UploadTaskStatus::Uploading => UPLOADING_PROGRESS,
            UploadTaskStatus::Processing | UploadTaskStatus::Completed => PROCESSING_PROGRESS,
            UploadTaskStatus::Queued | UploadTaskStatus::Failed => 0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UploadTask {
    pub id: String,
    pub name: String,
    pub size_bytes: u64,
    pub mime_type: String,
    pub status: UploadTaskStatus,
    pub progress_percent: u8,
    pub error_message: Option<String>,
    pub queued_at: DateTime<Utc>,
    pub chunks_added: Option<u32>,
}

impl UploadTask {
    pub fn queued(file: &UploadFile) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            name: file.name.clone(),
            size_bytes: file.content.len() as u64,
            mime_type: file.mime_type.clone(),
            status: UploadTaskStatus::Queued,
            progress_percent: 0,
            error_message: None,
            queued_at: Utc::now(),
            chunks_added: None,
        }
    }

    /// Apply a transition if legal. Progress never decreases.
    pub(crate) fn advance(&mut self, update: &TaskUpdate) -> bool {
        if !self.status.can_transition_to(update.status()) {
            return false;
        }

        self.status = update.status();
        self.progress_percent = self.progress_percent.max(self.status.progress_floor());

        match update {
            TaskUpdate::Failed(message) => self.error_message = Some(message.clone()),
            TaskUpdate::Completed { chunks_added } => self.chunks_added = *chunks_added,
            TaskUpdate::Uploading | TaskUpdate::Processing => {}
        }

        true
    }
}

/// A transition reported by a task's upload request
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum TaskUpdate {
    Uploading,
    Processing,
    Completed { chunks_added: Option<u32> },
    Failed(String),
}

impl TaskUpdate {
    pub fn status(&self) -> UploadTaskStatus {
        match self {
            TaskUpdate::Uploading => UploadTaskStatus::Uploading,
            TaskUpdate::Processing => UploadTaskStatus::Processing,
            TaskUpdate::Completed { .. } => UploadTaskStatus::Completed,
            TaskUpdate::Failed(_) => UploadTaskStatus::Failed,
        }
    }
}

/// A document handed to the pipeline
#[derive(Debug, Clone)]
pub struct UploadFile {
    pub name: String,
    pub mime_type: String,
    pub content: Vec<u8>,
}

impl UploadFile {
    /// Build from in-memory bytes, guessing the MIME type from the extension
    pub fn from_bytes(name: impl Into<String>, content: Vec<u8>) -> Self {
        let name = name.into();
        let mime_type = guess_mime_type(&name).to_string();
        Self {
            name,
            mime_type,
            content,
        }
    }

    pub async fn from_path(path: &Path) -> std::io::Result<Self> {
        let name = path
            .file_name()
            .and_then(|n| n.to_str())
            .ok_or_else(|| {
                std::io::Error::new(std::io::ErrorKind::InvalidInput, "Invalid file name")
            })?
            .to_string();
        let content = tokio::fs::read(path).await?;

        Ok(Self::from_bytes(name, content))
    }
}

pub fn guess_mime_type(name: &str) -> &'static str {
    let extension = Path::new(name)
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase());

    match extension.as_deref() {
        Some("pdf") => "application/pdf",
        Some("docx") => {
            "application/vnd.openxmlformats-officedocument.wordprocessingml.document"
        }
        Some("txt") => "text/plain",
        _ => "application/octet-stream",
    }
}

/// Counts behind the "X of Y processed" line
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UploadSummary {
    pub total: usize,
    pub completed: usize,
    pub failed: usize,
    pub in_flight: usize,
}

impl UploadSummary {
    pub fn processed(&self) -> usize {
        self.completed + self.failed
    }
}
