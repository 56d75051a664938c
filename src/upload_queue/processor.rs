//! Per-task upload processing.
//!
//! Each enqueued file runs through `UploadProcessor::run` on its own tokio task,
//! bounded by the shared semaphore. Every transition goes through the task store
//! so removed tasks are never resurrected.

use crate::api::{QueryBackend, UploadDocumentsResponse};
use crate::error::{ClientError, ClientResult};
use crate::events::{Component, EventBus, NotificationLevel, StatePayload};
use crate::logging::{log_debug, log_info, log_warn};
use std::sync::{Arc, Mutex};
use tokio::sync::Semaphore;

use super::queue_manager::{TaskStore, UpdateOutcome};
use super::types::{TaskUpdate, UploadFile, UploadTaskStatus};

const EMPTY_RESULTS_MESSAGE: &str = "Upload response contained no results";

/// Drives individual upload tasks against the backend
#[derive(Clone)]
pub(crate) struct UploadProcessor {
    store: Arc<Mutex<TaskStore>>,
    backend: Arc<dyn QueryBackend>,
    events: EventBus,
    semaphore: Arc<Semaphore>,
}

impl UploadProcessor {
    pub fn new(
        store: Arc<Mutex<TaskStore>>,
        backend: Arc<dyn QueryBackend>,
        events: EventBus,
        semaphore: Arc<Semaphore>,
    ) -> Self {
        Self {
            store,
            backend,
            events,
            semaphore,
        }
    }

    /// Upload one file and record every transition of its task
    pub async fn run(self, task_id: String, file: UploadFile) {
        // Wait in Queued until a permit frees up
        let Ok(_permit) = self.semaphore.clone().acquire_owned().await else {
            return;
        };

        let file_name = file.name.clone();

        if !self.apply(&task_id, &file_name, TaskUpdate::Uploading) {
            log_debug(
                "upload-queue",
                &format!("Skipping upload of {} (task removed before dispatch)", file_name),
            )
            .unwrap_or_default();
            return;
        }

        log_info("upload-queue", &format!("📤 Uploading {}", file_name)).unwrap_or_default();

        let result = self.backend.upload_document(file).await;

        for update in updates_for(result) {
            if !self.apply(&task_id, &file_name, update) {
                break;
            }
        }
    }

    /// Apply an update under one lock scope, then publish it.
    /// Returns false once the task is gone or the update was refused.
    fn apply(&self, task_id: &str, file_name: &str, update: TaskUpdate) -> bool {
        let outcome = {
            let mut store = self.store.lock().unwrap_or_else(|e| e.into_inner());
            store.apply_update(task_id, &update)
        };

        match outcome {
            UpdateOutcome::Applied(task) => {
                let status = task.status;
                let error_message = task.error_message.clone();
                let _ = self
                    .events
                    .publish(Component::Uploads, StatePayload::UploadTaskChanged { task });

                match status {
                    UploadTaskStatus::Completed => {
                        log_info("upload-queue", &format!("✓ Processed {}", file_name))
                            .unwrap_or_default();
                    }
                    UploadTaskStatus::Failed => {
                        let message = error_message.unwrap_or_default();
                        log_warn(
                            "upload-queue",
                            &format!("✗ Upload failed for {}: {}", file_name, message),
                        )
                        .unwrap_or_default();
                        self.events.notify(
                            Component::Uploads,
                            NotificationLevel::Error,
                            &format!("Error uploading {}", file_name),
                            Some(message),
                        );
                    }
                    _ => {}
                }
                true
            }
            UpdateOutcome::Rejected => {
                log_warn(
                    "upload-queue",
                    &format!(
                        "Ignoring illegal transition to {:?} for {}",
                        update.status(),
                        file_name
                    ),
                )
                .unwrap_or_default();
                false
            }
            UpdateOutcome::Detached => {
                log_debug(
                    "upload-queue",
                    &format!("Discarding late result for removed task {}", task_id),
                )
                .unwrap_or_default();
                false
            }
            UpdateOutcome::Unknown => {
                log_warn(
                    "upload-queue",
                    &format!("No upload task {} for {}", task_id, file_name),
                )
                .unwrap_or_default();
                false
            }
        }
    }
}

/// Transitions that follow a finished upload request.
///
/// Once a response has arrived the task passes through Processing before its
/// terminal state; a request that never produced a response fails directly.
fn updates_for(result: ClientResult<UploadDocumentsResponse>) -> Vec<TaskUpdate> {
    match result {
        Ok(response) => {
            let terminal = match response.first_result() {
                None => TaskUpdate::Failed(EMPTY_RESULTS_MESSAGE.to_string()),
                Some(first) => match &first.error {
                    Some(error) => TaskUpdate::Failed(error.clone()),
                    None => TaskUpdate::Completed {
                        chunks_added: first.chunks_added,
                    },
                },
            };
            vec![TaskUpdate::Processing, terminal]
        }
        Err(err) if response_received(&err) => {
            vec![TaskUpdate::Processing, TaskUpdate::Failed(err.user_message())]
        }
        Err(err) => vec![TaskUpdate::Failed(err.user_message())],
    }
}

fn response_received(err: &ClientError) -> bool {
    match err {
        ClientError::Backend { .. } => true,
        ClientError::Http(e) => e.is_decode() || e.is_body(),
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::FileProcessingResult;

    fn response_with(result: Option<FileProcessingResult>) -> UploadDocumentsResponse {
        UploadDocumentsResponse {
            message: None,
            results: result.into_iter().collect(),
        }
    }

    #[test]
    fn test_success_passes_through_processing() {
        let updates = updates_for(Ok(response_with(Some(FileProcessingResult {
            chunks_added: Some(4),
            ..Default::default()
        }))));

        assert_eq!(
            updates,
            vec![
                TaskUpdate::Processing,
                TaskUpdate::Completed { chunks_added: Some(4) }
            ]
        );
    }

    #[test]
    fn test_per_file_error_fails_task() {
        let updates = updates_for(Ok(response_with(Some(FileProcessingResult {
            error: Some("corrupt".to_string()),
            ..Default::default()
        }))));

        assert_eq!(
            updates,
            vec![TaskUpdate::Processing, TaskUpdate::Failed("corrupt".to_string())]
        );
    }

    #[test]
    fn test_empty_results_fail_task() {
        let updates = updates_for(Ok(response_with(None)));
        assert_eq!(
            updates.last(),
            Some(&TaskUpdate::Failed(EMPTY_RESULTS_MESSAGE.to_string()))
        );
    }

    #[test]
    fn test_backend_error_keeps_detail() {
        let updates = updates_for(Err(ClientError::backend(400, "No files were uploaded.")));
        assert_eq!(
            updates,
            vec![
                TaskUpdate::Processing,
                TaskUpdate::Failed("No files were uploaded.".to_string())
            ]
        );
    }

    #[test]
    fn test_transport_error_skips_processing() {
        let updates = updates_for(Err(ClientError::Other("connection refused".to_string())));
        assert_eq!(
            updates,
            vec![TaskUpdate::Failed("connection refused".to_string())]
        );
    }
}
