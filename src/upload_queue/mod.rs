// Module declarations
mod processor;
mod queue_manager;
mod types;

// Re-export types and constants from submodules
pub use types::*;

use crate::api::QueryBackend;
use crate::events::{Component, EventBus, NotificationLevel, StatePayload};
use crate::logging::log_info;
use processor::UploadProcessor;
use queue_manager::TaskStore;
use std::sync::{Arc, Mutex};
use tokio::sync::Semaphore;
use tokio::task::JoinHandle;

/// Owns the upload task collection and dispatches one background upload per task
#[derive(Clone)]
pub struct UploadQueue {
    store: Arc<Mutex<TaskStore>>,
    processor: UploadProcessor,
    handles: Arc<Mutex<Vec<JoinHandle<()>>>>,
    events: EventBus,
}

impl std::fmt::Debug for UploadQueue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UploadQueue")
            .field("store", &"<tasks>")
            .field("processor", &"<processor>")
            .field("handles", &"<join handles>")
            .finish()
    }
}

impl UploadQueue {
    pub fn new(backend: Arc<dyn QueryBackend>, events: EventBus, max_concurrent: usize) -> Self {
        let store = Arc::new(Mutex::new(TaskStore::default()));
        let semaphore = Arc::new(Semaphore::new(max_concurrent.max(1)));
        let processor = UploadProcessor::new(store.clone(), backend, events.clone(), semaphore);

        Self {
            store,
            processor,
            handles: Arc::new(Mutex::new(Vec::new())),
            events,
        }
    }

    /// Append one Queued task per file, in order, and start each upload.
    ///
    /// Must be called from within a tokio runtime. Returns the new task ids.
    pub fn enqueue(&self, files: Vec<UploadFile>) -> Vec<String> {
        if files.is_empty() {
            return Vec::new();
        }

        let tasks: Vec<UploadTask> = files.iter().map(UploadTask::queued).collect();
        {
            let mut store = self.store.lock().unwrap_or_else(|e| e.into_inner());
            for task in &tasks {
                store.insert(task.clone());
            }
        }

        let ids: Vec<String> = tasks.iter().map(|t| t.id.clone()).collect();
        for task in tasks {
            let _ = self
                .events
                .publish(Component::Uploads, StatePayload::UploadTaskChanged { task });
        }

        {
            let mut handles = self.handles.lock().unwrap_or_else(|e| e.into_inner());
            handles.retain(|h| !h.is_finished());
            for (id, file) in ids.iter().cloned().zip(files) {
                let processor = self.processor.clone();
                handles.push(tokio::spawn(processor.run(id, file)));
            }
        }

        log_info(
            "upload-queue",
            &format!("📥 Queued {} file(s) for upload", ids.len()),
        )
        .unwrap_or_default();
        self.events.notify(
            Component::Uploads,
            NotificationLevel::Info,
            "Files Queued",
            Some(format!("{} file(s) added to the upload queue.", ids.len())),
        );

        ids
    }

    /// Delete a task whatever its status. An in-flight request keeps running
    /// but its result is discarded.
    pub fn remove(&self, id: &str) -> bool {
        let removed = {
            let mut store = self.store.lock().unwrap_or_else(|e| e.into_inner());
            store.remove(id).is_some()
        };

        if removed {
            let _ = self.events.publish(
                Component::Uploads,
                StatePayload::UploadTaskRemoved {
                    task_id: id.to_string(),
                },
            );
        }

        removed
    }

    /// Remove every Completed task, returning how many were dropped
    pub fn clear_completed(&self) -> usize {
        let cleared = {
            let mut store = self.store.lock().unwrap_or_else(|e| e.into_inner());
            store.clear_completed()
        };

        for task_id in &cleared {
            let _ = self.events.publish(
                Component::Uploads,
                StatePayload::UploadTaskRemoved {
                    task_id: task_id.clone(),
                },
            );
        }

        cleared.len()
    }

    pub fn tasks(&self) -> Vec<UploadTask> {
        self.store
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .snapshot()
    }

    pub fn task(&self, id: &str) -> Option<UploadTask> {
        self.store.lock().unwrap_or_else(|e| e.into_inner()).get(id)
    }

    pub fn summary(&self) -> UploadSummary {
        self.store.lock().unwrap_or_else(|e| e.into_inner()).summary()
    }

    /// Wait for every upload dispatched so far to finish
    pub async fn drain(&self) {
        let handles = {
            let mut guard = self.handles.lock().unwrap_or_else(|e| e.into_inner());
            std::mem::take(&mut *guard)
        };

        for handle in handles {
            let _ = handle.await;
        }
    }
}
