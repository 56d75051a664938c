//! Task store operations - insert, update, remove, and query upload tasks.
//!
//! The store is the single writer of the task collection. Removed ids are kept
//! as tombstones so a late completion is recognised and discarded.

use indexmap::IndexSet;

use super::types::{
    TaskUpdate, UploadSummary, UploadTask, UploadTaskStatus, MAX_REMOVED_TOMBSTONES,
};

/// Outcome of applying an update reported by an upload request
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum UpdateOutcome {
    Applied(UploadTask),
    /// Illegal transition for the task's current status
    Rejected,
    /// The task was removed; the update is dropped
    Detached,
    /// No task with this id was ever stored
    Unknown,
}

#[derive(Debug, Default)]
pub(crate) struct TaskStore {
    tasks: Vec<UploadTask>,
    removed: IndexSet<String>,
}

impl TaskStore {
    pub fn insert(&mut self, task: UploadTask) {
        self.tasks.push(task);
    }

    pub fn apply_update(&mut self, id: &str, update: &TaskUpdate) -> UpdateOutcome {
        match self.tasks.iter_mut().find(|t| t.id == id) {
            Some(task) => {
                if task.advance(update) {
                    UpdateOutcome::Applied(task.clone())
                } else {
                    UpdateOutcome::Rejected
                }
            }
            None if self.removed.contains(id) => UpdateOutcome::Detached,
            None => UpdateOutcome::Unknown,
        }
    }

    /// Remove a task regardless of status
    pub fn remove(&mut self, id: &str) -> Option<UploadTask> {
        let index = self.tasks.iter().position(|t| t.id == id)?;
        let task = self.tasks.remove(index);

        self.removed.insert(task.id.clone());
        // Prune oldest tombstones (FIFO)
        while self.removed.len() > MAX_REMOVED_TOMBSTONES {
            self.removed.shift_remove_index(0);
        }

        Some(task)
    }

    pub fn was_removed(&self, id: &str) -> bool {
        self.removed.contains(id)
    }

    /// Drop completed tasks, returning their ids
    pub fn clear_completed(&mut self) -> Vec<String> {
        let completed: Vec<String> = self
            .tasks
            .iter()
            .filter(|t| t.status == UploadTaskStatus::Completed)
            .map(|t| t.id.clone())
            .collect();

        for id in &completed {
            self.remove(id);
        }

        completed
    }

    pub fn get(&self, id: &str) -> Option<UploadTask> {
        self.tasks.iter().find(|t| t.id == id).cloned()
    }

    pub fn snapshot(&self) -> Vec<UploadTask> {
        self.tasks.clone()
    }

    pub fn summary(&self) -> UploadSummary {
        let mut summary = UploadSummary {
            total: self.tasks.len(),
            ..Default::default()
        };

        for task in &self.tasks {
            match task.status {
                UploadTaskStatus::Completed => summary.completed += 1,
                UploadTaskStatus::Failed => summary.failed += 1,
                UploadTaskStatus::Uploading | UploadTaskStatus::Processing => {
                    summary.in_flight += 1
                }
                UploadTaskStatus::Queued => {}
            }
        }

        summary
    }
}
