//! In-memory registry for background ingestion tasks.
//!
//! Each dispatched ingestion gets one entry, updated when the task
//! finishes. Failed tasks keep the captured error type and message so
//! status polling surfaces a useful diagnostic.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Mutex;

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum TaskState {
    Processing,
    Success { chunks_indexed: usize },
    Failed { error_type: String, message: String },
}

#[derive(Debug, Clone, Serialize)]
pub struct TaskEntry {
    #[serde(flatten)]
    pub state: TaskState,
    pub updated_at: DateTime<Utc>,
}

#[derive(Default)]
pub struct TaskRegistry {
    tasks: Mutex<HashMap<String, TaskEntry>>,
}

impl TaskRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn start(&self, task_id: &str) {
        self.set(task_id, TaskState::Processing);
    }

    pub fn succeed(&self, task_id: &str, chunks_indexed: usize) {
        self.set(task_id, TaskState::Success { chunks_indexed });
    }

    pub fn fail(&self, task_id: &str, error_type: &str, message: &str) {
        self.set(
            task_id,
            TaskState::Failed {
                error_type: error_type.to_string(),
                message: message.to_string(),
            },
        );
    }

    pub fn get(&self, task_id: &str) -> Option<TaskEntry> {
        self.tasks.lock().unwrap().get(task_id).cloned()
    }

    fn set(&self, task_id: &str, state: TaskState) {
        let mut tasks = self.tasks.lock().unwrap();
        tasks.insert(
            task_id.to_string(),
            TaskEntry {
                state,
                updated_at: Utc::now(),
            },
        );
    }
}
