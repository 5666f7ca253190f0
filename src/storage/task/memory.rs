use std::collections::HashMap;
use std::sync::RwLock;

use async_trait::async_trait;
use chrono::Utc;

use super::{StatusChange, StoreError, TaskStore};
use crate::task::{Task, TaskStatus};

/// In-process task store. Fine for a single instance; records do not
/// survive a restart.
pub struct MemoryTaskStore {
    tasks: RwLock<HashMap<String, Task>>,
}

impl MemoryTaskStore {
    pub fn new() -> Self {
        Self {
            tasks: RwLock::new(HashMap::new()),
        }
    }
}

impl Default for MemoryTaskStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl TaskStore for MemoryTaskStore {
    async fn create(&self, key: &str, task: Task) -> Result<(), StoreError> {
        let mut tasks = self
            .tasks
            .write()
            .map_err(|e| StoreError::Backend(e.to_string()))?;

        if let Some(existing) = tasks.get(key) {
            if !existing.status.is_terminal() {
                return Err(StoreError::Conflict);
            }
        }

        tasks.insert(key.to_string(), task);
        Ok(())
    }

    async fn get(&self, key: &str) -> Result<Option<Task>, StoreError> {
        let tasks = self
            .tasks
            .read()
            .map_err(|e| StoreError::Backend(e.to_string()))?;
        Ok(tasks.get(key).cloned())
    }

    async fn update(&self, key: &str, change: StatusChange) -> Result<(), StoreError> {
        let mut tasks = self
            .tasks
            .write()
            .map_err(|e| StoreError::Backend(e.to_string()))?;

        let task = tasks.get_mut(key).ok_or(StoreError::NotFound)?;
        match change {
            StatusChange::Done => {
                task.status = TaskStatus::Done;
                task.error = None;
            }
            StatusChange::Failed(message) => {
                task.status = TaskStatus::Failed;
                task.error = Some(message);
            }
            StatusChange::Warning(message) => {
                task.warning = Some(message);
            }
        }
        task.updated_at = Utc::now();
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<(), StoreError> {
        let mut tasks = self
            .tasks
            .write()
            .map_err(|e| StoreError::Backend(e.to_string()))?;
        tasks.remove(key);
        Ok(())
    }
}
