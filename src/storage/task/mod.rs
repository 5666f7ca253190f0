use std::fmt::Display;

use async_trait::async_trait;

use crate::task::Task;

pub mod memory;
pub mod sqlite;

#[derive(Debug, PartialEq)]
pub enum StoreError {
    Conflict,
    NotFound,
    Backend(String),
}

impl Display for StoreError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:?}", self)
    }
}

impl std::error::Error for StoreError {}

/// A status transition applied by `TaskStore::update`. Reified instead of a
/// closure so relational backends can express the read-modify-write as a
/// single guarded statement.
#[derive(Debug, Clone, PartialEq)]
pub enum StatusChange {
    Done,
    Failed(String),
    Warning(String),
}

/// Keyed task records. At most one non-terminal task may exist per key;
/// `create` enforces that and replaces terminal records in place.
#[async_trait]
pub trait TaskStore: Send + Sync + 'static {
    async fn create(&self, key: &str, task: Task) -> Result<(), StoreError>;
    async fn get(&self, key: &str) -> Result<Option<Task>, StoreError>;
    async fn update(&self, key: &str, change: StatusChange) -> Result<(), StoreError>;
    async fn delete(&self, key: &str) -> Result<(), StoreError>;
}
