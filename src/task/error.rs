use std::fmt::Display;

use crate::storage::task::StoreError;

#[derive(Debug)]
pub enum SubmitError {
    AlreadyRunning,
    Store(StoreError),
}

impl Display for SubmitError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SubmitError::AlreadyRunning => write!(f, "Conversion already in progress"),
            SubmitError::Store(e) => write!(f, "task store error: {}", e),
        }
    }
}

impl std::error::Error for SubmitError {}

impl From<StoreError> for SubmitError {
    fn from(error: StoreError) -> Self {
        match error {
            StoreError::Conflict => SubmitError::AlreadyRunning,
            other => SubmitError::Store(other),
        }
    }
}
