pub mod controller;
pub mod error;
pub mod types;

pub use controller::{ControllerOptions, TaskController};
pub use error::SubmitError;
pub use types::{
    FileRef, JobOutput, KeyMode, Language, StatusView, Task, TaskInput, TaskStatus,
};

#[cfg(test)]
mod tests;
