use std::fmt::Display;

use async_trait::async_trait;

use crate::task::{JobOutput, Language, TaskInput};

pub mod pandoc;
pub mod pipeline;

pub use pipeline::{ApiContentPipeline, ContentPipeline, PipelineRunner};

/// Why a conversion job ended without a result. Variants, not substring
/// checks: callers can tell a source that wants credentials from a flaky
/// dependency without parsing messages.
#[derive(Debug, Clone, PartialEq)]
pub enum JobError {
    /// The source or a downstream service rejected our credentials.
    AuthRequired(String),
    /// Worth retrying by resubmitting; nothing about the input is wrong.
    Transient(String),
    /// The input or configuration is bad; resubmitting the same request
    /// will fail the same way.
    Fatal(String),
}

impl Display for JobError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            JobError::AuthRequired(m) => write!(f, "authorization required: {}", m),
            JobError::Transient(m) => write!(f, "temporary failure: {}", m),
            JobError::Fatal(m) => write!(f, "{}", m),
        }
    }
}

impl std::error::Error for JobError {}

/// Runs one conversion end to end. Any failure is terminal for that
/// submission; the controller never retries on its own.
#[async_trait]
pub trait JobRunner: Send + Sync + 'static {
    async fn run(&self, input: &TaskInput, lang: Language) -> Result<JobOutput, JobError>;
}
