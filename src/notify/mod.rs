use std::fmt::Display;

use async_trait::async_trait;

use crate::task::FileRef;

pub mod resend;

pub use resend::ResendNotifier;

#[derive(Debug)]
pub enum NotifyError {
    Api(String),
    Io(String),
}

impl Display for NotifyError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            NotifyError::Api(m) => write!(f, "email api error: {}", m),
            NotifyError::Io(m) => write!(f, "{}", m),
        }
    }
}

impl std::error::Error for NotifyError {}

/// Delivers finished conversion artifacts to the user. Best-effort: the
/// controller logs a failure and records it as a warning, the task stays
/// done.
#[async_trait]
pub trait Notifier: Send + Sync + 'static {
    async fn send(
        &self,
        to: &str,
        subject: &str,
        body: &str,
        artifacts: &[FileRef],
    ) -> Result<(), NotifyError>;
}
