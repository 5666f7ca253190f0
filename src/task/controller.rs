use std::sync::Arc;
use std::time::Duration;

use tracing::{error, info, warn};
use uuid::Uuid;

use crate::auth::Identity;
use crate::notify::Notifier;
use crate::runner::{JobError, JobRunner};
use crate::storage::task::{StatusChange, StoreError, TaskStore};

use super::error::SubmitError;
use super::types::{JobOutput, KeyMode, Language, StatusView, Task, TaskInput, TaskStatus};

#[derive(Debug, Clone)]
pub struct ControllerOptions {
    pub key_mode: KeyMode,
    pub job_timeout: Duration,
    pub error_display_cap: usize,
}

impl Default for ControllerOptions {
    fn default() -> Self {
        Self {
            key_mode: KeyMode::Owner,
            job_timeout: Duration::from_secs(900),
            error_display_cap: 256,
        }
    }
}

/// The only component that mutates the task store. Submission creates the
/// record and schedules the job; the job's completion callbacks move the
/// record to its terminal state; `reset` deletes it.
#[derive(Clone)]
pub struct TaskController {
    store: Arc<dyn TaskStore>,
    runner: Arc<dyn JobRunner>,
    notifier: Arc<dyn Notifier>,
    opts: ControllerOptions,
}

impl TaskController {
    pub fn new(
        store: Arc<dyn TaskStore>,
        runner: Arc<dyn JobRunner>,
        notifier: Arc<dyn Notifier>,
        opts: ControllerOptions,
    ) -> Self {
        Self {
            store,
            runner,
            notifier,
            opts,
        }
    }

    pub fn key_mode(&self) -> KeyMode {
        self.opts.key_mode
    }

    /// Creates the task record and schedules the conversion. Returns as
    /// soon as the record exists; the job itself runs on its own tokio
    /// task and is never awaited by the submitting request.
    pub async fn submit(
        &self,
        identity: &Identity,
        input: TaskInput,
        lang: Language,
    ) -> Result<String, SubmitError> {
        let key = match self.opts.key_mode {
            KeyMode::Owner => identity.subject.clone(),
            KeyMode::TaskId => format!("task-{}", Uuid::new_v4()),
        };

        let task = Task::new(
            key.clone(),
            Some(identity.subject.clone()),
            identity.email.clone(),
            input.clone(),
            lang,
        );
        self.store.create(&key, task).await?;
        info!("Created task {} for {}", key, identity.subject);

        let controller = self.clone();
        let job_key = key.clone();
        let email = identity.email.clone();
        tokio::spawn(async move {
            controller.run_job(job_key, email, input, lang).await;
        });

        Ok(key)
    }

    async fn run_job(&self, key: String, email: Option<String>, input: TaskInput, lang: Language) {
        match tokio::time::timeout(self.opts.job_timeout, self.runner.run(&input, lang)).await {
            Ok(Ok(output)) => self.on_job_success(&key, email.as_deref(), output).await,
            Ok(Err(err)) => self.on_job_failure(&key, &err).await,
            Err(_) => {
                let err = JobError::Transient(format!(
                    "conversion timed out after {}s",
                    self.opts.job_timeout.as_secs()
                ));
                self.on_job_failure(&key, &err).await;
            }
        }
    }

    /// Marks the task done and delivers the result. A task reset while the
    /// job was running no longer has a record; the result is dropped.
    /// Notification failure is a warning on the record, not a state change.
    pub async fn on_job_success(&self, key: &str, email: Option<&str>, output: JobOutput) {
        match self.store.update(key, StatusChange::Done).await {
            Ok(()) => info!("Task {} completed", key),
            Err(StoreError::NotFound) => {
                info!("Task {} was reset while running, dropping result", key);
                return;
            }
            Err(e) => {
                error!("Failed to mark task {} done: {}", key, e);
                return;
            }
        }

        let Some(to) = email else {
            info!("Task {} has no owner email, skipping notification", key);
            return;
        };

        let subject = format!("Your document \"{}\" is ready", output.title);
        if let Err(e) = self
            .notifier
            .send(to, &subject, &output.summary, &output.artifacts)
            .await
        {
            warn!("Failed to notify {} for task {}: {}", to, key, e);
            let note = truncate_display(
                &format!("email delivery failed: {}", e),
                self.opts.error_display_cap,
            );
            if let Err(e) = self.store.update(key, StatusChange::Warning(note)).await {
                warn!("Failed to record notify warning on task {}: {}", key, e);
            }
        }
    }

    pub async fn on_job_failure(&self, key: &str, err: &JobError) {
        warn!("Task {} failed: {}", key, err);
        let mut message = truncate_display(&err.to_string(), self.opts.error_display_cap);
        if message.is_empty() {
            message = "conversion failed".to_string();
        }
        match self.store.update(key, StatusChange::Failed(message)).await {
            Ok(()) => {}
            Err(StoreError::NotFound) => {
                info!("Task {} was reset while running, dropping failure", key)
            }
            Err(e) => error!("Failed to mark task {} failed: {}", key, e),
        }
    }

    pub async fn status(&self, key: &str) -> Result<StatusView, StoreError> {
        let view = match self.store.get(key).await? {
            None => StatusView::Idle,
            Some(task) => match task.status {
                TaskStatus::InProgress => StatusView::InProgress,
                TaskStatus::Done => StatusView::Done {
                    warning: task.warning,
                },
                TaskStatus::Failed => StatusView::Failed {
                    error: task
                        .error
                        .unwrap_or_else(|| "conversion failed".to_string()),
                },
            },
        };
        Ok(view)
    }

    /// Unconditional delete. An in-flight job is not interrupted; its
    /// completion callback will find no record and drop the outcome.
    pub async fn reset(&self, key: &str) -> Result<(), StoreError> {
        self.store.delete(key).await?;
        info!("Reset task {}", key);
        Ok(())
    }
}

fn truncate_display(s: &str, cap: usize) -> String {
    if s.chars().count() <= cap {
        return s.to_string();
    }
    s.chars().take(cap).collect()
}
