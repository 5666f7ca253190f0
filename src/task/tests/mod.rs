use std::path::PathBuf;
use std::sync::{Arc, Mutex as StdMutex};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::Notify;
use tokio::time::sleep;

use crate::auth::Identity;
use crate::notify::{Notifier, NotifyError};
use crate::runner::{JobError, JobRunner};
use crate::storage::task::memory::MemoryTaskStore;
use crate::task::{
    ControllerOptions, FileRef, JobOutput, KeyMode, Language, StatusView, SubmitError,
    TaskController, TaskInput,
};

struct ScriptedRunner {
    gate: Option<Arc<Notify>>,
    result: Result<JobOutput, JobError>,
}

impl ScriptedRunner {
    fn ready(result: Result<JobOutput, JobError>) -> Self {
        Self { gate: None, result }
    }

    fn gated(gate: Arc<Notify>, result: Result<JobOutput, JobError>) -> Self {
        Self {
            gate: Some(gate),
            result,
        }
    }
}

#[async_trait]
impl JobRunner for ScriptedRunner {
    async fn run(&self, _input: &TaskInput, _lang: Language) -> Result<JobOutput, JobError> {
        if let Some(gate) = &self.gate {
            gate.notified().await;
        }
        self.result.clone()
    }
}

#[derive(Default)]
struct RecordingNotifier {
    fail: bool,
    sent: StdMutex<Vec<(String, String, usize)>>,
}

impl RecordingNotifier {
    fn failing() -> Self {
        Self {
            fail: true,
            sent: StdMutex::new(Vec::new()),
        }
    }

    fn sent(&self) -> Vec<(String, String, usize)> {
        self.sent.lock().unwrap().clone()
    }
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn send(
        &self,
        to: &str,
        subject: &str,
        _body: &str,
        artifacts: &[FileRef],
    ) -> Result<(), NotifyError> {
        if self.fail {
            return Err(NotifyError::Api("mailbox unavailable".to_string()));
        }
        self.sent
            .lock()
            .unwrap()
            .push((to.to_string(), subject.to_string(), artifacts.len()));
        Ok(())
    }
}

fn identity(subject: &str) -> Identity {
    Identity {
        subject: subject.to_string(),
        email: Some(format!("{}@example.com", subject)),
    }
}

fn sample_output() -> JobOutput {
    JobOutput {
        title: "A Talk".to_string(),
        summary: "What the talk covered.".to_string(),
        artifacts: vec![FileRef {
            name: "a-talk.docx".to_string(),
            path: PathBuf::from("/tmp/a-talk.docx"),
            media_type: "application/vnd.openxmlformats-officedocument.wordprocessingml.document"
                .to_string(),
        }],
    }
}

fn url_input() -> TaskInput {
    TaskInput::Url {
        url: "https://example.com/a.mp3".to_string(),
    }
}

fn options() -> ControllerOptions {
    ControllerOptions {
        key_mode: KeyMode::Owner,
        job_timeout: Duration::from_secs(5),
        error_display_cap: 256,
    }
}

fn controller(
    runner: ScriptedRunner,
    notifier: Arc<RecordingNotifier>,
    opts: ControllerOptions,
) -> TaskController {
    TaskController::new(
        Arc::new(MemoryTaskStore::new()),
        Arc::new(runner),
        notifier,
        opts,
    )
}

async fn wait_for<F>(controller: &TaskController, key: &str, pred: F) -> StatusView
where
    F: Fn(&StatusView) -> bool,
{
    for _ in 0..200 {
        let view = controller.status(key).await.unwrap();
        if pred(&view) {
            return view;
        }
        sleep(Duration::from_millis(10)).await;
    }
    panic!("task {} never reached the expected state", key);
}

#[tokio::test]
async fn submit_while_in_progress_is_rejected() {
    let gate = Arc::new(Notify::new());
    let notifier = Arc::new(RecordingNotifier::default());
    let controller = controller(
        ScriptedRunner::gated(gate.clone(), Ok(sample_output())),
        notifier,
        options(),
    );

    let user = identity("auth0|alice");
    controller
        .submit(&user, url_input(), Language::En)
        .await
        .unwrap();

    let err = controller
        .submit(&user, url_input(), Language::En)
        .await
        .unwrap_err();
    assert!(matches!(err, SubmitError::AlreadyRunning));

    gate.notify_one();
    wait_for(&controller, "auth0|alice", |v| {
        matches!(v, StatusView::Done { .. })
    })
    .await;
}

#[tokio::test]
async fn distinct_owners_run_independently() {
    let gate = Arc::new(Notify::new());
    let notifier = Arc::new(RecordingNotifier::default());
    let controller = controller(
        ScriptedRunner::gated(gate.clone(), Ok(sample_output())),
        notifier,
        options(),
    );

    controller
        .submit(&identity("auth0|alice"), url_input(), Language::En)
        .await
        .unwrap();
    controller
        .submit(&identity("auth0|bob"), url_input(), Language::Es)
        .await
        .unwrap();

    assert_eq!(
        controller.status("auth0|alice").await.unwrap(),
        StatusView::InProgress
    );
    assert_eq!(
        controller.status("auth0|bob").await.unwrap(),
        StatusView::InProgress
    );
}

#[tokio::test]
async fn successful_job_reaches_done_and_notifies() {
    let notifier = Arc::new(RecordingNotifier::default());
    let controller = controller(
        ScriptedRunner::ready(Ok(sample_output())),
        notifier.clone(),
        options(),
    );

    let key = controller
        .submit(&identity("auth0|alice"), url_input(), Language::En)
        .await
        .unwrap();
    assert_eq!(key, "auth0|alice");

    let view = wait_for(&controller, &key, |v| matches!(v, StatusView::Done { .. })).await;
    assert_eq!(view, StatusView::Done { warning: None });

    // the email goes out after the status flip; give it a moment
    let mut sent = notifier.sent();
    for _ in 0..200 {
        if !sent.is_empty() {
            break;
        }
        sleep(Duration::from_millis(10)).await;
        sent = notifier.sent();
    }
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].0, "auth0|alice@example.com");
    assert!(sent[0].1.contains("A Talk"));
    assert_eq!(sent[0].2, 1);
}

#[tokio::test]
async fn owner_without_email_skips_notification() {
    let notifier = Arc::new(RecordingNotifier::default());
    let controller = controller(
        ScriptedRunner::ready(Ok(sample_output())),
        notifier.clone(),
        options(),
    );

    let anonymous = Identity {
        subject: "auth0|ghost".to_string(),
        email: None,
    };
    let key = controller
        .submit(&anonymous, url_input(), Language::En)
        .await
        .unwrap();

    wait_for(&controller, &key, |v| matches!(v, StatusView::Done { .. })).await;
    sleep(Duration::from_millis(50)).await;
    assert!(notifier.sent().is_empty());
}

#[tokio::test]
async fn failed_job_records_capped_error() {
    let long_reason = "x".repeat(400);
    let notifier = Arc::new(RecordingNotifier::default());
    let controller = controller(
        ScriptedRunner::ready(Err(JobError::Fatal(long_reason))),
        notifier.clone(),
        options(),
    );

    let key = controller
        .submit(&identity("auth0|carol"), url_input(), Language::En)
        .await
        .unwrap();

    let view = wait_for(&controller, &key, |v| matches!(v, StatusView::Failed { .. })).await;
    let StatusView::Failed { error } = view else {
        unreachable!()
    };
    assert!(!error.is_empty());
    assert!(error.chars().count() <= 256);

    // no email on failure
    assert!(notifier.sent().is_empty());
}

#[tokio::test]
async fn typed_runner_errors_surface_their_kind() {
    let notifier = Arc::new(RecordingNotifier::default());
    let controller = controller(
        ScriptedRunner::ready(Err(JobError::AuthRequired(
            "the source requires sign-in".to_string(),
        ))),
        notifier,
        options(),
    );

    let key = controller
        .submit(&identity("auth0|dave"), url_input(), Language::En)
        .await
        .unwrap();

    let view = wait_for(&controller, &key, |v| matches!(v, StatusView::Failed { .. })).await;
    let StatusView::Failed { error } = view else {
        unreachable!()
    };
    assert!(error.contains("authorization required"));
}

#[tokio::test]
async fn reset_returns_to_idle_from_any_state() {
    let notifier = Arc::new(RecordingNotifier::default());
    let controller = controller(
        ScriptedRunner::ready(Ok(sample_output())),
        notifier,
        options(),
    );

    // reset with no record is a quiet success
    controller.reset("auth0|alice").await.unwrap();
    assert_eq!(
        controller.status("auth0|alice").await.unwrap(),
        StatusView::Idle
    );

    let key = controller
        .submit(&identity("auth0|alice"), url_input(), Language::En)
        .await
        .unwrap();
    wait_for(&controller, &key, |v| matches!(v, StatusView::Done { .. })).await;

    controller.reset(&key).await.unwrap();
    assert_eq!(controller.status(&key).await.unwrap(), StatusView::Idle);
}

#[tokio::test]
async fn reset_while_running_drops_the_result() {
    let gate = Arc::new(Notify::new());
    let notifier = Arc::new(RecordingNotifier::default());
    let controller = controller(
        ScriptedRunner::gated(gate.clone(), Ok(sample_output())),
        notifier.clone(),
        options(),
    );

    let key = controller
        .submit(&identity("auth0|alice"), url_input(), Language::En)
        .await
        .unwrap();
    assert_eq!(controller.status(&key).await.unwrap(), StatusView::InProgress);

    controller.reset(&key).await.unwrap();
    gate.notify_one();

    // the late completion finds no record and is dropped
    sleep(Duration::from_millis(100)).await;
    assert_eq!(controller.status(&key).await.unwrap(), StatusView::Idle);
    assert!(notifier.sent().is_empty());
}

#[tokio::test]
async fn terminal_task_is_replaced_only_by_resubmission() {
    let notifier = Arc::new(RecordingNotifier::default());
    let controller = controller(
        ScriptedRunner::ready(Err(JobError::Transient("network blip".to_string()))),
        notifier,
        options(),
    );

    let user = identity("auth0|erin");
    let key = controller
        .submit(&user, url_input(), Language::En)
        .await
        .unwrap();
    wait_for(&controller, &key, |v| matches!(v, StatusView::Failed { .. })).await;

    // a failed task does not block a fresh submission, and the new task
    // runs its own full lifecycle
    controller
        .submit(&user, url_input(), Language::En)
        .await
        .unwrap();
    assert_ne!(controller.status(&key).await.unwrap(), StatusView::Idle);
    wait_for(&controller, &key, |v| matches!(v, StatusView::Failed { .. })).await;
}

#[tokio::test]
async fn notify_failure_keeps_done_with_warning() {
    let notifier = Arc::new(RecordingNotifier::failing());
    let controller = controller(
        ScriptedRunner::ready(Ok(sample_output())),
        notifier,
        options(),
    );

    let key = controller
        .submit(&identity("auth0|frank"), url_input(), Language::En)
        .await
        .unwrap();

    let view = wait_for(&controller, &key, |v| {
        matches!(v, StatusView::Done { warning: Some(_) })
    })
    .await;
    let StatusView::Done { warning } = view else {
        unreachable!()
    };
    assert!(warning.unwrap().contains("email delivery failed"));
}

#[tokio::test]
async fn job_timeout_marks_the_task_failed() {
    let gate = Arc::new(Notify::new());
    let notifier = Arc::new(RecordingNotifier::default());
    let opts = ControllerOptions {
        job_timeout: Duration::from_millis(50),
        ..options()
    };
    // the gate is never released; only the timeout can finish the job
    let controller = controller(
        ScriptedRunner::gated(gate, Ok(sample_output())),
        notifier,
        opts,
    );

    let key = controller
        .submit(&identity("auth0|grace"), url_input(), Language::En)
        .await
        .unwrap();

    let view = wait_for(&controller, &key, |v| matches!(v, StatusView::Failed { .. })).await;
    let StatusView::Failed { error } = view else {
        unreachable!()
    };
    assert!(error.contains("timed out"));
}

#[tokio::test]
async fn task_id_mode_generates_a_fresh_key_per_submission() {
    let notifier = Arc::new(RecordingNotifier::default());
    let opts = ControllerOptions {
        key_mode: KeyMode::TaskId,
        ..options()
    };
    let controller = controller(
        ScriptedRunner::ready(Ok(sample_output())),
        notifier,
        opts,
    );

    let user = identity("auth0|alice");
    let first = controller
        .submit(&user, url_input(), Language::En)
        .await
        .unwrap();
    let second = controller
        .submit(&user, url_input(), Language::En)
        .await
        .unwrap();

    assert_ne!(first, second);
    assert!(first.starts_with("task-"));
    assert!(second.starts_with("task-"));
}
