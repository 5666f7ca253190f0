use std::fmt::Display;
use std::path::PathBuf;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Output languages the conversion pipeline can produce.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Language {
    En,
    Es,
}

impl Language {
    pub fn as_str(&self) -> &'static str {
        match self {
            Language::En => "en",
            Language::Es => "es",
        }
    }
}

impl FromStr for Language {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "en" => Ok(Language::En),
            "es" => Ok(Language::Es),
            other => Err(other.to_string()),
        }
    }
}

impl Display for Language {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// What the user handed us: a previously uploaded file or a source URL.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum TaskInput {
    Upload { file_name: String },
    Url { url: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    InProgress,
    Done,
    Failed,
}

impl TaskStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TaskStatus::InProgress => "in_progress",
            TaskStatus::Done => "done",
            TaskStatus::Failed => "failed",
        }
    }

    pub fn is_terminal(&self) -> bool {
        !matches!(self, TaskStatus::InProgress)
    }
}

impl FromStr for TaskStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "in_progress" => Ok(TaskStatus::InProgress),
            "done" => Ok(TaskStatus::Done),
            "failed" => Ok(TaskStatus::Failed),
            other => Err(format!("Invalid task status: {}", other)),
        }
    }
}

impl Display for TaskStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// One tracked conversion request. `error` is set only when the task
/// failed; `warning` records a notification problem after a successful
/// conversion without changing the status.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Task {
    pub id: String,
    pub owner: Option<String>,
    pub email: Option<String>,
    pub input: TaskInput,
    pub lang: Language,
    pub status: TaskStatus,
    pub error: Option<String>,
    pub warning: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Task {
    pub fn new(
        id: String,
        owner: Option<String>,
        email: Option<String>,
        input: TaskInput,
        lang: Language,
    ) -> Self {
        let now = Utc::now();
        Self {
            id,
            owner,
            email,
            input,
            lang,
            status: TaskStatus::InProgress,
            error: None,
            warning: None,
            created_at: now,
            updated_at: now,
        }
    }
}

/// How active tasks are keyed: one per authenticated identity, or a fresh
/// generated id per submission.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum KeyMode {
    #[default]
    Owner,
    TaskId,
}

impl FromStr for KeyMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "owner" => Ok(KeyMode::Owner),
            "task-id" | "task_id" => Ok(KeyMode::TaskId),
            other => Err(format!("Invalid key mode: {}", other)),
        }
    }
}

/// A generated document on disk, ready to be attached to the result email.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FileRef {
    pub name: String,
    pub path: PathBuf,
    pub media_type: String,
}

/// What the job runner hands back on success.
#[derive(Debug, Clone, PartialEq)]
pub struct JobOutput {
    pub title: String,
    pub summary: String,
    pub artifacts: Vec<FileRef>,
}

/// Externally observable task state. `Idle` is the absence of a record,
/// never stored.
#[derive(Debug, Clone, PartialEq)]
pub enum StatusView {
    Idle,
    InProgress,
    Done { warning: Option<String> },
    Failed { error: String },
}
