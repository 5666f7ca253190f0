use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{Row, SqlitePool};
use tracing::info;

use super::{StatusChange, StoreError, TaskStore};
use crate::task::{Task, TaskStatus};

/// SQLite-backed task store. The conflict check on `create` and the status
/// transitions on `update` are single guarded statements, so the one-active
/// -task-per-key invariant holds even with several service processes on the
/// same database file.
pub struct SqliteTaskStore {
    pool: SqlitePool,
}

impl SqliteTaskStore {
    pub async fn new(database_url: &str) -> anyhow::Result<Self> {
        info!("Initializing SQLite task store at {}", database_url);
        let pool = SqlitePool::connect(database_url).await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS tasks (
                key TEXT PRIMARY KEY,
                id TEXT NOT NULL,
                owner TEXT,
                email TEXT,
                input TEXT NOT NULL,
                lang TEXT NOT NULL,
                status TEXT NOT NULL,
                error TEXT,
                warning TEXT,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL
            )
            "#,
        )
        .execute(&pool)
        .await?;

        Ok(Self { pool })
    }

    fn row_to_task(row: &sqlx::sqlite::SqliteRow) -> Result<Task, StoreError> {
        let input: String = row.get("input");
        let input =
            serde_json::from_str(&input).map_err(|e| StoreError::Backend(e.to_string()))?;

        let lang: String = row.get("lang");
        let lang = lang.parse().map_err(StoreError::Backend)?;

        let status: String = row.get("status");
        let status = status.parse().map_err(StoreError::Backend)?;

        Ok(Task {
            id: row.get("id"),
            owner: row.get("owner"),
            email: row.get("email"),
            input,
            lang,
            status,
            error: row.get("error"),
            warning: row.get("warning"),
            created_at: parse_timestamp(row.get("created_at"))?,
            updated_at: parse_timestamp(row.get("updated_at"))?,
        })
    }
}

fn parse_timestamp(raw: String) -> Result<DateTime<Utc>, StoreError> {
    DateTime::parse_from_rfc3339(&raw)
        .map(|t| t.with_timezone(&Utc))
        .map_err(|e| StoreError::Backend(e.to_string()))
}

#[async_trait]
impl TaskStore for SqliteTaskStore {
    async fn create(&self, key: &str, task: Task) -> Result<(), StoreError> {
        let input =
            serde_json::to_string(&task.input).map_err(|e| StoreError::Backend(e.to_string()))?;

        // Insert, or replace a terminal record; a row still in progress is
        // left untouched and reported as a conflict.
        let result = sqlx::query(
            r#"
            INSERT INTO tasks
            (key, id, owner, email, input, lang, status, error, warning, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, NULL, NULL, ?, ?)
            ON CONFLICT(key) DO UPDATE SET
                id = excluded.id,
                owner = excluded.owner,
                email = excluded.email,
                input = excluded.input,
                lang = excluded.lang,
                status = excluded.status,
                error = NULL,
                warning = NULL,
                created_at = excluded.created_at,
                updated_at = excluded.updated_at
            WHERE tasks.status != 'in_progress'
            "#,
        )
        .bind(key)
        .bind(&task.id)
        .bind(&task.owner)
        .bind(&task.email)
        .bind(&input)
        .bind(task.lang.as_str())
        .bind(task.status.as_str())
        .bind(task.created_at.to_rfc3339())
        .bind(task.updated_at.to_rfc3339())
        .execute(&self.pool)
        .await
        .map_err(|e| StoreError::Backend(e.to_string()))?;

        if result.rows_affected() == 0 {
            return Err(StoreError::Conflict);
        }
        Ok(())
    }

    async fn get(&self, key: &str) -> Result<Option<Task>, StoreError> {
        let row = sqlx::query("SELECT * FROM tasks WHERE key = ?")
            .bind(key)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| StoreError::Backend(e.to_string()))?;

        row.as_ref().map(Self::row_to_task).transpose()
    }

    async fn update(&self, key: &str, change: StatusChange) -> Result<(), StoreError> {
        let now = Utc::now().to_rfc3339();

        let result = match change {
            StatusChange::Done => {
                sqlx::query("UPDATE tasks SET status = ?, error = NULL, updated_at = ? WHERE key = ?")
                    .bind(TaskStatus::Done.as_str())
                    .bind(&now)
                    .bind(key)
                    .execute(&self.pool)
                    .await
            }
            StatusChange::Failed(message) => {
                sqlx::query("UPDATE tasks SET status = ?, error = ?, updated_at = ? WHERE key = ?")
                    .bind(TaskStatus::Failed.as_str())
                    .bind(&message)
                    .bind(&now)
                    .bind(key)
                    .execute(&self.pool)
                    .await
            }
            StatusChange::Warning(message) => {
                sqlx::query("UPDATE tasks SET warning = ?, updated_at = ? WHERE key = ?")
                    .bind(&message)
                    .bind(&now)
                    .bind(key)
                    .execute(&self.pool)
                    .await
            }
        }
        .map_err(|e| StoreError::Backend(e.to_string()))?;

        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound);
        }
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<(), StoreError> {
        sqlx::query("DELETE FROM tasks WHERE key = ?")
            .bind(key)
            .execute(&self.pool)
            .await
            .map_err(|e| StoreError::Backend(e.to_string()))?;
        Ok(())
    }
}
