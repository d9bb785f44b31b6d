// ABOUTME: Owner-scoped task store consumed by the context aggregator
// ABOUTME: Create, list, and delete; listing is ordered oldest first
//
// SPDX-License-Identifier: MIT OR Apache-2.0

use chrono::{TimeZone, Utc};
use sqlx::Row;
use tracing::debug;
use uuid::Uuid;

use super::Database;
use crate::errors::{AppError, AppResult};
use crate::models::{NewTask, Task, TaskImportance};

impl Database {
    /// Create the `tasks` table
    ///
    /// # Errors
    ///
    /// Returns an error if table or index creation fails
    pub(super) async fn migrate_tasks(&self) -> AppResult<()> {
        sqlx::query(
            r"
            CREATE TABLE IF NOT EXISTS tasks (
                id TEXT PRIMARY KEY,
                user_id TEXT NOT NULL,
                title TEXT NOT NULL,
                description TEXT,
                due_date_ms INTEGER,
                is_complete BOOLEAN NOT NULL DEFAULT false,
                importance TEXT NOT NULL DEFAULT 'medium',
                created_at DATETIME NOT NULL,
                updated_at DATETIME NOT NULL
            )
            ",
        )
        .execute(self.pool())
        .await?;

        sqlx::query("CREATE INDEX IF NOT EXISTS idx_tasks_user ON tasks(user_id)")
            .execute(self.pool())
            .await?;

        Ok(())
    }

    /// Create a task for a user.
    ///
    /// # Errors
    ///
    /// Returns `InvalidInput` for an empty title or a `DatabaseError` on
    /// query failure.
    pub async fn create_task(&self, user_id: Uuid, new_task: &NewTask) -> AppResult<Task> {
        if new_task.title.trim().is_empty() {
            return Err(AppError::invalid_input("task title must not be empty").with_user_id(user_id));
        }

        let now = Utc::now();
        let task = Task {
            id: Uuid::new_v4(),
            user_id,
            title: new_task.title.clone(),
            description: new_task.description.clone(),
            due_date: new_task.due_date,
            is_complete: false,
            importance: new_task.importance.unwrap_or_default(),
            created_at: now,
            updated_at: now,
        };

        sqlx::query(
            r"
            INSERT INTO tasks (
                id, user_id, title, description, due_date_ms,
                is_complete, importance, created_at, updated_at
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            ",
        )
        .bind(task.id.to_string())
        .bind(task.user_id.to_string())
        .bind(&task.title)
        .bind(task.description.as_deref())
        .bind(task.due_date.map(|t| t.timestamp_millis()))
        .bind(task.is_complete)
        .bind(task.importance.as_str())
        .bind(task.created_at)
        .bind(task.updated_at)
        .execute(self.pool())
        .await?;

        debug!(%user_id, task_id = %task.id, "created task");

        Ok(task)
    }

    /// List all tasks for a user, oldest first.
    ///
    /// # Errors
    ///
    /// Returns a `DatabaseError` if the query fails.
    pub async fn list_tasks(&self, user_id: Uuid) -> AppResult<Vec<Task>> {
        let rows = sqlx::query(
            r"
            SELECT id, user_id, title, description, due_date_ms,
                   is_complete, importance, created_at, updated_at
            FROM tasks
            WHERE user_id = $1
            ORDER BY created_at ASC
            ",
        )
        .bind(user_id.to_string())
        .fetch_all(self.pool())
        .await?;

        rows.iter().map(Self::row_to_task).collect()
    }

    /// Delete a task, scoped to its owner.
    ///
    /// # Errors
    ///
    /// Returns `ResourceNotFound` when the task does not exist or belongs
    /// to another user, or a `DatabaseError` on query failure.
    pub async fn delete_task(&self, user_id: Uuid, task_id: Uuid) -> AppResult<()> {
        let result = sqlx::query("DELETE FROM tasks WHERE id = $1 AND user_id = $2")
            .bind(task_id.to_string())
            .bind(user_id.to_string())
            .execute(self.pool())
            .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::not_found(format!("task {task_id}")).with_user_id(user_id));
        }

        debug!(%user_id, %task_id, "deleted task");

        Ok(())
    }

    fn row_to_task(row: &sqlx::sqlite::SqliteRow) -> AppResult<Task> {
        let id_str: String = row.get("id");
        let id = Uuid::parse_str(&id_str)
            .map_err(|e| AppError::database(format!("invalid task id in row: {e}")))?;

        let user_id_str: String = row.get("user_id");
        let user_id = Uuid::parse_str(&user_id_str)
            .map_err(|e| AppError::database(format!("invalid user id in task row: {e}")))?;

        let importance_str: String = row.get("importance");
        let importance: TaskImportance = importance_str
            .parse()
            .map_err(|_| AppError::database(format!("unknown importance in task row: {importance_str}")))?;

        let due_date = row
            .get::<Option<i64>, _>("due_date_ms")
            .and_then(|ms| Utc.timestamp_millis_opt(ms).single());

        Ok(Task {
            id,
            user_id,
            title: row.get("title"),
            description: row.get("description"),
            due_date,
            is_complete: row.get("is_complete"),
            importance,
            created_at: row.get("created_at"),
            updated_at: row.get("updated_at"),
        })
    }
}
