// ABOUTME: Task operation gateway exposing the six fixed, ownership-enforcing task operations
// ABOUTME: Every statement is scoped to the calling user; the gateway knows nothing of conversations
//
// SPDX-License-Identifier: MIT OR Apache-2.0

//! # Task Operation Gateway
//!
//! [`TaskGateway`] is the only path to the `tasks` table. It offers exactly
//! six operations, each stateless and scoped to the calling user id in the
//! SQL itself, so a task belonging to another user behaves as if it did not
//! exist. The dispatcher validates arguments before calling in; the gateway
//! still rejects out-of-range values as defense in depth.
//!
//! All mutations are idempotent from the caller's perspective where the
//! operation allows it: setting completion to the current value succeeds
//! without a spurious write conflict.
//!
//! Store-level failures surface as gateway errors, distinct from the
//! conversation store's database errors, so a failed task operation can be
//! recorded on the turn instead of aborting it.

use crate::database::conversations::{parse_timestamp, parse_uuid};
use crate::errors::{AppError, AppResult};
use crate::models::{Task, TaskFilter};
use chrono::Utc;
use sqlx::{Row, SqlitePool};
use uuid::Uuid;

/// Hard ceiling on one page of a task listing
const MAX_LIST_LIMIT: i64 = 100;
/// Default page size when the caller does not ask for one
const DEFAULT_LIST_LIMIT: i64 = 50;

/// Ownership-enforcing access to the task store
#[derive(Clone)]
pub struct TaskGateway {
    pool: SqlitePool,
}

impl TaskGateway {
    /// Create a gateway over the shared pool
    #[must_use]
    pub const fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Create a task owned by `user_id`
    ///
    /// # Errors
    ///
    /// Returns an invalid-input error for an empty title, or a database
    /// error if the insert fails.
    pub async fn create_task(
        &self,
        user_id: Uuid,
        title: &str,
        description: Option<&str>,
    ) -> AppResult<Task> {
        let title = title.trim();
        if title.is_empty() {
            return Err(AppError::invalid_input("Task title must not be empty"));
        }

        let now = Utc::now();
        let task = Task {
            id: Uuid::new_v4(),
            user_id,
            title: title.to_owned(),
            description: description.unwrap_or_default().trim().to_owned(),
            completed: false,
            created_at: now,
            updated_at: now,
        };

        sqlx::query(
            "INSERT INTO tasks (id, user_id, title, description, completed, created_at, updated_at)
             VALUES (?, ?, ?, ?, 0, ?, ?)",
        )
        .bind(task.id.to_string())
        .bind(task.user_id.to_string())
        .bind(&task.title)
        .bind(&task.description)
        .bind(task.created_at.to_rfc3339())
        .bind(task.updated_at.to_rfc3339())
        .execute(&self.pool)
        .await
        .map_err(store_error)?;

        Ok(task)
    }

    /// List the user's tasks, newest first, optionally filtered by
    /// completion state
    ///
    /// # Errors
    ///
    /// Returns a database error if the query fails.
    pub async fn list_tasks(
        &self,
        user_id: Uuid,
        filter: TaskFilter,
        limit: Option<i64>,
        offset: Option<i64>,
    ) -> AppResult<Vec<Task>> {
        let limit = limit
            .unwrap_or(DEFAULT_LIST_LIMIT)
            .clamp(1, MAX_LIST_LIMIT);
        let offset = offset.unwrap_or(0).max(0);

        let completed_clause = match filter {
            TaskFilter::All => "",
            TaskFilter::Completed => "AND completed = 1",
            TaskFilter::Pending => "AND completed = 0",
        };

        let query = format!(
            "SELECT id, user_id, title, description, completed, created_at, updated_at
             FROM tasks WHERE user_id = ? {completed_clause}
             ORDER BY created_at DESC LIMIT ? OFFSET ?"
        );

        let rows = sqlx::query(&query)
            .bind(user_id.to_string())
            .bind(limit)
            .bind(offset)
            .fetch_all(&self.pool)
            .await
            .map_err(store_error)?;

        rows.iter().map(task_from_row).collect()
    }

    /// Fetch one task by id, scoped to its owner
    ///
    /// # Errors
    ///
    /// Returns not-found both for a missing task and for one owned by
    /// another user.
    pub async fn get_task(&self, user_id: Uuid, task_id: Uuid) -> AppResult<Task> {
        let row = sqlx::query(
            "SELECT id, user_id, title, description, completed, created_at, updated_at
             FROM tasks WHERE id = ? AND user_id = ?",
        )
        .bind(task_id.to_string())
        .bind(user_id.to_string())
        .fetch_optional(&self.pool)
        .await
        .map_err(store_error)?;

        row.as_ref()
            .map(task_from_row)
            .transpose()?
            .ok_or_else(|| AppError::not_found("Task"))
    }

    /// Update a task's title and/or description
    ///
    /// # Errors
    ///
    /// Returns invalid-input when neither field is given, not-found when
    /// the task is missing or owned by another user.
    pub async fn update_task(
        &self,
        user_id: Uuid,
        task_id: Uuid,
        title: Option<&str>,
        description: Option<&str>,
    ) -> AppResult<Task> {
        if title.is_none() && description.is_none() {
            return Err(AppError::invalid_input(
                "Update requires a new title or description",
            ));
        }
        if let Some(t) = title {
            if t.trim().is_empty() {
                return Err(AppError::invalid_input("Task title must not be empty"));
            }
        }

        let current = self.get_task(user_id, task_id).await?;
        let new_title = title.map_or(current.title, |t| t.trim().to_owned());
        let new_description = description.map_or(current.description, |d| d.trim().to_owned());
        let now = Utc::now();

        sqlx::query(
            "UPDATE tasks SET title = ?, description = ?, updated_at = ?
             WHERE id = ? AND user_id = ?",
        )
        .bind(&new_title)
        .bind(&new_description)
        .bind(now.to_rfc3339())
        .bind(task_id.to_string())
        .bind(user_id.to_string())
        .execute(&self.pool)
        .await
        .map_err(store_error)?;

        Ok(Task {
            title: new_title,
            description: new_description,
            updated_at: now,
            ..current
        })
    }

    /// Delete a task permanently
    ///
    /// # Errors
    ///
    /// Returns not-found when the task is missing or owned by another
    /// user.
    pub async fn delete_task(&self, user_id: Uuid, task_id: Uuid) -> AppResult<Task> {
        let task = self.get_task(user_id, task_id).await?;

        let result = sqlx::query("DELETE FROM tasks WHERE id = ? AND user_id = ?")
            .bind(task_id.to_string())
            .bind(user_id.to_string())
            .execute(&self.pool)
            .await
            .map_err(store_error)?;

        if result.rows_affected() == 0 {
            return Err(AppError::not_found("Task"));
        }
        Ok(task)
    }

    /// Set a task's completion flag. Idempotent: setting the current value
    /// succeeds and refreshes `updated_at` only when the value changes.
    ///
    /// # Errors
    ///
    /// Returns not-found when the task is missing or owned by another
    /// user.
    pub async fn set_task_complete(
        &self,
        user_id: Uuid,
        task_id: Uuid,
        is_completed: bool,
    ) -> AppResult<Task> {
        let current = self.get_task(user_id, task_id).await?;
        if current.completed == is_completed {
            return Ok(current);
        }

        let now = Utc::now();
        sqlx::query(
            "UPDATE tasks SET completed = ?, updated_at = ? WHERE id = ? AND user_id = ?",
        )
        .bind(i32::from(is_completed))
        .bind(now.to_rfc3339())
        .bind(task_id.to_string())
        .bind(user_id.to_string())
        .execute(&self.pool)
        .await
        .map_err(store_error)?;

        Ok(Task {
            completed: is_completed,
            updated_at: now,
            ..current
        })
    }
}

fn store_error(error: sqlx::Error) -> AppError {
    AppError::gateway(format!("Task store failure: {error}")).with_source(error)
}

fn task_from_row(row: &sqlx::sqlite::SqliteRow) -> AppResult<Task> {
    Ok(Task {
        id: parse_uuid(&row.get::<String, _>("id"))?,
        user_id: parse_uuid(&row.get::<String, _>("user_id"))?,
        title: row.get("title"),
        description: row.get("description"),
        completed: row.get::<i32, _>("completed") != 0,
        created_at: parse_timestamp(&row.get::<String, _>("created_at"))?,
        updated_at: parse_timestamp(&row.get::<String, _>("updated_at"))?,
    })
}
