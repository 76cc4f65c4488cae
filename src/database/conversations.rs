// ABOUTME: Conversation store for sessions, messages and tool-invocation audit records
// ABOUTME: All queries are user- or session-scoped; turn persistence is transactional
//
// SPDX-License-Identifier: MIT OR Apache-2.0

//! # Conversation Store
//!
//! [`ConversationStore`] is the only component that touches the
//! `chat_sessions`, `chat_messages` and `tool_invocations` tables. Message
//! sequence numbers are assigned inside a transaction, so a session's
//! history is totally ordered even under concurrent writers. A completed
//! turn (assistant message plus optional invocation record) is committed
//! atomically via [`ConversationStore::append_turn`].

use crate::errors::{AppError, AppResult};
use crate::models::{InvocationStatus, Message, MessageRole, Session, ToolInvocation};
use chrono::{DateTime, Utc};
use sqlx::{Row, SqlitePool};
use uuid::Uuid;

/// Maximum characters of the first message used as a derived session title
const DERIVED_TITLE_CHARS: usize = 50;

/// A session together with its visible message count, for listings
#[derive(Debug, Clone, serde::Serialize)]
pub struct SessionSummary {
    /// The session row
    #[serde(flatten)]
    pub session: Session,
    /// Number of non-archived messages
    pub message_count: i64,
}

/// A tool invocation ready to be written alongside its assistant message.
///
/// The message id is assigned by the store when the turn is committed.
#[derive(Debug, Clone)]
pub struct InvocationDraft {
    /// Operation name as dispatched
    pub tool_name: String,
    /// Argument snapshot
    pub arguments: serde_json::Value,
    /// Result payload on success
    pub result: Option<serde_json::Value>,
    /// Error text on failure
    pub error: Option<String>,
    /// Outcome classification
    pub status: InvocationStatus,
}

/// Data access for conversations
#[derive(Clone)]
pub struct ConversationStore {
    pool: SqlitePool,
}

impl ConversationStore {
    /// Create a store over the shared pool
    #[must_use]
    pub const fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Create a new session owned by `user_id`
    ///
    /// # Errors
    ///
    /// Returns a database error if the insert fails.
    pub async fn create_session(&self, user_id: Uuid, title: Option<&str>) -> AppResult<Session> {
        let session = Session {
            id: Uuid::new_v4(),
            user_id,
            title: title.unwrap_or("New conversation").to_owned(),
            is_active: true,
            created_at: Utc::now(),
            last_active_at: Utc::now(),
        };

        sqlx::query(
            "INSERT INTO chat_sessions (id, user_id, title, is_active, created_at, last_active_at)
             VALUES (?, ?, ?, ?, ?, ?)",
        )
        .bind(session.id.to_string())
        .bind(session.user_id.to_string())
        .bind(&session.title)
        .bind(i32::from(session.is_active))
        .bind(session.created_at.to_rfc3339())
        .bind(session.last_active_at.to_rfc3339())
        .execute(&self.pool)
        .await?;

        Ok(session)
    }

    /// Fetch a session, scoped to its owner.
    ///
    /// Returns `Ok(None)` both when the session does not exist and when it
    /// belongs to another user, so callers cannot distinguish the two.
    ///
    /// # Errors
    ///
    /// Returns a database error if the query fails.
    pub async fn get_session(&self, session_id: Uuid, user_id: Uuid) -> AppResult<Option<Session>> {
        let row = sqlx::query(
            "SELECT id, user_id, title, is_active, created_at, last_active_at
             FROM chat_sessions WHERE id = ? AND user_id = ?",
        )
        .bind(session_id.to_string())
        .bind(user_id.to_string())
        .fetch_optional(&self.pool)
        .await?;

        row.map(|r| session_from_row(&r)).transpose()
    }

    /// List a user's sessions, most recently active first
    ///
    /// # Errors
    ///
    /// Returns a database error if the query fails.
    pub async fn list_sessions(&self, user_id: Uuid) -> AppResult<Vec<SessionSummary>> {
        let rows = sqlx::query(
            "SELECT s.id, s.user_id, s.title, s.is_active, s.created_at, s.last_active_at,
                    (SELECT COUNT(*) FROM chat_messages m
                     WHERE m.session_id = s.id AND m.archived = 0) AS message_count
             FROM chat_sessions s
             WHERE s.user_id = ?
             ORDER BY s.last_active_at DESC",
        )
        .bind(user_id.to_string())
        .fetch_all(&self.pool)
        .await?;

        rows.iter()
            .map(|r| {
                Ok(SessionSummary {
                    session: session_from_row(r)?,
                    message_count: r.get("message_count"),
                })
            })
            .collect()
    }

    /// Mark a session inactive. Returns `false` if the caller does not own
    /// an active session with this id.
    ///
    /// # Errors
    ///
    /// Returns a database error if the update fails.
    pub async fn deactivate_session(&self, session_id: Uuid, user_id: Uuid) -> AppResult<bool> {
        let result = sqlx::query(
            "UPDATE chat_sessions SET is_active = 0 WHERE id = ? AND user_id = ? AND is_active = 1",
        )
        .bind(session_id.to_string())
        .bind(user_id.to_string())
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Append a single message, assigning the next sequence number.
    ///
    /// Also bumps the session's `last_active_at` and, for the first message
    /// of a session, derives a title from the content.
    ///
    /// # Errors
    ///
    /// Returns a database error if the transaction fails.
    pub async fn append_message(
        &self,
        session_id: Uuid,
        role: MessageRole,
        content: &str,
    ) -> AppResult<Message> {
        let mut tx = self.pool.begin().await?;
        let message = insert_message(&mut tx, session_id, role, content).await?;
        touch_session(&mut tx, session_id, &message).await?;
        tx.commit().await?;
        Ok(message)
    }

    /// Commit a completed turn: the assistant message and, when a task
    /// operation ran, its invocation record, in one transaction. Either
    /// both rows land or neither does.
    ///
    /// # Errors
    ///
    /// Returns a database error if the transaction fails.
    pub async fn append_turn(
        &self,
        session_id: Uuid,
        assistant_content: &str,
        invocation: Option<&InvocationDraft>,
    ) -> AppResult<(Message, Option<ToolInvocation>)> {
        let mut tx = self.pool.begin().await?;

        let message =
            insert_message(&mut tx, session_id, MessageRole::Assistant, assistant_content).await?;

        let record = if let Some(draft) = invocation {
            let record = ToolInvocation {
                id: Uuid::new_v4(),
                message_id: message.id,
                session_id,
                tool_name: draft.tool_name.clone(),
                arguments: draft.arguments.clone(),
                result: draft.result.clone(),
                error: draft.error.clone(),
                status: draft.status,
                created_at: Utc::now(),
            };

            sqlx::query(
                "INSERT INTO tool_invocations
                 (id, message_id, session_id, tool_name, arguments, result, error, status, created_at)
                 VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)",
            )
            .bind(record.id.to_string())
            .bind(record.message_id.to_string())
            .bind(record.session_id.to_string())
            .bind(&record.tool_name)
            .bind(record.arguments.to_string())
            .bind(record.result.as_ref().map(ToString::to_string))
            .bind(record.error.as_deref())
            .bind(record.status.as_str())
            .bind(record.created_at.to_rfc3339())
            .execute(&mut *tx)
            .await?;

            Some(record)
        } else {
            None
        };

        touch_session(&mut tx, session_id, &message).await?;
        tx.commit().await?;

        Ok((message, record))
    }

    /// Load the most recent non-archived messages, oldest first
    ///
    /// # Errors
    ///
    /// Returns a database error if the query fails.
    pub async fn load_recent(&self, session_id: Uuid, limit: i64) -> AppResult<Vec<Message>> {
        let rows = sqlx::query(
            "SELECT id, session_id, role, content, seq, created_at
             FROM chat_messages
             WHERE session_id = ? AND archived = 0
             ORDER BY seq DESC LIMIT ?",
        )
        .bind(session_id.to_string())
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        let mut messages: Vec<Message> = rows
            .iter()
            .map(message_from_row)
            .collect::<AppResult<_>>()?;
        messages.reverse();
        Ok(messages)
    }

    /// Load all non-archived messages of a session, oldest first
    ///
    /// # Errors
    ///
    /// Returns a database error if the query fails.
    pub async fn list_messages(&self, session_id: Uuid) -> AppResult<Vec<Message>> {
        let rows = sqlx::query(
            "SELECT id, session_id, role, content, seq, created_at
             FROM chat_messages
             WHERE session_id = ? AND archived = 0
             ORDER BY seq ASC",
        )
        .bind(session_id.to_string())
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(message_from_row).collect()
    }

    /// Archive messages beyond the newest `cap`, returning how many were
    /// archived. Archived messages stay in storage but are excluded from
    /// history reconstruction and listings.
    ///
    /// # Errors
    ///
    /// Returns a database error if the update fails.
    pub async fn archive_overflow(&self, session_id: Uuid, cap: i64) -> AppResult<u64> {
        let result = sqlx::query(
            "UPDATE chat_messages SET archived = 1
             WHERE session_id = ? AND archived = 0
               AND seq <= (SELECT COALESCE(MAX(seq), 0) FROM chat_messages
                           WHERE session_id = ?) - ?",
        )
        .bind(session_id.to_string())
        .bind(session_id.to_string())
        .bind(cap)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected())
    }

    /// Invocation audit trail for a session, oldest first
    ///
    /// # Errors
    ///
    /// Returns a database error if the query fails.
    pub async fn list_invocations(&self, session_id: Uuid) -> AppResult<Vec<ToolInvocation>> {
        let rows = sqlx::query(
            "SELECT id, message_id, session_id, tool_name, arguments, result, error, status, created_at
             FROM tool_invocations
             WHERE session_id = ?
             ORDER BY created_at ASC",
        )
        .bind(session_id.to_string())
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(invocation_from_row).collect()
    }
}

async fn insert_message(
    tx: &mut sqlx::Transaction<'_, sqlx::Sqlite>,
    session_id: Uuid,
    role: MessageRole,
    content: &str,
) -> AppResult<Message> {
    let next_seq: i64 = sqlx::query(
        "SELECT COALESCE(MAX(seq), 0) + 1 AS next_seq FROM chat_messages WHERE session_id = ?",
    )
    .bind(session_id.to_string())
    .fetch_one(&mut **tx)
    .await?
    .get("next_seq");

    let message = Message {
        id: Uuid::new_v4(),
        session_id,
        role,
        content: content.to_owned(),
        seq: next_seq,
        created_at: Utc::now(),
    };

    sqlx::query(
        "INSERT INTO chat_messages (id, session_id, role, content, seq, archived, created_at)
         VALUES (?, ?, ?, ?, ?, 0, ?)",
    )
    .bind(message.id.to_string())
    .bind(message.session_id.to_string())
    .bind(message.role.as_str())
    .bind(&message.content)
    .bind(message.seq)
    .bind(message.created_at.to_rfc3339())
    .execute(&mut **tx)
    .await?;

    Ok(message)
}

async fn touch_session(
    tx: &mut sqlx::Transaction<'_, sqlx::Sqlite>,
    session_id: Uuid,
    message: &Message,
) -> AppResult<()> {
    sqlx::query("UPDATE chat_sessions SET last_active_at = ? WHERE id = ?")
        .bind(Utc::now().to_rfc3339())
        .bind(session_id.to_string())
        .execute(&mut **tx)
        .await?;

    // The first user message names the session.
    if message.seq == 1 && message.role == MessageRole::User {
        let title: String = message.content.chars().take(DERIVED_TITLE_CHARS).collect();
        sqlx::query("UPDATE chat_sessions SET title = ? WHERE id = ? AND title = 'New conversation'")
            .bind(title)
            .bind(session_id.to_string())
            .execute(&mut **tx)
            .await?;
    }

    Ok(())
}

fn session_from_row(row: &sqlx::sqlite::SqliteRow) -> AppResult<Session> {
    Ok(Session {
        id: parse_uuid(&row.get::<String, _>("id"))?,
        user_id: parse_uuid(&row.get::<String, _>("user_id"))?,
        title: row.get("title"),
        is_active: row.get::<i32, _>("is_active") != 0,
        created_at: parse_timestamp(&row.get::<String, _>("created_at"))?,
        last_active_at: parse_timestamp(&row.get::<String, _>("last_active_at"))?,
    })
}

fn message_from_row(row: &sqlx::sqlite::SqliteRow) -> AppResult<Message> {
    let role_raw: String = row.get("role");
    let role = MessageRole::parse(&role_raw)
        .ok_or_else(|| AppError::database(format!("Unknown message role: {role_raw}")))?;

    Ok(Message {
        id: parse_uuid(&row.get::<String, _>("id"))?,
        session_id: parse_uuid(&row.get::<String, _>("session_id"))?,
        role,
        content: row.get("content"),
        seq: row.get("seq"),
        created_at: parse_timestamp(&row.get::<String, _>("created_at"))?,
    })
}

fn invocation_from_row(row: &sqlx::sqlite::SqliteRow) -> AppResult<ToolInvocation> {
    let status_raw: String = row.get("status");
    let status = match status_raw.as_str() {
        "succeeded" => InvocationStatus::Succeeded,
        "failed" => InvocationStatus::Failed,
        other => {
            return Err(AppError::database(format!(
                "Unknown invocation status: {other}"
            )))
        }
    };

    let arguments_raw: String = row.get("arguments");
    let arguments = serde_json::from_str(&arguments_raw)
        .map_err(|e| AppError::database(format!("Corrupt invocation arguments: {e}")))?;

    let result = row
        .get::<Option<String>, _>("result")
        .map(|raw| {
            serde_json::from_str(&raw)
                .map_err(|e| AppError::database(format!("Corrupt invocation result: {e}")))
        })
        .transpose()?;

    Ok(ToolInvocation {
        id: parse_uuid(&row.get::<String, _>("id"))?,
        message_id: parse_uuid(&row.get::<String, _>("message_id"))?,
        session_id: parse_uuid(&row.get::<String, _>("session_id"))?,
        tool_name: row.get("tool_name"),
        arguments,
        result,
        error: row.get("error"),
        status,
        created_at: parse_timestamp(&row.get::<String, _>("created_at"))?,
    })
}

pub(crate) fn parse_uuid(raw: &str) -> AppResult<Uuid> {
    Uuid::parse_str(raw).map_err(|e| AppError::database(format!("Corrupt uuid in storage: {e}")))
}

pub(crate) fn parse_timestamp(raw: &str) -> AppResult<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| AppError::database(format!("Corrupt timestamp in storage: {e}")))
}
