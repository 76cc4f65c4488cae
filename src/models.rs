// ABOUTME: Core data structures for conversations, messages, tool invocations and tasks
// ABOUTME: Serde types mirrored one-to-one by the sqlite rows in the conversation store
//
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Data model shared across the conversation store, dispatcher and routes.
//!
//! A [`Session`] owns an ordered sequence of [`Message`]s; an assistant
//! message that executed a task operation owns exactly one
//! [`ToolInvocation`]. [`Task`] rows are owned by a user and reachable only
//! through the task operation gateway.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// One conversation thread, owned by exactly one user.
///
/// The owner is immutable after creation; sessions are deactivated or
/// pruned by retention, never hard-deleted by the turn path.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Session {
    /// Unique session ID
    pub id: Uuid,
    /// User who owns this session
    pub user_id: Uuid,
    /// Display title (derived from the first message unless set explicitly)
    pub title: String,
    /// Whether the session accepts new turns
    pub is_active: bool,
    /// Creation timestamp
    pub created_at: DateTime<Utc>,
    /// Updated on every turn
    pub last_active_at: DateTime<Utc>,
}

/// Role of a message author
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageRole {
    /// Message written by the end user
    User,
    /// Message produced by the dispatcher
    Assistant,
}

impl MessageRole {
    /// Stable string form used in storage
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::User => "user",
            Self::Assistant => "assistant",
        }
    }

    /// Parse the stored string form
    #[must_use]
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "user" => Some(Self::User),
            "assistant" => Some(Self::Assistant),
            _ => None,
        }
    }
}

/// One turn's unit of content, immutable once written
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    /// Unique message ID
    pub id: Uuid,
    /// Session this message belongs to
    pub session_id: Uuid,
    /// Author role
    pub role: MessageRole,
    /// Message text
    pub content: String,
    /// Position within the session, strictly increasing
    pub seq: i64,
    /// Creation timestamp
    pub created_at: DateTime<Utc>,
}

/// Outcome classification of a tool invocation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InvocationStatus {
    /// The gateway call returned a result payload
    Succeeded,
    /// The gateway call returned a typed failure
    Failed,
}

impl InvocationStatus {
    /// Stable string form used in storage
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Succeeded => "succeeded",
            Self::Failed => "failed",
        }
    }
}

/// Audit record of one call into the task operation gateway.
///
/// At most one exists per assistant message (single operation per turn).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolInvocation {
    /// Unique invocation ID
    pub id: Uuid,
    /// Assistant message this invocation belongs to
    pub message_id: Uuid,
    /// Session, denormalized for per-session audit queries
    pub session_id: Uuid,
    /// One of the six fixed operation names
    pub tool_name: String,
    /// Argument snapshot as validated before the call
    pub arguments: serde_json::Value,
    /// Result snapshot if the call succeeded
    pub result: Option<serde_json::Value>,
    /// Error text if the call failed
    pub error: Option<String>,
    /// Outcome classification
    pub status: InvocationStatus,
    /// Creation timestamp
    pub created_at: DateTime<Utc>,
}

/// A todo task, referenced by the conversational core but owned by the
/// gateway's store.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Task {
    /// Unique task ID
    pub id: Uuid,
    /// Owning user
    pub user_id: Uuid,
    /// Task title
    pub title: String,
    /// Free-form description, empty when unset
    pub description: String,
    /// Completion flag
    pub completed: bool,
    /// Creation timestamp
    pub created_at: DateTime<Utc>,
    /// Last mutation timestamp
    pub updated_at: DateTime<Utc>,
}

/// Completion filter accepted by the list operation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskFilter {
    /// All tasks regardless of completion
    #[default]
    All,
    /// Completed tasks only
    Completed,
    /// Incomplete tasks only
    Pending,
}

impl TaskFilter {
    /// Parse the wire form, rejecting anything outside the closed set
    #[must_use]
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "all" => Some(Self::All),
            "completed" => Some(Self::Completed),
            "pending" => Some(Self::Pending),
            _ => None,
        }
    }
}
