// ABOUTME: Chat API handlers: turns, session management and message history
// ABOUTME: Every handler authenticates the bearer token before touching any state
//
// SPDX-License-Identifier: MIT OR Apache-2.0

//! # Chat Routes
//!
//! Thin HTTP shims over the orchestrator and the conversation store. All
//! session lookups are scoped to the authenticated caller, so foreign
//! session ids come back as 404 rather than confirming their existence.

use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::{HeaderMap, StatusCode};
use axum::Json;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::context::ServerResources;
use crate::database::SessionSummary;
use crate::errors::{AppError, AppResult};
use crate::models::Message;

/// One conversation turn
#[derive(Debug, Deserialize)]
pub struct TurnRequest {
    /// Existing session to continue; omit to start a new one
    pub session_id: Option<Uuid>,
    /// The user's message
    pub message: String,
}

/// Reply to a completed turn
#[derive(Debug, Serialize)]
pub struct TurnResponse {
    /// Session the turn belongs to
    pub session_id: Uuid,
    /// Assistant reply text
    pub reply: String,
    /// Id of the persisted assistant message
    pub message_id: Uuid,
    /// Operation executed this turn, if any
    #[serde(skip_serializing_if = "Option::is_none")]
    pub operation: Option<String>,
    /// Turns left in the caller's current window
    pub rate_remaining: u32,
    /// When the reply was persisted
    pub created_at: DateTime<Utc>,
}

/// Explicit session creation
#[derive(Debug, Default, Deserialize)]
pub struct CreateSessionRequest {
    /// Optional display title
    pub title: Option<String>,
}

/// Session listing payload
#[derive(Debug, Serialize)]
pub struct SessionsResponse {
    /// The caller's sessions, most recently active first
    pub sessions: Vec<SessionSummary>,
}

/// Message history payload
#[derive(Debug, Serialize)]
pub struct MessagesResponse {
    /// Session the messages belong to
    pub session_id: Uuid,
    /// Non-archived messages, oldest first
    pub messages: Vec<Message>,
}

/// Handlers for the chat API
pub struct ChatRoutes;

impl ChatRoutes {
    /// `GET /health`
    pub async fn health() -> Json<serde_json::Value> {
        Json(serde_json::json!({
            "status": "ok",
            "service": env!("CARGO_PKG_NAME"),
            "version": env!("CARGO_PKG_VERSION"),
        }))
    }

    /// `POST /api/chat/turn`
    ///
    /// # Errors
    ///
    /// Auth, validation, rate-limit and engine failures surface as their
    /// respective error codes.
    pub async fn post_turn(
        State(resources): State<Arc<ServerResources>>,
        headers: HeaderMap,
        Json(request): Json<TurnRequest>,
    ) -> AppResult<Json<TurnResponse>> {
        let user_id = resources.auth.authenticate(&headers)?;

        // The turn runs on its own task: a client disconnect drops this
        // handler future, not the in-flight turn, so a started turn always
        // persists its outcome.
        let turn = tokio::spawn({
            let resources = resources.clone();
            async move {
                resources
                    .orchestrator
                    .handle_turn(user_id, request.session_id, &request.message)
                    .await
            }
        });
        let result = turn
            .await
            .map_err(|e| AppError::internal(format!("Turn task failed: {e}")))??;

        Ok(Json(TurnResponse {
            session_id: result.session.id,
            reply: result.assistant_message.content.clone(),
            message_id: result.assistant_message.id,
            operation: result.invocation.map(|i| i.tool_name),
            rate_remaining: result.rate_remaining,
            created_at: result.assistant_message.created_at,
        }))
    }

    /// `POST /api/chat/sessions`
    ///
    /// # Errors
    ///
    /// Returns auth errors or a database error.
    pub async fn create_session(
        State(resources): State<Arc<ServerResources>>,
        headers: HeaderMap,
        body: Option<Json<CreateSessionRequest>>,
    ) -> AppResult<(StatusCode, Json<crate::models::Session>)> {
        let user_id = resources.auth.authenticate(&headers)?;
        let title = body.as_ref().and_then(|b| b.title.as_deref());

        let session = resources.store.create_session(user_id, title).await?;
        Ok((StatusCode::CREATED, Json(session)))
    }

    /// `GET /api/chat/sessions`
    ///
    /// # Errors
    ///
    /// Returns auth errors or a database error.
    pub async fn list_sessions(
        State(resources): State<Arc<ServerResources>>,
        headers: HeaderMap,
    ) -> AppResult<Json<SessionsResponse>> {
        let user_id = resources.auth.authenticate(&headers)?;
        let sessions = resources.store.list_sessions(user_id).await?;
        Ok(Json(SessionsResponse { sessions }))
    }

    /// `GET /api/chat/sessions/:session_id/messages`
    ///
    /// # Errors
    ///
    /// Returns 404 for a missing or foreign session.
    pub async fn list_messages(
        State(resources): State<Arc<ServerResources>>,
        headers: HeaderMap,
        Path(session_id): Path<Uuid>,
    ) -> AppResult<Json<MessagesResponse>> {
        let user_id = resources.auth.authenticate(&headers)?;

        let session = resources
            .store
            .get_session(session_id, user_id)
            .await?
            .ok_or_else(|| AppError::not_found("Session"))?;

        let messages = resources.store.list_messages(session.id).await?;
        Ok(Json(MessagesResponse {
            session_id: session.id,
            messages,
        }))
    }

    /// `DELETE /api/chat/sessions/:session_id`
    ///
    /// Marks the session inactive; its history stays queryable.
    ///
    /// # Errors
    ///
    /// Returns 404 for a missing, foreign, or already-closed session.
    pub async fn delete_session(
        State(resources): State<Arc<ServerResources>>,
        headers: HeaderMap,
        Path(session_id): Path<Uuid>,
    ) -> AppResult<StatusCode> {
        let user_id = resources.auth.authenticate(&headers)?;

        if resources.store.deactivate_session(session_id, user_id).await? {
            Ok(StatusCode::NO_CONTENT)
        } else {
            Err(AppError::not_found("Session"))
        }
    }
}
