// ABOUTME: Request-scoped turn orchestrator coordinating rate limits, history, dispatch and persistence
// ABOUTME: Owns the ordering guarantees: user message survives engine failures, turn commit is atomic
//
// SPDX-License-Identifier: MIT OR Apache-2.0

//! # Turn Orchestrator
//!
//! One [`TurnOrchestrator::handle_turn`] call is one conversation turn.
//! The steps run in a fixed order:
//!
//! 1. validate the message (non-empty, length cap)
//! 2. charge the rate limiter — a denied turn touches nothing else
//! 3. resolve or create the session, scoped to the caller
//! 4. reconstruct the recent history from storage
//! 5. persist the user message — from here on it is never lost
//! 6. dispatch (the dispatcher time-boxes the engine consult; gateway
//!    work started after a decision always runs to completion)
//! 7. commit the assistant message and any invocation atomically
//! 8. archive messages beyond the retention cap
//!
//! A recoverable dispatch failure (engine timeout or outage) leaves the
//! user's message in place and surfaces a retryable error with a fixed
//! safe message — upstream provider detail stays in the logs, never in
//! the response — and no reply or tool result is fabricated. Once a
//! gateway mutation has returned success it is never re-attempted by this
//! layer; idempotent gateway operations make client retries safe.

use std::sync::Arc;

use tracing::{info, instrument, warn};
use uuid::Uuid;

use crate::config::ServerConfig;
use crate::database::ConversationStore;
use crate::dispatcher::IntentDispatcher;
use crate::errors::{AppError, AppResult, ErrorCode};
use crate::models::{Message, MessageRole, Session, ToolInvocation};
use crate::rate_limiting::TurnRateLimiter;

/// What a caller sees when the reasoning engine fails or times out
const ENGINE_UNAVAILABLE_REPLY: &str =
    "The assistant is temporarily unavailable. Your message was saved; please try again.";

/// The completed turn as returned to the HTTP layer
#[derive(Debug)]
pub struct TurnResult {
    /// Session the turn belongs to (created on demand)
    pub session: Session,
    /// The persisted assistant reply
    pub assistant_message: Message,
    /// Audit record of the turn's gateway call, if one ran
    pub invocation: Option<ToolInvocation>,
    /// Turns left in the caller's current window
    pub rate_remaining: u32,
}

/// Coordinates one conversation turn end to end
pub struct TurnOrchestrator {
    store: ConversationStore,
    dispatcher: IntentDispatcher,
    rate_limiter: Arc<TurnRateLimiter>,
    max_message_chars: usize,
    history_window: i64,
    message_retention_cap: i64,
}

impl TurnOrchestrator {
    /// Assemble the orchestrator from its collaborators
    #[must_use]
    pub fn new(
        store: ConversationStore,
        dispatcher: IntentDispatcher,
        rate_limiter: Arc<TurnRateLimiter>,
        config: &ServerConfig,
    ) -> Self {
        Self {
            store,
            dispatcher,
            rate_limiter,
            max_message_chars: config.max_message_chars,
            history_window: config.history_window,
            message_retention_cap: config.message_retention_cap,
        }
    }

    /// Run one turn for an authenticated caller.
    ///
    /// With no `session_id` a fresh session is created; with one, it must
    /// belong to the caller and still be active.
    ///
    /// # Errors
    ///
    /// Returns invalid-input for a bad message, rate-limited when the
    /// quota is spent, not-found for a foreign or missing session, and
    /// reasoning-unavailable when the engine fails (the user message is
    /// already persisted in that case).
    #[instrument(skip(self, message), fields(user_id = %user_id))]
    pub async fn handle_turn(
        &self,
        user_id: Uuid,
        session_id: Option<Uuid>,
        message: &str,
    ) -> AppResult<TurnResult> {
        let message = message.trim();
        if message.is_empty() {
            return Err(AppError::invalid_input("Message must not be empty"));
        }
        if message.chars().count() > self.max_message_chars {
            return Err(AppError::invalid_input(format!(
                "Message exceeds the {} character limit",
                self.max_message_chars
            )));
        }

        let decision = self.rate_limiter.check_and_record(user_id);
        if !decision.allowed {
            warn!(limit = decision.limit, "turn denied by rate limiter");
            return Err(AppError::rate_limited(
                decision.limit,
                decision.retry_after_secs,
            ));
        }

        let session = match session_id {
            Some(id) => {
                let session = self
                    .store
                    .get_session(id, user_id)
                    .await?
                    .ok_or_else(|| AppError::not_found("Session"))?;
                if !session.is_active {
                    return Err(AppError::invalid_input("Session is closed"));
                }
                session
            }
            None => self.store.create_session(user_id, None).await?,
        };

        // History is reconstructed before the new message lands so the
        // dispatcher sees exactly the prior turns.
        let history = self.store.load_recent(session.id, self.history_window).await?;

        self.store
            .append_message(session.id, MessageRole::User, message)
            .await?;

        let outcome = match self.dispatcher.dispatch(user_id, &history, message).await {
            Ok(outcome) => outcome,
            Err(err) if err.code == ErrorCode::ReasoningUnavailable => {
                // Upstream provider detail goes to the logs only.
                warn!(session_id = %session.id, error = %err, "reasoning engine unavailable");
                return Err(AppError::reasoning_unavailable(ENGINE_UNAVAILABLE_REPLY));
            }
            Err(err) => return Err(err),
        };

        let (assistant_message, invocation) = self
            .store
            .append_turn(session.id, &outcome.reply, outcome.invocation.as_ref())
            .await?;

        let archived = self
            .store
            .archive_overflow(session.id, self.message_retention_cap)
            .await?;
        if archived > 0 {
            info!(session_id = %session.id, archived, "archived overflow messages");
        }

        info!(
            session_id = %session.id,
            operation = invocation.as_ref().map_or("none", |i| i.tool_name.as_str()),
            "turn completed"
        );

        Ok(TurnResult {
            session,
            assistant_message,
            invocation,
            rate_remaining: decision.remaining,
        })
    }
}
