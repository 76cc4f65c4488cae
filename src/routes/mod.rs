// ABOUTME: HTTP route registration for the chat API
// ABOUTME: Maps URL paths onto the chat handlers with shared server resources
//
// SPDX-License-Identifier: MIT OR Apache-2.0

//! HTTP routing.

/// Chat session and turn endpoints
pub mod chat;

use std::sync::Arc;

use axum::routing::{delete, get, post};
use axum::Router;

use crate::context::ServerResources;
use chat::ChatRoutes;

/// Build the application router
#[must_use]
pub fn router(resources: Arc<ServerResources>) -> Router {
    Router::new()
        .route("/health", get(ChatRoutes::health))
        .route("/api/chat/turn", post(ChatRoutes::post_turn))
        .route(
            "/api/chat/sessions",
            post(ChatRoutes::create_session).get(ChatRoutes::list_sessions),
        )
        .route(
            "/api/chat/sessions/:session_id/messages",
            get(ChatRoutes::list_messages),
        )
        .route(
            "/api/chat/sessions/:session_id",
            delete(ChatRoutes::delete_session),
        )
        .with_state(resources)
}
