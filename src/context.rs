// ABOUTME: Shared server resources wired once at startup and cloned into request handlers
// ABOUTME: Single construction point for the store, gateway, dispatcher and orchestrator
//
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Dependency container for the HTTP layer.
//!
//! Everything request handlers need hangs off one [`ServerResources`]
//! behind an `Arc`, so handlers stay free of construction logic and tests
//! can assemble the same graph around a scripted engine.

use std::sync::Arc;
use std::time::Duration;

use crate::auth::AuthManager;
use crate::config::ServerConfig;
use crate::database::{ConversationStore, Database};
use crate::dispatcher::IntentDispatcher;
use crate::gateway::TaskGateway;
use crate::llm::ReasoningEngine;
use crate::orchestrator::TurnOrchestrator;
use crate::rate_limiting::TurnRateLimiter;

/// All long-lived server state
pub struct ServerResources {
    /// Conversation persistence
    pub store: ConversationStore,
    /// Task store access, ownership-enforcing
    pub gateway: TaskGateway,
    /// Bearer-token verification
    pub auth: AuthManager,
    /// Turn coordination
    pub orchestrator: TurnOrchestrator,
    /// Effective configuration
    pub config: ServerConfig,
}

impl ServerResources {
    /// Wire the full component graph over one database and engine
    #[must_use]
    pub fn new(database: &Database, engine: Arc<dyn ReasoningEngine>, config: ServerConfig) -> Self {
        let store = ConversationStore::new(database.pool().clone());
        let gateway = TaskGateway::new(database.pool().clone());
        let auth = AuthManager::new(&config.jwt_secret);
        let dispatcher = IntentDispatcher::new(
            engine,
            gateway.clone(),
            Duration::from_secs(config.reasoning_timeout_secs),
        );
        let rate_limiter = Arc::new(TurnRateLimiter::new(config.rate_limit_per_hour));
        let orchestrator =
            TurnOrchestrator::new(store.clone(), dispatcher, rate_limiter, &config);

        Self {
            store,
            gateway,
            auth,
            orchestrator,
            config,
        }
    }
}
