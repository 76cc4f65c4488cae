// ABOUTME: Shared helpers for integration tests
// ABOUTME: Builds an in-memory server around the scripted reasoning engine
//
// SPDX-License-Identifier: MIT OR Apache-2.0

#![allow(dead_code, clippy::unwrap_used)]

use std::sync::Arc;

use taskchat::config::ServerConfig;
use taskchat::context::ServerResources;
use taskchat::database::Database;
use taskchat::test_utils::ScriptedEngine;
use uuid::Uuid;

/// Everything an integration test needs: the wired resources plus a handle
/// on the scripted engine for enqueueing decisions.
pub struct TestHarness {
    pub resources: Arc<ServerResources>,
    pub engine: Arc<ScriptedEngine>,
    pub database: Database,
}

/// Build a harness over an in-memory database with default test config
pub async fn harness() -> TestHarness {
    harness_with(ServerConfig::for_testing()).await
}

/// Build a harness with custom configuration
pub async fn harness_with(config: ServerConfig) -> TestHarness {
    let database = Database::connect(&config.database_url).await.unwrap();
    database.migrate().await.unwrap();

    let engine = Arc::new(ScriptedEngine::new());
    let resources = Arc::new(ServerResources::new(&database, engine.clone(), config));

    TestHarness {
        resources,
        engine,
        database,
    }
}

/// Mint a bearer header value for a user
pub fn bearer(resources: &ServerResources, user_id: Uuid) -> String {
    let token = resources.auth.generate_token(user_id).unwrap();
    format!("Bearer {token}")
}
