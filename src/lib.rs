// ABOUTME: Main library entry point for the TaskChat conversational todo server
// ABOUTME: Wires the turn orchestrator, intent dispatcher, task gateway and conversation store
//
// SPDX-License-Identifier: MIT OR Apache-2.0

#![deny(unsafe_code)]

//! # TaskChat
//!
//! A conversational todo-management server. Users talk to an assistant in
//! plain language; the server turns each message into at most one of six
//! fixed task operations (create, list, get, update, delete,
//! set-completion), executes it against the caller's own tasks, and
//! replies conversationally. Every turn is durable and auditable.
//!
//! ## Architecture
//!
//! The turn path is a straight line through four components:
//!
//! - **Turn Orchestrator** — authenticated, rate-limited coordination of
//!   one turn: load history, persist the message, dispatch, commit.
//! - **Intent Dispatcher** — one reasoning-engine consult per turn; the
//!   engine's output is re-validated against a closed operation catalog
//!   before anything executes.
//! - **Task Operation Gateway** — the six operations, each scoped to the
//!   calling user in the SQL itself.
//! - **Conversation Store** — sessions, ordered messages and
//!   tool-invocation audit records in sqlite; a completed turn commits
//!   atomically.
//!
//! The server is stateless between turns: each request reconstructs its
//! context from storage, so any instance can serve any turn.
//!
//! ## Example
//!
//! ```rust,no_run
//! use taskchat::config::ServerConfig;
//! use taskchat::errors::AppResult;
//!
//! #[tokio::main]
//! async fn main() -> AppResult<()> {
//!     let config = ServerConfig::from_env()?;
//!     println!("TaskChat configured for port {}", config.http_port);
//!     Ok(())
//! }
//! ```

/// Bearer-token authentication
pub mod auth;
/// Environment-based configuration
pub mod config;
/// Shared server resources
pub mod context;
/// Sqlite persistence: sessions, messages, invocations, tasks
pub mod database;
/// Intent dispatch and reply derivation
pub mod dispatcher;
/// Unified error taxonomy
pub mod errors;
/// The six ownership-enforcing task operations
pub mod gateway;
/// Reasoning engine trait and providers
pub mod llm;
/// Structured logging setup
pub mod logging;
/// Core data model
pub mod models;
/// Turn coordination
pub mod orchestrator;
/// Per-user turn quotas
pub mod rate_limiting;
/// HTTP surface
pub mod routes;
/// Test doubles
pub mod test_utils;
/// Operation catalog and validation
pub mod tools;
