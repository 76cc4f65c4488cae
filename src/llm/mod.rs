// ABOUTME: Reasoning engine abstraction consulted exactly once per conversation turn
// ABOUTME: Defines the provider trait, wire-neutral chat types and the closed decision enum
//
// SPDX-License-Identifier: MIT OR Apache-2.0

//! # Reasoning Engine
//!
//! The dispatcher talks to an external reasoning service through the
//! [`ReasoningEngine`] trait: one call per turn, carrying the reconstructed
//! history, the new message and the fixed operation catalog. The engine
//! answers with an [`EngineDecision`] — either final text or a single
//! requested operation. Nothing the engine returns is trusted; the
//! dispatcher re-validates before any side effect.
//!
//! [`gemini::GeminiEngine`] is the production implementation.

/// Google Gemini implementation of the reasoning engine
pub mod gemini;
/// System prompt assembly for the todo assistant persona
pub mod prompts;

use crate::errors::AppResult;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Author of a chat message as seen by the reasoning engine
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChatRole {
    /// The end user
    User,
    /// The assistant (the engine's own prior replies)
    Assistant,
}

/// One history entry handed to the engine
#[derive(Debug, Clone)]
pub struct ChatMessage {
    /// Author role
    pub role: ChatRole,
    /// Message text
    pub content: String,
}

/// Schema of one operation the engine may request
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FunctionDeclaration {
    /// Operation name, one of the six fixed names
    pub name: String,
    /// What the operation does, phrased for the engine
    pub description: String,
    /// JSON schema of the accepted arguments
    pub parameters: Value,
}

/// An operation requested by the engine, unvalidated
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FunctionCall {
    /// Requested operation name
    pub name: String,
    /// Raw arguments as produced by the engine
    #[serde(default)]
    pub args: Value,
}

/// The engine's answer for one turn
#[derive(Debug, Clone)]
pub enum EngineDecision {
    /// Reply with this text; no operation requested
    Text(String),
    /// Execute (at most) this one operation
    ToolCall(FunctionCall),
}

/// A reasoning service consulted once per turn.
///
/// Implementations must not retain history between calls; the full context
/// arrives with every request.
#[async_trait]
pub trait ReasoningEngine: Send + Sync {
    /// Produce a decision for the new message given the prior history and
    /// the operation catalog.
    ///
    /// # Errors
    ///
    /// Returns a reasoning-unavailable error when the service is
    /// unreachable, times out, or produces an unusable response.
    async fn decide(
        &self,
        system_prompt: &str,
        history: &[ChatMessage],
        tools: &[FunctionDeclaration],
    ) -> AppResult<EngineDecision>;

    /// Provider name for logging
    fn name(&self) -> &'static str;
}
