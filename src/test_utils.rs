// ABOUTME: Test doubles shared by unit and integration tests
// ABOUTME: A scripted reasoning engine that replays canned decisions deterministically
//
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Test utilities.
//!
//! [`ScriptedEngine`] stands in for the reasoning engine: tests enqueue
//! the decisions it should return, and it replays them in order while
//! counting calls, so the single-consult-per-turn property is assertable.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;

use crate::errors::{AppError, AppResult};
use crate::llm::{ChatMessage, EngineDecision, FunctionCall, FunctionDeclaration, ReasoningEngine};

enum ScriptedResponse {
    Decision(EngineDecision),
    Delayed(Duration, EngineDecision),
    Unavailable(String),
    Hang,
}

/// Reasoning engine double replaying enqueued decisions
#[derive(Default)]
pub struct ScriptedEngine {
    responses: Mutex<VecDeque<ScriptedResponse>>,
    calls: AtomicUsize,
}

impl ScriptedEngine {
    /// Create an engine with an empty script
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Enqueue a plain text reply
    pub fn push_text(&self, text: impl Into<String>) {
        self.push(ScriptedResponse::Decision(EngineDecision::Text(text.into())));
    }

    /// Enqueue a tool call
    pub fn push_tool_call(&self, name: impl Into<String>, args: Value) {
        self.push(ScriptedResponse::Decision(EngineDecision::ToolCall(
            FunctionCall {
                name: name.into(),
                args,
            },
        )));
    }

    /// Enqueue a text reply that arrives after `delay`
    pub fn push_delayed_text(&self, delay: Duration, text: impl Into<String>) {
        self.push(ScriptedResponse::Delayed(
            delay,
            EngineDecision::Text(text.into()),
        ));
    }

    /// Enqueue a tool call that arrives after `delay`
    pub fn push_delayed_tool_call(&self, delay: Duration, name: impl Into<String>, args: Value) {
        self.push(ScriptedResponse::Delayed(
            delay,
            EngineDecision::ToolCall(FunctionCall {
                name: name.into(),
                args,
            }),
        ));
    }

    /// Enqueue a recoverable engine failure
    pub fn push_unavailable(&self, message: impl Into<String>) {
        self.push(ScriptedResponse::Unavailable(message.into()));
    }

    /// Enqueue a response that never arrives, for timeout tests
    pub fn push_hang(&self) {
        self.push(ScriptedResponse::Hang);
    }

    /// How many times the engine has been consulted
    #[must_use]
    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    fn push(&self, response: ScriptedResponse) {
        if let Ok(mut responses) = self.responses.lock() {
            responses.push_back(response);
        }
    }
}

#[async_trait]
impl ReasoningEngine for ScriptedEngine {
    async fn decide(
        &self,
        _system_prompt: &str,
        _history: &[ChatMessage],
        _tools: &[FunctionDeclaration],
    ) -> AppResult<EngineDecision> {
        self.calls.fetch_add(1, Ordering::SeqCst);

        let next = self
            .responses
            .lock()
            .ok()
            .and_then(|mut responses| responses.pop_front());

        match next {
            Some(ScriptedResponse::Decision(decision)) => Ok(decision),
            Some(ScriptedResponse::Delayed(delay, decision)) => {
                tokio::time::sleep(delay).await;
                Ok(decision)
            }
            Some(ScriptedResponse::Unavailable(message)) => {
                Err(AppError::reasoning_unavailable(message))
            }
            Some(ScriptedResponse::Hang) => {
                Ok(futures_util::future::pending::<EngineDecision>().await)
            }
            None => Err(AppError::reasoning_unavailable(
                "ScriptedEngine has no response enqueued",
            )),
        }
    }

    fn name(&self) -> &'static str {
        "scripted"
    }
}
