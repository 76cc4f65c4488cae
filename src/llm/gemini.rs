// ABOUTME: Google Gemini implementation of the reasoning engine trait
// ABOUTME: Non-streaming generateContent calls with function-calling enabled
//
// SPDX-License-Identifier: MIT OR Apache-2.0

//! # Gemini Engine
//!
//! Talks to the Generative AI API with the operation catalog attached as
//! tool declarations. Set `GEMINI_API_KEY` with a key from Google AI
//! Studio. Every transport or API failure maps to the recoverable
//! reasoning-unavailable error class so a turn can be retried by the
//! client without losing the user's message.

use std::env;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, error};

use super::{ChatMessage, ChatRole, EngineDecision, FunctionCall, FunctionDeclaration, ReasoningEngine};
use crate::errors::{AppError, AppResult};

/// Environment variable for the Gemini API key
const GEMINI_API_KEY_ENV: &str = "GEMINI_API_KEY";
/// Environment variable overriding the model
const GEMINI_MODEL_ENV: &str = "GEMINI_MODEL";
/// Default model
const DEFAULT_MODEL: &str = "gemini-2.5-flash";
/// Base URL for the Gemini API
const API_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";

#[derive(Debug, Serialize)]
struct GeminiRequest {
    contents: Vec<GeminiContent>,
    #[serde(skip_serializing_if = "Option::is_none")]
    system_instruction: Option<GeminiContent>,
    generation_config: GenerationConfig,
    #[serde(skip_serializing_if = "Option::is_none")]
    tools: Option<Vec<GeminiTool>>,
}

#[derive(Debug, Serialize, Deserialize)]
struct GeminiContent {
    #[serde(skip_serializing_if = "Option::is_none")]
    role: Option<String>,
    parts: Vec<ContentPart>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
enum ContentPart {
    Text {
        text: String,
    },
    FunctionCall {
        #[serde(rename = "functionCall")]
        function_call: FunctionCall,
    },
}

#[derive(Debug, Serialize)]
struct GeminiTool {
    function_declarations: Vec<FunctionDeclaration>,
}

#[derive(Debug, Serialize)]
struct GenerationConfig {
    temperature: f32,
    candidate_count: u32,
}

#[derive(Debug, Deserialize)]
struct GeminiResponse {
    candidates: Option<Vec<Candidate>>,
    error: Option<GeminiError>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: Option<GeminiContent>,
}

#[derive(Debug, Deserialize)]
struct GeminiError {
    message: String,
}

/// Reasoning engine backed by Google Gemini
pub struct GeminiEngine {
    api_key: String,
    client: Client,
    model: String,
}

impl GeminiEngine {
    /// Create an engine with an explicit API key
    #[must_use]
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            client: Client::new(),
            model: DEFAULT_MODEL.to_owned(),
        }
    }

    /// Create an engine from `GEMINI_API_KEY` (and optionally
    /// `GEMINI_MODEL`)
    ///
    /// # Errors
    ///
    /// Returns a config error if the key variable is not set.
    pub fn from_env() -> AppResult<Self> {
        let api_key = env::var(GEMINI_API_KEY_ENV).map_err(|_| {
            AppError::config(format!("{GEMINI_API_KEY_ENV} environment variable not set"))
        })?;
        let mut engine = Self::new(api_key);
        if let Ok(model) = env::var(GEMINI_MODEL_ENV) {
            engine.model = model;
        }
        Ok(engine)
    }

    /// Override the model
    #[must_use]
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    fn build_url(&self) -> String {
        format!(
            "{API_BASE_URL}/models/{}:generateContent?key={}",
            self.model, self.api_key
        )
    }

    fn build_request(
        system_prompt: &str,
        history: &[ChatMessage],
        tools: &[FunctionDeclaration],
    ) -> GeminiRequest {
        let contents = history
            .iter()
            .map(|message| GeminiContent {
                role: Some(
                    match message.role {
                        ChatRole::User => "user",
                        ChatRole::Assistant => "model",
                    }
                    .to_owned(),
                ),
                parts: vec![ContentPart::Text {
                    text: message.content.clone(),
                }],
            })
            .collect();

        GeminiRequest {
            contents,
            system_instruction: Some(GeminiContent {
                role: None,
                parts: vec![ContentPart::Text {
                    text: system_prompt.to_owned(),
                }],
            }),
            // Low temperature keeps operation selection deterministic for
            // identical history and message.
            generation_config: GenerationConfig {
                temperature: 0.1,
                candidate_count: 1,
            },
            tools: if tools.is_empty() {
                None
            } else {
                Some(vec![GeminiTool {
                    function_declarations: tools.to_vec(),
                }])
            },
        }
    }

    fn extract_decision(response: GeminiResponse) -> AppResult<EngineDecision> {
        if let Some(err) = response.error {
            return Err(AppError::reasoning_unavailable(format!(
                "Gemini API error: {}",
                err.message
            )));
        }

        let parts = response
            .candidates
            .and_then(|mut c| if c.is_empty() { None } else { Some(c.remove(0)) })
            .and_then(|c| c.content)
            .map(|c| c.parts)
            .ok_or_else(|| AppError::reasoning_unavailable("Empty Gemini response"))?;

        // A function call wins over text; only the first one counts under
        // the single-operation-per-turn policy.
        for part in &parts {
            if let ContentPart::FunctionCall { function_call } = part {
                return Ok(EngineDecision::ToolCall(function_call.clone()));
            }
        }

        let text: String = parts
            .into_iter()
            .filter_map(|p| match p {
                ContentPart::Text { text } => Some(text),
                ContentPart::FunctionCall { .. } => None,
            })
            .collect::<Vec<_>>()
            .join("");

        if text.is_empty() {
            return Err(AppError::reasoning_unavailable(
                "Gemini response contained neither text nor a function call",
            ));
        }
        Ok(EngineDecision::Text(text))
    }
}

#[async_trait]
impl ReasoningEngine for GeminiEngine {
    async fn decide(
        &self,
        system_prompt: &str,
        history: &[ChatMessage],
        tools: &[FunctionDeclaration],
    ) -> AppResult<EngineDecision> {
        let request = Self::build_request(system_prompt, history, tools);

        debug!(model = %self.model, turns = history.len(), "consulting reasoning engine");

        let response = self
            .client
            .post(self.build_url())
            .json(&request)
            .send()
            .await
            .map_err(|e| {
                AppError::reasoning_unavailable(format!("HTTP request failed: {e}")).with_source(e)
            })?;

        let status = response.status();
        let body = response.text().await.map_err(|e| {
            AppError::reasoning_unavailable(format!("Failed to read response: {e}")).with_source(e)
        })?;

        if !status.is_success() {
            error!(status = %status, "Gemini API returned an error status");
            return Err(AppError::reasoning_unavailable(format!(
                "Gemini API returned {status}"
            )));
        }

        let parsed: GeminiResponse = serde_json::from_str(&body).map_err(|e| {
            error!(error = %e, "Failed to parse Gemini response");
            AppError::reasoning_unavailable(format!("Failed to parse Gemini response: {e}"))
        })?;

        Self::extract_decision(parsed)
    }

    fn name(&self) -> &'static str {
        "gemini"
    }
}
