// ABOUTME: Environment-variable based server configuration with sane defaults
// ABOUTME: Single source of truth for ports, limits, timeouts and secrets
//
// SPDX-License-Identifier: MIT OR Apache-2.0

//! # Server Configuration
//!
//! All configuration is read from the environment; there are no
//! configuration files. Every knob has a default suitable for local
//! development except `JWT_SECRET`, which is required.

use crate::errors::{AppError, AppResult};
use std::env;

/// Default HTTP port
const DEFAULT_HTTP_PORT: u16 = 8081;
/// Default sqlite database URL
const DEFAULT_DATABASE_URL: &str = "sqlite:./data/taskchat.db";
/// Default per-user turn quota per hour
const DEFAULT_RATE_LIMIT_PER_HOUR: u32 = 100;
/// Default maximum message length in characters
const DEFAULT_MAX_MESSAGE_CHARS: usize = 4000;
/// Default number of recent messages handed to the reasoning engine
const DEFAULT_HISTORY_WINDOW: i64 = 10;
/// Default retained (non-archived) messages per session
const DEFAULT_MESSAGE_RETENTION_CAP: i64 = 1000;
/// Default reasoning engine timeout in seconds
const DEFAULT_REASONING_TIMEOUT_SECS: u64 = 30;

/// Server configuration loaded from the environment
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// HTTP listen port (`HTTP_PORT`)
    pub http_port: u16,
    /// Database connection URL (`DATABASE_URL`)
    pub database_url: String,
    /// HS256 secret for bearer token verification (`JWT_SECRET`)
    pub jwt_secret: String,
    /// Turns allowed per user per hour (`RATE_LIMIT_PER_HOUR`)
    pub rate_limit_per_hour: u32,
    /// Maximum user message length (`MAX_MESSAGE_CHARS`)
    pub max_message_chars: usize,
    /// Recent messages reconstructed per turn (`HISTORY_WINDOW`)
    pub history_window: i64,
    /// Retained messages per session before archival (`MESSAGE_RETENTION_CAP`)
    pub message_retention_cap: i64,
    /// Upper bound on one reasoning engine call (`REASONING_TIMEOUT_SECS`)
    pub reasoning_timeout_secs: u64,
}

impl ServerConfig {
    /// Load configuration from environment variables
    ///
    /// # Errors
    ///
    /// Returns a config error if `JWT_SECRET` is unset or a numeric
    /// variable fails to parse.
    pub fn from_env() -> AppResult<Self> {
        let jwt_secret = env::var("JWT_SECRET")
            .map_err(|_| AppError::config("JWT_SECRET environment variable is required"))?;

        Ok(Self {
            http_port: parse_env("HTTP_PORT", DEFAULT_HTTP_PORT)?,
            database_url: env::var("DATABASE_URL")
                .unwrap_or_else(|_| DEFAULT_DATABASE_URL.to_owned()),
            jwt_secret,
            rate_limit_per_hour: parse_env("RATE_LIMIT_PER_HOUR", DEFAULT_RATE_LIMIT_PER_HOUR)?,
            max_message_chars: parse_env("MAX_MESSAGE_CHARS", DEFAULT_MAX_MESSAGE_CHARS)?,
            history_window: parse_env("HISTORY_WINDOW", DEFAULT_HISTORY_WINDOW)?,
            message_retention_cap: parse_env(
                "MESSAGE_RETENTION_CAP",
                DEFAULT_MESSAGE_RETENTION_CAP,
            )?,
            reasoning_timeout_secs: parse_env(
                "REASONING_TIMEOUT_SECS",
                DEFAULT_REASONING_TIMEOUT_SECS,
            )?,
        })
    }

    /// Configuration suitable for tests: in-memory database, small limits
    #[must_use]
    pub fn for_testing() -> Self {
        Self {
            http_port: 0,
            database_url: "sqlite::memory:".to_owned(),
            jwt_secret: "test-secret".to_owned(),
            rate_limit_per_hour: DEFAULT_RATE_LIMIT_PER_HOUR,
            max_message_chars: DEFAULT_MAX_MESSAGE_CHARS,
            history_window: DEFAULT_HISTORY_WINDOW,
            message_retention_cap: DEFAULT_MESSAGE_RETENTION_CAP,
            reasoning_timeout_secs: 5,
        }
    }
}

fn parse_env<T: std::str::FromStr>(name: &str, default: T) -> AppResult<T> {
    match env::var(name) {
        Ok(raw) => raw
            .parse()
            .map_err(|_| AppError::config(format!("{name} has an invalid value: {raw}"))),
        Err(_) => Ok(default),
    }
}
