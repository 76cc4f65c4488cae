// ABOUTME: Unified error handling with standard error codes and HTTP response mapping
// ABOUTME: Defines the failure taxonomy shared by the orchestrator, dispatcher, gateway and routes
//
// SPDX-License-Identifier: MIT OR Apache-2.0

//! # Unified Error Handling System
//!
//! Centralized error types for the TaskChat server. Every fallible path in
//! the crate returns [`AppError`], which carries a stable [`ErrorCode`] and
//! maps onto a consistent HTTP error body.

use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Standard error codes used throughout the application
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ErrorCode {
    /// No credentials were supplied
    #[serde(rename = "AUTH_REQUIRED")]
    AuthRequired,
    /// Credentials were supplied but could not be verified
    #[serde(rename = "AUTH_INVALID")]
    AuthInvalid,
    /// Caller is authenticated but does not own the resource
    #[serde(rename = "PERMISSION_DENIED")]
    PermissionDenied,
    /// Per-user turn quota exhausted
    #[serde(rename = "RATE_LIMIT_EXCEEDED")]
    RateLimitExceeded,
    /// Bad input from the caller or from the reasoning engine
    #[serde(rename = "INVALID_INPUT")]
    InvalidInput,
    /// A required argument is absent
    #[serde(rename = "MISSING_REQUIRED_FIELD")]
    MissingRequiredField,
    /// Referenced session, message, or task does not exist for this caller
    #[serde(rename = "RESOURCE_NOT_FOUND")]
    ResourceNotFound,
    /// The reasoning engine timed out or refused the request (recoverable)
    #[serde(rename = "REASONING_UNAVAILABLE")]
    ReasoningUnavailable,
    /// The task operation gateway reported a failure
    #[serde(rename = "GATEWAY_ERROR")]
    GatewayError,
    /// Conversation store failure
    #[serde(rename = "DATABASE_ERROR")]
    DatabaseError,
    /// Configuration is missing or invalid
    #[serde(rename = "CONFIG_ERROR")]
    ConfigError,
    /// Unclassified internal failure
    #[serde(rename = "INTERNAL_ERROR")]
    InternalError,
}

impl ErrorCode {
    /// Get the HTTP status code for this error
    #[must_use]
    pub const fn http_status(&self) -> StatusCode {
        match self {
            Self::InvalidInput | Self::MissingRequiredField => StatusCode::BAD_REQUEST,
            Self::AuthRequired | Self::AuthInvalid => StatusCode::UNAUTHORIZED,
            Self::PermissionDenied => StatusCode::FORBIDDEN,
            Self::ResourceNotFound => StatusCode::NOT_FOUND,
            Self::RateLimitExceeded => StatusCode::TOO_MANY_REQUESTS,
            Self::ReasoningUnavailable | Self::GatewayError => StatusCode::BAD_GATEWAY,
            Self::DatabaseError | Self::ConfigError | Self::InternalError => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    /// Get a user-facing description of this error class
    #[must_use]
    pub const fn description(&self) -> &'static str {
        match self {
            Self::AuthRequired => "Authentication is required to access this resource",
            Self::AuthInvalid => "The provided authentication credentials are invalid",
            Self::PermissionDenied => "You do not have permission to perform this action",
            Self::RateLimitExceeded => "Rate limit exceeded. Please slow down your requests",
            Self::InvalidInput => "The provided input is invalid",
            Self::MissingRequiredField => "A required field is missing from the request",
            Self::ResourceNotFound => "The requested resource was not found",
            Self::ReasoningUnavailable => "The reasoning service is temporarily unavailable",
            Self::GatewayError => "The task service reported an error",
            Self::DatabaseError => "Database operation failed",
            Self::ConfigError => "Configuration error encountered",
            Self::InternalError => "An internal server error occurred",
        }
    }

    /// Whether a client may safely retry the same request after a delay
    #[must_use]
    pub const fn is_recoverable(&self) -> bool {
        matches!(self, Self::ReasoningUnavailable | Self::RateLimitExceeded)
    }
}

/// Unified error type for the application
#[derive(Debug, Error)]
pub struct AppError {
    /// Error code
    pub code: ErrorCode,
    /// Human-readable error message
    pub message: String,
    /// Seconds until a rate-limited caller may retry
    pub retry_after_secs: Option<u64>,
    /// Source error for error chaining
    #[source]
    pub source: Option<Box<dyn std::error::Error + Send + Sync>>,
}

impl AppError {
    /// Create a new error with the given code and message
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            retry_after_secs: None,
            source: None,
        }
    }

    /// Attach a source error for chaining
    #[must_use]
    pub fn with_source(mut self, source: impl std::error::Error + Send + Sync + 'static) -> Self {
        self.source = Some(Box::new(source));
        self
    }

    /// Get the HTTP status code for this error
    #[must_use]
    pub const fn http_status(&self) -> StatusCode {
        self.code.http_status()
    }

    /// Missing or absent credentials
    #[must_use]
    pub fn auth_required() -> Self {
        Self::new(ErrorCode::AuthRequired, "Authentication required")
    }

    /// Invalid credentials
    pub fn auth_invalid(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::AuthInvalid, message)
    }

    /// Rate limit exceeded, with a retry hint
    #[must_use]
    pub fn rate_limited(limit: u32, retry_after_secs: u64) -> Self {
        let mut err = Self::new(
            ErrorCode::RateLimitExceeded,
            format!("Rate limit of {limit} turns per hour exceeded"),
        );
        err.retry_after_secs = Some(retry_after_secs);
        err
    }

    /// Resource not found. Also used to mask ownership violations so that
    /// callers cannot confirm the existence of other users' resources.
    pub fn not_found(resource: impl Into<String>) -> Self {
        Self::new(
            ErrorCode::ResourceNotFound,
            format!("{} not found", resource.into()),
        )
    }

    /// Invalid input
    pub fn invalid_input(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::InvalidInput, message)
    }

    /// Required field absent
    pub fn missing_field(field: impl Into<String>) -> Self {
        Self::new(
            ErrorCode::MissingRequiredField,
            format!("Required field is missing: {}", field.into()),
        )
    }

    /// Reasoning engine unavailable (recoverable)
    pub fn reasoning_unavailable(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::ReasoningUnavailable, message)
    }

    /// Gateway failure
    pub fn gateway(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::GatewayError, message)
    }

    /// Database error
    pub fn database(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::DatabaseError, message)
    }

    /// Configuration error
    pub fn config(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::ConfigError, message)
    }

    /// Internal server error
    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::InternalError, message)
    }
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.code.description(), self.message)
    }
}

/// Result type alias for convenience
pub type AppResult<T> = Result<T, AppError>;

/// HTTP error response format
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    /// Error payload
    pub error: ErrorResponseDetails,
}

/// Body of an error response
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponseDetails {
    /// Stable machine-readable code
    pub code: ErrorCode,
    /// Human-readable message
    pub message: String,
    /// Present when the caller should wait before retrying
    #[serde(skip_serializing_if = "Option::is_none")]
    pub retry_after_secs: Option<u64>,
}

impl From<&AppError> for ErrorResponse {
    fn from(error: &AppError) -> Self {
        Self {
            error: ErrorResponseDetails {
                code: error.code,
                message: error.message.clone(),
                retry_after_secs: error.retry_after_secs,
            },
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.http_status();
        let body = ErrorResponse::from(&self);
        let mut response = (status, Json(body)).into_response();
        if let Some(secs) = self.retry_after_secs {
            if let Ok(value) = header::HeaderValue::from_str(&secs.to_string()) {
                response.headers_mut().insert(header::RETRY_AFTER, value);
            }
        }
        response
    }
}

impl From<sqlx::Error> for AppError {
    fn from(error: sqlx::Error) -> Self {
        Self::database(error.to_string()).with_source(error)
    }
}

impl From<anyhow::Error> for AppError {
    fn from(error: anyhow::Error) -> Self {
        Self::internal(error.to_string())
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    use super::*;

    #[test]
    fn test_error_code_http_status() {
        assert_eq!(
            ErrorCode::AuthRequired.http_status(),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(
            ErrorCode::RateLimitExceeded.http_status(),
            StatusCode::TOO_MANY_REQUESTS
        );
        assert_eq!(
            ErrorCode::ResourceNotFound.http_status(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            ErrorCode::ReasoningUnavailable.http_status(),
            StatusCode::BAD_GATEWAY
        );
    }

    #[test]
    fn test_rate_limited_carries_retry_hint() {
        let error = AppError::rate_limited(100, 1800);
        assert_eq!(error.code, ErrorCode::RateLimitExceeded);
        assert_eq!(error.retry_after_secs, Some(1800));
        assert!(error.code.is_recoverable());
    }

    #[test]
    fn test_error_response_serialization() {
        let error = AppError::rate_limited(100, 60);
        let response = ErrorResponse::from(&error);

        let json = serde_json::to_string(&response).unwrap();
        assert!(json.contains("RATE_LIMIT_EXCEEDED"));
        assert!(json.contains("retry_after_secs"));
    }

    #[test]
    fn test_not_found_masks_ownership() {
        let error = AppError::not_found("Session");
        assert_eq!(error.http_status(), StatusCode::NOT_FOUND);
        assert_eq!(error.message, "Session not found");
    }
}
