// ABOUTME: JWT bearer-token verification resolving credentials to a user id
// ABOUTME: Identity issuance lives elsewhere; this module only verifies and mints dev/test tokens
//
// SPDX-License-Identifier: MIT OR Apache-2.0

//! # Authentication
//!
//! The conversational core consumes identity as a verified bearer token.
//! [`AuthManager`] validates HS256 JWTs and yields the owning user id; it
//! can also mint tokens, which the server itself only uses in tests and
//! local development (issuance is an external collaborator in production).

use crate::errors::{AppError, AppResult};
use axum::http::header::AUTHORIZATION;
use axum::http::HeaderMap;
use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Token lifetime for locally minted tokens
const TOKEN_EXPIRY_HOURS: i64 = 24;

/// `JWT` claims for user authentication
#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    /// User ID
    pub sub: String,
    /// Issued at timestamp
    pub iat: i64,
    /// Expiration timestamp
    pub exp: i64,
}

/// Validates bearer tokens and resolves them to user ids
#[derive(Clone)]
pub struct AuthManager {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
}

impl AuthManager {
    /// Create a manager from the shared HS256 secret
    #[must_use]
    pub fn new(secret: &str) -> Self {
        Self {
            encoding_key: EncodingKey::from_secret(secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(secret.as_bytes()),
        }
    }

    /// Mint a token for a user. Used by tests and local development.
    ///
    /// # Errors
    ///
    /// Returns an error if token signing fails.
    pub fn generate_token(&self, user_id: Uuid) -> AppResult<String> {
        let now = Utc::now();
        let claims = Claims {
            sub: user_id.to_string(),
            iat: now.timestamp(),
            exp: (now + Duration::hours(TOKEN_EXPIRY_HOURS)).timestamp(),
        };

        encode(&Header::new(Algorithm::HS256), &claims, &self.encoding_key)
            .map_err(|e| AppError::internal(format!("Failed to sign token: {e}")))
    }

    /// Validate a raw token and return the authenticated user id
    ///
    /// # Errors
    ///
    /// Returns an auth error if the token is expired, malformed, or the
    /// signature does not verify.
    pub fn validate_token(&self, token: &str) -> AppResult<Uuid> {
        let validation = Validation::new(Algorithm::HS256);
        let data = decode::<Claims>(token, &self.decoding_key, &validation)
            .map_err(|e| AppError::auth_invalid(format!("Token validation failed: {e}")))?;

        Uuid::parse_str(&data.claims.sub)
            .map_err(|_| AppError::auth_invalid("Token subject is not a valid user id"))
    }

    /// Resolve the `Authorization: Bearer` header to a user id
    ///
    /// # Errors
    ///
    /// Returns an auth error if the header is missing, not a bearer
    /// credential, or fails validation.
    pub fn authenticate(&self, headers: &HeaderMap) -> AppResult<Uuid> {
        let value = headers
            .get(AUTHORIZATION)
            .and_then(|h| h.to_str().ok())
            .ok_or_else(AppError::auth_required)?;

        let token = value
            .strip_prefix("Bearer ")
            .ok_or_else(|| AppError::auth_invalid("Authorization header must use Bearer scheme"))?;

        self.validate_token(token)
    }
}
