// ABOUTME: Per-user sliding-window rate limiting for conversation turns
// ABOUTME: In-memory accounting keyed by user id; denial happens before any persistence
//
// SPDX-License-Identifier: MIT OR Apache-2.0

//! # Turn Rate Limiting
//!
//! Each user gets a fixed number of turns per sliding hour. The check runs
//! before the user's message is persisted and before the reasoning engine
//! is consulted, so a denied turn consumes no downstream resources. State
//! is in-memory; a restart resets the window, which is acceptable for an
//! hourly quota.

use std::collections::VecDeque;
use std::sync::Mutex;
use std::time::{Duration, Instant};

use dashmap::DashMap;
use uuid::Uuid;

/// Length of the sliding window
const WINDOW: Duration = Duration::from_secs(3600);

/// Outcome of one rate-limit check
#[derive(Debug, Clone, Copy)]
pub struct RateLimitDecision {
    /// Whether the turn may proceed
    pub allowed: bool,
    /// Configured quota per window
    pub limit: u32,
    /// Turns left in the current window, after this one
    pub remaining: u32,
    /// Seconds until a denied caller frees a slot
    pub retry_after_secs: u64,
}

/// Sliding-window turn limiter, shared across requests
pub struct TurnRateLimiter {
    limit: u32,
    windows: DashMap<Uuid, Mutex<VecDeque<Instant>>>,
}

impl TurnRateLimiter {
    /// Create a limiter allowing `limit` turns per user per hour
    #[must_use]
    pub fn new(limit: u32) -> Self {
        Self {
            limit,
            windows: DashMap::new(),
        }
    }

    /// Check the caller's quota and, if allowed, record this turn
    pub fn check_and_record(&self, user_id: Uuid) -> RateLimitDecision {
        self.check_at(user_id, Instant::now())
    }

    fn check_at(&self, user_id: Uuid, now: Instant) -> RateLimitDecision {
        let entry = self
            .windows
            .entry(user_id)
            .or_insert_with(|| Mutex::new(VecDeque::new()));

        let mut window = match entry.lock() {
            Ok(guard) => guard,
            // A poisoned window only ever contains timestamps; keep going.
            Err(poisoned) => poisoned.into_inner(),
        };

        while let Some(oldest) = window.front() {
            if now.duration_since(*oldest) >= WINDOW {
                window.pop_front();
            } else {
                break;
            }
        }

        let used = u32::try_from(window.len()).unwrap_or(u32::MAX);
        if used < self.limit {
            window.push_back(now);
            return RateLimitDecision {
                allowed: true,
                limit: self.limit,
                remaining: self.limit - used - 1,
                retry_after_secs: 0,
            };
        }

        let retry_after_secs = window
            .front()
            .map(|oldest| WINDOW.saturating_sub(now.duration_since(*oldest)).as_secs())
            .unwrap_or_default()
            .max(1);

        RateLimitDecision {
            allowed: false,
            limit: self.limit,
            remaining: 0,
            retry_after_secs,
        }
    }
}
