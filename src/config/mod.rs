// ABOUTME: Configuration management module
// ABOUTME: Environment-only server configuration, no config files
//
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration management and persistence

/// Environment-based server configuration
pub mod environment;

pub use environment::ServerConfig;
