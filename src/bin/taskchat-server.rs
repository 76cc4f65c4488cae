// ABOUTME: TaskChat server binary: configuration, schema, wiring and the axum listener
// ABOUTME: All configuration comes from the environment; no flags, no config files
//
// SPDX-License-Identifier: MIT OR Apache-2.0

//! # TaskChat Server Binary
//!
//! Starts the conversational todo server: loads configuration, applies the
//! sqlite schema, wires the component graph around the Gemini reasoning
//! engine, and serves the chat API.

use std::sync::Arc;

use anyhow::Result;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::info;

use taskchat::config::ServerConfig;
use taskchat::context::ServerResources;
use taskchat::database::Database;
use taskchat::llm::gemini::GeminiEngine;
use taskchat::logging::LoggingConfig;
use taskchat::routes;

#[tokio::main]
async fn main() -> Result<()> {
    LoggingConfig::from_env().init()?;

    let config = ServerConfig::from_env()?;
    info!(port = config.http_port, "starting TaskChat server");

    let database = Database::connect(&config.database_url).await?;
    database.migrate().await?;
    info!(url = %config.database_url, "database ready");

    let engine = Arc::new(GeminiEngine::from_env()?);
    let resources = Arc::new(ServerResources::new(&database, engine, config.clone()));

    let app = routes::router(resources)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive());

    let listener =
        tokio::net::TcpListener::bind(("0.0.0.0", config.http_port)).await?;
    info!(port = config.http_port, "listening");

    axum::serve(listener, app).await?;
    Ok(())
}
