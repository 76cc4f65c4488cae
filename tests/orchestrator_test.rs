// ABOUTME: Integration tests for the turn orchestrator
// ABOUTME: Covers turn persistence, rate limiting, session scoping and engine failure paths
//
// SPDX-License-Identifier: MIT OR Apache-2.0

#![allow(clippy::unwrap_used)]

mod common;

use serde_json::json;
use taskchat::config::ServerConfig;
use taskchat::errors::ErrorCode;
use taskchat::models::MessageRole;
use uuid::Uuid;

#[tokio::test]
async fn test_full_turn_persists_both_messages_and_invocation() {
    let harness = common::harness().await;
    let user = Uuid::new_v4();

    harness
        .engine
        .push_tool_call("create_task", json!({"title": "buy milk"}));

    let result = harness
        .resources
        .orchestrator
        .handle_turn(user, None, "add buy milk")
        .await
        .unwrap();

    assert_eq!(
        result.assistant_message.content,
        "I've created a task for you: 'buy milk'."
    );
    assert_eq!(result.invocation.as_ref().unwrap().tool_name, "create_task");

    let messages = harness
        .resources
        .store
        .list_messages(result.session.id)
        .await
        .unwrap();
    assert_eq!(messages.len(), 2);
    assert_eq!(messages[0].role, MessageRole::User);
    assert_eq!(messages[0].content, "add buy milk");
    assert_eq!(messages[1].role, MessageRole::Assistant);

    let audit = harness
        .resources
        .store
        .list_invocations(result.session.id)
        .await
        .unwrap();
    assert_eq!(audit.len(), 1);
}

#[tokio::test]
async fn test_turn_continues_existing_session_with_history() {
    let harness = common::harness().await;
    let user = Uuid::new_v4();

    harness.engine.push_text("Hello!");
    let first = harness
        .resources
        .orchestrator
        .handle_turn(user, None, "hi")
        .await
        .unwrap();

    harness.engine.push_text("Still here.");
    let second = harness
        .resources
        .orchestrator
        .handle_turn(user, Some(first.session.id), "are you there?")
        .await
        .unwrap();

    assert_eq!(second.session.id, first.session.id);
    let messages = harness
        .resources
        .store
        .list_messages(first.session.id)
        .await
        .unwrap();
    assert_eq!(messages.len(), 4);
    // One consult per turn, no more.
    assert_eq!(harness.engine.call_count(), 2);
}

#[tokio::test]
async fn test_rate_limit_denies_excess_turns_before_persistence() {
    let mut config = ServerConfig::for_testing();
    config.rate_limit_per_hour = 2;
    let harness = common::harness_with(config).await;
    let user = Uuid::new_v4();

    harness.engine.push_text("one");
    harness.engine.push_text("two");

    let first = harness
        .resources
        .orchestrator
        .handle_turn(user, None, "first")
        .await
        .unwrap();
    let session_id = first.session.id;

    harness
        .resources
        .orchestrator
        .handle_turn(user, Some(session_id), "second")
        .await
        .unwrap();

    let err = harness
        .resources
        .orchestrator
        .handle_turn(user, Some(session_id), "third")
        .await
        .unwrap_err();
    assert_eq!(err.code, ErrorCode::RateLimitExceeded);
    assert!(err.retry_after_secs.unwrap() >= 1);

    // The denied turn left no trace and never consulted the engine.
    let messages = harness.resources.store.list_messages(session_id).await.unwrap();
    assert_eq!(messages.len(), 4);
    assert_eq!(harness.engine.call_count(), 2);
}

#[tokio::test]
async fn test_engine_outage_keeps_user_message_and_fabricates_nothing() {
    let harness = common::harness().await;
    let user = Uuid::new_v4();

    harness.engine.push_text("hello");
    let first = harness
        .resources
        .orchestrator
        .handle_turn(user, None, "hi")
        .await
        .unwrap();
    let session_id = first.session.id;

    harness
        .engine
        .push_unavailable("Gemini API error: quota exhausted for project 12345");
    let err = harness
        .resources
        .orchestrator
        .handle_turn(user, Some(session_id), "add buy milk")
        .await
        .unwrap_err();
    assert_eq!(err.code, ErrorCode::ReasoningUnavailable);
    assert!(err.code.is_recoverable());

    // Provider detail stays out of the caller-facing message.
    assert!(!err.message.contains("Gemini"));
    assert!(!err.message.contains("quota"));
    assert!(err.message.contains("try again"));

    // The user's message survived; no assistant reply or invocation was
    // invented for it.
    let messages = harness.resources.store.list_messages(session_id).await.unwrap();
    assert_eq!(messages.len(), 3);
    assert_eq!(messages[2].role, MessageRole::User);
    assert_eq!(messages[2].content, "add buy milk");
    assert!(harness
        .resources
        .store
        .list_invocations(session_id)
        .await
        .unwrap()
        .is_empty());
}

#[tokio::test]
async fn test_engine_timeout_is_recoverable() {
    let harness = common::harness().await;
    let user = Uuid::new_v4();

    harness.engine.push_hang();

    let err = harness
        .resources
        .orchestrator
        .handle_turn(user, None, "anyone home?")
        .await
        .unwrap_err();
    assert_eq!(err.code, ErrorCode::ReasoningUnavailable);
    assert!(err.message.contains("try again"));

    // The user's message was persisted before the consult and survives
    // the timeout; no invocation was recorded.
    let sessions = harness.resources.store.list_sessions(user).await.unwrap();
    assert_eq!(sessions.len(), 1);
    let session_id = sessions[0].session.id;
    let messages = harness.resources.store.list_messages(session_id).await.unwrap();
    assert_eq!(messages.len(), 1);
    assert_eq!(messages[0].content, "anyone home?");
    assert!(harness
        .resources
        .store
        .list_invocations(session_id)
        .await
        .unwrap()
        .is_empty());
}

#[tokio::test]
async fn test_message_validation() {
    let harness = common::harness().await;
    let user = Uuid::new_v4();

    let empty = harness
        .resources
        .orchestrator
        .handle_turn(user, None, "   ")
        .await
        .unwrap_err();
    assert_eq!(empty.code, ErrorCode::InvalidInput);

    let oversized = "x".repeat(harness.resources.config.max_message_chars + 1);
    let too_long = harness
        .resources
        .orchestrator
        .handle_turn(user, None, &oversized)
        .await
        .unwrap_err();
    assert_eq!(too_long.code, ErrorCode::InvalidInput);
}

#[tokio::test]
async fn test_foreign_session_is_not_found() {
    let harness = common::harness().await;
    let owner = Uuid::new_v4();
    let stranger = Uuid::new_v4();

    harness.engine.push_text("hello");
    let turn = harness
        .resources
        .orchestrator
        .handle_turn(owner, None, "hi")
        .await
        .unwrap();

    let err = harness
        .resources
        .orchestrator
        .handle_turn(stranger, Some(turn.session.id), "let me in")
        .await
        .unwrap_err();
    assert_eq!(err.code, ErrorCode::ResourceNotFound);
}

#[tokio::test]
async fn test_closed_session_rejects_turns() {
    let harness = common::harness().await;
    let user = Uuid::new_v4();

    harness.engine.push_text("hello");
    let turn = harness
        .resources
        .orchestrator
        .handle_turn(user, None, "hi")
        .await
        .unwrap();

    harness
        .resources
        .store
        .deactivate_session(turn.session.id, user)
        .await
        .unwrap();

    let err = harness
        .resources
        .orchestrator
        .handle_turn(user, Some(turn.session.id), "one more")
        .await
        .unwrap_err();
    assert_eq!(err.code, ErrorCode::InvalidInput);
}

#[tokio::test]
async fn test_retention_cap_archives_old_turns() {
    let mut config = ServerConfig::for_testing();
    config.message_retention_cap = 4;
    let harness = common::harness_with(config).await;
    let user = Uuid::new_v4();

    harness.engine.push_text("r1");
    let first = harness
        .resources
        .orchestrator
        .handle_turn(user, None, "m1")
        .await
        .unwrap();
    let session_id = first.session.id;

    for i in 2..=4 {
        harness.engine.push_text(format!("r{i}"));
        harness
            .resources
            .orchestrator
            .handle_turn(user, Some(session_id), &format!("m{i}"))
            .await
            .unwrap();
    }

    // 8 messages written, only the newest 4 remain visible.
    let visible = harness.resources.store.list_messages(session_id).await.unwrap();
    assert_eq!(visible.len(), 4);
    assert_eq!(visible[0].content, "m3");
}
