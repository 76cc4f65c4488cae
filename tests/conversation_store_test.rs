// ABOUTME: Integration tests for the conversation store
// ABOUTME: Covers ordering, ownership scoping, atomic turn commits and archival
//
// SPDX-License-Identifier: MIT OR Apache-2.0

#![allow(clippy::unwrap_used)]

mod common;

use serde_json::json;
use taskchat::database::InvocationDraft;
use taskchat::models::{InvocationStatus, MessageRole};
use uuid::Uuid;

#[tokio::test]
async fn test_messages_are_totally_ordered() {
    let harness = common::harness().await;
    let store = &harness.resources.store;
    let user = Uuid::new_v4();

    let session = store.create_session(user, None).await.unwrap();
    for i in 0..5 {
        store
            .append_message(session.id, MessageRole::User, &format!("message {i}"))
            .await
            .unwrap();
    }

    let messages = store.list_messages(session.id).await.unwrap();
    assert_eq!(messages.len(), 5);
    let seqs: Vec<i64> = messages.iter().map(|m| m.seq).collect();
    assert_eq!(seqs, vec![1, 2, 3, 4, 5]);
}

#[tokio::test]
async fn test_session_lookup_is_owner_scoped() {
    let harness = common::harness().await;
    let store = &harness.resources.store;
    let owner = Uuid::new_v4();
    let stranger = Uuid::new_v4();

    let session = store.create_session(owner, Some("mine")).await.unwrap();

    assert!(store.get_session(session.id, owner).await.unwrap().is_some());
    // A foreign session behaves exactly like a missing one.
    assert!(store
        .get_session(session.id, stranger)
        .await
        .unwrap()
        .is_none());
}

#[tokio::test]
async fn test_append_turn_commits_message_and_invocation_together() {
    let harness = common::harness().await;
    let store = &harness.resources.store;
    let user = Uuid::new_v4();

    let session = store.create_session(user, None).await.unwrap();
    store
        .append_message(session.id, MessageRole::User, "add buy milk")
        .await
        .unwrap();

    let draft = InvocationDraft {
        tool_name: "create_task".to_owned(),
        arguments: json!({"title": "buy milk"}),
        result: Some(json!({"task": {"title": "buy milk"}})),
        error: None,
        status: InvocationStatus::Succeeded,
    };

    let (message, invocation) = store
        .append_turn(session.id, "I've created a task for you: 'buy milk'.", Some(&draft))
        .await
        .unwrap();

    let invocation = invocation.unwrap();
    assert_eq!(invocation.message_id, message.id);
    assert_eq!(invocation.session_id, session.id);
    assert_eq!(invocation.status, InvocationStatus::Succeeded);

    let audit = store.list_invocations(session.id).await.unwrap();
    assert_eq!(audit.len(), 1);
    assert_eq!(audit[0].tool_name, "create_task");
}

#[tokio::test]
async fn test_turn_without_operation_records_no_invocation() {
    let harness = common::harness().await;
    let store = &harness.resources.store;
    let user = Uuid::new_v4();

    let session = store.create_session(user, None).await.unwrap();
    store
        .append_turn(session.id, "Hello! How can I help?", None)
        .await
        .unwrap();

    assert!(store.list_invocations(session.id).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_load_recent_returns_newest_window_oldest_first() {
    let harness = common::harness().await;
    let store = &harness.resources.store;
    let user = Uuid::new_v4();

    let session = store.create_session(user, None).await.unwrap();
    for i in 0..8 {
        store
            .append_message(session.id, MessageRole::User, &format!("m{i}"))
            .await
            .unwrap();
    }

    let recent = store.load_recent(session.id, 3).await.unwrap();
    let contents: Vec<&str> = recent.iter().map(|m| m.content.as_str()).collect();
    assert_eq!(contents, vec!["m5", "m6", "m7"]);
}

#[tokio::test]
async fn test_archive_overflow_hides_old_messages() {
    let harness = common::harness().await;
    let store = &harness.resources.store;
    let user = Uuid::new_v4();

    let session = store.create_session(user, None).await.unwrap();
    for i in 0..10 {
        store
            .append_message(session.id, MessageRole::User, &format!("m{i}"))
            .await
            .unwrap();
    }

    let archived = store.archive_overflow(session.id, 4).await.unwrap();
    assert_eq!(archived, 6);

    let visible = store.list_messages(session.id).await.unwrap();
    assert_eq!(visible.len(), 4);
    assert_eq!(visible[0].content, "m6");

    // Archival is idempotent once under the cap.
    assert_eq!(store.archive_overflow(session.id, 4).await.unwrap(), 0);

    // New messages still get increasing seq numbers.
    let next = store
        .append_message(session.id, MessageRole::User, "m10")
        .await
        .unwrap();
    assert_eq!(next.seq, 11);
}

#[tokio::test]
async fn test_first_message_derives_session_title() {
    let harness = common::harness().await;
    let store = &harness.resources.store;
    let user = Uuid::new_v4();

    let session = store.create_session(user, None).await.unwrap();
    store
        .append_message(session.id, MessageRole::User, "plan my week")
        .await
        .unwrap();

    let reloaded = store.get_session(session.id, user).await.unwrap().unwrap();
    assert_eq!(reloaded.title, "plan my week");
}

#[tokio::test]
async fn test_file_backed_database_survives_reconnect() {
    use taskchat::database::{ConversationStore, Database};

    let dir = tempfile::tempdir().unwrap();
    let url = format!("sqlite:{}/taskchat.db", dir.path().display());

    let session_id;
    let user = Uuid::new_v4();
    {
        let database = Database::connect(&url).await.unwrap();
        database.migrate().await.unwrap();
        let store = ConversationStore::new(database.pool().clone());

        let session = store.create_session(user, Some("durable")).await.unwrap();
        session_id = session.id;
        store
            .append_message(session.id, MessageRole::User, "persist me")
            .await
            .unwrap();
    }

    let database = Database::connect(&url).await.unwrap();
    database.migrate().await.unwrap();
    let store = ConversationStore::new(database.pool().clone());

    let reloaded = store.get_session(session_id, user).await.unwrap().unwrap();
    assert_eq!(reloaded.title, "durable");
    let messages = store.list_messages(session_id).await.unwrap();
    assert_eq!(messages.len(), 1);
    assert_eq!(messages[0].content, "persist me");
}

#[tokio::test]
async fn test_deactivate_session() {
    let harness = common::harness().await;
    let store = &harness.resources.store;
    let user = Uuid::new_v4();
    let stranger = Uuid::new_v4();

    let session = store.create_session(user, None).await.unwrap();

    // A stranger cannot close someone else's session.
    assert!(!store.deactivate_session(session.id, stranger).await.unwrap());
    assert!(store.deactivate_session(session.id, user).await.unwrap());
    // Closing twice reports nothing to do.
    assert!(!store.deactivate_session(session.id, user).await.unwrap());

    let reloaded = store.get_session(session.id, user).await.unwrap().unwrap();
    assert!(!reloaded.is_active);
}
