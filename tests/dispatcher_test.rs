// ABOUTME: Integration tests for the intent dispatcher
// ABOUTME: Covers validation-before-mutation, clarification over guessing, reference resolution
//
// SPDX-License-Identifier: MIT OR Apache-2.0

#![allow(clippy::unwrap_used)]

mod common;

use std::time::Duration;

use serde_json::json;
use taskchat::dispatcher::IntentDispatcher;
use taskchat::errors::ErrorCode;
use taskchat::models::{InvocationStatus, TaskFilter};
use uuid::Uuid;

const TEST_REASONING_TIMEOUT: Duration = Duration::from_secs(5);

fn dispatcher(harness: &common::TestHarness) -> IntentDispatcher {
    IntentDispatcher::new(
        harness.engine.clone(),
        harness.resources.gateway.clone(),
        TEST_REASONING_TIMEOUT,
    )
}

#[tokio::test]
async fn test_create_task_via_engine_decision() {
    let harness = common::harness().await;
    let dispatcher = dispatcher(&harness);
    let user = Uuid::new_v4();

    harness
        .engine
        .push_tool_call("create_task", json!({"title": "buy milk"}));

    let outcome = dispatcher
        .dispatch(user, &[], "add buy milk to my list")
        .await
        .unwrap();

    assert_eq!(outcome.reply, "I've created a task for you: 'buy milk'.");
    let invocation = outcome.invocation.unwrap();
    assert_eq!(invocation.tool_name, "create_task");
    assert_eq!(invocation.status, InvocationStatus::Succeeded);

    // The task really exists in the store.
    let tasks = harness
        .resources
        .gateway
        .list_tasks(user, TaskFilter::All, None, None)
        .await
        .unwrap();
    assert_eq!(tasks.len(), 1);
    assert_eq!(tasks[0].title, "buy milk");

    // The engine was consulted exactly once.
    assert_eq!(harness.engine.call_count(), 1);
}

#[tokio::test]
async fn test_direct_text_reply_executes_nothing() {
    let harness = common::harness().await;
    let dispatcher = dispatcher(&harness);
    let user = Uuid::new_v4();

    harness.engine.push_text("Hello! I can manage your todo list.");

    let outcome = dispatcher.dispatch(user, &[], "hi there").await.unwrap();
    assert_eq!(outcome.reply, "Hello! I can manage your todo list.");
    assert!(outcome.invocation.is_none());
}

#[tokio::test]
async fn test_complete_with_zero_tasks_clarifies_without_gateway_call() {
    let harness = common::harness().await;
    let dispatcher = dispatcher(&harness);
    let user = Uuid::new_v4();

    harness.engine.push_tool_call(
        "set_task_complete",
        json!({"task": "my task", "is_completed": true}),
    );

    let outcome = dispatcher.dispatch(user, &[], "complete my task").await.unwrap();

    assert!(outcome.invocation.is_none());
    assert!(outcome.reply.contains("don't have any tasks"));
    assert_eq!(harness.engine.call_count(), 1);
}

#[tokio::test]
async fn test_ambiguous_title_clarifies_instead_of_guessing() {
    let harness = common::harness().await;
    let dispatcher = dispatcher(&harness);
    let gateway = &harness.resources.gateway;
    let user = Uuid::new_v4();

    gateway.create_task(user, "call mom", None).await.unwrap();
    gateway.create_task(user, "call mom", None).await.unwrap();

    harness
        .engine
        .push_tool_call("delete_task", json!({"task": "call mom"}));

    let outcome = dispatcher.dispatch(user, &[], "delete call mom").await.unwrap();

    assert!(outcome.invocation.is_none());
    assert!(outcome.reply.contains("more than one task"));

    // Nothing was deleted.
    let remaining = gateway.list_tasks(user, TaskFilter::All, None, None).await.unwrap();
    assert_eq!(remaining.len(), 2);
}

#[tokio::test]
async fn test_unknown_operation_name_never_executes() {
    let harness = common::harness().await;
    let dispatcher = dispatcher(&harness);
    let user = Uuid::new_v4();

    harness
        .engine
        .push_tool_call("drop_all_tables", json!({"confirm": true}));

    let outcome = dispatcher.dispatch(user, &[], "do something weird").await.unwrap();
    assert!(outcome.invocation.is_none());
    assert!(outcome.reply.contains("rephrase"));
}

#[tokio::test]
async fn test_missing_required_argument_clarifies() {
    let harness = common::harness().await;
    let dispatcher = dispatcher(&harness);
    let user = Uuid::new_v4();

    harness.engine.push_tool_call("create_task", json!({}));

    let outcome = dispatcher.dispatch(user, &[], "make a task").await.unwrap();
    assert!(outcome.invocation.is_none());
    assert!(outcome.reply.contains("rephrase"));
}

#[tokio::test]
async fn test_ordinal_reference_resolves_against_listing_order() {
    let harness = common::harness().await;
    let dispatcher = dispatcher(&harness);
    let gateway = &harness.resources.gateway;
    let user = Uuid::new_v4();

    gateway.create_task(user, "older task", None).await.unwrap();
    gateway.create_task(user, "newer task", None).await.unwrap();

    // Listings are newest first, so #1 is the newer task.
    let listing = gateway.list_tasks(user, TaskFilter::All, None, None).await.unwrap();
    let first_title = listing[0].title.clone();

    harness.engine.push_tool_call(
        "set_task_complete",
        json!({"task": "#1", "is_completed": true}),
    );

    let outcome = dispatcher.dispatch(user, &[], "complete task 1").await.unwrap();
    assert_eq!(
        outcome.reply,
        format!("I've marked the task '{first_title}' as completed.")
    );
    assert_eq!(outcome.invocation.unwrap().status, InvocationStatus::Succeeded);
}

#[tokio::test]
async fn test_ordinal_out_of_range_clarifies() {
    let harness = common::harness().await;
    let dispatcher = dispatcher(&harness);
    let user = Uuid::new_v4();

    harness
        .resources
        .gateway
        .create_task(user, "only task", None)
        .await
        .unwrap();

    harness
        .engine
        .push_tool_call("delete_task", json!({"task": "#5"}));

    let outcome = dispatcher.dispatch(user, &[], "delete task 5").await.unwrap();
    assert!(outcome.invocation.is_none());
    assert!(outcome.reply.contains("Task #5 doesn't exist"));
}

#[tokio::test]
async fn test_title_reference_is_case_insensitive() {
    let harness = common::harness().await;
    let dispatcher = dispatcher(&harness);
    let user = Uuid::new_v4();

    harness
        .resources
        .gateway
        .create_task(user, "Buy Milk", None)
        .await
        .unwrap();

    harness
        .engine
        .push_tool_call("get_task", json!({"task": "buy milk"}));

    let outcome = dispatcher.dispatch(user, &[], "show buy milk").await.unwrap();
    assert!(outcome.reply.contains("'Buy Milk' is pending."));
    assert_eq!(outcome.invocation.unwrap().tool_name, "get_task");
}

#[tokio::test]
async fn test_uuid_reference_resolves_directly() {
    let harness = common::harness().await;
    let dispatcher = dispatcher(&harness);
    let user = Uuid::new_v4();

    let task = harness
        .resources
        .gateway
        .create_task(user, "precise task", Some("with notes"))
        .await
        .unwrap();

    harness
        .engine
        .push_tool_call("get_task", json!({"task": task.id.to_string()}));

    let outcome = dispatcher.dispatch(user, &[], "show it").await.unwrap();
    assert!(outcome.reply.contains("'precise task' is pending."));
    assert!(outcome.reply.contains("with notes"));
}

#[tokio::test]
async fn test_decision_past_deadline_never_reaches_gateway() {
    let harness = common::harness().await;
    let dispatcher = dispatcher(&harness);
    let user = Uuid::new_v4();

    harness.engine.push_delayed_tool_call(
        TEST_REASONING_TIMEOUT * 2,
        "create_task",
        json!({"title": "late arrival"}),
    );

    let err = dispatcher
        .dispatch(user, &[], "add late arrival")
        .await
        .unwrap_err();
    assert_eq!(err.code, ErrorCode::ReasoningUnavailable);

    // The deadline cut off the consult, so the operation never ran.
    let tasks = harness
        .resources
        .gateway
        .list_tasks(user, TaskFilter::All, None, None)
        .await
        .unwrap();
    assert!(tasks.is_empty());
}

#[tokio::test]
async fn test_decision_within_deadline_commits_fully() {
    let harness = common::harness().await;
    let dispatcher = dispatcher(&harness);
    let user = Uuid::new_v4();

    // Slow but in time: once the decision lands, the gateway call runs to
    // completion regardless of how much of the deadline is left.
    harness.engine.push_delayed_tool_call(
        TEST_REASONING_TIMEOUT - Duration::from_secs(1),
        "create_task",
        json!({"title": "on time"}),
    );

    let outcome = dispatcher.dispatch(user, &[], "add on time").await.unwrap();
    assert_eq!(outcome.invocation.unwrap().status, InvocationStatus::Succeeded);

    let tasks = harness
        .resources
        .gateway
        .list_tasks(user, TaskFilter::All, None, None)
        .await
        .unwrap();
    assert_eq!(tasks.len(), 1);
    assert_eq!(tasks[0].title, "on time");
}

#[tokio::test]
async fn test_update_with_empty_description_clears_it() {
    let harness = common::harness().await;
    let dispatcher = dispatcher(&harness);
    let gateway = &harness.resources.gateway;
    let user = Uuid::new_v4();

    let task = gateway
        .create_task(user, "buy milk", Some("two liters"))
        .await
        .unwrap();

    harness
        .engine
        .push_tool_call("update_task", json!({"task": "buy milk", "description": ""}));

    let outcome = dispatcher
        .dispatch(user, &[], "remove the note from buy milk")
        .await
        .unwrap();
    assert_eq!(outcome.reply, "I've updated the task: 'buy milk'.");
    assert_eq!(outcome.invocation.unwrap().status, InvocationStatus::Succeeded);

    let updated = gateway.get_task(user, task.id).await.unwrap();
    assert!(updated.description.is_empty());
}

#[tokio::test]
async fn test_task_store_failure_becomes_failed_invocation() {
    let harness = common::harness().await;
    let dispatcher = dispatcher(&harness);
    let user = Uuid::new_v4();

    sqlx::query("DROP TABLE tasks")
        .execute(harness.database.pool())
        .await
        .unwrap();

    harness
        .engine
        .push_tool_call("create_task", json!({"title": "doomed"}));

    // The turn survives: the failure is recorded, not propagated.
    let outcome = dispatcher.dispatch(user, &[], "add doomed").await.unwrap();
    assert!(outcome.reply.contains("I'm sorry, I couldn't do that"));

    let invocation = outcome.invocation.unwrap();
    assert_eq!(invocation.tool_name, "create_task");
    assert_eq!(invocation.status, InvocationStatus::Failed);
    assert!(invocation.error.is_some());
}

#[tokio::test]
async fn test_list_tasks_renders_completion_marks() {
    let harness = common::harness().await;
    let dispatcher = dispatcher(&harness);
    let gateway = &harness.resources.gateway;
    let user = Uuid::new_v4();

    let done = gateway.create_task(user, "finished", None).await.unwrap();
    gateway.create_task(user, "in progress", None).await.unwrap();
    gateway.set_task_complete(user, done.id, true).await.unwrap();

    harness.engine.push_tool_call("list_tasks", json!({}));

    let outcome = dispatcher.dispatch(user, &[], "what's on my list?").await.unwrap();
    assert!(outcome.reply.starts_with("Here are your tasks:"));
    assert!(outcome.reply.contains("\u{2713} finished"));
    assert!(outcome.reply.contains("\u{25cb} in progress"));

    let invocation = outcome.invocation.unwrap();
    assert_eq!(invocation.tool_name, "list_tasks");
    assert_eq!(invocation.result.unwrap()["count"], 2);
}
