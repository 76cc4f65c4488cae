// ABOUTME: Intent dispatcher turning one user message into a reply and at most one gateway call
// ABOUTME: Consults the reasoning engine once, re-validates its output, resolves task references
//
// SPDX-License-Identifier: MIT OR Apache-2.0

//! # Intent Dispatcher
//!
//! For each turn the dispatcher consults the reasoning engine exactly once
//! with the reconstructed history and the operation catalog. The engine's
//! answer is treated as untrusted input: a requested operation is parsed
//! back into the closed [`OperationCall`] enum and its arguments
//! re-validated before the gateway is touched. Ambiguous or under-specified
//! requests produce a clarification reply instead of a guess, so a vague
//! "update my task" can never mutate an arbitrary row.
//!
//! Task references from the engine are resolved against the caller's own
//! tasks only: first as a task id, then as an ordinal into the task
//! listing, then as an exact (case-insensitive) title. Anything still
//! ambiguous becomes a clarification.
//!
//! Only the engine consult is time-boxed. Once a decision is in hand, the
//! gateway call and reply derivation run to completion, so a deadline can
//! never land between a committed mutation and its invocation record.

use std::fmt::Write as _;
use std::sync::Arc;
use std::time::Duration;

use serde_json::json;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::database::InvocationDraft;
use crate::errors::{AppError, AppResult, ErrorCode};
use crate::gateway::TaskGateway;
use crate::llm::{prompts, ChatMessage, ChatRole, EngineDecision, ReasoningEngine};
use crate::models::{InvocationStatus, Message, MessageRole, Task, TaskFilter};
use crate::tools::{operation_catalog, OperationCall};

/// Upper bound on tasks fetched while resolving a textual reference
const RESOLUTION_FETCH_LIMIT: i64 = 100;

/// The dispatcher's verdict for one turn
#[derive(Debug)]
pub struct DispatchOutcome {
    /// Assistant reply text
    pub reply: String,
    /// The single gateway call of this turn, if one happened
    pub invocation: Option<InvocationDraft>,
}

impl DispatchOutcome {
    fn text(reply: impl Into<String>) -> Self {
        Self {
            reply: reply.into(),
            invocation: None,
        }
    }
}

enum Resolution {
    Found(Task),
    Clarify(String),
}

/// Turns user intent into replies and validated gateway calls
pub struct IntentDispatcher {
    engine: Arc<dyn ReasoningEngine>,
    gateway: TaskGateway,
    reasoning_timeout: Duration,
}

impl IntentDispatcher {
    /// Create a dispatcher over the given engine and gateway
    #[must_use]
    pub fn new(
        engine: Arc<dyn ReasoningEngine>,
        gateway: TaskGateway,
        reasoning_timeout: Duration,
    ) -> Self {
        Self {
            engine,
            gateway,
            reasoning_timeout,
        }
    }

    /// Handle one turn: consult the engine once, then execute at most one
    /// validated operation.
    ///
    /// # Errors
    ///
    /// Propagates reasoning-unavailable and storage errors; gateway-level
    /// failures of a selected operation are captured in the outcome's
    /// invocation record instead.
    pub async fn dispatch(
        &self,
        user_id: Uuid,
        history: &[Message],
        new_message: &str,
    ) -> AppResult<DispatchOutcome> {
        let mut chat_history: Vec<ChatMessage> = history
            .iter()
            .map(|m| ChatMessage {
                role: match m.role {
                    MessageRole::User => ChatRole::User,
                    MessageRole::Assistant => ChatRole::Assistant,
                },
                content: m.content.clone(),
            })
            .collect();
        chat_history.push(ChatMessage {
            role: ChatRole::User,
            content: new_message.to_owned(),
        });

        let decision = match tokio::time::timeout(
            self.reasoning_timeout,
            self.engine
                .decide(&prompts::system_prompt(), &chat_history, &operation_catalog()),
        )
        .await
        {
            Ok(result) => result?,
            Err(_) => {
                warn!("reasoning engine timed out");
                return Err(AppError::reasoning_unavailable("Reasoning engine timed out"));
            }
        };

        match decision {
            EngineDecision::Text(reply) => Ok(DispatchOutcome::text(reply)),
            EngineDecision::ToolCall(call) => {
                let operation = match OperationCall::from_function_call(&call) {
                    Ok(operation) => operation,
                    Err(err) => {
                        // Schema-invalid engine output never reaches the
                        // gateway; ask the user instead of guessing.
                        warn!(operation = %call.name, error = %err, "rejected engine tool call");
                        return Ok(DispatchOutcome::text(
                            "I'm not sure I understood that correctly. \
                             Could you rephrase what you'd like me to do with your tasks?",
                        ));
                    }
                };

                debug!(operation = operation.name(), "executing validated operation");
                self.execute(user_id, operation).await
            }
        }
    }

    async fn execute(&self, user_id: Uuid, operation: OperationCall) -> AppResult<DispatchOutcome> {
        match operation {
            OperationCall::CreateTask { title, description } => {
                let arguments = json!({"title": title, "description": description});
                match self
                    .gateway
                    .create_task(user_id, &title, description.as_deref())
                    .await
                {
                    Ok(task) => Ok(succeeded(
                        "create_task",
                        arguments,
                        &task,
                        format!("I've created a task for you: '{}'.", task.title),
                    )),
                    Err(err) => failed_or_propagate("create_task", arguments, err),
                }
            }
            OperationCall::ListTasks {
                status,
                limit,
                offset,
            } => {
                let arguments = json!({"status": status, "limit": limit, "offset": offset});
                match self.gateway.list_tasks(user_id, status, limit, offset).await {
                    Ok(tasks) => {
                        let reply = render_task_list(status, &tasks);
                        Ok(DispatchOutcome {
                            reply,
                            invocation: Some(InvocationDraft {
                                tool_name: "list_tasks".to_owned(),
                                arguments,
                                result: Some(json!({"tasks": tasks, "count": tasks.len()})),
                                error: None,
                                status: InvocationStatus::Succeeded,
                            }),
                        })
                    }
                    Err(err) => failed_or_propagate("list_tasks", arguments, err),
                }
            }
            OperationCall::GetTask { task } => match self.resolve(user_id, &task).await? {
                Resolution::Clarify(reply) => Ok(DispatchOutcome::text(reply)),
                Resolution::Found(found) => {
                    let arguments = json!({"task_id": found.id});
                    let state = if found.completed { "completed" } else { "pending" };
                    let mut reply = format!("'{}' is {state}.", found.title);
                    if !found.description.is_empty() {
                        let _ = write!(reply, " Notes: {}", found.description);
                    }
                    Ok(succeeded("get_task", arguments, &found, reply))
                }
            },
            OperationCall::UpdateTask {
                task,
                title,
                description,
            } => match self.resolve(user_id, &task).await? {
                Resolution::Clarify(reply) => Ok(DispatchOutcome::text(reply)),
                Resolution::Found(found) => {
                    let arguments =
                        json!({"task_id": found.id, "title": title, "description": description});
                    match self
                        .gateway
                        .update_task(user_id, found.id, title.as_deref(), description.as_deref())
                        .await
                    {
                        Ok(updated) => Ok(succeeded(
                            "update_task",
                            arguments,
                            &updated,
                            format!("I've updated the task: '{}'.", updated.title),
                        )),
                        Err(err) => failed_or_propagate("update_task", arguments, err),
                    }
                }
            },
            OperationCall::DeleteTask { task } => match self.resolve(user_id, &task).await? {
                Resolution::Clarify(reply) => Ok(DispatchOutcome::text(reply)),
                Resolution::Found(found) => {
                    let arguments = json!({"task_id": found.id});
                    match self.gateway.delete_task(user_id, found.id).await {
                        Ok(deleted) => Ok(succeeded(
                            "delete_task",
                            arguments,
                            &deleted,
                            format!("I've deleted the task '{}'.", deleted.title),
                        )),
                        Err(err) => failed_or_propagate("delete_task", arguments, err),
                    }
                }
            },
            OperationCall::SetTaskComplete { task, is_completed } => {
                match self.resolve(user_id, &task).await? {
                    Resolution::Clarify(reply) => Ok(DispatchOutcome::text(reply)),
                    Resolution::Found(found) => {
                        let arguments = json!({"task_id": found.id, "is_completed": is_completed});
                        match self
                            .gateway
                            .set_task_complete(user_id, found.id, is_completed)
                            .await
                        {
                            Ok(updated) => {
                                let word = if is_completed { "completed" } else { "incomplete" };
                                Ok(succeeded(
                                    "set_task_complete",
                                    arguments,
                                    &updated,
                                    format!("I've marked the task '{}' as {word}.", updated.title),
                                ))
                            }
                            Err(err) => failed_or_propagate("set_task_complete", arguments, err),
                        }
                    }
                }
            }
        }
    }

    /// Resolve a textual task reference against the caller's own tasks.
    ///
    /// The lookup reads are not recorded as invocations; only the selected
    /// operation is.
    async fn resolve(&self, user_id: Uuid, reference: &str) -> AppResult<Resolution> {
        let reference = reference.trim();

        if let Ok(task_id) = Uuid::parse_str(reference) {
            return match self.gateway.get_task(user_id, task_id).await {
                Ok(task) => Ok(Resolution::Found(task)),
                Err(err) if err.code == ErrorCode::ResourceNotFound => Ok(Resolution::Clarify(
                    "I couldn't find that task. Could you check which one you mean?".to_owned(),
                )),
                Err(err) => Err(err),
            };
        }

        let tasks = self
            .gateway
            .list_tasks(user_id, TaskFilter::All, Some(RESOLUTION_FETCH_LIMIT), None)
            .await?;

        if tasks.is_empty() {
            return Ok(Resolution::Clarify(
                "You don't have any tasks yet, so there's nothing to do here.".to_owned(),
            ));
        }

        if let Some(ordinal) = parse_ordinal(reference) {
            return Ok(match tasks.get(ordinal - 1) {
                Some(task) => Resolution::Found(task.clone()),
                None => Resolution::Clarify(format!(
                    "Task #{ordinal} doesn't exist. You have {} tasks.",
                    tasks.len()
                )),
            });
        }

        let matches: Vec<&Task> = tasks
            .iter()
            .filter(|t| t.title.eq_ignore_ascii_case(reference))
            .collect();

        match matches.as_slice() {
            [only] => Ok(Resolution::Found((*only).clone())),
            [] => Ok(Resolution::Clarify(format!(
                "I couldn't find a task matching '{reference}'. \
                 Please specify the task number or check the task name."
            ))),
            several => {
                let titles: Vec<String> = several
                    .iter()
                    .enumerate()
                    .map(|(i, t)| format!("{}. {}", i + 1, t.title))
                    .collect();
                Ok(Resolution::Clarify(format!(
                    "You have more than one task with that name. Which one do you mean?\n{}",
                    titles.join("\n")
                )))
            }
        }
    }
}

fn succeeded(
    tool_name: &str,
    arguments: serde_json::Value,
    task: &Task,
    reply: String,
) -> DispatchOutcome {
    DispatchOutcome {
        reply,
        invocation: Some(InvocationDraft {
            tool_name: tool_name.to_owned(),
            arguments,
            result: Some(json!({"task": task})),
            error: None,
            status: InvocationStatus::Succeeded,
        }),
    }
}

/// A typed gateway failure becomes a failed invocation with a friendly
/// reply; storage and internal failures abort the turn instead.
fn failed_or_propagate(
    tool_name: &str,
    arguments: serde_json::Value,
    err: AppError,
) -> AppResult<DispatchOutcome> {
    match err.code {
        ErrorCode::DatabaseError | ErrorCode::InternalError | ErrorCode::ConfigError => Err(err),
        _ => {
            warn!(operation = tool_name, error = %err, "gateway call failed");
            Ok(DispatchOutcome {
                reply: format!("I'm sorry, I couldn't do that: {}.", err.message),
                invocation: Some(InvocationDraft {
                    tool_name: tool_name.to_owned(),
                    arguments,
                    result: None,
                    error: Some(err.message),
                    status: InvocationStatus::Failed,
                }),
            })
        }
    }
}

fn render_task_list(filter: TaskFilter, tasks: &[Task]) -> String {
    let label = match filter {
        TaskFilter::All => "",
        TaskFilter::Completed => "completed ",
        TaskFilter::Pending => "pending ",
    };

    if tasks.is_empty() {
        return format!("You don't have any {label}tasks.");
    }

    let lines: Vec<String> = tasks
        .iter()
        .enumerate()
        .map(|(i, task)| {
            let mark = if task.completed { "\u{2713}" } else { "\u{25cb}" };
            format!("{}. {mark} {}", i + 1, task.title)
        })
        .collect();

    format!("Here are your {label}tasks:\n{}", lines.join("\n"))
}

/// Accepts "3" and "#3"; ordinals are 1-based positions in the listing
fn parse_ordinal(reference: &str) -> Option<usize> {
    let digits = reference.strip_prefix('#').unwrap_or(reference);
    match digits.parse::<usize>() {
        Ok(n) if n >= 1 => Some(n),
        _ => None,
    }
}
