// ABOUTME: The fixed operation catalog and the closed, validated operation-call enum
// ABOUTME: Re-validates every engine-produced call before it can reach the gateway
//
// SPDX-License-Identifier: MIT OR Apache-2.0

//! # Operation Catalog
//!
//! The six task operations are the only actions the reasoning engine can
//! request. [`operation_catalog`] produces their schemas for the engine;
//! [`OperationCall::from_function_call`] parses an engine response back into
//! a closed enum, rejecting unknown names and schema-invalid arguments. An
//! operation name outside the catalog can therefore never execute,
//! regardless of what the engine claims.

use crate::errors::{AppError, AppResult};
use crate::llm::{FunctionCall, FunctionDeclaration};
use crate::models::TaskFilter;
use serde_json::{json, Value};

/// Operation name: create a task
pub const OP_CREATE_TASK: &str = "create_task";
/// Operation name: list tasks
pub const OP_LIST_TASKS: &str = "list_tasks";
/// Operation name: fetch one task
pub const OP_GET_TASK: &str = "get_task";
/// Operation name: update title/description
pub const OP_UPDATE_TASK: &str = "update_task";
/// Operation name: delete a task
pub const OP_DELETE_TASK: &str = "delete_task";
/// Operation name: set the completion flag
pub const OP_SET_TASK_COMPLETE: &str = "set_task_complete";

/// A validated call into the task operation gateway.
///
/// Task references stay textual here; the dispatcher resolves them to ids
/// against the caller's own tasks.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OperationCall {
    /// Create a new task
    CreateTask {
        /// Task title, non-empty
        title: String,
        /// Optional free-form description
        description: Option<String>,
    },
    /// List the caller's tasks
    ListTasks {
        /// Completion filter
        status: TaskFilter,
        /// Page size
        limit: Option<i64>,
        /// Page offset
        offset: Option<i64>,
    },
    /// Fetch one task
    GetTask {
        /// Task reference: id, ordinal, or title
        task: String,
    },
    /// Update a task's title and/or description
    UpdateTask {
        /// Task reference
        task: String,
        /// New title, if changing
        title: Option<String>,
        /// New description, if changing
        description: Option<String>,
    },
    /// Delete a task
    DeleteTask {
        /// Task reference
        task: String,
    },
    /// Set a task's completion flag
    SetTaskComplete {
        /// Task reference
        task: String,
        /// Desired completion state
        is_completed: bool,
    },
}

impl OperationCall {
    /// The operation's catalog name
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::CreateTask { .. } => OP_CREATE_TASK,
            Self::ListTasks { .. } => OP_LIST_TASKS,
            Self::GetTask { .. } => OP_GET_TASK,
            Self::UpdateTask { .. } => OP_UPDATE_TASK,
            Self::DeleteTask { .. } => OP_DELETE_TASK,
            Self::SetTaskComplete { .. } => OP_SET_TASK_COMPLETE,
        }
    }

    /// Whether the operation mutates the task store
    #[must_use]
    pub const fn is_mutation(&self) -> bool {
        !matches!(self, Self::ListTasks { .. } | Self::GetTask { .. })
    }

    /// Parse and validate an engine-produced call.
    ///
    /// # Errors
    ///
    /// Returns invalid-input for an unknown operation name, missing-field
    /// for absent required arguments, and invalid-input for arguments
    /// outside their schema.
    pub fn from_function_call(call: &FunctionCall) -> AppResult<Self> {
        let args = &call.args;
        match call.name.as_str() {
            OP_CREATE_TASK => Ok(Self::CreateTask {
                title: required_string(args, "title")?,
                description: optional_description(args, "description")?,
            }),
            OP_LIST_TASKS => {
                let status = match optional_string(args, "status")? {
                    Some(raw) => TaskFilter::parse(&raw).ok_or_else(|| {
                        AppError::invalid_input(format!(
                            "status must be one of all, completed, pending; got: {raw}"
                        ))
                    })?,
                    None => TaskFilter::All,
                };
                Ok(Self::ListTasks {
                    status,
                    limit: optional_integer(args, "limit")?,
                    offset: optional_integer(args, "offset")?,
                })
            }
            OP_GET_TASK => Ok(Self::GetTask {
                task: required_string(args, "task")?,
            }),
            OP_UPDATE_TASK => {
                let title = optional_string(args, "title")?;
                let description = optional_description(args, "description")?;
                if title.is_none() && description.is_none() {
                    return Err(AppError::invalid_input(
                        "update_task requires a new title or description",
                    ));
                }
                Ok(Self::UpdateTask {
                    task: required_string(args, "task")?,
                    title,
                    description,
                })
            }
            OP_DELETE_TASK => Ok(Self::DeleteTask {
                task: required_string(args, "task")?,
            }),
            OP_SET_TASK_COMPLETE => Ok(Self::SetTaskComplete {
                task: required_string(args, "task")?,
                is_completed: required_bool(args, "is_completed")?,
            }),
            other => Err(AppError::invalid_input(format!(
                "Unknown operation: {other}"
            ))),
        }
    }
}

/// The schemas of the six operations, in catalog order
#[must_use]
pub fn operation_catalog() -> Vec<FunctionDeclaration> {
    let task_ref = json!({
        "type": "string",
        "description": "Which task: its id, its number in the last listing, or its exact title"
    });

    vec![
        FunctionDeclaration {
            name: OP_CREATE_TASK.to_owned(),
            description: "Create a new todo task for the user".to_owned(),
            parameters: json!({
                "type": "object",
                "properties": {
                    "title": {"type": "string", "description": "Short task title"},
                    "description": {"type": "string", "description": "Optional details"}
                },
                "required": ["title"]
            }),
        },
        FunctionDeclaration {
            name: OP_LIST_TASKS.to_owned(),
            description: "List the user's tasks, optionally filtered by completion".to_owned(),
            parameters: json!({
                "type": "object",
                "properties": {
                    "status": {
                        "type": "string",
                        "enum": ["all", "completed", "pending"],
                        "description": "Completion filter, defaults to all"
                    },
                    "limit": {"type": "integer", "description": "Page size"},
                    "offset": {"type": "integer", "description": "Page offset"}
                }
            }),
        },
        FunctionDeclaration {
            name: OP_GET_TASK.to_owned(),
            description: "Show the details of one task".to_owned(),
            parameters: json!({
                "type": "object",
                "properties": {"task": task_ref},
                "required": ["task"]
            }),
        },
        FunctionDeclaration {
            name: OP_UPDATE_TASK.to_owned(),
            description: "Change a task's title or description".to_owned(),
            parameters: json!({
                "type": "object",
                "properties": {
                    "task": task_ref,
                    "title": {"type": "string", "description": "New title"},
                    "description": {
                        "type": "string",
                        "description": "New description; an empty string clears it"
                    }
                },
                "required": ["task"]
            }),
        },
        FunctionDeclaration {
            name: OP_DELETE_TASK.to_owned(),
            description: "Delete a task permanently".to_owned(),
            parameters: json!({
                "type": "object",
                "properties": {"task": task_ref},
                "required": ["task"]
            }),
        },
        FunctionDeclaration {
            name: OP_SET_TASK_COMPLETE.to_owned(),
            description: "Mark a task completed or reopen it".to_owned(),
            parameters: json!({
                "type": "object",
                "properties": {
                    "task": task_ref,
                    "is_completed": {
                        "type": "boolean",
                        "description": "true to complete, false to reopen"
                    }
                },
                "required": ["task", "is_completed"]
            }),
        },
    ]
}

fn required_string(args: &Value, field: &str) -> AppResult<String> {
    optional_string(args, field)?.ok_or_else(|| AppError::missing_field(field))
}

fn optional_string(args: &Value, field: &str) -> AppResult<Option<String>> {
    match args.get(field) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(s)) if s.trim().is_empty() => {
            Err(AppError::invalid_input(format!("{field} must not be empty")))
        }
        Some(Value::String(s)) => Ok(Some(s.trim().to_owned())),
        Some(other) => Err(AppError::invalid_input(format!(
            "{field} must be a string, got: {other}"
        ))),
    }
}

// Descriptions may be set to the empty string to clear them, unlike titles.
fn optional_description(args: &Value, field: &str) -> AppResult<Option<String>> {
    match args.get(field) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(s)) => Ok(Some(s.trim().to_owned())),
        Some(other) => Err(AppError::invalid_input(format!(
            "{field} must be a string, got: {other}"
        ))),
    }
}

fn optional_integer(args: &Value, field: &str) -> AppResult<Option<i64>> {
    match args.get(field) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::Number(n)) => n
            .as_i64()
            .map(Some)
            .ok_or_else(|| AppError::invalid_input(format!("{field} must be an integer"))),
        Some(other) => Err(AppError::invalid_input(format!(
            "{field} must be an integer, got: {other}"
        ))),
    }
}

fn required_bool(args: &Value, field: &str) -> AppResult<bool> {
    match args.get(field) {
        None | Some(Value::Null) => Err(AppError::missing_field(field)),
        Some(Value::Bool(b)) => Ok(*b),
        Some(other) => Err(AppError::invalid_input(format!(
            "{field} must be a boolean, got: {other}"
        ))),
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    use super::*;
    use serde_json::json;

    fn call(name: &str, args: Value) -> FunctionCall {
        FunctionCall {
            name: name.to_owned(),
            args,
        }
    }

    #[test]
    fn test_catalog_has_six_operations() {
        let catalog = operation_catalog();
        assert_eq!(catalog.len(), 6);
        let names: Vec<_> = catalog.iter().map(|d| d.name.as_str()).collect();
        assert!(names.contains(&OP_CREATE_TASK));
        assert!(names.contains(&OP_SET_TASK_COMPLETE));
    }

    #[test]
    fn test_unknown_operation_rejected() {
        let err = OperationCall::from_function_call(&call("drop_all_tables", json!({}))).unwrap_err();
        assert_eq!(err.code, crate::errors::ErrorCode::InvalidInput);
    }

    #[test]
    fn test_create_requires_title() {
        let err = OperationCall::from_function_call(&call(OP_CREATE_TASK, json!({}))).unwrap_err();
        assert_eq!(err.code, crate::errors::ErrorCode::MissingRequiredField);

        let parsed = OperationCall::from_function_call(&call(
            OP_CREATE_TASK,
            json!({"title": "buy milk", "description": "two liters"}),
        ))
        .unwrap();
        assert_eq!(
            parsed,
            OperationCall::CreateTask {
                title: "buy milk".to_owned(),
                description: Some("two liters".to_owned()),
            }
        );
    }

    #[test]
    fn test_list_status_is_closed() {
        let err = OperationCall::from_function_call(&call(
            OP_LIST_TASKS,
            json!({"status": "archived"}),
        ))
        .unwrap_err();
        assert_eq!(err.code, crate::errors::ErrorCode::InvalidInput);

        let parsed =
            OperationCall::from_function_call(&call(OP_LIST_TASKS, json!({"status": "pending"})))
                .unwrap();
        assert_eq!(
            parsed,
            OperationCall::ListTasks {
                status: TaskFilter::Pending,
                limit: None,
                offset: None,
            }
        );
    }

    #[test]
    fn test_update_requires_some_change() {
        let err = OperationCall::from_function_call(&call(
            OP_UPDATE_TASK,
            json!({"task": "buy milk"}),
        ))
        .unwrap_err();
        assert_eq!(err.code, crate::errors::ErrorCode::InvalidInput);
    }

    #[test]
    fn test_update_accepts_empty_description_to_clear_it() {
        let parsed = OperationCall::from_function_call(&call(
            OP_UPDATE_TASK,
            json!({"task": "buy milk", "description": ""}),
        ))
        .unwrap();
        assert_eq!(
            parsed,
            OperationCall::UpdateTask {
                task: "buy milk".to_owned(),
                title: None,
                description: Some(String::new()),
            }
        );

        // Titles keep the non-empty rule.
        let err = OperationCall::from_function_call(&call(
            OP_UPDATE_TASK,
            json!({"task": "buy milk", "title": ""}),
        ))
        .unwrap_err();
        assert_eq!(err.code, crate::errors::ErrorCode::InvalidInput);
    }

    #[test]
    fn test_set_complete_requires_bool() {
        let err = OperationCall::from_function_call(&call(
            OP_SET_TASK_COMPLETE,
            json!({"task": "buy milk", "is_completed": "yes"}),
        ))
        .unwrap_err();
        assert_eq!(err.code, crate::errors::ErrorCode::InvalidInput);

        let parsed = OperationCall::from_function_call(&call(
            OP_SET_TASK_COMPLETE,
            json!({"task": "buy milk", "is_completed": true}),
        ))
        .unwrap();
        assert!(parsed.is_mutation());
    }
}
