//! # Task Action Handlers
//!
//! The business handlers registered with the dispatcher. Each one follows
//! the same shape: decode the payload, call the task service, route a
//! callback on success, and triage every failure into the redelivery
//! taxonomy exactly once, at this boundary. Inner logic stays free of
//! redelivery concerns.

use crate::messaging::dispatcher::{ActionHandler, HandlerContext};
use crate::messaging::errors::HandlerError;
use crate::messaging::message::{ActionMessage, TaskResultPayload, TaskStatus};
use crate::models::NewTaskRecord;
use crate::orchestration::task_service::{CreateOutcome, TaskService, UpdateOutcome};
use crate::storage::StoreError;
use async_trait::async_trait;
use serde::Deserialize;
use std::sync::Arc;
use tracing::debug;

/// Payload of a `CreateTask` message.
#[derive(Debug, Deserialize)]
pub struct CreateTaskPayload {
    pub id: i64,
    pub name: String,
    #[serde(default)]
    pub payload: Option<serde_json::Value>,
}

/// Payload of an `UpdateTask` message.
#[derive(Debug, Deserialize)]
pub struct UpdateTaskPayload {
    pub id: i64,
    pub name: String,
    /// Version token the sender last observed, possibly ETag-decorated.
    #[serde(default)]
    pub if_match: Option<String>,
}

/// Payload of a `DeleteTask` message.
#[derive(Debug, Deserialize)]
pub struct DeleteTaskPayload {
    pub id: i64,
}

/// Triage for failures that escape the domain logic: everything unexpected
/// is transient unless shutdown is already in progress, in which case the
/// message is neither bad nor in need of a retry penalty.
fn triage_store_failure(err: StoreError, ctx: &HandlerContext) -> HandlerError {
    if ctx.cancellation.is_cancelled() {
        return HandlerError::Cancelled;
    }
    HandlerError::retryable_with("store operation failed", err)
}

fn decode_payload<'de, T: Deserialize<'de>>(
    action: &str,
    payload: &'de serde_json::Value,
) -> Result<T, HandlerError> {
    T::deserialize(payload)
        .map_err(|e| HandlerError::non_retryable_with(format!("invalid {action} payload"), e))
}

/// Handles `CreateTask`: idempotent creation keyed on the caller-assigned id.
pub struct CreateTaskHandler {
    service: Arc<TaskService>,
}

impl CreateTaskHandler {
    pub fn new(service: Arc<TaskService>) -> Self {
        Self { service }
    }
}

#[async_trait]
impl ActionHandler for CreateTaskHandler {
    async fn handle(
        &self,
        message: &ActionMessage,
        ctx: &HandlerContext,
    ) -> Result<(), HandlerError> {
        let payload: CreateTaskPayload = decode_payload("CreateTask", &message.payload)?;
        if payload.name.trim().is_empty() {
            return Err(HandlerError::non_retryable("task name must not be empty"));
        }

        let request = NewTaskRecord {
            id: payload.id,
            name: payload.name,
            payload: payload.payload,
        };

        match self.service.create_task(&request).await {
            Ok(CreateOutcome::Created) | Ok(CreateOutcome::Replayed) => {
                ctx.route_result(
                    TaskResultPayload {
                        id: request.id,
                        status: TaskStatus::Created,
                    },
                    message,
                )
                .await;
                Ok(())
            }
            Ok(CreateOutcome::Conflict) => Err(HandlerError::non_retryable(format!(
                "task {} already exists with different content",
                request.id
            ))),
            Err(e) => Err(triage_store_failure(e, ctx)),
        }
    }
}

/// Handles `UpdateTask`: version-checked rename.
pub struct UpdateTaskHandler {
    service: Arc<TaskService>,
}

impl UpdateTaskHandler {
    pub fn new(service: Arc<TaskService>) -> Self {
        Self { service }
    }
}

#[async_trait]
impl ActionHandler for UpdateTaskHandler {
    async fn handle(
        &self,
        message: &ActionMessage,
        ctx: &HandlerContext,
    ) -> Result<(), HandlerError> {
        let payload: UpdateTaskPayload = decode_payload("UpdateTask", &message.payload)?;

        match self
            .service
            .update_task_name(payload.id, &payload.name, payload.if_match.as_deref())
            .await
        {
            Ok(UpdateOutcome::Updated { token }) => {
                debug!(task_id = payload.id, new_token = %token, "Update applied");
                ctx.route_result(
                    TaskResultPayload {
                        id: payload.id,
                        status: TaskStatus::Updated,
                    },
                    message,
                )
                .await;
                Ok(())
            }
            Ok(UpdateOutcome::NotFound) => Err(HandlerError::non_retryable(format!(
                "task {} not found",
                payload.id
            ))),
            Ok(UpdateOutcome::PreconditionFailed) => Err(HandlerError::non_retryable(format!(
                "version token for task {} is stale; re-fetch and retry with the current token",
                payload.id
            ))),
            Ok(UpdateOutcome::PreconditionRequired) => Err(HandlerError::non_retryable(
                "update requires the last observed version token",
            )),
            Err(e) => Err(triage_store_failure(e, ctx)),
        }
    }
}

/// Handles `DeleteTask`: explicit removal. Deleting an already-absent task
/// is a no-op success, for the same redelivery reason creates are
/// idempotent.
pub struct DeleteTaskHandler {
    service: Arc<TaskService>,
}

impl DeleteTaskHandler {
    pub fn new(service: Arc<TaskService>) -> Self {
        Self { service }
    }
}

#[async_trait]
impl ActionHandler for DeleteTaskHandler {
    async fn handle(
        &self,
        message: &ActionMessage,
        ctx: &HandlerContext,
    ) -> Result<(), HandlerError> {
        let payload: DeleteTaskPayload = decode_payload("DeleteTask", &message.payload)?;
        match self.service.delete_task(payload.id).await {
            Ok(removed) => {
                if !removed {
                    debug!(task_id = payload.id, "Delete replayed against absent task");
                }
                Ok(())
            }
            Err(e) => Err(triage_store_failure(e, ctx)),
        }
    }
}
