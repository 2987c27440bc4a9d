//! # Task Service
//!
//! The concurrency-sensitive task operations: idempotent creation under
//! at-least-once delivery and version-checked updates against the shared
//! store. Expected outcomes (replay, conflict, stale token) come back as
//! enum values so callers branch without inspecting message text; only
//! infrastructure failures are errors.

use crate::models::{NewTaskRecord, TaskRecord};
use crate::storage::{StoreError, TaskStore, VersionToken};
use std::sync::Arc;
use tracing::{debug, info};

/// Outcome of an idempotent create.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CreateOutcome {
    /// A new row was inserted.
    Created,
    /// A row with the same id and same content already exists; the message
    /// was redelivered and this call is a no-op success.
    Replayed,
    /// A row with the same id but different content exists. Definitive
    /// rejection; retrying cannot resolve a genuine content mismatch.
    Conflict,
}

/// Outcome of a version-checked name update.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UpdateOutcome {
    /// The conditional write landed; the new token allows chaining further
    /// updates without a re-fetch.
    Updated { token: VersionToken },
    /// No row with this id exists. Terminal for the caller.
    NotFound,
    /// The row exists but the presented token is stale; a concurrent writer
    /// got there first. The caller may re-fetch and retry.
    PreconditionFailed,
    /// No token was presented. Rejected before touching the store.
    PreconditionRequired,
}

/// Task operations over any [`TaskStore`].
pub struct TaskService {
    store: Arc<dyn TaskStore>,
}

impl TaskService {
    pub fn new(store: Arc<dyn TaskStore>) -> Self {
        Self { store }
    }

    /// Idempotent create with caller-assigned id.
    ///
    /// The store's uniqueness constraint is the arbiter between concurrent
    /// creates: both may attempt the insert, exactly one wins, and the loser
    /// reconciles by re-reading and comparing content instead of assuming
    /// failure. A row that vanished between the violation and the re-read
    /// (a race with a concurrent delete) re-raises the original violation,
    /// which is retryable; the next attempt will insert cleanly.
    pub async fn create_task(&self, request: &NewTaskRecord) -> Result<CreateOutcome, StoreError> {
        match self.store.insert(request).await {
            Ok(()) => {
                info!(task_id = request.id, "Task created");
                Ok(CreateOutcome::Created)
            }
            Err(StoreError::UniqueViolation { table, key }) => {
                match self.store.find_by_id(request.id).await? {
                    None => Err(StoreError::UniqueViolation { table, key }),
                    Some(existing) if request.matches(&existing) => {
                        debug!(task_id = request.id, "Duplicate create replayed as no-op");
                        Ok(CreateOutcome::Replayed)
                    }
                    Some(_) => {
                        debug!(task_id = request.id, "Duplicate create with conflicting content");
                        Ok(CreateOutcome::Conflict)
                    }
                }
            }
            Err(e) => Err(e),
        }
    }

    /// Version-checked rename.
    ///
    /// `if_match` is the raw token as the caller presented it (possibly
    /// ETag-decorated); normalization happens here, once.
    pub async fn update_task_name(
        &self,
        id: i64,
        new_name: &str,
        if_match: Option<&str>,
    ) -> Result<UpdateOutcome, StoreError> {
        let token = match if_match {
            Some(raw) => VersionToken::new(raw),
            None => return Ok(UpdateOutcome::PreconditionRequired),
        };
        if token.is_empty() {
            return Ok(UpdateOutcome::PreconditionRequired);
        }

        match self
            .store
            .update_name_if_version(id, new_name, &token)
            .await?
        {
            Some(new_token) => {
                info!(task_id = id, "Task name updated");
                Ok(UpdateOutcome::Updated { token: new_token })
            }
            None => {
                // Zero rows affected has two distinct causes with different
                // retry strategies; a follow-up existence check tells them
                // apart.
                match self.store.find_by_id(id).await? {
                    None => Ok(UpdateOutcome::NotFound),
                    Some(_) => Ok(UpdateOutcome::PreconditionFailed),
                }
            }
        }
    }

    /// Explicit delete; `true` when a row was removed.
    pub async fn delete_task(&self, id: i64) -> Result<bool, StoreError> {
        let deleted = self.store.delete(id).await?;
        if deleted {
            info!(task_id = id, "Task deleted");
        }
        Ok(deleted)
    }

    /// Fetch a task row.
    pub async fn find_task(&self, id: i64) -> Result<Option<TaskRecord>, StoreError> {
        self.store.find_by_id(id).await
    }

    /// Current revision token, for callers priming a conditional update.
    pub async fn current_version(&self, id: i64) -> Result<Option<VersionToken>, StoreError> {
        self.store.current_version(id).await
    }
}
