//! # Store Access Layer
//!
//! Trait seams over the relational store, plus the Postgres implementations.
//! Handlers, the purge engine, and the scheduler depend only on these traits,
//! which keeps the concurrency-sensitive logic testable against in-memory
//! collaborators.
//!
//! Expected, frequent outcomes (duplicate key, zero rows matched) are
//! surfaced as values, not errors; [`StoreError`] is reserved for the
//! infrastructure failures that make a result unknowable.

pub mod postgres;
pub mod version;

use crate::models::{NewRefreshSession, NewTaskRecord, RefreshSession, TaskRecord};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;
use uuid::Uuid;

pub use postgres::{PgAdvisoryLock, PgSessionStore, PgTaskStore};
pub use version::VersionToken;

/// Store access failures.
#[derive(Debug, Error)]
pub enum StoreError {
    /// A keyed insert hit the table's uniqueness constraint.
    #[error("Unique constraint violated on {table}: key {key}")]
    UniqueViolation { table: String, key: String },

    /// The store could not complete the operation; the caller may retry.
    #[error("Store unavailable during {operation}: {message}")]
    Unavailable { operation: String, message: String },
}

impl StoreError {
    pub fn unique_violation(table: impl Into<String>, key: impl std::fmt::Display) -> Self {
        Self::UniqueViolation {
            table: table.into(),
            key: key.to_string(),
        }
    }

    pub fn unavailable(operation: impl Into<String>, message: impl std::fmt::Display) -> Self {
        Self::Unavailable {
            operation: operation.into(),
            message: message.to_string(),
        }
    }

    /// Translate an sqlx failure, preserving uniqueness-violation signaling.
    pub fn from_sqlx(operation: &str, table: &str, key: impl std::fmt::Display, err: sqlx::Error) -> Self {
        if let sqlx::Error::Database(db_err) = &err {
            if db_err.is_unique_violation() {
                return Self::unique_violation(table, key);
            }
        }
        Self::unavailable(operation, err)
    }
}

/// Keyed task storage with uniqueness signaling and a conditional write.
#[async_trait]
pub trait TaskStore: Send + Sync {
    /// Insert a new task row. Fails with [`StoreError::UniqueViolation`]
    /// when the id is already taken; the store's constraint is the arbiter
    /// for concurrent creates.
    async fn insert(&self, task: &NewTaskRecord) -> Result<(), StoreError>;

    async fn find_by_id(&self, id: i64) -> Result<Option<TaskRecord>, StoreError>;

    /// Current revision token for a row, if it exists.
    async fn current_version(&self, id: i64) -> Result<Option<VersionToken>, StoreError>;

    /// One atomic conditional write: set the name only if the row's current
    /// revision equals `expected`. Returns the new token when the write
    /// landed, `None` when zero rows matched (missing row or stale token;
    /// the caller disambiguates).
    async fn update_name_if_version(
        &self,
        id: i64,
        name: &str,
        expected: &VersionToken,
    ) -> Result<Option<VersionToken>, StoreError>;

    /// Delete by id; `true` when a row was removed.
    async fn delete(&self, id: i64) -> Result<bool, StoreError>;
}

/// Refresh session lifecycle plus the purge engine's two primitives.
#[async_trait]
pub trait SessionStore: Send + Sync {
    async fn insert(&self, session: &NewRefreshSession) -> Result<RefreshSession, StoreError>;

    /// Rotation: replace the token hash and expiry, touch last-seen.
    /// Returns `false` when the session no longer exists.
    async fn rotate(
        &self,
        id: Uuid,
        token_hash: &str,
        expires_at: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> Result<bool, StoreError>;

    /// Revocation (logout). Returns `false` when the session no longer exists.
    async fn revoke(&self, id: Uuid, now: DateTime<Utc>) -> Result<bool, StoreError>;

    /// Up to `limit` purge-eligible ids (`expires_at < now` or revoked),
    /// ordered by id ascending so successive batches never re-scan survivors.
    async fn select_purgeable(
        &self,
        now: DateTime<Utc>,
        limit: i64,
    ) -> Result<Vec<Uuid>, StoreError>;

    /// Delete exactly the given ids in one statement; returns rows removed.
    async fn delete_by_ids(&self, ids: &[Uuid]) -> Result<u64, StoreError>;
}

/// Cluster-wide, non-blocking named mutual exclusion.
///
/// Backed by Postgres advisory locks in production. `try_acquire` must never
/// block: losing the race is the expected steady state on all but one
/// replica.
#[async_trait]
pub trait ClusterLock: Send + Sync {
    async fn try_acquire(&self, key: i64) -> Result<bool, StoreError>;

    /// Release a previously acquired key. Callers run this on every exit
    /// path of their critical section.
    async fn release(&self, key: i64) -> Result<(), StoreError>;
}
