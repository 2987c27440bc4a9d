//! # Postgres Store Implementations
//!
//! sqlx-backed implementations of the store traits. The optimistic
//! concurrency token rides on `xmin`, Postgres's per-row revision counter,
//! so application code never generates versions. The cluster lock wraps
//! `pg_try_advisory_lock`; advisory locks are session-scoped, so each
//! acquired key pins one pool connection until release.

use crate::models::{NewRefreshSession, NewTaskRecord, RefreshSession, TaskRecord};
use crate::storage::{ClusterLock, SessionStore, StoreError, TaskStore, VersionToken};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use sqlx::pool::PoolConnection;
use sqlx::{PgPool, Postgres};
use std::collections::HashMap;
use tracing::{debug, warn};
use uuid::Uuid;

const TASK_COLUMNS: &str = "id, name, payload, created_at, updated_at";

/// Task storage over `campus_tasks`.
#[derive(Debug, Clone)]
pub struct PgTaskStore {
    pool: PgPool,
}

impl PgTaskStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl TaskStore for PgTaskStore {
    async fn insert(&self, task: &NewTaskRecord) -> Result<(), StoreError> {
        sqlx::query("INSERT INTO campus_tasks (id, name, payload) VALUES ($1, $2, $3)")
            .bind(task.id)
            .bind(&task.name)
            .bind(&task.payload)
            .execute(&self.pool)
            .await
            .map_err(|e| StoreError::from_sqlx("task_insert", "campus_tasks", task.id, e))?;
        Ok(())
    }

    async fn find_by_id(&self, id: i64) -> Result<Option<TaskRecord>, StoreError> {
        sqlx::query_as::<_, TaskRecord>(&format!(
            "SELECT {TASK_COLUMNS} FROM campus_tasks WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| StoreError::unavailable("task_find", e))
    }

    async fn current_version(&self, id: i64) -> Result<Option<VersionToken>, StoreError> {
        let token = sqlx::query_scalar::<_, String>(
            "SELECT xmin::text FROM campus_tasks WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| StoreError::unavailable("task_current_version", e))?;
        Ok(token.map(VersionToken::new))
    }

    async fn update_name_if_version(
        &self,
        id: i64,
        name: &str,
        expected: &VersionToken,
    ) -> Result<Option<VersionToken>, StoreError> {
        // One conditional statement, not read-then-write: the revision check
        // and the write are a single atomic operation at the store.
        let token = sqlx::query_scalar::<_, String>(
            "UPDATE campus_tasks SET name = $2, updated_at = NOW() \
             WHERE id = $1 AND xmin::text = $3 \
             RETURNING xmin::text",
        )
        .bind(id)
        .bind(name)
        .bind(expected.as_str())
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| StoreError::unavailable("task_conditional_update", e))?;
        Ok(token.map(VersionToken::new))
    }

    async fn delete(&self, id: i64) -> Result<bool, StoreError> {
        let result = sqlx::query("DELETE FROM campus_tasks WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(|e| StoreError::unavailable("task_delete", e))?;
        Ok(result.rows_affected() > 0)
    }
}

/// Refresh session storage over `campus_refresh_sessions`.
#[derive(Debug, Clone)]
pub struct PgSessionStore {
    pool: PgPool,
}

impl PgSessionStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl SessionStore for PgSessionStore {
    async fn insert(&self, session: &NewRefreshSession) -> Result<RefreshSession, StoreError> {
        let row = session.clone().into_session(Utc::now());
        sqlx::query(
            "INSERT INTO campus_refresh_sessions \
             (id, user_id, token_hash, device_fingerprint_hash, issued_at, last_seen_at, expires_at, revoked_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, NULL)",
        )
        .bind(row.id)
        .bind(row.user_id)
        .bind(&row.token_hash)
        .bind(&row.device_fingerprint_hash)
        .bind(row.issued_at)
        .bind(row.last_seen_at)
        .bind(row.expires_at)
        .execute(&self.pool)
        .await
        .map_err(|e| StoreError::from_sqlx("session_insert", "campus_refresh_sessions", row.id, e))?;
        Ok(row)
    }

    async fn rotate(
        &self,
        id: Uuid,
        token_hash: &str,
        expires_at: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> Result<bool, StoreError> {
        let result = sqlx::query(
            "UPDATE campus_refresh_sessions \
             SET token_hash = $2, expires_at = $3, last_seen_at = $4 \
             WHERE id = $1 AND revoked_at IS NULL",
        )
        .bind(id)
        .bind(token_hash)
        .bind(expires_at)
        .bind(now)
        .execute(&self.pool)
        .await
        .map_err(|e| StoreError::unavailable("session_rotate", e))?;
        Ok(result.rows_affected() > 0)
    }

    async fn revoke(&self, id: Uuid, now: DateTime<Utc>) -> Result<bool, StoreError> {
        let result = sqlx::query(
            "UPDATE campus_refresh_sessions SET revoked_at = $2 \
             WHERE id = $1 AND revoked_at IS NULL",
        )
        .bind(id)
        .bind(now)
        .execute(&self.pool)
        .await
        .map_err(|e| StoreError::unavailable("session_revoke", e))?;
        Ok(result.rows_affected() > 0)
    }

    async fn select_purgeable(
        &self,
        now: DateTime<Utc>,
        limit: i64,
    ) -> Result<Vec<Uuid>, StoreError> {
        sqlx::query_scalar::<_, Uuid>(
            "SELECT id FROM campus_refresh_sessions \
             WHERE expires_at < $1 OR revoked_at IS NOT NULL \
             ORDER BY id ASC LIMIT $2",
        )
        .bind(now)
        .bind(limit)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| StoreError::unavailable("session_select_purgeable", e))
    }

    async fn delete_by_ids(&self, ids: &[Uuid]) -> Result<u64, StoreError> {
        if ids.is_empty() {
            return Ok(0);
        }
        let result = sqlx::query("DELETE FROM campus_refresh_sessions WHERE id = ANY($1)")
            .bind(ids)
            .execute(&self.pool)
            .await
            .map_err(|e| StoreError::unavailable("session_delete_batch", e))?;
        Ok(result.rows_affected())
    }
}

/// Cluster-wide mutual exclusion via Postgres advisory locks.
///
/// `pg_try_advisory_lock` grants are tied to the acquiring session, so the
/// connection that won a key is checked out of the pool and held until the
/// matching [`ClusterLock::release`].
pub struct PgAdvisoryLock {
    pool: PgPool,
    held: Mutex<HashMap<i64, PoolConnection<Postgres>>>,
}

impl PgAdvisoryLock {
    pub fn new(pool: PgPool) -> Self {
        Self {
            pool,
            held: Mutex::new(HashMap::new()),
        }
    }
}

#[async_trait]
impl ClusterLock for PgAdvisoryLock {
    async fn try_acquire(&self, key: i64) -> Result<bool, StoreError> {
        if self.held.lock().contains_key(&key) {
            // Already held by this process; callers treat this like losing
            // the race rather than recursing into the critical section.
            return Ok(false);
        }

        let mut conn = self
            .pool
            .acquire()
            .await
            .map_err(|e| StoreError::unavailable("advisory_lock_acquire", e))?;
        let acquired = sqlx::query_scalar::<_, bool>("SELECT pg_try_advisory_lock($1)")
            .bind(key)
            .fetch_one(&mut *conn)
            .await
            .map_err(|e| StoreError::unavailable("advisory_lock_acquire", e))?;

        if acquired {
            debug!(key, "Advisory lock acquired");
            self.held.lock().insert(key, conn);
        } else {
            debug!(key, "Advisory lock busy");
        }
        Ok(acquired)
    }

    async fn release(&self, key: i64) -> Result<(), StoreError> {
        let conn = self.held.lock().remove(&key);
        let Some(mut conn) = conn else {
            warn!(key, "Release requested for a lock this process does not hold");
            return Ok(());
        };

        sqlx::query_scalar::<_, bool>("SELECT pg_advisory_unlock($1)")
            .bind(key)
            .fetch_one(&mut *conn)
            .await
            .map_err(|e| StoreError::unavailable("advisory_lock_release", e))?;
        debug!(key, "Advisory lock released");
        Ok(())
    }
}
