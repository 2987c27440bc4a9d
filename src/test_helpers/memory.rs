//! In-memory collaborators backing the trait seams.
//!
//! State lives behind `parking_lot` mutexes so each implementation is a
//! plain `Send + Sync` value that can be shared across spawned tasks the
//! same way the Postgres-backed ones are. Uniqueness arbitration and
//! conditional writes happen while the state lock is held, which preserves
//! the atomicity the real store provides.

use crate::messaging::broker::{Broker, Delivery};
use crate::messaging::errors::BrokerError;
use crate::models::{NewRefreshSession, NewTaskRecord, RefreshSession, TaskRecord};
use crate::storage::{ClusterLock, SessionStore, StoreError, TaskStore, VersionToken};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use uuid::Uuid;

/// Task store over a hash map, with a per-row revision counter standing in
/// for the store's internal one.
#[derive(Default)]
pub struct InMemoryTaskStore {
    rows: Mutex<HashMap<i64, (TaskRecord, u64)>>,
    revision_counter: AtomicU64,
    fail_all: AtomicBool,
}

impl InMemoryTaskStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every subsequent operation fail as unavailable.
    pub fn fail_all(&self, enabled: bool) {
        self.fail_all.store(enabled, Ordering::SeqCst);
    }

    pub fn row_count(&self) -> usize {
        self.rows.lock().len()
    }

    fn check_available(&self, operation: &str) -> Result<(), StoreError> {
        if self.fail_all.load(Ordering::SeqCst) {
            return Err(StoreError::unavailable(operation, "injected failure"));
        }
        Ok(())
    }

    fn next_revision(&self) -> u64 {
        self.revision_counter.fetch_add(1, Ordering::SeqCst) + 1
    }
}

#[async_trait]
impl TaskStore for InMemoryTaskStore {
    async fn insert(&self, task: &NewTaskRecord) -> Result<(), StoreError> {
        self.check_available("task_insert")?;
        let mut rows = self.rows.lock();
        if rows.contains_key(&task.id) {
            return Err(StoreError::unique_violation("campus_tasks", task.id));
        }
        let now = Utc::now();
        let record = TaskRecord {
            id: task.id,
            name: task.name.clone(),
            payload: task.payload.clone(),
            created_at: now,
            updated_at: now,
        };
        rows.insert(task.id, (record, self.next_revision()));
        Ok(())
    }

    async fn find_by_id(&self, id: i64) -> Result<Option<TaskRecord>, StoreError> {
        self.check_available("task_find")?;
        Ok(self.rows.lock().get(&id).map(|(record, _)| record.clone()))
    }

    async fn current_version(&self, id: i64) -> Result<Option<VersionToken>, StoreError> {
        self.check_available("task_current_version")?;
        Ok(self
            .rows
            .lock()
            .get(&id)
            .map(|(_, revision)| VersionToken::new(revision.to_string())))
    }

    async fn update_name_if_version(
        &self,
        id: i64,
        name: &str,
        expected: &VersionToken,
    ) -> Result<Option<VersionToken>, StoreError> {
        self.check_available("task_conditional_update")?;
        let mut rows = self.rows.lock();
        let Some((record, revision)) = rows.get_mut(&id) else {
            return Ok(None);
        };
        if revision.to_string() != expected.as_str() {
            return Ok(None);
        }
        record.name = name.to_string();
        record.updated_at = Utc::now();
        *revision = self.revision_counter.fetch_add(1, Ordering::SeqCst) + 1;
        Ok(Some(VersionToken::new(revision.to_string())))
    }

    async fn delete(&self, id: i64) -> Result<bool, StoreError> {
        self.check_available("task_delete")?;
        Ok(self.rows.lock().remove(&id).is_some())
    }
}

/// Session store over a hash map, counting select and delete calls so tests
/// can assert batch behavior.
#[derive(Default)]
pub struct InMemorySessionStore {
    rows: Mutex<HashMap<Uuid, RefreshSession>>,
    select_calls: AtomicU64,
    delete_calls: AtomicU64,
    fail_all: AtomicBool,
}

impl InMemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fail_all(&self, enabled: bool) {
        self.fail_all.store(enabled, Ordering::SeqCst);
    }

    /// Insert a fully materialized row, bypassing login semantics.
    pub fn seed(&self, session: RefreshSession) {
        self.rows.lock().insert(session.id, session);
    }

    pub fn row_count(&self) -> usize {
        self.rows.lock().len()
    }

    pub fn contains(&self, id: Uuid) -> bool {
        self.rows.lock().contains_key(&id)
    }

    pub fn select_calls(&self) -> u64 {
        self.select_calls.load(Ordering::SeqCst)
    }

    pub fn delete_calls(&self) -> u64 {
        self.delete_calls.load(Ordering::SeqCst)
    }

    fn check_available(&self, operation: &str) -> Result<(), StoreError> {
        if self.fail_all.load(Ordering::SeqCst) {
            return Err(StoreError::unavailable(operation, "injected failure"));
        }
        Ok(())
    }
}

#[async_trait]
impl SessionStore for InMemorySessionStore {
    async fn insert(&self, session: &NewRefreshSession) -> Result<RefreshSession, StoreError> {
        self.check_available("session_insert")?;
        let row = session.clone().into_session(Utc::now());
        self.rows.lock().insert(row.id, row.clone());
        Ok(row)
    }

    async fn rotate(
        &self,
        id: Uuid,
        token_hash: &str,
        expires_at: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> Result<bool, StoreError> {
        self.check_available("session_rotate")?;
        let mut rows = self.rows.lock();
        match rows.get_mut(&id) {
            Some(row) if row.revoked_at.is_none() => {
                row.token_hash = token_hash.to_string();
                row.expires_at = expires_at;
                row.last_seen_at = now;
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn revoke(&self, id: Uuid, now: DateTime<Utc>) -> Result<bool, StoreError> {
        self.check_available("session_revoke")?;
        let mut rows = self.rows.lock();
        match rows.get_mut(&id) {
            Some(row) if row.revoked_at.is_none() => {
                row.revoked_at = Some(now);
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn select_purgeable(
        &self,
        now: DateTime<Utc>,
        limit: i64,
    ) -> Result<Vec<Uuid>, StoreError> {
        self.check_available("session_select_purgeable")?;
        self.select_calls.fetch_add(1, Ordering::SeqCst);
        let rows = self.rows.lock();
        let mut ids: Vec<Uuid> = rows
            .values()
            .filter(|row| row.is_purgeable(now))
            .map(|row| row.id)
            .collect();
        ids.sort();
        ids.truncate(limit.max(0) as usize);
        Ok(ids)
    }

    async fn delete_by_ids(&self, ids: &[Uuid]) -> Result<u64, StoreError> {
        self.check_available("session_delete_batch")?;
        if ids.is_empty() {
            return Ok(0);
        }
        self.delete_calls.fetch_add(1, Ordering::SeqCst);
        let mut rows = self.rows.lock();
        let mut deleted = 0;
        for id in ids {
            if rows.remove(id).is_some() {
                deleted += 1;
            }
        }
        Ok(deleted)
    }
}

/// Cluster lock over a set of held keys.
#[derive(Default)]
pub struct InMemoryClusterLock {
    held: Mutex<HashSet<i64>>,
}

impl InMemoryClusterLock {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_held(&self, key: i64) -> bool {
        self.held.lock().contains(&key)
    }
}

#[async_trait]
impl ClusterLock for InMemoryClusterLock {
    async fn try_acquire(&self, key: i64) -> Result<bool, StoreError> {
        Ok(self.held.lock().insert(key))
    }

    async fn release(&self, key: i64) -> Result<(), StoreError> {
        self.held.lock().remove(&key);
        Ok(())
    }
}

#[derive(Debug, Clone)]
struct StoredMessage {
    msg_id: i64,
    read_ct: i64,
    available: bool,
    last_requeue_delay: Option<i32>,
    body: serde_json::Value,
}

#[derive(Default)]
struct BrokerState {
    next_id: i64,
    queues: HashMap<String, Vec<StoredMessage>>,
    archives: HashMap<String, Vec<StoredMessage>>,
    lease_renewals: u64,
}

/// Broker over per-queue vectors with explicit visibility flags.
#[derive(Default)]
pub struct InMemoryBroker {
    state: Mutex<BrokerState>,
}

impl InMemoryBroker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bodies currently sitting in a queue, in arrival order.
    pub fn queued_bodies(&self, queue_name: &str) -> Vec<serde_json::Value> {
        self.state
            .lock()
            .queues
            .get(queue_name)
            .map(|msgs| msgs.iter().map(|m| m.body.clone()).collect())
            .unwrap_or_default()
    }

    pub fn queue_len(&self, queue_name: &str) -> usize {
        self.state
            .lock()
            .queues
            .get(queue_name)
            .map_or(0, Vec::len)
    }

    pub fn archived_len(&self, queue_name: &str) -> usize {
        self.state
            .lock()
            .archives
            .get(queue_name)
            .map_or(0, Vec::len)
    }

    /// Requeue delay last applied to a message, if any.
    pub fn requeue_delay(&self, queue_name: &str, msg_id: i64) -> Option<i32> {
        self.state
            .lock()
            .queues
            .get(queue_name)
            .and_then(|msgs| msgs.iter().find(|m| m.msg_id == msg_id))
            .and_then(|m| m.last_requeue_delay)
    }

    pub fn lease_renewals(&self) -> u64 {
        self.state.lock().lease_renewals
    }
}

#[async_trait]
impl Broker for InMemoryBroker {
    async fn send_json(
        &self,
        queue_name: &str,
        body: &serde_json::Value,
    ) -> Result<i64, BrokerError> {
        let mut state = self.state.lock();
        state.next_id += 1;
        let msg_id = state.next_id;
        state
            .queues
            .entry(queue_name.to_string())
            .or_default()
            .push(StoredMessage {
                msg_id,
                read_ct: 0,
                available: true,
                last_requeue_delay: None,
                body: body.clone(),
            });
        Ok(msg_id)
    }

    async fn read_batch(
        &self,
        queue_name: &str,
        _vt_secs: i32,
        limit: i32,
    ) -> Result<Vec<Delivery>, BrokerError> {
        let mut state = self.state.lock();
        let Some(messages) = state.queues.get_mut(queue_name) else {
            return Ok(Vec::new());
        };
        let mut batch = Vec::new();
        for message in messages.iter_mut() {
            if batch.len() >= limit as usize {
                break;
            }
            if message.available {
                message.available = false;
                message.read_ct += 1;
                batch.push(Delivery {
                    msg_id: message.msg_id,
                    read_count: message.read_ct,
                    body: message.body.clone(),
                });
            }
        }
        Ok(batch)
    }

    async fn acknowledge(&self, queue_name: &str, msg_id: i64) -> Result<(), BrokerError> {
        let mut state = self.state.lock();
        if let Some(messages) = state.queues.get_mut(queue_name) {
            messages.retain(|m| m.msg_id != msg_id);
        }
        Ok(())
    }

    async fn requeue(
        &self,
        queue_name: &str,
        msg_id: i64,
        delay_secs: i32,
    ) -> Result<(), BrokerError> {
        let mut state = self.state.lock();
        let message = state
            .queues
            .get_mut(queue_name)
            .and_then(|msgs| msgs.iter_mut().find(|m| m.msg_id == msg_id));
        match message {
            Some(message) => {
                message.available = true;
                message.last_requeue_delay = Some(delay_secs);
                Ok(())
            }
            None => Err(BrokerError::queue_operation(
                queue_name,
                "set_vt",
                format!("message {msg_id} not found"),
            )),
        }
    }

    async fn dead_letter(&self, queue_name: &str, msg_id: i64) -> Result<(), BrokerError> {
        let mut state = self.state.lock();
        let removed = state
            .queues
            .get_mut(queue_name)
            .and_then(|messages| {
                let index = messages.iter().position(|m| m.msg_id == msg_id)?;
                Some(messages.remove(index))
            });
        if let Some(message) = removed {
            state
                .archives
                .entry(queue_name.to_string())
                .or_default()
                .push(message);
        }
        Ok(())
    }

    async fn renew_lease(
        &self,
        _queue_name: &str,
        _msg_id: i64,
        _vt_secs: i32,
    ) -> Result<(), BrokerError> {
        self.state.lock().lease_renewals += 1;
        Ok(())
    }
}
