//! # Session Purge Engine
//!
//! Paginated select-then-delete removal of expired or revoked refresh
//! sessions. Batching bounds the work of any single delete statement no
//! matter how large the backlog, so the purge never holds store resources
//! proportional to table size. Re-running after a full purge deletes zero
//! rows.

use crate::storage::{SessionStore, StoreError};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, info};

/// Result of an operator-facing purge invocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PurgeReport {
    pub deleted_count: u64,
}

/// Batch purge engine over any [`SessionStore`].
pub struct SessionPurger {
    store: Arc<dyn SessionStore>,
}

impl SessionPurger {
    pub fn new(store: Arc<dyn SessionStore>) -> Self {
        Self { store }
    }

    /// Remove every purge-eligible session in batches of `batch_size`,
    /// returning the total number of rows deleted.
    ///
    /// Selection is ordered by primary key ascending, so as deletions
    /// proceed each batch picks up where the last one left off instead of
    /// re-scanning surviving rows.
    pub async fn purge(&self, batch_size: i64) -> Result<u64, StoreError> {
        let mut total: u64 = 0;
        loop {
            let now = Utc::now();
            let ids = self.store.select_purgeable(now, batch_size).await?;
            if ids.is_empty() {
                break;
            }
            let deleted = self.store.delete_by_ids(&ids).await?;
            total += deleted;
            debug!(batch = ids.len(), deleted, total, "Purge batch removed");
        }
        Ok(total)
    }

    /// Manual one-shot purge for ad hoc cleanup outside the schedule.
    pub async fn run_manual(&self, batch_size: i64) -> Result<PurgeReport, StoreError> {
        let deleted_count = self.purge(batch_size).await?;
        info!(deleted_count, "Manual session purge completed");
        Ok(PurgeReport { deleted_count })
    }
}
