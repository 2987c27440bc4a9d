//! # Task Record Model
//!
//! A task is the unit of work other services ask this core to materialize.
//! Ids are caller-assigned, which is what makes creation idempotent under
//! at-least-once delivery: a redelivered create carries the same id.
//!
//! ## Database Schema
//!
//! Maps to `campus_tasks`:
//! - `id`: caller-assigned primary key (BIGINT)
//! - `name`: display name, the content compared on duplicate creates
//! - `payload`: opaque JSONB payload, not interpreted by the core
//!
//! The row version used for optimistic concurrency is the store's own
//! revision counter (`xmin`), surfaced as an opaque token; it is never a
//! column of this struct.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// A stored task row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct TaskRecord {
    pub id: i64,
    pub name: String,
    pub payload: Option<serde_json::Value>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Task fields supplied by the caller on creation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewTaskRecord {
    pub id: i64,
    pub name: String,
    pub payload: Option<serde_json::Value>,
}

impl NewTaskRecord {
    /// Whether an existing row holds the same task content as this request.
    ///
    /// This is the single comparison point for duplicate-create detection;
    /// widen it here if tasks grow more semantically relevant fields.
    pub fn matches(&self, existing: &TaskRecord) -> bool {
        self.name == existing.name
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn matching_compares_name_only() {
        let request = NewTaskRecord {
            id: 7,
            name: "algebra-drill".to_string(),
            payload: Some(serde_json::json!({"difficulty": 2})),
        };
        let existing = TaskRecord {
            id: 7,
            name: "algebra-drill".to_string(),
            payload: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };
        assert!(request.matches(&existing));

        let renamed = TaskRecord {
            name: "geometry-drill".to_string(),
            ..existing
        };
        assert!(!request.matches(&renamed));
    }
}
