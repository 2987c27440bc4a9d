//! # Refresh Session Model
//!
//! One row per issued refresh token. Rows are created at login, rotated on
//! refresh, revoked at logout, and eventually removed by the purge engine
//! once expired or revoked.
//!
//! ## Database Schema
//!
//! Maps to `campus_refresh_sessions`:
//! - `id`: session id (UUID, primary key)
//! - `user_id`: owning user (UUID)
//! - `token_hash`: hash of the current refresh token, replaced on rotation
//! - `device_fingerprint_hash`: hash binding the session to a device
//! - `expires_at` / `revoked_at`: the two purge-eligibility columns

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// A stored refresh session row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct RefreshSession {
    pub id: Uuid,
    pub user_id: Uuid,
    pub token_hash: String,
    pub device_fingerprint_hash: String,
    pub issued_at: DateTime<Utc>,
    pub last_seen_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub revoked_at: Option<DateTime<Utc>>,
}

impl RefreshSession {
    /// Purge eligibility: expired or explicitly revoked.
    pub fn is_purgeable(&self, now: DateTime<Utc>) -> bool {
        self.expires_at < now || self.revoked_at.is_some()
    }
}

/// Session fields supplied at login.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewRefreshSession {
    pub user_id: Uuid,
    pub token_hash: String,
    pub device_fingerprint_hash: String,
    pub expires_at: DateTime<Utc>,
}

impl NewRefreshSession {
    /// Materialize a full row with a fresh id and issue timestamps.
    pub fn into_session(self, now: DateTime<Utc>) -> RefreshSession {
        RefreshSession {
            id: Uuid::new_v4(),
            user_id: self.user_id,
            token_hash: self.token_hash,
            device_fingerprint_hash: self.device_fingerprint_hash,
            issued_at: now,
            last_seen_at: now,
            expires_at: self.expires_at,
            revoked_at: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn session(expires_in: i64, revoked: bool) -> RefreshSession {
        let now = Utc::now();
        RefreshSession {
            id: Uuid::new_v4(),
            user_id: Uuid::new_v4(),
            token_hash: "h".to_string(),
            device_fingerprint_hash: "d".to_string(),
            issued_at: now,
            last_seen_at: now,
            expires_at: now + Duration::seconds(expires_in),
            revoked_at: revoked.then(|| now),
        }
    }

    #[test]
    fn live_session_is_not_purgeable() {
        assert!(!session(3600, false).is_purgeable(Utc::now()));
    }

    #[test]
    fn expired_session_is_purgeable() {
        assert!(session(-1, false).is_purgeable(Utc::now()));
    }

    #[test]
    fn revoked_session_is_purgeable_even_if_unexpired() {
        assert!(session(3600, true).is_purgeable(Utc::now()));
    }
}
