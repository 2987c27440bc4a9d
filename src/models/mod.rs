//! # Data Models
//!
//! Row types shared by the Postgres and in-memory store implementations.

pub mod refresh_session;
pub mod task_record;

pub use refresh_session::{NewRefreshSession, RefreshSession};
pub use task_record::{NewTaskRecord, TaskRecord};
