//! # Structured Error Handling
//!
//! Top-level error type for crate-wide operations (configuration, database
//! bootstrap, scheduler plumbing). Domain-specific taxonomies live closer to
//! their modules: [`crate::storage::StoreError`] for store access,
//! [`crate::messaging::errors`] for broker and handler failures.

use thiserror::Error;

/// Crate-level error for bootstrap and configuration paths.
#[derive(Debug, Error)]
pub enum CoreError {
    #[error("Database error: {0}")]
    Database(String),

    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Messaging error: {0}")]
    Messaging(String),

    #[error("Scheduler error: {0}")]
    Scheduler(String),
}

impl From<sqlx::Error> for CoreError {
    fn from(err: sqlx::Error) -> Self {
        CoreError::Database(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, CoreError>;
