//! # Messaging Error Types
//!
//! Two taxonomies live here. [`BrokerError`] covers the queue transport
//! itself. [`HandlerError`] is the redelivery taxonomy every action handler
//! resolves to exactly once, at its outer boundary: the broker adapter's
//! ack/requeue/dead-letter decision depends entirely on which variant comes
//! back, so no failure may escape unclassified.

use thiserror::Error;

type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Queue transport failures.
#[derive(Debug, Error)]
pub enum BrokerError {
    #[error("Queue operation failed: {queue_name}: {operation}: {message}")]
    QueueOperation {
        queue_name: String,
        operation: String,
        message: String,
    },

    #[error("Message serialization error: {message}")]
    Serialization { message: String },
}

impl BrokerError {
    pub fn queue_operation(
        queue_name: impl Into<String>,
        operation: impl Into<String>,
        message: impl std::fmt::Display,
    ) -> Self {
        Self::QueueOperation {
            queue_name: queue_name.into(),
            operation: operation.into(),
            message: message.to_string(),
        }
    }

    pub fn serialization(message: impl std::fmt::Display) -> Self {
        Self::Serialization {
            message: message.to_string(),
        }
    }
}

/// Terminal classification of a handler failure.
///
/// - `NonRetryable`: the message can never succeed (malformed payload,
///   unknown action, genuine content conflict). Dead-lettered.
/// - `Retryable`: transient infrastructure trouble. Requeued with a delay so
///   the broker redelivers.
/// - `Cancelled`: shutdown in progress. Neither a bad message nor a retry
///   request; requeued immediately without penalty.
#[derive(Debug, Error)]
pub enum HandlerError {
    #[error("Non-retryable: {reason}")]
    NonRetryable {
        reason: String,
        #[source]
        cause: Option<BoxError>,
    },

    #[error("Retryable: {reason}")]
    Retryable {
        reason: String,
        #[source]
        cause: Option<BoxError>,
    },

    #[error("Cancelled")]
    Cancelled,
}

impl HandlerError {
    pub fn non_retryable(reason: impl Into<String>) -> Self {
        Self::NonRetryable {
            reason: reason.into(),
            cause: None,
        }
    }

    pub fn non_retryable_with(reason: impl Into<String>, cause: impl Into<BoxError>) -> Self {
        Self::NonRetryable {
            reason: reason.into(),
            cause: Some(cause.into()),
        }
    }

    pub fn retryable(reason: impl Into<String>) -> Self {
        Self::Retryable {
            reason: reason.into(),
            cause: None,
        }
    }

    pub fn retryable_with(reason: impl Into<String>, cause: impl Into<BoxError>) -> Self {
        Self::Retryable {
            reason: reason.into(),
            cause: Some(cause.into()),
        }
    }

    /// What the broker adapter should do with the message.
    pub fn disposition(&self, retry_delay_secs: i32) -> Disposition {
        match self {
            Self::NonRetryable { .. } => Disposition::DeadLetter,
            Self::Retryable { .. } => Disposition::Requeue {
                delay_secs: retry_delay_secs,
            },
            // Requeue without penalty: the message is fine, this process is
            // just going away.
            Self::Cancelled => Disposition::Requeue { delay_secs: 0 },
        }
    }
}

/// Broker-side outcome for a failed message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Disposition {
    /// Remove from normal processing, keep a copy for inspection.
    DeadLetter,
    /// Make the message visible again after `delay_secs`.
    Requeue { delay_secs: i32 },
}
