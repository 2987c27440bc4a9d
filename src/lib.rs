#![allow(clippy::doc_markdown)] // Allow technical terms like PostgreSQL, SQLx in docs
#![allow(clippy::missing_errors_doc)] // Allow public functions without # Errors sections
#![allow(clippy::must_use_candidate)] // Allow methods without must_use when context is clear

//! # Campus Core
//!
//! Queue-driven task orchestration and distributed coordination core for the
//! Campus learning platform (lessons, games, chat, meetings).
//!
//! ## Overview
//!
//! Services publish action messages to a Postgres-backed queue (pgmq); this
//! core consumes them, routes each message to its registered handler, and
//! decides per failure whether the broker should redeliver or dead-letter.
//! Handler side effects stay correct under at-least-once delivery and
//! concurrent replicas:
//!
//! - **Idempotent creation**: caller-assigned ids plus the store's
//!   uniqueness constraint arbitrate duplicate and concurrent creates.
//! - **Optimistic concurrency**: updates are a single conditional write
//!   gated on an opaque row-revision token (Postgres `xmin`).
//! - **Distributed singleton scheduling**: a nightly purge of expired and
//!   revoked refresh sessions runs on exactly one replica, elected through
//!   a non-blocking advisory lock, deleting in bounded batches.
//!
//! ## Module Organization
//!
//! - [`messaging`] - Broker adapter, action dispatch, redelivery taxonomy
//! - [`orchestration`] - Handlers, task service, purge engine, scheduler
//! - [`storage`] - Store traits and Postgres implementations
//! - [`models`] - Row types
//! - [`config`] - Configuration management
//! - [`database`] - Pool and migrations
//! - [`error`] - Crate-level errors
//! - [`test_helpers`] - In-memory collaborators for tests
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use campus_core::config::CoreConfig;
//! use campus_core::messaging::{ActionDispatcher, ActionTag, PgmqBroker, QueueConsumer};
//! use campus_core::orchestration::{CreateTaskHandler, TaskService};
//! use campus_core::storage::PgTaskStore;
//! use std::sync::Arc;
//! use tokio_util::sync::CancellationToken;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let config = CoreConfig::from_env()?;
//! let pool = campus_core::database::connect(&config.database_url).await?;
//!
//! let service = Arc::new(TaskService::new(Arc::new(PgTaskStore::new(pool.clone()))));
//! let mut dispatcher = ActionDispatcher::new();
//! dispatcher.register(ActionTag::CreateTask, Arc::new(CreateTaskHandler::new(service)));
//!
//! let consumer = QueueConsumer::new(
//!     Arc::new(PgmqBroker::new(pool)),
//!     Arc::new(dispatcher),
//!     config.consumer,
//!     CancellationToken::new(),
//! );
//! consumer.run().await;
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod constants;
pub mod database;
pub mod error;
pub mod logging;
pub mod messaging;
pub mod models;
pub mod orchestration;
pub mod storage;
pub mod test_helpers;

pub use config::{ConsumerConfig, CoreConfig, ScheduleSpec, SchedulerConfig};
pub use error::{CoreError, Result};
pub use messaging::{
    ActionDispatcher, ActionHandler, ActionMessage, ActionTag, Broker, BrokerError, Delivery,
    Disposition, HandlerContext, HandlerError, PgmqBroker, QueueConsumer, TaskResultPayload,
    TaskStatus,
};
pub use orchestration::{
    CreateOutcome, CreateTaskHandler, CycleOutcome, DeleteTaskHandler, PurgeReport, PurgeScheduler,
    SessionPurger, TaskService, UpdateOutcome, UpdateTaskHandler,
};
pub use storage::{
    ClusterLock, PgAdvisoryLock, PgSessionStore, PgTaskStore, SessionStore, StoreError, TaskStore,
    VersionToken,
};
