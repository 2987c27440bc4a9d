//! # Orchestration
//!
//! The action handlers, task service, purge engine, and scheduler: the
//! parts that must stay correct under redelivery, concurrent replicas, and
//! partial failure.

pub mod handlers;
pub mod purge;
pub mod scheduler;
pub mod task_service;

pub use handlers::{CreateTaskHandler, DeleteTaskHandler, UpdateTaskHandler};
pub use purge::{PurgeReport, SessionPurger};
pub use scheduler::{next_run_after, CycleOutcome, PurgeScheduler};
pub use task_service::{CreateOutcome, TaskService, UpdateOutcome};
