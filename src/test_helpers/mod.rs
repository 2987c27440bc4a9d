//! # Test Helpers
//!
//! In-memory implementations of the store, lock, and broker seams, used by
//! the test suites to exercise redelivery and concurrency behavior without
//! a database. Call-count accessors let tests assert how many batches or
//! broker operations an engine performed.

pub mod memory;

pub use memory::{InMemoryBroker, InMemoryClusterLock, InMemorySessionStore, InMemoryTaskStore};
