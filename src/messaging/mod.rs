//! # Messaging
//!
//! Queue transport, action dispatch, and the redelivery error taxonomy.

pub mod broker;
pub mod consumer;
pub mod dispatcher;
pub mod errors;
pub mod message;

pub use broker::{Broker, Delivery, PgmqBroker};
pub use consumer::QueueConsumer;
pub use dispatcher::{ActionDispatcher, ActionHandler, HandlerContext};
pub use errors::{BrokerError, Disposition, HandlerError};
pub use message::{ActionMessage, ActionTag, CallbackDescriptor, TaskResultPayload, TaskStatus};
