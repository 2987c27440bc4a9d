//! # Action Dispatcher
//!
//! Maps an inbound message's action tag to a registered handler. The
//! registry is built once at startup; there is no dynamic discovery. A tag
//! with no registered handler is classified non-retryable immediately; an
//! unknown action can never succeed however many times it is redelivered.

use crate::messaging::broker::Broker;
use crate::messaging::errors::{BrokerError, HandlerError};
use crate::messaging::message::{ActionMessage, ActionTag, CallbackDescriptor, TaskResultPayload};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Per-message capabilities handed to a handler alongside the message.
///
/// The dispatcher passes these through untouched; in particular it never
/// renews the lease itself.
pub struct HandlerContext {
    broker: Arc<dyn Broker>,
    origin_queue: String,
    msg_id: i64,
    pub cancellation: CancellationToken,
}

impl HandlerContext {
    pub fn new(
        broker: Arc<dyn Broker>,
        origin_queue: impl Into<String>,
        msg_id: i64,
        cancellation: CancellationToken,
    ) -> Self {
        Self {
            broker,
            origin_queue: origin_queue.into(),
            msg_id,
            cancellation,
        }
    }

    /// Extend this message's exclusive lease. For handlers whose store work
    /// can outlive the visibility timeout.
    pub async fn renew_lease(&self, vt_secs: i32) -> Result<(), BrokerError> {
        self.broker
            .renew_lease(&self.origin_queue, self.msg_id, vt_secs)
            .await
    }

    /// Callback router: forward a result to the reply destination named in
    /// the message metadata, echoing that metadata back for correlation.
    ///
    /// A missing or malformed destination, or a send failure, is logged and
    /// swallowed: the primary side effect already succeeded, so the
    /// message itself must still be acknowledged.
    pub async fn route_result(&self, result: TaskResultPayload, message: &ActionMessage) {
        let Some(descriptor) = CallbackDescriptor::from_metadata(message.metadata.as_ref()) else {
            debug!(
                msg_id = self.msg_id,
                "No callback destination in metadata; skipping reply"
            );
            return;
        };

        let outbound = descriptor.outbound_queue();
        let reply = match result.into_message(message.metadata.clone()) {
            Ok(reply) => reply,
            Err(e) => {
                warn!(msg_id = self.msg_id, error = %e, "Failed to build result message");
                return;
            }
        };
        let body = match serde_json::to_value(&reply) {
            Ok(body) => body,
            Err(e) => {
                warn!(msg_id = self.msg_id, error = %e, "Failed to serialize result message");
                return;
            }
        };

        match self.broker.send_json(&outbound, &body).await {
            Ok(reply_id) => debug!(
                msg_id = self.msg_id,
                outbound, reply_id, method = %descriptor.method,
                "Result routed to callback queue"
            ),
            Err(e) => warn!(
                msg_id = self.msg_id,
                outbound, error = %e,
                "Failed to route result; continuing"
            ),
        }
    }
}

/// A registered action handler.
///
/// Implementations resolve every failure into [`HandlerError`] exactly once,
/// at their outer boundary; inner logic does not reason about redelivery.
#[async_trait]
pub trait ActionHandler: Send + Sync {
    async fn handle(&self, message: &ActionMessage, ctx: &HandlerContext)
        -> Result<(), HandlerError>;
}

/// Static action → handler registry.
pub struct ActionDispatcher {
    handlers: HashMap<ActionTag, Arc<dyn ActionHandler>>,
}

impl ActionDispatcher {
    pub fn new() -> Self {
        Self {
            handlers: HashMap::new(),
        }
    }

    pub fn register(&mut self, tag: ActionTag, handler: Arc<dyn ActionHandler>) {
        if self.handlers.insert(tag, handler).is_some() {
            warn!(action = %tag, "Handler already registered, replacing");
        } else {
            info!(action = %tag, "Handler registered");
        }
    }

    /// Route one message to its handler.
    pub async fn dispatch(
        &self,
        message: &ActionMessage,
        ctx: &HandlerContext,
    ) -> Result<(), HandlerError> {
        match self.handlers.get(&message.action) {
            Some(handler) => handler.handle(message, ctx).await,
            None => Err(HandlerError::non_retryable(format!(
                "no handler for action {}",
                message.action
            ))),
        }
    }

    pub fn registered_actions(&self) -> Vec<ActionTag> {
        self.handlers.keys().copied().collect()
    }
}

impl Default for ActionDispatcher {
    fn default() -> Self {
        Self::new()
    }
}
