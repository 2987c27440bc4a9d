//! # Queue Consumer
//!
//! The broker-facing worker loop: read a batch of deliveries, hand each one
//! to the dispatcher, and translate the outcome into the broker operation
//! the redelivery taxonomy demands: acknowledge on success, dead-letter on
//! non-retryable failure, requeue with delay on transient failure, requeue
//! without penalty on cancellation.
//!
//! Envelope decode failures never reach a handler: a body that does not
//! parse as an [`ActionMessage`] is permanently invalid and goes straight to
//! the dead-letter archive.

use crate::config::ConsumerConfig;
use crate::messaging::broker::{Broker, Delivery};
use crate::messaging::dispatcher::{ActionDispatcher, HandlerContext};
use crate::messaging::errors::{Disposition, HandlerError};
use crate::messaging::message::ActionMessage;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// Long-lived consumer for one inbound action queue.
pub struct QueueConsumer {
    broker: Arc<dyn Broker>,
    dispatcher: Arc<ActionDispatcher>,
    config: ConsumerConfig,
    cancellation: CancellationToken,
}

impl QueueConsumer {
    pub fn new(
        broker: Arc<dyn Broker>,
        dispatcher: Arc<ActionDispatcher>,
        config: ConsumerConfig,
        cancellation: CancellationToken,
    ) -> Self {
        Self {
            broker,
            dispatcher,
            config,
            cancellation,
        }
    }

    /// Run until cancelled. Broker read failures back off and retry; they
    /// never terminate the loop.
    pub async fn run(&self) {
        info!(queue = %self.config.queue_name, "Queue consumer started");

        while !self.cancellation.is_cancelled() {
            let batch = match self
                .broker
                .read_batch(
                    &self.config.queue_name,
                    self.config.visibility_timeout_secs,
                    self.config.batch_size,
                )
                .await
            {
                Ok(batch) => batch,
                Err(e) => {
                    error!(queue = %self.config.queue_name, error = %e, "Queue read failed");
                    self.idle_sleep().await;
                    continue;
                }
            };

            if batch.is_empty() {
                self.idle_sleep().await;
                continue;
            }

            // Handlers for distinct messages are independent; run the
            // batch concurrently. Ordering across messages is not
            // guaranteed anyway, which is exactly why creation is
            // idempotent and updates are version-checked.
            futures::future::join_all(
                batch
                    .into_iter()
                    .map(|delivery| self.process_delivery(delivery)),
            )
            .await;
        }

        info!(queue = %self.config.queue_name, "Queue consumer stopped");
    }

    /// Dispatch one delivery and apply the resulting broker disposition.
    pub async fn process_delivery(&self, delivery: Delivery) {
        let queue = &self.config.queue_name;
        let msg_id = delivery.msg_id;

        let outcome = match serde_json::from_value::<ActionMessage>(delivery.body) {
            Ok(message) => {
                let ctx = HandlerContext::new(
                    Arc::clone(&self.broker),
                    queue.clone(),
                    msg_id,
                    self.cancellation.child_token(),
                );
                self.dispatcher.dispatch(&message, &ctx).await
            }
            Err(e) => Err(HandlerError::non_retryable_with(
                "action message failed to decode",
                e,
            )),
        };

        match outcome {
            Ok(()) => {
                if let Err(e) = self.broker.acknowledge(queue, msg_id).await {
                    // The handler side effects are idempotent, so a lost
                    // acknowledge only costs a redundant redelivery.
                    warn!(queue, msg_id, error = %e, "Acknowledge failed");
                } else {
                    debug!(queue, msg_id, "Message acknowledged");
                }
            }
            Err(handler_err) => {
                let disposition = handler_err.disposition(self.config.retry_delay_secs);
                warn!(
                    queue, msg_id,
                    read_count = delivery.read_count,
                    error = %handler_err,
                    ?disposition,
                    "Message processing failed"
                );
                let result = match disposition {
                    Disposition::DeadLetter => self.broker.dead_letter(queue, msg_id).await,
                    Disposition::Requeue { delay_secs } => {
                        self.broker.requeue(queue, msg_id, delay_secs).await
                    }
                };
                if let Err(e) = result {
                    error!(queue, msg_id, error = %e, "Failed to apply message disposition");
                }
            }
        }
    }

    async fn idle_sleep(&self) {
        let wait = Duration::from_millis(self.config.poll_interval_ms);
        tokio::select! {
            _ = self.cancellation.cancelled() => {}
            _ = tokio::time::sleep(wait) => {}
        }
    }
}
