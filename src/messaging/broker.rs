//! # Broker Adapter
//!
//! The queue transport seam. The core depends on exactly these operations:
//! deliver (read), acknowledge, requeue, dead-letter, lease renewal, and
//! "send to a named destination". Production uses pgmq (Postgres message
//! queues) driven through its SQL API on the shared connection pool.

use crate::messaging::errors::BrokerError;
use async_trait::async_trait;
use sqlx::{PgPool, Row};
use tracing::{debug, info, warn};

/// One delivery attempt of a queue message.
#[derive(Debug, Clone)]
pub struct Delivery {
    /// Broker-assigned message id, scoped to the queue.
    pub msg_id: i64,
    /// How many times this message has been read, including this attempt.
    pub read_count: i64,
    /// Raw JSON body.
    pub body: serde_json::Value,
}

/// Queue transport operations the core relies on.
#[async_trait]
pub trait Broker: Send + Sync {
    /// Send a JSON message to a named destination, returning its id.
    async fn send_json(
        &self,
        queue_name: &str,
        body: &serde_json::Value,
    ) -> Result<i64, BrokerError>;

    /// Read up to `limit` messages, hiding them from other consumers for
    /// `vt_secs` seconds.
    async fn read_batch(
        &self,
        queue_name: &str,
        vt_secs: i32,
        limit: i32,
    ) -> Result<Vec<Delivery>, BrokerError>;

    /// Acknowledge: remove the message from the queue for good.
    async fn acknowledge(&self, queue_name: &str, msg_id: i64) -> Result<(), BrokerError>;

    /// Negative acknowledge: make the message visible again after
    /// `delay_secs` so the broker redelivers it.
    async fn requeue(&self, queue_name: &str, msg_id: i64, delay_secs: i32)
        -> Result<(), BrokerError>;

    /// Remove the message from normal processing, keeping a copy on the
    /// side channel for inspection.
    async fn dead_letter(&self, queue_name: &str, msg_id: i64) -> Result<(), BrokerError>;

    /// Extend the exclusive lease on an in-flight message.
    async fn renew_lease(
        &self,
        queue_name: &str,
        msg_id: i64,
        vt_secs: i32,
    ) -> Result<(), BrokerError>;
}

/// pgmq-backed broker adapter.
#[derive(Debug, Clone)]
pub struct PgmqBroker {
    pool: PgPool,
}

impl PgmqBroker {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Create a queue if it does not exist. pgmq's create is idempotent.
    pub async fn ensure_queue(&self, queue_name: &str) -> Result<(), BrokerError> {
        sqlx::query("SELECT pgmq.create($1::text)")
            .bind(queue_name)
            .execute(&self.pool)
            .await
            .map_err(|e| BrokerError::queue_operation(queue_name, "create", e))?;
        info!(queue_name, "Queue ready");
        Ok(())
    }
}

#[async_trait]
impl Broker for PgmqBroker {
    async fn send_json(
        &self,
        queue_name: &str,
        body: &serde_json::Value,
    ) -> Result<i64, BrokerError> {
        let msg_id = sqlx::query_scalar::<_, i64>("SELECT pgmq.send($1::text, $2::jsonb)")
            .bind(queue_name)
            .bind(body)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| BrokerError::queue_operation(queue_name, "send", e))?;
        debug!(queue_name, msg_id, "Message sent");
        Ok(msg_id)
    }

    async fn read_batch(
        &self,
        queue_name: &str,
        vt_secs: i32,
        limit: i32,
    ) -> Result<Vec<Delivery>, BrokerError> {
        let rows = sqlx::query(
            "SELECT msg_id, read_ct, message FROM pgmq.read($1::text, $2::integer, $3::integer)",
        )
        .bind(queue_name)
        .bind(vt_secs)
        .bind(limit)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| BrokerError::queue_operation(queue_name, "read", e))?;

        let mut deliveries = Vec::with_capacity(rows.len());
        for row in rows {
            deliveries.push(Delivery {
                msg_id: row
                    .try_get("msg_id")
                    .map_err(|e| BrokerError::queue_operation(queue_name, "read", e))?,
                read_count: row
                    .try_get::<i32, _>("read_ct")
                    .map_err(|e| BrokerError::queue_operation(queue_name, "read", e))?
                    as i64,
                body: row
                    .try_get("message")
                    .map_err(|e| BrokerError::queue_operation(queue_name, "read", e))?,
            });
        }
        if !deliveries.is_empty() {
            debug!(queue_name, count = deliveries.len(), "Messages read");
        }
        Ok(deliveries)
    }

    async fn acknowledge(&self, queue_name: &str, msg_id: i64) -> Result<(), BrokerError> {
        let deleted = sqlx::query_scalar::<_, bool>("SELECT pgmq.delete($1::text, $2::bigint)")
            .bind(queue_name)
            .bind(msg_id)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| BrokerError::queue_operation(queue_name, "delete", e))?;
        if !deleted {
            warn!(queue_name, msg_id, "Acknowledge found no message to delete");
        }
        Ok(())
    }

    async fn requeue(
        &self,
        queue_name: &str,
        msg_id: i64,
        delay_secs: i32,
    ) -> Result<(), BrokerError> {
        sqlx::query("SELECT msg_id FROM pgmq.set_vt($1::text, $2::bigint, $3::integer)")
            .bind(queue_name)
            .bind(msg_id)
            .bind(delay_secs)
            .execute(&self.pool)
            .await
            .map_err(|e| BrokerError::queue_operation(queue_name, "set_vt", e))?;
        debug!(queue_name, msg_id, delay_secs, "Message requeued");
        Ok(())
    }

    async fn dead_letter(&self, queue_name: &str, msg_id: i64) -> Result<(), BrokerError> {
        let archived = sqlx::query_scalar::<_, bool>("SELECT pgmq.archive($1::text, $2::bigint)")
            .bind(queue_name)
            .bind(msg_id)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| BrokerError::queue_operation(queue_name, "archive", e))?;
        if archived {
            warn!(queue_name, msg_id, "Message dead-lettered to archive");
        }
        Ok(())
    }

    async fn renew_lease(
        &self,
        queue_name: &str,
        msg_id: i64,
        vt_secs: i32,
    ) -> Result<(), BrokerError> {
        sqlx::query("SELECT msg_id FROM pgmq.set_vt($1::text, $2::bigint, $3::integer)")
            .bind(queue_name)
            .bind(msg_id)
            .bind(vt_secs)
            .execute(&self.pool)
            .await
            .map_err(|e| BrokerError::queue_operation(queue_name, "set_vt", e))?;
        debug!(queue_name, msg_id, vt_secs, "Message lease renewed");
        Ok(())
    }
}
