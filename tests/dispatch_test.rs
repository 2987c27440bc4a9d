//! End-to-end message flow through the consumer: dispatch, the redelivery
//! taxonomy, and callback routing.

use campus_core::config::ConsumerConfig;
use campus_core::messaging::{
    ActionDispatcher, ActionTag, Broker, HandlerContext, QueueConsumer,
};
use campus_core::orchestration::{
    CreateTaskHandler, DeleteTaskHandler, TaskService, UpdateTaskHandler,
};
use campus_core::test_helpers::{InMemoryBroker, InMemoryTaskStore};
use serde_json::json;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

const QUEUE: &str = "task_actions";

struct Fixture {
    broker: Arc<InMemoryBroker>,
    store: Arc<InMemoryTaskStore>,
    service: Arc<TaskService>,
    consumer: QueueConsumer,
    cancellation: CancellationToken,
}

fn fixture() -> Fixture {
    let broker = Arc::new(InMemoryBroker::new());
    let store = Arc::new(InMemoryTaskStore::new());
    let service = Arc::new(TaskService::new(Arc::clone(&store) as _));

    let mut dispatcher = ActionDispatcher::new();
    dispatcher.register(
        ActionTag::CreateTask,
        Arc::new(CreateTaskHandler::new(Arc::clone(&service))),
    );
    dispatcher.register(
        ActionTag::UpdateTask,
        Arc::new(UpdateTaskHandler::new(Arc::clone(&service))),
    );
    dispatcher.register(
        ActionTag::DeleteTask,
        Arc::new(DeleteTaskHandler::new(Arc::clone(&service))),
    );

    let cancellation = CancellationToken::new();
    let consumer = QueueConsumer::new(
        Arc::clone(&broker) as _,
        Arc::new(dispatcher),
        ConsumerConfig {
            queue_name: QUEUE.to_string(),
            ..ConsumerConfig::default()
        },
        cancellation.clone(),
    );
    Fixture {
        broker,
        store,
        service,
        consumer,
        cancellation,
    }
}

impl Fixture {
    /// Enqueue a raw body, then pull and process every delivery once.
    async fn deliver(&self, body: serde_json::Value) {
        self.broker.send_json(QUEUE, &body).await.unwrap();
        let batch = self.broker.read_batch(QUEUE, 60, 10).await.unwrap();
        for delivery in batch {
            self.consumer.process_delivery(delivery).await;
        }
    }
}

fn create_body(id: i64, name: &str, metadata: Option<serde_json::Value>) -> serde_json::Value {
    let mut body = json!({
        "action": "CreateTask",
        "payload": { "id": id, "name": name },
    });
    if let Some(metadata) = metadata {
        body["metadata"] = metadata;
    }
    body
}

#[tokio::test]
async fn successful_create_is_acknowledged_and_replied_to() {
    let f = fixture();
    let metadata = json!({"callback_queue": "lessons", "callback_method": "TaskDone", "correlation_id": "xyz"});
    f.deliver(create_body(1, "algebra", Some(metadata))).await;

    // Acked off the inbound queue, stored, and replied on the companion.
    assert_eq!(f.broker.queue_len(QUEUE), 0);
    assert_eq!(f.store.row_count(), 1);

    let replies = f.broker.queued_bodies("lessons-out");
    assert_eq!(replies.len(), 1);
    assert_eq!(replies[0]["action"], "TaskResult");
    assert_eq!(replies[0]["payload"]["id"], 1);
    assert_eq!(replies[0]["payload"]["status"], "Created");
    // Original metadata echoed back for correlation.
    assert_eq!(replies[0]["metadata"]["correlation_id"], "xyz");
}

#[tokio::test]
async fn missing_callback_metadata_does_not_fail_the_message() {
    let f = fixture();
    f.deliver(create_body(2, "geometry", None)).await;

    assert_eq!(f.broker.queue_len(QUEUE), 0);
    assert_eq!(f.store.row_count(), 1);
    assert_eq!(f.broker.queue_len("lessons-out"), 0);
}

#[tokio::test]
async fn undecodable_body_is_dead_lettered() {
    let f = fixture();
    f.deliver(json!({"not_an_action_message": true})).await;

    assert_eq!(f.broker.queue_len(QUEUE), 0);
    assert_eq!(f.broker.archived_len(QUEUE), 1);
    assert_eq!(f.store.row_count(), 0);
}

#[tokio::test]
async fn unknown_action_is_dead_lettered_not_retried() {
    let f = fixture();
    f.deliver(json!({"action": "LaunchRocket", "payload": {}}))
        .await;

    assert_eq!(f.broker.queue_len(QUEUE), 0);
    assert_eq!(f.broker.archived_len(QUEUE), 1);
}

#[tokio::test]
async fn content_conflict_is_dead_lettered_not_retried() {
    let f = fixture();
    f.deliver(create_body(7, "A", None)).await;
    f.deliver(create_body(7, "B", None)).await;

    assert_eq!(f.broker.archived_len(QUEUE), 1);
    assert_eq!(f.service.find_task(7).await.unwrap().unwrap().name, "A");
}

#[tokio::test]
async fn redelivered_create_is_acknowledged_as_a_noop() {
    let f = fixture();
    f.deliver(create_body(7, "A", None)).await;
    f.deliver(create_body(7, "A", None)).await;

    assert_eq!(f.broker.queue_len(QUEUE), 0);
    assert_eq!(f.broker.archived_len(QUEUE), 0);
    assert_eq!(f.store.row_count(), 1);
}

#[tokio::test]
async fn store_outage_requeues_with_the_configured_delay() {
    let f = fixture();
    f.store.fail_all(true);

    f.broker
        .send_json(QUEUE, &create_body(3, "science", None))
        .await
        .unwrap();
    let batch = f.broker.read_batch(QUEUE, 60, 10).await.unwrap();
    let msg_id = batch[0].msg_id;
    for delivery in batch {
        f.consumer.process_delivery(delivery).await;
    }

    assert_eq!(f.broker.queue_len(QUEUE), 1);
    assert_eq!(f.broker.requeue_delay(QUEUE, msg_id), Some(30));
    assert_eq!(f.broker.archived_len(QUEUE), 0);
}

#[tokio::test]
async fn cancellation_during_failure_requeues_without_penalty() {
    let f = fixture();
    f.store.fail_all(true);
    f.cancellation.cancel();

    f.broker
        .send_json(QUEUE, &create_body(4, "music", None))
        .await
        .unwrap();
    let batch = f.broker.read_batch(QUEUE, 60, 10).await.unwrap();
    let msg_id = batch[0].msg_id;
    for delivery in batch {
        f.consumer.process_delivery(delivery).await;
    }

    // Cancelled, not NonRetryable: the message survives with zero delay.
    assert_eq!(f.broker.archived_len(QUEUE), 0);
    assert_eq!(f.broker.requeue_delay(QUEUE, msg_id), Some(0));
}

#[tokio::test]
async fn update_flow_round_trips_through_the_queue() {
    let f = fixture();
    f.deliver(create_body(10, "before", None)).await;
    let token = f.service.current_version(10).await.unwrap().unwrap();

    let metadata = json!({"callback_queue": "games", "callback_method": "TaskDone"});
    f.deliver(json!({
        "action": "UpdateTask",
        "payload": { "id": 10, "name": "after", "if_match": token.as_str() },
        "metadata": metadata,
    }))
    .await;

    assert_eq!(f.service.find_task(10).await.unwrap().unwrap().name, "after");
    let replies = f.broker.queued_bodies("games-out");
    assert_eq!(replies.len(), 1);
    assert_eq!(replies[0]["payload"]["status"], "Updated");
}

#[tokio::test]
async fn stale_token_update_is_dead_lettered() {
    let f = fixture();
    f.deliver(create_body(11, "before", None)).await;
    let stale = f.service.current_version(11).await.unwrap().unwrap();
    // Age the token.
    f.service
        .update_task_name(11, "mid", Some(stale.as_str()))
        .await
        .unwrap();

    f.deliver(json!({
        "action": "UpdateTask",
        "payload": { "id": 11, "name": "late", "if_match": stale.as_str() },
    }))
    .await;

    assert_eq!(f.broker.archived_len(QUEUE), 1);
    assert_eq!(f.service.find_task(11).await.unwrap().unwrap().name, "mid");
}

#[tokio::test]
async fn delete_action_removes_the_task_and_tolerates_replay() {
    let f = fixture();
    f.deliver(create_body(12, "ephemeral", None)).await;
    assert_eq!(f.store.row_count(), 1);

    let delete = json!({"action": "DeleteTask", "payload": {"id": 12}});
    f.deliver(delete.clone()).await;
    f.deliver(delete).await;

    assert_eq!(f.store.row_count(), 0);
    assert_eq!(f.broker.archived_len(QUEUE), 0);
}

#[tokio::test]
async fn lease_renewal_capability_reaches_the_broker() {
    let f = fixture();
    let ctx = HandlerContext::new(
        Arc::clone(&f.broker) as _,
        QUEUE,
        99,
        CancellationToken::new(),
    );
    ctx.renew_lease(120).await.unwrap();
    assert_eq!(f.broker.lease_renewals(), 1);
}
