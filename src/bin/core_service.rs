//! Campus core service: queue consumer plus the nightly purge scheduler.

use anyhow::Context;
use campus_core::config::CoreConfig;
use campus_core::constants::OUTBOUND_QUEUE_SUFFIX;
use campus_core::messaging::{ActionDispatcher, ActionTag, Broker, PgmqBroker, QueueConsumer};
use campus_core::orchestration::{
    CreateTaskHandler, DeleteTaskHandler, PurgeScheduler, SessionPurger, TaskService,
    UpdateTaskHandler,
};
use campus_core::storage::{PgAdvisoryLock, PgSessionStore, PgTaskStore};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::info;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    campus_core::logging::init_structured_logging();

    let config = CoreConfig::from_env().context("loading configuration")?;
    let pool = campus_core::database::connect(&config.database_url)
        .await
        .context("connecting to database")?;
    campus_core::database::migrate(&pool)
        .await
        .context("running migrations")?;

    let broker = Arc::new(PgmqBroker::new(pool.clone()));
    broker
        .ensure_queue(&config.consumer.queue_name)
        .await
        .context("creating inbound queue")?;
    broker
        .ensure_queue(&format!(
            "{}{}",
            config.consumer.queue_name, OUTBOUND_QUEUE_SUFFIX
        ))
        .await
        .context("creating outbound companion queue")?;

    let task_service = Arc::new(TaskService::new(Arc::new(PgTaskStore::new(pool.clone()))));
    let mut dispatcher = ActionDispatcher::new();
    dispatcher.register(
        ActionTag::CreateTask,
        Arc::new(CreateTaskHandler::new(Arc::clone(&task_service))),
    );
    dispatcher.register(
        ActionTag::UpdateTask,
        Arc::new(UpdateTaskHandler::new(Arc::clone(&task_service))),
    );
    dispatcher.register(
        ActionTag::DeleteTask,
        Arc::new(DeleteTaskHandler::new(Arc::clone(&task_service))),
    );

    let cancellation = CancellationToken::new();

    let consumer = QueueConsumer::new(
        Arc::clone(&broker) as Arc<dyn Broker>,
        Arc::new(dispatcher),
        config.consumer.clone(),
        cancellation.child_token(),
    );

    let purger = SessionPurger::new(Arc::new(PgSessionStore::new(pool.clone())));
    let scheduler = PurgeScheduler::new(
        &config.scheduler,
        Arc::new(PgAdvisoryLock::new(pool)),
        purger,
        cancellation.child_token(),
    )
    .context("building purge scheduler")?;

    let consumer_task = tokio::spawn(async move { consumer.run().await });
    let scheduler_task = tokio::spawn(async move { scheduler.run().await });

    info!("Campus core service started");
    tokio::signal::ctrl_c()
        .await
        .context("waiting for shutdown signal")?;
    info!("Shutdown signal received");
    cancellation.cancel();

    let _ = consumer_task.await;
    let _ = scheduler_task.await;
    info!("Campus core service stopped");
    Ok(())
}
