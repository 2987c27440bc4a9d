//! Idempotent creation and optimistic-concurrency behavior of the task
//! service, exercised against the in-memory store.

use campus_core::models::NewTaskRecord;
use campus_core::orchestration::{CreateOutcome, TaskService, UpdateOutcome};
use campus_core::test_helpers::InMemoryTaskStore;
use std::sync::Arc;

fn setup() -> (Arc<InMemoryTaskStore>, Arc<TaskService>) {
    let store = Arc::new(InMemoryTaskStore::new());
    let service = Arc::new(TaskService::new(Arc::clone(&store) as _));
    (store, service)
}

fn task(id: i64, name: &str) -> NewTaskRecord {
    NewTaskRecord {
        id,
        name: name.to_string(),
        payload: None,
    }
}

#[tokio::test]
async fn duplicate_create_with_same_content_is_a_noop_success() {
    let (store, service) = setup();

    assert_eq!(
        service.create_task(&task(7, "algebra")).await.unwrap(),
        CreateOutcome::Created
    );
    assert_eq!(
        service.create_task(&task(7, "algebra")).await.unwrap(),
        CreateOutcome::Replayed
    );
    assert_eq!(store.row_count(), 1);
}

#[tokio::test]
async fn duplicate_create_with_different_content_is_a_conflict() {
    let (_store, service) = setup();

    service.create_task(&task(7, "algebra")).await.unwrap();
    assert_eq!(
        service.create_task(&task(7, "geometry")).await.unwrap(),
        CreateOutcome::Conflict
    );
    // Order and repetition do not change the verdict.
    assert_eq!(
        service.create_task(&task(7, "geometry")).await.unwrap(),
        CreateOutcome::Conflict
    );
}

#[tokio::test]
async fn concurrent_creates_of_the_same_task_both_succeed() {
    let (store, service) = setup();

    let task_a = task(42, "reading");
    let task_b = task(42, "reading");
    let (a, b) = tokio::join!(
        service.create_task(&task_a),
        service.create_task(&task_b),
    );
    let outcomes = [a.unwrap(), b.unwrap()];
    assert!(outcomes.contains(&CreateOutcome::Created));
    assert!(outcomes
        .iter()
        .all(|o| matches!(o, CreateOutcome::Created | CreateOutcome::Replayed)));
    assert_eq!(store.row_count(), 1);
}

#[tokio::test]
async fn update_without_a_token_is_rejected_before_the_store() {
    let (store, service) = setup();
    service.create_task(&task(1, "a")).await.unwrap();

    assert_eq!(
        service.update_task_name(1, "b", None).await.unwrap(),
        UpdateOutcome::PreconditionRequired
    );
    assert_eq!(
        service.update_task_name(1, "b", Some("")).await.unwrap(),
        UpdateOutcome::PreconditionRequired
    );
    assert_eq!(
        service
            .update_task_name(1, "b", Some("W/\"\""))
            .await
            .unwrap(),
        UpdateOutcome::PreconditionRequired
    );
    assert_eq!(store.row_count(), 1);
    assert_eq!(service.find_task(1).await.unwrap().unwrap().name, "a");
}

#[tokio::test]
async fn update_of_a_missing_task_is_not_found() {
    let (_store, service) = setup();
    assert_eq!(
        service
            .update_task_name(999, "b", Some("1"))
            .await
            .unwrap(),
        UpdateOutcome::NotFound
    );
}

#[tokio::test]
async fn stale_token_loses_and_the_winner_update_sticks() {
    let (_store, service) = setup();
    service.create_task(&task(5, "draft")).await.unwrap();
    let t1 = service.current_version(5).await.unwrap().unwrap();

    // Two writers hold the same observed version; only one may win.
    let first = service
        .update_task_name(5, "winner", Some(t1.as_str()))
        .await
        .unwrap();
    let second = service
        .update_task_name(5, "loser", Some(t1.as_str()))
        .await
        .unwrap();

    assert!(matches!(first, UpdateOutcome::Updated { .. }));
    assert_eq!(second, UpdateOutcome::PreconditionFailed);
    assert_eq!(service.find_task(5).await.unwrap().unwrap().name, "winner");
}

#[tokio::test]
async fn returned_token_chains_into_the_next_update() {
    let (_store, service) = setup();
    service.create_task(&task(6, "one")).await.unwrap();
    let t1 = service.current_version(6).await.unwrap().unwrap();

    let UpdateOutcome::Updated { token: t2 } = service
        .update_task_name(6, "two", Some(t1.as_str()))
        .await
        .unwrap()
    else {
        panic!("first update must succeed");
    };
    assert_ne!(t1, t2);

    let outcome = service
        .update_task_name(6, "three", Some(t2.as_str()))
        .await
        .unwrap();
    assert!(matches!(outcome, UpdateOutcome::Updated { .. }));
    assert_eq!(service.find_task(6).await.unwrap().unwrap().name, "three");
}

#[tokio::test]
async fn etag_decorated_tokens_are_normalized_before_comparison() {
    let (_store, service) = setup();
    service.create_task(&task(8, "styled")).await.unwrap();
    let token = service.current_version(8).await.unwrap().unwrap();

    let decorated = format!("W/\"{}\"", token.as_str());
    let outcome = service
        .update_task_name(8, "renamed", Some(&decorated))
        .await
        .unwrap();
    assert!(matches!(outcome, UpdateOutcome::Updated { .. }));
}

#[tokio::test]
async fn delete_is_idempotent_and_frees_the_id() {
    let (_store, service) = setup();
    service.create_task(&task(9, "temp")).await.unwrap();

    assert!(service.delete_task(9).await.unwrap());
    assert!(!service.delete_task(9).await.unwrap());
    assert_eq!(
        service.create_task(&task(9, "fresh")).await.unwrap(),
        CreateOutcome::Created
    );
}

#[tokio::test]
async fn create_replay_conflict_then_guarded_updates() {
    let (_store, service) = setup();

    assert_eq!(
        service.create_task(&task(7, "A")).await.unwrap(),
        CreateOutcome::Created
    );
    assert_eq!(
        service.create_task(&task(7, "A")).await.unwrap(),
        CreateOutcome::Replayed
    );
    assert_eq!(
        service.create_task(&task(7, "B")).await.unwrap(),
        CreateOutcome::Conflict
    );

    let t1 = service.current_version(7).await.unwrap().unwrap();
    // Age the token with an unrelated write.
    service
        .update_task_name(7, "A2", Some(t1.as_str()))
        .await
        .unwrap();
    assert_eq!(
        service.update_task_name(7, "C", Some(t1.as_str())).await.unwrap(),
        UpdateOutcome::PreconditionFailed
    );

    let current = service.current_version(7).await.unwrap().unwrap();
    let outcome = service
        .update_task_name(7, "C", Some(current.as_str()))
        .await
        .unwrap();
    let UpdateOutcome::Updated { token: t2 } = outcome else {
        panic!("current token must win");
    };
    assert_ne!(t2, current);
}
