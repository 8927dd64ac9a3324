//! PostgreSQL backend tests
//!
//! These start a disposable postgres container and are ignored unless Docker
//! is available: `cargo test -- --ignored`.

use crate::common::{lot, test_config, ScriptedSource};
use chrono::Utc;
use hibid_ingest::storage::{
    Item, PostgresStorage, RunCounters, RunParams, Storage, StorageError, UpsertOutcome,
};
use hibid_ingest::{Coordinator, RunStatus};
use sqlx::postgres::PgPoolOptions;
use testcontainers::core::{ContainerPort, WaitFor};
use testcontainers::runners::AsyncRunner;
use testcontainers::{ContainerAsync, GenericImage, ImageExt};
use tokio_util::sync::CancellationToken;

/// Spins up PostgreSQL and returns a storage with the schema applied
///
/// The container stops when the returned handle is dropped.
async fn setup_storage() -> (PostgresStorage, ContainerAsync<GenericImage>) {
    let container = GenericImage::new("postgres", "16")
        .with_exposed_port(ContainerPort::Tcp(5432))
        .with_wait_for(WaitFor::message_on_stderr(
            "database system is ready to accept connections",
        ))
        .with_env_var("POSTGRES_PASSWORD", "postgres")
        .with_env_var("POSTGRES_DB", "hibid_test")
        .start()
        .await
        .expect("Failed to start PostgreSQL container");

    let host = container.get_host().await.expect("Failed to get host");
    let port = container
        .get_host_port_ipv4(5432)
        .await
        .expect("Failed to get port");
    let url = format!("postgresql://postgres:postgres@{host}:{port}/hibid_test");

    const MAX_RETRIES: u32 = 30;
    let mut retries = 0;
    let pool = loop {
        match PgPoolOptions::new().max_connections(2).connect(&url).await {
            Ok(pool) => break pool,
            Err(e) => {
                retries += 1;
                if retries >= MAX_RETRIES {
                    panic!("Failed to connect to database after {MAX_RETRIES} retries: {e}");
                }
                tokio::time::sleep(std::time::Duration::from_millis(100)).await;
            }
        }
    };

    let storage = PostgresStorage::from_pool(pool)
        .await
        .expect("Failed to create schema");
    (storage, container)
}

fn item(id: u64, title: &str) -> Item {
    let mut payload = lot(id);
    payload["lead"] = title.into();
    Item {
        item_id: id.to_string(),
        raw_payload: payload,
        scraped_at: Utc::now(),
        zip_code: "78414".to_string(),
        radius_miles: 50,
        category: Some("cars".to_string()),
        search_term: None,
    }
}

#[tokio::test]
#[ignore = "requires docker"]
async fn test_postgres_upsert_preserves_first_seen() {
    let (mut storage, _container) = setup_storage().await;

    let outcome = storage.upsert_item(&item(1, "Ford F-150")).await.unwrap();
    assert_eq!(outcome, UpsertOutcome::Inserted);
    let first = storage.get_item("1").await.unwrap().unwrap();

    tokio::time::sleep(std::time::Duration::from_millis(10)).await;
    let outcome = storage.upsert_item(&item(1, "Ford F-150 XLT")).await.unwrap();
    assert_eq!(outcome, UpsertOutcome::Updated);

    let second = storage.get_item("1").await.unwrap().unwrap();
    assert_eq!(second.raw_payload["lead"], "Ford F-150 XLT");
    assert_eq!(second.first_created_at, first.first_created_at);
    assert!(second.scraped_at > first.scraped_at);
    assert_eq!(storage.count_items().await.unwrap(), 1);
}

#[tokio::test]
#[ignore = "requires docker"]
async fn test_postgres_run_closes_once() {
    let (mut storage, _container) = setup_storage().await;
    let params = RunParams {
        zip_code: "78414".to_string(),
        radius_miles: 100,
        categories: vec!["cars".to_string(), "boats".to_string()],
        search_term: Some("outboard".to_string()),
        test_mode: false,
    };

    let run = storage.create_run(&params).await.unwrap();
    assert_eq!(run.status, RunStatus::Running);
    assert_eq!(run.params, params);

    let counters = RunCounters {
        items_found: 3,
        items_added: 2,
        items_updated: 1,
        errors: 0,
        pages_scraped: 1,
    };
    let closed = storage
        .finish_run(run.id, &counters, RunStatus::Completed)
        .await
        .unwrap();
    assert_eq!(closed.counters, counters);
    assert!(closed.completed_at.is_some());

    let again = storage
        .finish_run(run.id, &counters, RunStatus::Failed)
        .await;
    assert!(matches!(
        again,
        Err(StorageError::InvalidTransition {
            from: RunStatus::Completed,
            ..
        })
    ));
}

#[tokio::test]
#[ignore = "requires docker"]
async fn test_postgres_full_run() {
    let (mut storage, _container) = setup_storage().await;
    let config = test_config("postgres://unused");
    let source = ScriptedSource::new(10, 2);

    let summary = Coordinator::new(&config, &source)
        .run(&mut storage, &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(summary.status, RunStatus::Completed);
    assert_eq!(summary.items_added, 20);
    assert_eq!(storage.recent_runs(5).await.unwrap().len(), 1);
    storage.close().await;
}
