use crate::common::{test_config, ScriptedSource};
use hibid_ingest::storage::{
    Item, ItemRecord, RunCounters, RunParams, RunRecord, SqliteStorage, Storage, StorageError,
    StorageResult, UpsertOutcome,
};
use hibid_ingest::{Coordinator, IngestError, RunStatus};
use std::time::Duration;
use tempfile::TempDir;
use tokio_util::sync::CancellationToken;

fn file_storage() -> (SqliteStorage, TempDir) {
    let dir = tempfile::tempdir().unwrap();
    let storage = SqliteStorage::new(&dir.path().join("auctions.db")).unwrap();
    (storage, dir)
}

#[tokio::test]
async fn test_test_mode_caps_items() {
    let (mut storage, _dir) = file_storage();
    let mut config = test_config("sqlite::memory:");
    config.search.radius_miles = 50;
    config.search.test_mode = true;
    config.search.test_limit = 20;
    let source = ScriptedSource::new(100, 10);

    let summary = Coordinator::new(&config, &source)
        .run(&mut storage, &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(summary.status, RunStatus::Completed);
    assert_eq!(summary.items_found, 20);
    assert_eq!(source.calls(), 1);
    assert_eq!(storage.count_items().await.unwrap(), 20);
}

#[tokio::test]
async fn test_interrupted_run_keeps_partial_counters() {
    let (mut storage, _dir) = file_storage();
    let config = test_config("sqlite::memory:");
    let cancel = CancellationToken::new();
    let mut source = ScriptedSource::new(20, 10);
    source.interrupt_after = Some((2, cancel.clone()));

    let summary = Coordinator::new(&config, &source)
        .run(&mut storage, &cancel)
        .await
        .unwrap();

    assert_eq!(summary.status, RunStatus::Interrupted);
    assert_eq!(summary.items_found, 40);
    assert_eq!(summary.pages_scraped, 2);
    assert!(summary.completed_at.is_some());

    let stored = storage.get_run(summary.run_id).await.unwrap();
    assert_eq!(stored.status, RunStatus::Interrupted);
    assert_eq!(stored.counters.items_found, 40);
    assert!(stored.completed_at.is_some());
}

#[tokio::test]
async fn test_rerun_updates_in_place() {
    let (mut storage, _dir) = file_storage();
    let config = test_config("sqlite::memory:");
    let source = ScriptedSource::new(10, 2);

    let first = Coordinator::new(&config, &source)
        .run(&mut storage, &CancellationToken::new())
        .await
        .unwrap();
    let before = storage.get_item("5").await.unwrap().unwrap();

    tokio::time::sleep(Duration::from_millis(10)).await;

    let second = Coordinator::new(&config, &source)
        .run(&mut storage, &CancellationToken::new())
        .await
        .unwrap();
    let after = storage.get_item("5").await.unwrap().unwrap();

    assert_eq!(first.items_added, 20);
    assert_eq!(second.items_added, 0);
    assert_eq!(second.items_updated, second.items_found);
    assert_eq!(second.items_found, 20);
    assert!(second.run_id > first.run_id);

    assert_eq!(after.first_created_at, before.first_created_at);
    assert!(after.scraped_at > before.scraped_at);
    assert_eq!(storage.count_items().await.unwrap(), 20);
}

#[tokio::test]
async fn test_overlapping_runs_stay_balanced() {
    let (mut storage, _dir) = file_storage();
    let config = test_config("sqlite::memory:");

    let first_source = ScriptedSource::new(10, 2);
    Coordinator::new(&config, &first_source)
        .run(&mut storage, &CancellationToken::new())
        .await
        .unwrap();

    // ids 11..=40 overlap the first run on 11..=20
    let mut second_source = ScriptedSource::new(10, 3);
    second_source.first_id = 11;
    let summary = Coordinator::new(&config, &second_source)
        .run(&mut storage, &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(summary.items_found, 30);
    assert_eq!(summary.items_added, 20);
    assert_eq!(summary.items_updated, 10);
    assert!(summary.counters().is_balanced());
}

#[tokio::test]
async fn test_short_page_halts_pagination() {
    let (mut storage, _dir) = file_storage();
    let config = test_config("sqlite::memory:");
    let mut source = ScriptedSource::new(20, 1);
    source.short_page = 5;

    let summary = Coordinator::new(&config, &source)
        .run(&mut storage, &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(summary.items_found, 25);
    assert_eq!(summary.pages_scraped, 2);
    assert_eq!(source.calls(), 2);
}

#[tokio::test]
async fn test_empty_page_halts_pagination() {
    let (mut storage, _dir) = file_storage();
    let config = test_config("sqlite::memory:");
    let source = ScriptedSource::new(20, 2);

    let summary = Coordinator::new(&config, &source)
        .run(&mut storage, &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(summary.items_found, 40);
    assert_eq!(source.calls(), 3);
    assert_eq!(summary.status, RunStatus::Completed);
}

#[tokio::test]
async fn test_failed_page_counts_error_and_keeps_earlier_items() {
    let (mut storage, _dir) = file_storage();
    let config = test_config("sqlite::memory:");
    let mut source = ScriptedSource::new(20, 5);
    source.failing_pages = vec![2];

    let summary = Coordinator::new(&config, &source)
        .run(&mut storage, &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(summary.status, RunStatus::Completed);
    assert_eq!(summary.items_found, 20);
    assert_eq!(summary.errors, 1);
    // the failed page is counted as an error, not as a scraped page
    assert_eq!(summary.pages_scraped, 1);
    assert_eq!(source.calls(), 2);
}

/// SQLite storage whose item writes start failing after `fail_after` upserts
struct FailingStorage {
    inner: SqliteStorage,
    fail_after: usize,
    upserts: usize,
    /// Rejects closing a run as completed
    refuse_completion: bool,
}

impl Storage for FailingStorage {
    async fn create_run(&mut self, params: &RunParams) -> StorageResult<RunRecord> {
        self.inner.create_run(params).await
    }

    async fn update_run_counters(
        &mut self,
        run_id: i64,
        counters: &RunCounters,
    ) -> StorageResult<()> {
        self.inner.update_run_counters(run_id, counters).await
    }

    async fn finish_run(
        &mut self,
        run_id: i64,
        counters: &RunCounters,
        status: RunStatus,
    ) -> StorageResult<RunRecord> {
        if self.refuse_completion && status == RunStatus::Completed {
            return Err(StorageError::Database("database is locked".to_string()));
        }
        self.inner.finish_run(run_id, counters, status).await
    }

    async fn get_run(&self, run_id: i64) -> StorageResult<RunRecord> {
        self.inner.get_run(run_id).await
    }

    async fn recent_runs(&self, limit: usize) -> StorageResult<Vec<RunRecord>> {
        self.inner.recent_runs(limit).await
    }

    async fn upsert_item(&mut self, item: &Item) -> StorageResult<UpsertOutcome> {
        if self.upserts >= self.fail_after {
            return Err(StorageError::Database("disk I/O error".to_string()));
        }
        self.upserts += 1;
        self.inner.upsert_item(item).await
    }

    async fn get_item(&self, item_id: &str) -> StorageResult<Option<ItemRecord>> {
        self.inner.get_item(item_id).await
    }

    async fn count_items(&self) -> StorageResult<u64> {
        self.inner.count_items().await
    }
}

#[tokio::test]
async fn test_storage_failure_closes_run_failed() {
    let (inner, _dir) = file_storage();
    let mut storage = FailingStorage {
        inner,
        fail_after: 15,
        upserts: 0,
        refuse_completion: false,
    };
    let config = test_config("sqlite::memory:");
    let source = ScriptedSource::new(10, 5);

    let result = Coordinator::new(&config, &source)
        .run(&mut storage, &CancellationToken::new())
        .await;
    assert!(matches!(result, Err(IngestError::Storage(_))));

    let runs = storage.recent_runs(1).await.unwrap();
    let run = &runs[0];
    assert_eq!(run.status, RunStatus::Failed);
    assert!(run.completed_at.is_some());
    assert_eq!(run.counters.items_added, 15);
    assert_eq!(run.counters.errors, 1);
    // pagination stopped at the failing page
    assert_eq!(source.calls(), 2);
}

#[tokio::test]
async fn test_failed_completion_closes_run_failed() {
    let (inner, _dir) = file_storage();
    let mut storage = FailingStorage {
        inner,
        fail_after: usize::MAX,
        upserts: 0,
        refuse_completion: true,
    };
    let config = test_config("sqlite::memory:");
    let source = ScriptedSource::new(10, 2);

    let result = Coordinator::new(&config, &source)
        .run(&mut storage, &CancellationToken::new())
        .await;
    assert!(matches!(result, Err(IngestError::Storage(_))));

    let runs = storage.recent_runs(1).await.unwrap();
    let run = &runs[0];
    assert_eq!(run.status, RunStatus::Failed);
    assert!(run.completed_at.is_some());
    assert_eq!(run.counters.items_found, 20);
    assert_eq!(run.counters.errors, 1);
}
