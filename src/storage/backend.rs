//! Backend selection by database URL

use crate::storage::postgres::PostgresStorage;
use crate::storage::sqlite::SqliteStorage;
use crate::storage::traits::{Storage, StorageError, StorageResult};
use crate::storage::{Item, ItemRecord, RunCounters, RunParams, RunRecord, RunStatus, UpsertOutcome};
use std::path::Path;

/// The storage backend chosen by configuration
pub enum StorageBackend {
    Sqlite(SqliteStorage),
    Postgres(PostgresStorage),
}

/// Opens the backend named by `database_url`
///
/// Accepted forms:
/// - `sqlite:///relative.db`, `sqlite:////absolute/path.db`, `sqlite:file.db`
/// - `sqlite::memory:`
/// - `postgres://...` or `postgresql://...`
pub async fn open_storage(database_url: &str) -> StorageResult<StorageBackend> {
    if database_url.starts_with("postgres://") || database_url.starts_with("postgresql://") {
        let storage = PostgresStorage::connect(database_url).await?;
        return Ok(StorageBackend::Postgres(storage));
    }

    match sqlite_path(database_url) {
        Some(":memory:") => Ok(StorageBackend::Sqlite(SqliteStorage::new_in_memory()?)),
        Some(path) => Ok(StorageBackend::Sqlite(SqliteStorage::new(Path::new(path))?)),
        None => Err(StorageError::UnsupportedUrl(database_url.to_string())),
    }
}

/// Extracts the file path from a `sqlite:` URL
fn sqlite_path(database_url: &str) -> Option<&str> {
    let path = database_url
        .strip_prefix("sqlite:///")
        .or_else(|| database_url.strip_prefix("sqlite://"))
        .or_else(|| database_url.strip_prefix("sqlite:"))?;

    if path.is_empty() {
        None
    } else {
        Some(path)
    }
}

impl StorageBackend {
    /// Releases the underlying connection or pool
    pub async fn close(self) {
        match self {
            Self::Sqlite(storage) => {
                drop(storage);
                tracing::info!("SQLite database closed");
            }
            Self::Postgres(storage) => storage.close().await,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Self::Sqlite(_) => "sqlite",
            Self::Postgres(_) => "postgres",
        }
    }
}

impl Storage for StorageBackend {
    async fn create_run(&mut self, params: &RunParams) -> StorageResult<RunRecord> {
        match self {
            Self::Sqlite(s) => s.create_run(params).await,
            Self::Postgres(s) => s.create_run(params).await,
        }
    }

    async fn update_run_counters(
        &mut self,
        run_id: i64,
        counters: &RunCounters,
    ) -> StorageResult<()> {
        match self {
            Self::Sqlite(s) => s.update_run_counters(run_id, counters).await,
            Self::Postgres(s) => s.update_run_counters(run_id, counters).await,
        }
    }

    async fn finish_run(
        &mut self,
        run_id: i64,
        counters: &RunCounters,
        status: RunStatus,
    ) -> StorageResult<RunRecord> {
        match self {
            Self::Sqlite(s) => s.finish_run(run_id, counters, status).await,
            Self::Postgres(s) => s.finish_run(run_id, counters, status).await,
        }
    }

    async fn get_run(&self, run_id: i64) -> StorageResult<RunRecord> {
        match self {
            Self::Sqlite(s) => s.get_run(run_id).await,
            Self::Postgres(s) => s.get_run(run_id).await,
        }
    }

    async fn recent_runs(&self, limit: usize) -> StorageResult<Vec<RunRecord>> {
        match self {
            Self::Sqlite(s) => s.recent_runs(limit).await,
            Self::Postgres(s) => s.recent_runs(limit).await,
        }
    }

    async fn upsert_item(&mut self, item: &Item) -> StorageResult<UpsertOutcome> {
        match self {
            Self::Sqlite(s) => s.upsert_item(item).await,
            Self::Postgres(s) => s.upsert_item(item).await,
        }
    }

    async fn get_item(&self, item_id: &str) -> StorageResult<Option<ItemRecord>> {
        match self {
            Self::Sqlite(s) => s.get_item(item_id).await,
            Self::Postgres(s) => s.get_item(item_id).await,
        }
    }

    async fn count_items(&self) -> StorageResult<u64> {
        match self {
            Self::Sqlite(s) => s.count_items().await,
            Self::Postgres(s) => s.count_items().await,
        }
    }
}
