//! Storage traits and error types
//!
//! This module defines the trait interface for storage backends and
//! associated error types.

use crate::storage::{
    Item, ItemRecord, RunCounters, RunParams, RunRecord, RunStatus, UpsertOutcome,
};
use thiserror::Error;

/// Errors that can occur during storage operations
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Database error: {0}")]
    Database(String),

    #[error("Run not found: {0}")]
    RunNotFound(i64),

    #[error("Invalid run status transition: {from:?} -> {to:?}")]
    InvalidTransition { from: RunStatus, to: RunStatus },

    #[error("Unsupported database URL: {0}")]
    UnsupportedUrl(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("PostgreSQL error: {0}")]
    Postgres(#[from] sqlx::Error),
}

/// Result type for storage operations
pub type StorageResult<T> = Result<T, StorageError>;

/// Trait for storage backend implementations
///
/// A backend owns one connection (or pool) for the duration of an invocation.
/// Writes from a single invocation are issued strictly in order; no
/// cross-invocation locking is provided.
#[allow(async_fn_in_trait)]
pub trait Storage {
    // ===== Run Management =====

    /// Opens a new run in `running` status with zeroed counters
    async fn create_run(&mut self, params: &RunParams) -> StorageResult<RunRecord>;

    /// Persists the current counters of a running run
    async fn update_run_counters(
        &mut self,
        run_id: i64,
        counters: &RunCounters,
    ) -> StorageResult<()>;

    /// Writes final counters, `completed_at` and a terminal status
    ///
    /// Fails with [`StorageError::InvalidTransition`] if the run is already
    /// closed or `status` is not terminal.
    async fn finish_run(
        &mut self,
        run_id: i64,
        counters: &RunCounters,
        status: RunStatus,
    ) -> StorageResult<RunRecord>;

    /// Gets a run by ID
    async fn get_run(&self, run_id: i64) -> StorageResult<RunRecord>;

    /// Gets the most recent runs, newest first
    async fn recent_runs(&self, limit: usize) -> StorageResult<Vec<RunRecord>>;

    // ===== Item Management =====

    /// Inserts or updates an item keyed by `item_id`
    ///
    /// On update the payload, `scraped_at` and search context are replaced
    /// and `first_created_at` is preserved. Atomic per item.
    async fn upsert_item(&mut self, item: &Item) -> StorageResult<UpsertOutcome>;

    /// Gets an item by its natural key
    async fn get_item(&self, item_id: &str) -> StorageResult<Option<ItemRecord>>;

    /// Gets total item count
    async fn count_items(&self) -> StorageResult<u64>;
}
