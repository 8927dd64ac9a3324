//! Run accounting
//!
//! A run is opened before the first page is fetched and closed exactly once.
//! Counters are written back after every page so an abrupt exit still leaves
//! the progress made so far in the run record.

use crate::storage::{RunCounters, RunParams, RunRecord, RunStatus, Storage, StorageResult};
use chrono::{DateTime, Duration, Utc};

/// Counts produced by one processed page
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PageTally {
    pub found: u64,
    pub added: u64,
    pub updated: u64,
    pub errors: u64,
    /// 1 when the page was fetched and parsed, 0 for a failed fetch
    pub pages: u64,
}

/// Handle on an open run
///
/// `close` takes the tracker by value, so a handle can be closed only once.
#[derive(Debug)]
pub struct RunTracker {
    run_id: i64,
    started_at: DateTime<Utc>,
    counters: RunCounters,
}

impl RunTracker {
    /// Creates the run record with status `running`
    pub async fn open<S: Storage>(storage: &mut S, params: &RunParams) -> StorageResult<Self> {
        let record = storage.create_run(params).await?;
        tracing::info!(
            "Started scrape run {} (zip: {}, radius: {} miles)",
            record.id,
            params.zip_code,
            params.radius_miles
        );

        Ok(Self {
            run_id: record.id,
            started_at: record.started_at,
            counters: RunCounters::default(),
        })
    }

    pub fn run_id(&self) -> i64 {
        self.run_id
    }

    pub fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    pub fn counters(&self) -> RunCounters {
        self.counters
    }

    /// Adds one page's counts and persists the running totals
    pub async fn record_page<S: Storage>(
        &mut self,
        storage: &mut S,
        tally: PageTally,
    ) -> StorageResult<()> {
        self.counters.items_found += tally.found;
        self.counters.items_added += tally.added;
        self.counters.items_updated += tally.updated;
        self.counters.errors += tally.errors;
        self.counters.pages_scraped += tally.pages;

        storage
            .update_run_counters(self.run_id, &self.counters)
            .await
    }

    /// Counts a failure that happened outside page processing
    pub fn record_error(&mut self) {
        self.counters.errors += 1;
    }

    /// Writes `completed_at` and the terminal status
    pub async fn close<S: Storage>(
        self,
        storage: &mut S,
        status: RunStatus,
    ) -> StorageResult<RunSummary> {
        let record = storage
            .finish_run(self.run_id, &self.counters, status)
            .await?;
        tracing::info!("Scrape run {} finished with status {}", record.id, record.status);
        Ok(RunSummary::from(record))
    }
}

/// Final state of one run, mirroring its stored record
#[derive(Debug, Clone, PartialEq)]
pub struct RunSummary {
    pub run_id: i64,
    pub status: RunStatus,
    pub started_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
    pub params: RunParams,
    pub items_found: u64,
    pub items_added: u64,
    pub items_updated: u64,
    pub errors: u64,
    pub pages_scraped: u64,
}

impl RunSummary {
    /// Wall time between open and close
    pub fn duration(&self) -> Option<Duration> {
        self.completed_at.map(|end| end - self.started_at)
    }

    pub fn counters(&self) -> RunCounters {
        RunCounters {
            items_found: self.items_found,
            items_added: self.items_added,
            items_updated: self.items_updated,
            errors: self.errors,
            pages_scraped: self.pages_scraped,
        }
    }
}

impl From<RunRecord> for RunSummary {
    fn from(record: RunRecord) -> Self {
        Self {
            run_id: record.id,
            status: record.status,
            started_at: record.started_at,
            completed_at: record.completed_at,
            params: record.params,
            items_found: record.counters.items_found,
            items_added: record.counters.items_added,
            items_updated: record.counters.items_updated,
            errors: record.counters.errors,
            pages_scraped: record.counters.pages_scraped,
        }
    }
}
