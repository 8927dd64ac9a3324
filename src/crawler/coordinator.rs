//! Scrape coordinator - main ingestion orchestration logic
//!
//! This module contains the run loop that ties the pieces together:
//! - Validating the configuration before anything is written
//! - Opening and closing the run record
//! - Driving the paginator and upserting every yielded item
//! - Handling cancellation, fatal storage errors and panics

use crate::config::{validate, Config};
use crate::crawler::paginator::Paginator;
use crate::crawler::{HttpFetcher, PageSource};
use crate::state::{PageTally, RunSummary, RunTracker};
use crate::storage::{
    open_storage, Item, RunParams, RunStatus, Storage, StorageResult, UpsertOutcome,
};
use crate::Result;
use futures::FutureExt;
use std::panic::AssertUnwindSafe;
use tokio_util::sync::CancellationToken;

/// How the ingest loop ended
enum Flow {
    Exhausted,
    Cancelled,
}

/// Main scrape coordinator structure
pub struct Coordinator<'a, P> {
    config: &'a Config,
    source: &'a P,
}

impl<'a, P: PageSource> Coordinator<'a, P> {
    pub fn new(config: &'a Config, source: &'a P) -> Self {
        Self { config, source }
    }

    /// Executes one scrape run against `storage`
    ///
    /// # Run Flow
    ///
    /// 1. Validate the configuration; an invalid one never opens a run
    /// 2. Open the run record
    /// 3. Fetch pages in order, upserting each item and recording page counts
    /// 4. Close the run:
    ///    - `completed` when pagination is exhausted
    ///    - `interrupted` when `cancel` fires or the loop panics
    ///    - `failed` on a storage error, which is then returned
    ///
    /// # Returns
    ///
    /// * `Ok(RunSummary)` - The run was closed as completed or interrupted
    /// * `Err(IngestError)` - Invalid configuration or a fatal storage error
    pub async fn run<S: Storage>(
        &self,
        storage: &mut S,
        cancel: &CancellationToken,
    ) -> Result<RunSummary> {
        validate(self.config)?;

        let params = RunParams::from(&self.config.search);
        let mut tracker = RunTracker::open(storage, &params).await?;

        let outcome = AssertUnwindSafe(self.ingest(storage, &mut tracker, cancel))
            .catch_unwind()
            .await;

        match outcome {
            Ok(Ok(Flow::Exhausted)) => {
                let run_id = tracker.run_id();
                let mut counters = tracker.counters();
                tracing::info!("Scrape complete for run {}", run_id);
                match tracker.close(storage, RunStatus::Completed).await {
                    Ok(summary) => Ok(summary),
                    Err(e) => {
                        tracing::error!("Failed to close run {} as completed: {}", run_id, e);
                        counters.errors += 1;
                        if let Err(close_err) =
                            storage.finish_run(run_id, &counters, RunStatus::Failed).await
                        {
                            tracing::error!("Failed to close run as failed: {}", close_err);
                        }
                        Err(e.into())
                    }
                }
            }
            Ok(Ok(Flow::Cancelled)) => {
                tracing::warn!("Scrape interrupted, closing run {}", tracker.run_id());
                Ok(tracker.close(storage, RunStatus::Interrupted).await?)
            }
            Ok(Err(e)) => {
                tracing::error!("Scrape failed: {}", e);
                tracker.record_error();
                if let Err(close_err) = tracker.close(storage, RunStatus::Failed).await {
                    tracing::error!("Failed to close run as failed: {}", close_err);
                }
                Err(e.into())
            }
            Err(panic) => {
                tracing::error!("Scrape aborted by panic, closing run {}", tracker.run_id());
                if let Err(close_err) = tracker.close(storage, RunStatus::Interrupted).await {
                    tracing::error!("Failed to close run as interrupted: {}", close_err);
                }
                std::panic::resume_unwind(panic)
            }
        }
    }

    /// Pages through the source until exhaustion or cancellation
    async fn ingest<S: Storage>(
        &self,
        storage: &mut S,
        tracker: &mut RunTracker,
        cancel: &CancellationToken,
    ) -> StorageResult<Flow> {
        let mut pages = Paginator::new(self.source, &self.config.search);

        loop {
            if cancel.is_cancelled() {
                return Ok(Flow::Cancelled);
            }

            let batch = tokio::select! {
                biased;
                _ = cancel.cancelled() => return Ok(Flow::Cancelled),
                batch = pages.next_page() => batch,
            };
            let Some(batch) = batch else {
                return Ok(Flow::Exhausted);
            };

            let mut tally = PageTally {
                errors: batch.errors,
                pages: u64::from(batch.scraped),
                ..Default::default()
            };
            let stored = store_items(storage, &batch.items, &mut tally).await;
            let recorded = tracker.record_page(storage, tally).await;
            stored?;
            recorded?;

            let totals = tracker.counters();
            tracing::debug!(
                "Run {} totals: found {}, added {}, updated {}, errors {}",
                tracker.run_id(),
                totals.items_found,
                totals.items_added,
                totals.items_updated,
                totals.errors
            );
        }
    }
}

/// Upserts a page's items in order, tallying the outcomes
async fn store_items<S: Storage>(
    storage: &mut S,
    items: &[Item],
    tally: &mut PageTally,
) -> StorageResult<()> {
    for item in items {
        tally.found += 1;
        match storage.upsert_item(item).await? {
            UpsertOutcome::Inserted => {
                tracing::debug!("Added new item: {}", item.item_id);
                tally.added += 1;
            }
            UpsertOutcome::Updated => {
                tracing::debug!("Updated item: {}", item.item_id);
                tally.updated += 1;
            }
        }
    }
    Ok(())
}

/// Runs one scrape invocation end to end
///
/// Validates `config`, opens the configured storage backend, fetches over HTTP
/// and releases the backend on every exit path.
///
/// # Example
///
/// ```no_run
/// use hibid_ingest::{run, Config};
/// use tokio_util::sync::CancellationToken;
///
/// # async fn example() -> hibid_ingest::Result<()> {
/// let mut config = Config::for_zip("78414");
/// config.search.test_mode = true;
/// let summary = run(&config, &CancellationToken::new()).await?;
/// println!("{} items found", summary.items_found);
/// # Ok(())
/// # }
/// ```
pub async fn run(config: &Config, cancel: &CancellationToken) -> Result<RunSummary> {
    validate(config)?;

    let fetcher = HttpFetcher::new(config)?;
    let mut storage = open_storage(&config.storage.database_url).await?;
    tracing::info!("Using {} storage backend", storage.kind());

    let result = Coordinator::new(config, &fetcher)
        .run(&mut storage, cancel)
        .await;

    storage.close().await;
    result
}
