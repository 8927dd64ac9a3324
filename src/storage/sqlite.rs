//! SQLite storage implementation
//!
//! This module provides the embedded single-file implementation of the
//! Storage trait.

use crate::storage::schema::initialize_schema;
use crate::storage::traits::{Storage, StorageError, StorageResult};
use crate::storage::{
    join_categories, split_categories, Item, ItemRecord, RunCounters, RunParams, RunRecord,
    RunStatus, UpsertOutcome,
};
use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::types::Type;
use rusqlite::{params, Connection, OptionalExtension, Row};
use std::path::Path;

const RUN_COLUMNS: &str = "id, started_at, completed_at, zip_code, radius_miles, test_mode, \
     search_term, categories, items_found, items_added, items_updated, errors, pages_scraped, status";

const ITEM_COLUMNS: &str =
    "item_id, raw_json, scraped_at, zip_code, radius_miles, category, search_term, created_at";

/// SQLite storage backend
pub struct SqliteStorage {
    conn: Connection,
}

impl SqliteStorage {
    /// Opens (or creates) the database file at `path` and initializes the schema
    pub fn new(path: &Path) -> StorageResult<Self> {
        let conn = Connection::open(path)?;

        conn.execute_batch(
            "
            PRAGMA journal_mode = WAL;
            PRAGMA synchronous = NORMAL;
            PRAGMA temp_store = MEMORY;
        ",
        )?;

        initialize_schema(&conn)?;

        tracing::info!("Opened SQLite database: {}", path.display());
        Ok(Self { conn })
    }

    /// Creates an in-memory database
    pub fn new_in_memory() -> StorageResult<Self> {
        let conn = Connection::open_in_memory()?;
        initialize_schema(&conn)?;
        Ok(Self { conn })
    }

    fn load_run(&self, run_id: i64) -> StorageResult<RunRecord> {
        let sql = format!("SELECT {} FROM scrape_runs WHERE id = ?1", RUN_COLUMNS);
        self.conn
            .query_row(&sql, params![run_id], run_from_row)
            .optional()?
            .ok_or(StorageError::RunNotFound(run_id))
    }
}

impl Storage for SqliteStorage {
    // ===== Run Management =====

    async fn create_run(&mut self, params: &RunParams) -> StorageResult<RunRecord> {
        let now = format_timestamp(Utc::now());
        self.conn.execute(
            "INSERT INTO scrape_runs (started_at, zip_code, radius_miles, test_mode, search_term, categories, status)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                now,
                params.zip_code,
                params.radius_miles,
                params.test_mode,
                params.search_term,
                join_categories(&params.categories),
                RunStatus::Running.to_db_string()
            ],
        )?;
        self.load_run(self.conn.last_insert_rowid())
    }

    async fn update_run_counters(
        &mut self,
        run_id: i64,
        counters: &RunCounters,
    ) -> StorageResult<()> {
        let updated = self.conn.execute(
            "UPDATE scrape_runs SET items_found = ?1, items_added = ?2, items_updated = ?3,
             errors = ?4, pages_scraped = ?5 WHERE id = ?6",
            params![
                counters.items_found as i64,
                counters.items_added as i64,
                counters.items_updated as i64,
                counters.errors as i64,
                counters.pages_scraped as i64,
                run_id
            ],
        )?;

        if updated == 0 {
            return Err(StorageError::RunNotFound(run_id));
        }
        Ok(())
    }

    async fn finish_run(
        &mut self,
        run_id: i64,
        counters: &RunCounters,
        status: RunStatus,
    ) -> StorageResult<RunRecord> {
        let current = self.load_run(run_id)?;
        if current.status.is_terminal() || !status.is_terminal() {
            return Err(StorageError::InvalidTransition {
                from: current.status,
                to: status,
            });
        }

        let now = format_timestamp(Utc::now());
        self.conn.execute(
            "UPDATE scrape_runs SET completed_at = ?1, items_found = ?2, items_added = ?3,
             items_updated = ?4, errors = ?5, pages_scraped = ?6, status = ?7
             WHERE id = ?8 AND status = 'running'",
            params![
                now,
                counters.items_found as i64,
                counters.items_added as i64,
                counters.items_updated as i64,
                counters.errors as i64,
                counters.pages_scraped as i64,
                status.to_db_string(),
                run_id
            ],
        )?;

        self.load_run(run_id)
    }

    async fn get_run(&self, run_id: i64) -> StorageResult<RunRecord> {
        self.load_run(run_id)
    }

    async fn recent_runs(&self, limit: usize) -> StorageResult<Vec<RunRecord>> {
        let sql = format!(
            "SELECT {} FROM scrape_runs ORDER BY id DESC LIMIT ?1",
            RUN_COLUMNS
        );
        let mut stmt = self.conn.prepare(&sql)?;

        let runs = stmt
            .query_map(params![limit as i64], run_from_row)?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(runs)
    }

    // ===== Item Management =====

    async fn upsert_item(&mut self, item: &Item) -> StorageResult<UpsertOutcome> {
        let raw_json = serde_json::to_string(&item.raw_payload)?;
        let scraped_at = format_timestamp(item.scraped_at);

        let tx = self.conn.transaction()?;

        let exists = tx
            .query_row(
                "SELECT 1 FROM auction_items WHERE item_id = ?1",
                params![item.item_id],
                |_| Ok(()),
            )
            .optional()?
            .is_some();

        let outcome = if exists {
            tx.execute(
                "UPDATE auction_items SET raw_json = ?1, scraped_at = ?2, zip_code = ?3,
                 radius_miles = ?4, category = ?5, search_term = ?6 WHERE item_id = ?7",
                params![
                    raw_json,
                    scraped_at,
                    item.zip_code,
                    item.radius_miles,
                    item.category,
                    item.search_term,
                    item.item_id
                ],
            )?;
            UpsertOutcome::Updated
        } else {
            tx.execute(
                "INSERT INTO auction_items
                 (item_id, raw_json, scraped_at, zip_code, radius_miles, category, search_term, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
                params![
                    item.item_id,
                    raw_json,
                    scraped_at,
                    item.zip_code,
                    item.radius_miles,
                    item.category,
                    item.search_term,
                    format_timestamp(Utc::now())
                ],
            )?;
            UpsertOutcome::Inserted
        };

        tx.commit()?;
        Ok(outcome)
    }

    async fn get_item(&self, item_id: &str) -> StorageResult<Option<ItemRecord>> {
        let sql = format!(
            "SELECT {} FROM auction_items WHERE item_id = ?1",
            ITEM_COLUMNS
        );
        let item = self
            .conn
            .query_row(&sql, params![item_id], item_from_row)
            .optional()?;
        Ok(item)
    }

    async fn count_items(&self) -> StorageResult<u64> {
        let count: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM auction_items", [], |row| row.get(0))?;
        Ok(count as u64)
    }
}

/// Timestamps are stored as RFC 3339 text with microsecond precision
fn format_timestamp(ts: DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn timestamp_at(row: &Row<'_>, idx: usize) -> rusqlite::Result<DateTime<Utc>> {
    let text: String = row.get(idx)?;
    parse_timestamp(&text, idx)
}

fn optional_timestamp_at(row: &Row<'_>, idx: usize) -> rusqlite::Result<Option<DateTime<Utc>>> {
    let text: Option<String> = row.get(idx)?;
    text.map(|t| parse_timestamp(&t, idx)).transpose()
}

fn parse_timestamp(text: &str, idx: usize) -> rusqlite::Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(text)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}

fn run_from_row(row: &Row<'_>) -> rusqlite::Result<RunRecord> {
    let status_text: String = row.get(13)?;
    let categories: String = row.get(7)?;

    Ok(RunRecord {
        id: row.get(0)?,
        started_at: timestamp_at(row, 1)?,
        completed_at: optional_timestamp_at(row, 2)?,
        params: RunParams {
            zip_code: row.get(3)?,
            radius_miles: row.get(4)?,
            test_mode: row.get(5)?,
            search_term: row.get(6)?,
            categories: split_categories(&categories),
        },
        counters: RunCounters {
            items_found: row.get::<_, i64>(8)? as u64,
            items_added: row.get::<_, i64>(9)? as u64,
            items_updated: row.get::<_, i64>(10)? as u64,
            errors: row.get::<_, i64>(11)? as u64,
            pages_scraped: row.get::<_, i64>(12)? as u64,
        },
        status: RunStatus::from_db_string(&status_text).unwrap_or(RunStatus::Running),
    })
}

fn item_from_row(row: &Row<'_>) -> rusqlite::Result<ItemRecord> {
    let raw_json: String = row.get(1)?;
    let raw_payload = serde_json::from_str(&raw_json)
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(1, Type::Text, Box::new(e)))?;

    Ok(ItemRecord {
        item_id: row.get(0)?,
        raw_payload,
        scraped_at: timestamp_at(row, 2)?,
        zip_code: row.get(3)?,
        radius_miles: row.get(4)?,
        category: row.get(5)?,
        search_term: row.get(6)?,
        first_created_at: timestamp_at(row, 7)?,
    })
}
