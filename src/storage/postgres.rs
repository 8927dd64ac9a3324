//! PostgreSQL storage implementation
//!
//! Networked relational backend for the Storage trait. Payloads are stored as
//! JSONB and each upsert is a single `INSERT ... ON CONFLICT` statement.

use crate::storage::schema::POSTGRES_SCHEMA;
use crate::storage::traits::{Storage, StorageError, StorageResult};
use crate::storage::{
    join_categories, split_categories, Item, ItemRecord, RunCounters, RunParams, RunRecord,
    RunStatus, UpsertOutcome,
};
use chrono::{DateTime, Utc};
use sqlx::postgres::{PgPool, PgPoolOptions, PgRow};
use sqlx::Row;

const RUN_COLUMNS: &str = "id, started_at, completed_at, zip_code, radius_miles, test_mode, \
     search_term, categories, items_found, items_added, items_updated, errors, pages_scraped, status";

/// PostgreSQL storage backend
#[derive(Clone)]
pub struct PostgresStorage {
    pool: PgPool,
}

impl PostgresStorage {
    /// Connects to PostgreSQL and creates the schema if needed
    pub async fn connect(url: &str) -> StorageResult<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(2)
            .connect(url)
            .await?;

        tracing::info!("Connected to PostgreSQL database");
        Self::from_pool(pool).await
    }

    /// Wraps an existing pool, creating the schema if needed
    pub async fn from_pool(pool: PgPool) -> StorageResult<Self> {
        for statement in POSTGRES_SCHEMA {
            sqlx::query(statement).execute(&pool).await?;
        }
        Ok(Self { pool })
    }

    /// Closes every pooled connection
    pub async fn close(&self) {
        self.pool.close().await;
        tracing::info!("PostgreSQL connection pool closed");
    }

    async fn load_run(&self, run_id: i64) -> StorageResult<RunRecord> {
        let sql = format!("SELECT {} FROM scrape_runs WHERE id = $1", RUN_COLUMNS);
        let row = sqlx::query(&sql)
            .bind(run_id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or(StorageError::RunNotFound(run_id))?;
        run_from_row(&row)
    }
}

impl Storage for PostgresStorage {
    // ===== Run Management =====

    async fn create_run(&mut self, params: &RunParams) -> StorageResult<RunRecord> {
        let sql = format!(
            "INSERT INTO scrape_runs (started_at, zip_code, radius_miles, test_mode, search_term, categories, status)
             VALUES ($1, $2, $3, $4, $5, $6, $7)
             RETURNING {}",
            RUN_COLUMNS
        );
        let row = sqlx::query(&sql)
            .bind(Utc::now())
            .bind(&params.zip_code)
            .bind(params.radius_miles as i32)
            .bind(params.test_mode)
            .bind(&params.search_term)
            .bind(join_categories(&params.categories))
            .bind(RunStatus::Running.to_db_string())
            .fetch_one(&self.pool)
            .await?;
        run_from_row(&row)
    }

    async fn update_run_counters(
        &mut self,
        run_id: i64,
        counters: &RunCounters,
    ) -> StorageResult<()> {
        let result = sqlx::query(
            "UPDATE scrape_runs SET items_found = $1, items_added = $2, items_updated = $3,
             errors = $4, pages_scraped = $5 WHERE id = $6",
        )
        .bind(counters.items_found as i64)
        .bind(counters.items_added as i64)
        .bind(counters.items_updated as i64)
        .bind(counters.errors as i64)
        .bind(counters.pages_scraped as i64)
        .bind(run_id)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
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
        if !status.is_terminal() {
            let current = self.load_run(run_id).await?;
            return Err(StorageError::InvalidTransition {
                from: current.status,
                to: status,
            });
        }

        let sql = format!(
            "UPDATE scrape_runs SET completed_at = $1, items_found = $2, items_added = $3,
             items_updated = $4, errors = $5, pages_scraped = $6, status = $7
             WHERE id = $8 AND status = 'running'
             RETURNING {}",
            RUN_COLUMNS
        );
        let row = sqlx::query(&sql)
            .bind(Utc::now())
            .bind(counters.items_found as i64)
            .bind(counters.items_added as i64)
            .bind(counters.items_updated as i64)
            .bind(counters.errors as i64)
            .bind(counters.pages_scraped as i64)
            .bind(status.to_db_string())
            .bind(run_id)
            .fetch_optional(&self.pool)
            .await?;

        match row {
            Some(row) => run_from_row(&row),
            None => {
                // Either missing (RunNotFound) or already closed
                let current = self.load_run(run_id).await?;
                Err(StorageError::InvalidTransition {
                    from: current.status,
                    to: status,
                })
            }
        }
    }

    async fn get_run(&self, run_id: i64) -> StorageResult<RunRecord> {
        self.load_run(run_id).await
    }

    async fn recent_runs(&self, limit: usize) -> StorageResult<Vec<RunRecord>> {
        let sql = format!(
            "SELECT {} FROM scrape_runs ORDER BY id DESC LIMIT $1",
            RUN_COLUMNS
        );
        let rows = sqlx::query(&sql)
            .bind(limit as i64)
            .fetch_all(&self.pool)
            .await?;

        rows.iter().map(run_from_row).collect()
    }

    // ===== Item Management =====

    async fn upsert_item(&mut self, item: &Item) -> StorageResult<UpsertOutcome> {
        // xmax is zero only for freshly inserted tuples
        let inserted: bool = sqlx::query_scalar(
            r#"
            INSERT INTO auction_items
                (item_id, raw_json, scraped_at, zip_code, radius_miles, category, search_term, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            ON CONFLICT (item_id) DO UPDATE SET
                raw_json = EXCLUDED.raw_json,
                scraped_at = EXCLUDED.scraped_at,
                zip_code = EXCLUDED.zip_code,
                radius_miles = EXCLUDED.radius_miles,
                category = EXCLUDED.category,
                search_term = EXCLUDED.search_term
            RETURNING (xmax = 0)
            "#,
        )
        .bind(&item.item_id)
        .bind(&item.raw_payload)
        .bind(item.scraped_at)
        .bind(&item.zip_code)
        .bind(item.radius_miles as i32)
        .bind(&item.category)
        .bind(&item.search_term)
        .bind(Utc::now())
        .fetch_one(&self.pool)
        .await?;

        Ok(if inserted {
            UpsertOutcome::Inserted
        } else {
            UpsertOutcome::Updated
        })
    }

    async fn get_item(&self, item_id: &str) -> StorageResult<Option<ItemRecord>> {
        let row = sqlx::query(
            "SELECT item_id, raw_json, scraped_at, zip_code, radius_miles, category, search_term, created_at
             FROM auction_items WHERE item_id = $1",
        )
        .bind(item_id)
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(item_from_row).transpose()
    }

    async fn count_items(&self) -> StorageResult<u64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM auction_items")
            .fetch_one(&self.pool)
            .await?;
        Ok(count as u64)
    }
}

fn run_from_row(row: &PgRow) -> StorageResult<RunRecord> {
    let status_text: String = row.try_get("status")?;
    let categories: String = row.try_get("categories")?;
    let radius: i32 = row.try_get("radius_miles")?;

    Ok(RunRecord {
        id: row.try_get("id")?,
        started_at: row.try_get::<DateTime<Utc>, _>("started_at")?,
        completed_at: row.try_get::<Option<DateTime<Utc>>, _>("completed_at")?,
        params: RunParams {
            zip_code: row.try_get("zip_code")?,
            radius_miles: radius as u32,
            test_mode: row.try_get("test_mode")?,
            search_term: row.try_get("search_term")?,
            categories: split_categories(&categories),
        },
        counters: RunCounters {
            items_found: row.try_get::<i64, _>("items_found")? as u64,
            items_added: row.try_get::<i64, _>("items_added")? as u64,
            items_updated: row.try_get::<i64, _>("items_updated")? as u64,
            errors: row.try_get::<i64, _>("errors")? as u64,
            pages_scraped: row.try_get::<i64, _>("pages_scraped")? as u64,
        },
        status: RunStatus::from_db_string(&status_text).unwrap_or(RunStatus::Running),
    })
}

fn item_from_row(row: &PgRow) -> StorageResult<ItemRecord> {
    let radius: i32 = row.try_get("radius_miles")?;

    Ok(ItemRecord {
        item_id: row.try_get("item_id")?,
        raw_payload: row.try_get::<serde_json::Value, _>("raw_json")?,
        scraped_at: row.try_get("scraped_at")?,
        zip_code: row.try_get("zip_code")?,
        radius_miles: radius as u32,
        category: row.try_get("category")?,
        search_term: row.try_get("search_term")?,
        first_created_at: row.try_get("created_at")?,
    })
}
