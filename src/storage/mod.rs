//! Storage module for persisting auction items and scrape runs
//!
//! This module handles all database operations for the ingestion engine:
//! - Schema management for the `auction_items` and `scrape_runs` tables
//! - Atomic per-item upserts keyed by the site-assigned item id
//! - Run records with incrementally persisted counters
//!
//! Two interchangeable backends implement [`Storage`]: an embedded SQLite file
//! and a networked PostgreSQL database. [`open_storage`] picks one from the
//! configured database URL.

mod backend;
mod postgres;
mod schema;
mod sqlite;
mod traits;

pub use backend::{open_storage, StorageBackend};
pub use postgres::PostgresStorage;
pub use sqlite::SqliteStorage;
pub use traits::{Storage, StorageError, StorageResult};

use chrono::{DateTime, Utc};

/// One auction listing snapshot ready to be persisted
#[derive(Debug, Clone, PartialEq)]
pub struct Item {
    /// Site-assigned natural key
    pub item_id: String,
    /// Lot document exactly as extracted from the listing page
    pub raw_payload: serde_json::Value,
    /// When the page carrying this snapshot was fetched
    pub scraped_at: DateTime<Utc>,
    pub zip_code: String,
    pub radius_miles: u32,
    pub category: Option<String>,
    pub search_term: Option<String>,
}

/// A persisted item row
#[derive(Debug, Clone)]
pub struct ItemRecord {
    pub item_id: String,
    pub raw_payload: serde_json::Value,
    pub scraped_at: DateTime<Utc>,
    pub zip_code: String,
    pub radius_miles: u32,
    pub category: Option<String>,
    pub search_term: Option<String>,
    /// Set on first insert and never rewritten
    pub first_created_at: DateTime<Utc>,
}

/// Result of an item upsert
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpsertOutcome {
    Inserted,
    Updated,
}

/// Search parameters recorded with a run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunParams {
    pub zip_code: String,
    pub radius_miles: u32,
    pub categories: Vec<String>,
    pub search_term: Option<String>,
    pub test_mode: bool,
}

impl From<&crate::config::SearchConfig> for RunParams {
    fn from(search: &crate::config::SearchConfig) -> Self {
        Self {
            zip_code: search.zip_code.clone(),
            radius_miles: search.radius_miles,
            categories: search.categories.clone(),
            search_term: search.search_term.clone(),
            test_mode: search.test_mode,
        }
    }
}

/// Accumulated run counters; every field only ever increases
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunCounters {
    pub items_found: u64,
    pub items_added: u64,
    pub items_updated: u64,
    pub errors: u64,
    pub pages_scraped: u64,
}

impl RunCounters {
    /// True when every found item was either added or updated
    pub fn is_balanced(&self) -> bool {
        self.items_found == self.items_added + self.items_updated
    }
}

/// Represents a scrape run
#[derive(Debug, Clone)]
pub struct RunRecord {
    pub id: i64,
    pub started_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
    pub params: RunParams,
    pub counters: RunCounters,
    pub status: RunStatus,
}

/// Status of a scrape run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunStatus {
    Running,
    Completed,
    Interrupted,
    Failed,
}

impl RunStatus {
    pub fn to_db_string(&self) -> &'static str {
        match self {
            Self::Running => "running",
            Self::Completed => "completed",
            Self::Interrupted => "interrupted",
            Self::Failed => "failed",
        }
    }

    pub fn from_db_string(s: &str) -> Option<Self> {
        match s {
            "running" => Some(Self::Running),
            "completed" => Some(Self::Completed),
            "interrupted" => Some(Self::Interrupted),
            "failed" => Some(Self::Failed),
            _ => None,
        }
    }

    /// Terminal statuses close a run; only `Running` is open
    pub fn is_terminal(&self) -> bool {
        !matches!(self, Self::Running)
    }
}

impl std::fmt::Display for RunStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.to_db_string())
    }
}

/// Joins category slugs for the `scrape_runs.categories` column
pub(crate) fn join_categories(categories: &[String]) -> String {
    categories.join(",")
}

/// Splits the `scrape_runs.categories` column back into slugs
pub(crate) fn split_categories(joined: &str) -> Vec<String> {
    joined
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}
