//! Database schema definitions
//!
//! Both backends produce the same two tables. SQLite keeps the payload as
//! JSON text and timestamps as RFC 3339 text; PostgreSQL uses JSONB and
//! TIMESTAMPTZ.

/// SQL schema for the embedded SQLite backend
pub const SQLITE_SCHEMA_SQL: &str = r#"
-- Raw lot payloads, one row per site item id
CREATE TABLE IF NOT EXISTS auction_items (
    item_id TEXT PRIMARY KEY NOT NULL,
    raw_json TEXT NOT NULL,
    scraped_at TEXT NOT NULL,
    zip_code TEXT NOT NULL,
    radius_miles INTEGER NOT NULL,
    category TEXT,
    search_term TEXT,
    created_at TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_items_scraped_at ON auction_items(scraped_at);
CREATE INDEX IF NOT EXISTS idx_items_zip_code ON auction_items(zip_code);
CREATE INDEX IF NOT EXISTS idx_items_category ON auction_items(category);

-- Audit record of every invocation
CREATE TABLE IF NOT EXISTS scrape_runs (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    started_at TEXT NOT NULL,
    completed_at TEXT,
    zip_code TEXT NOT NULL,
    radius_miles INTEGER NOT NULL,
    test_mode INTEGER NOT NULL,
    search_term TEXT,
    categories TEXT NOT NULL DEFAULT '',
    items_found INTEGER NOT NULL DEFAULT 0,
    items_added INTEGER NOT NULL DEFAULT 0,
    items_updated INTEGER NOT NULL DEFAULT 0,
    errors INTEGER NOT NULL DEFAULT 0,
    pages_scraped INTEGER NOT NULL DEFAULT 0,
    status TEXT NOT NULL DEFAULT 'running'
        CHECK (status IN ('running', 'completed', 'failed', 'interrupted'))
);

CREATE INDEX IF NOT EXISTS idx_runs_status ON scrape_runs(status);
"#;

/// Schema statements for the PostgreSQL backend, executed one at a time
pub const POSTGRES_SCHEMA: &[&str] = &[
    r#"CREATE TABLE IF NOT EXISTS auction_items (
        item_id VARCHAR(255) PRIMARY KEY,
        raw_json JSONB NOT NULL,
        scraped_at TIMESTAMPTZ NOT NULL,
        zip_code VARCHAR(10) NOT NULL,
        radius_miles INTEGER NOT NULL,
        category VARCHAR(255),
        search_term TEXT,
        created_at TIMESTAMPTZ NOT NULL
    )"#,
    r#"CREATE INDEX IF NOT EXISTS idx_items_scraped_at ON auction_items(scraped_at)"#,
    r#"CREATE INDEX IF NOT EXISTS idx_items_zip_code ON auction_items(zip_code)"#,
    r#"CREATE INDEX IF NOT EXISTS idx_items_category ON auction_items(category)"#,
    r#"CREATE INDEX IF NOT EXISTS idx_items_raw_json_gin ON auction_items USING GIN (raw_json)"#,
    r#"CREATE TABLE IF NOT EXISTS scrape_runs (
        id BIGSERIAL PRIMARY KEY,
        started_at TIMESTAMPTZ NOT NULL,
        completed_at TIMESTAMPTZ,
        zip_code VARCHAR(10) NOT NULL,
        radius_miles INTEGER NOT NULL,
        test_mode BOOLEAN NOT NULL,
        search_term TEXT,
        categories TEXT NOT NULL DEFAULT '',
        items_found BIGINT NOT NULL DEFAULT 0,
        items_added BIGINT NOT NULL DEFAULT 0,
        items_updated BIGINT NOT NULL DEFAULT 0,
        errors BIGINT NOT NULL DEFAULT 0,
        pages_scraped BIGINT NOT NULL DEFAULT 0,
        status VARCHAR(20) NOT NULL DEFAULT 'running',
        CONSTRAINT chk_scrape_runs_status CHECK (
            status IN ('running', 'completed', 'failed', 'interrupted')
        )
    )"#,
    r#"CREATE INDEX IF NOT EXISTS idx_runs_status ON scrape_runs(status)"#,
];

/// Initializes the SQLite schema
pub fn initialize_schema(conn: &rusqlite::Connection) -> Result<(), rusqlite::Error> {
    conn.execute_batch(SQLITE_SCHEMA_SQL)?;
    Ok(())
}
