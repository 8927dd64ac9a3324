//! Crawler module for listing retrieval and ingestion
//!
//! This module contains the core ingestion logic, including:
//! - Randomized request delays and exponential-backoff retries
//! - HTTP fetching of listing pages and lot extraction
//! - Pagination across pages and categories with an optional item cap
//! - Orchestration of one scrape run against a storage backend

mod coordinator;
mod fetcher;
mod paginator;
mod parser;
mod rate_limit;
mod retry;

pub use coordinator::{run, Coordinator};
pub use fetcher::{build_http_client, HttpFetcher};
pub use paginator::{PageBatch, Paginator};
pub use parser::{extract_item_id, extract_lots};
pub use rate_limit::RateLimiter;
pub use retry::RetryPolicy;

use chrono::{DateTime, Utc};
use std::future::Future;
use thiserror::Error;

/// Errors raised while fetching a listing page
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("HTTP error for {url}: {source}")]
    Network { url: String, source: reqwest::Error },

    #[error("Request timeout for {url}")]
    Timeout { url: String },

    #[error("HTTP {status} from {url}")]
    Status { url: String, status: u16 },

    #[error("Empty response body from {url}")]
    EmptyBody { url: String },

    #[error("Malformed listing payload from {url}: {reason}")]
    MalformedPayload { url: String, reason: String },

    #[error("Page fetch failed after {attempts} attempts: {last}")]
    FetchFailed { attempts: u32, last: Box<FetchError> },
}

impl FetchError {
    /// Whether another attempt could plausibly succeed
    ///
    /// Request construction problems and already-exhausted retries are final.
    pub fn is_retryable(&self) -> bool {
        !matches!(
            self,
            Self::InvalidRequest(_) | Self::FetchFailed { .. }
        )
    }
}

/// Query parameters for one category sequence
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageQuery {
    pub zip_code: String,
    pub radius_miles: u32,
    /// `None` requests all open lots
    pub category: Option<String>,
    pub search_term: Option<String>,
}

/// One fetched listing page
#[derive(Debug, Clone)]
pub struct PageResult {
    /// Raw lot records in page order
    pub records: Vec<serde_json::Value>,
    /// False once the page came back short or empty
    pub has_more: bool,
    pub fetched_at: DateTime<Utc>,
}

impl PageResult {
    /// Builds a page result, deriving `has_more` from the requested page size
    pub fn new(records: Vec<serde_json::Value>, page_size: usize) -> Self {
        let has_more = !records.is_empty() && records.len() >= page_size;
        Self {
            records,
            has_more,
            fetched_at: Utc::now(),
        }
    }
}

/// A paginated listing source
pub trait PageSource: Send + Sync {
    /// Fetches page `page` (1-based) for `query`
    fn fetch_page(
        &self,
        query: &PageQuery,
        page: u32,
    ) -> impl Future<Output = Result<PageResult, FetchError>> + Send;
}
