#![allow(dead_code)]

use hibid_ingest::crawler::{FetchError, PageQuery, PageResult, PageSource};
use hibid_ingest::Config;
use serde_json::{json, Map, Value};
use std::path::Path;
use std::sync::atomic::{AtomicU32, Ordering};
use tokio_util::sync::CancellationToken;

/// A lot record shaped like the listing site's cache entries
pub fn lot(id: u64) -> Value {
    json!({
        "__typename": "Lot",
        "id": id,
        "lead": format!("Lot {}", id),
        "lotNumber": format!("{}A", id),
    })
}

/// Renders a listing page embedding `lots` in the hibid-state script
pub fn listing_html(lots: &[Value]) -> String {
    let mut cache = Map::new();
    cache.insert("ROOT_QUERY".to_string(), json!({"__typename": "Query"}));
    for lot in lots {
        cache.insert(format!("Lot:{}", lot["id"]), lot.clone());
    }
    let state = json!({ "apollo.state": cache });

    format!(
        r#"<!DOCTYPE html><html><head><title>Online Auctions</title></head>
        <body><app-root></app-root>
        <script id="hibid-state" type="application/json">{}</script>
        </body></html>"#,
        state
    )
}

/// A configuration with no pacing delays and millisecond backoff
pub fn test_config(database_url: &str) -> Config {
    let mut config = Config::for_zip("78414");
    config.rate_limit.min_delay_ms = 0;
    config.rate_limit.max_delay_ms = 0;
    config.retry.backoff_base_ms = 1;
    config.storage.database_url = database_url.to_string();
    config
}

/// SQLite URL for a file inside `dir`
pub fn sqlite_url(dir: &Path) -> String {
    format!("sqlite:///{}", dir.join("auctions.db").display())
}

/// Scripted listing source
///
/// Serves `full_pages` pages of `page_size` lots with ids numbered from
/// `first_id`, then an optional short page, then empty pages.
pub struct ScriptedSource {
    pub page_size: usize,
    pub full_pages: u32,
    pub short_page: usize,
    pub first_id: u64,
    /// Page numbers whose fetch fails after retries
    pub failing_pages: Vec<u32>,
    /// Cancels this token and hangs when asked for the page after this one
    pub interrupt_after: Option<(u32, CancellationToken)>,
    calls: AtomicU32,
}

impl ScriptedSource {
    pub fn new(page_size: usize, full_pages: u32) -> Self {
        Self {
            page_size,
            full_pages,
            short_page: 0,
            first_id: 1,
            failing_pages: Vec::new(),
            interrupt_after: None,
            calls: AtomicU32::new(0),
        }
    }

    pub fn calls(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }

    fn records(&self, page: u32) -> Vec<Value> {
        let count = if page <= self.full_pages {
            self.page_size
        } else if page == self.full_pages + 1 {
            self.short_page
        } else {
            0
        };
        let start = self.first_id + (page as u64 - 1) * self.page_size as u64;
        (start..start + count as u64).map(lot).collect()
    }
}

impl PageSource for ScriptedSource {
    async fn fetch_page(&self, _query: &PageQuery, page: u32) -> Result<PageResult, FetchError> {
        self.calls.fetch_add(1, Ordering::SeqCst);

        if let Some((after, token)) = &self.interrupt_after {
            if page > *after {
                token.cancel();
                std::future::pending::<()>().await;
            }
        }

        if self.failing_pages.contains(&page) {
            return Err(FetchError::FetchFailed {
                attempts: 3,
                last: Box::new(FetchError::Status {
                    url: format!("https://hibid.com/lots/?apage={}", page),
                    status: 503,
                }),
            });
        }

        Ok(PageResult::new(self.records(page), self.page_size))
    }
}
