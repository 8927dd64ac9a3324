//! Page-by-page traversal of one search configuration
//!
//! The paginator runs one sequence per configured category (or a single
//! all-lots sequence), resetting the page counter for each. It stops a
//! sequence on exhaustion, on a failed fetch, or on a page with nothing new,
//! and stops everything once the item cap is reached.

use crate::config::SearchConfig;
use crate::crawler::parser::extract_item_id;
use crate::crawler::{PageQuery, PageSource};
use crate::storage::Item;
use std::collections::HashSet;

/// Items produced by one fetched page
#[derive(Debug, Clone)]
pub struct PageBatch {
    pub category: Option<String>,
    pub page: u32,
    /// New items in page order, truncated at the cap
    pub items: Vec<Item>,
    /// Failed fetches and records without an id
    pub errors: u64,
    /// False when the fetch itself failed
    pub scraped: bool,
}

/// Lazy page sequence over a [`PageSource`]
pub struct Paginator<'a, P> {
    source: &'a P,
    zip_code: String,
    radius_miles: u32,
    search_term: Option<String>,
    categories: Vec<Option<String>>,
    category_index: usize,
    page: u32,
    seen: HashSet<String>,
    cap: Option<usize>,
    yielded: usize,
}

impl<'a, P: PageSource> Paginator<'a, P> {
    /// Starts at page 1 of the first category
    pub fn new(source: &'a P, search: &SearchConfig) -> Self {
        let categories = if search.categories.is_empty() {
            vec![None]
        } else {
            search.categories.iter().cloned().map(Some).collect()
        };

        Self {
            source,
            zip_code: search.zip_code.clone(),
            radius_miles: search.radius_miles,
            search_term: search.search_term.clone(),
            categories,
            category_index: 0,
            page: 0,
            seen: HashSet::new(),
            cap: search.item_cap(),
            yielded: 0,
        }
    }

    /// Number of items yielded so far
    pub fn yielded(&self) -> usize {
        self.yielded
    }

    fn cap_reached(&self) -> bool {
        self.cap.is_some_and(|cap| self.yielded >= cap)
    }

    fn end_category(&mut self) {
        self.category_index += 1;
        self.page = 0;
        self.seen.clear();
    }

    /// Fetches the next page, or `None` once every sequence is finished
    pub async fn next_page(&mut self) -> Option<PageBatch> {
        if self.cap_reached() {
            return None;
        }
        let category = self.categories.get(self.category_index)?.clone();

        self.page += 1;
        let page = self.page;
        let query = PageQuery {
            zip_code: self.zip_code.clone(),
            radius_miles: self.radius_miles,
            category: category.clone(),
            search_term: self.search_term.clone(),
        };

        if page == 1 {
            tracing::info!(
                "Scraping category: {} (zip: {}, radius: {} miles)",
                category.as_deref().unwrap_or("all"),
                self.zip_code,
                self.radius_miles
            );
        }

        let result = match self.source.fetch_page(&query, page).await {
            Ok(result) => result,
            Err(e) => {
                tracing::warn!("Failed to fetch page {}: {}", page, e);
                self.end_category();
                return Some(PageBatch {
                    category,
                    page,
                    items: Vec::new(),
                    errors: 1,
                    scraped: false,
                });
            }
        };

        let total = result.records.len();
        let mut items = Vec::new();
        let mut errors = 0;
        let mut fresh = 0;

        for record in result.records {
            if self.cap_reached() {
                tracing::info!("Test mode limit reached ({} items)", self.yielded);
                break;
            }
            let Some(item_id) = extract_item_id(&record) else {
                tracing::warn!("Lot without ID on page {}, skipping", page);
                errors += 1;
                continue;
            };
            if !self.seen.insert(item_id.clone()) {
                continue;
            }

            fresh += 1;
            self.yielded += 1;
            items.push(Item {
                item_id,
                raw_payload: record,
                scraped_at: result.fetched_at,
                zip_code: self.zip_code.clone(),
                radius_miles: self.radius_miles,
                category: category.clone(),
                search_term: self.search_term.clone(),
            });
        }

        tracing::info!(
            "Page {}: found {} new items (total lots in state: {})",
            page,
            fresh,
            total
        );

        if !result.has_more {
            tracing::info!("Partial page received, end of results");
            self.end_category();
        } else if fresh == 0 {
            tracing::info!("No new items found on page {}", page);
            self.end_category();
        }

        Some(PageBatch {
            category,
            page,
            items,
            errors,
            scraped: true,
        })
    }
}
