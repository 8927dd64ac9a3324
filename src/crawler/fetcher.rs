//! HTTP fetcher implementation
//!
//! This module issues listing page requests, including:
//! - Building the HTTP client with browser-like headers
//! - Building the listing URL from the query and page number
//! - Rate limiting before each page and retrying transient failures
//! - Error classification for the retry policy

use crate::config::{Config, SourceConfig};
use crate::crawler::parser::extract_lots;
use crate::crawler::rate_limit::RateLimiter;
use crate::crawler::retry::RetryPolicy;
use crate::crawler::{FetchError, PageQuery, PageResult, PageSource};
use crate::{ConfigError, IngestError};
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, ACCEPT_LANGUAGE};
use reqwest::Client;
use serde_json::Value;
use std::future::Future;
use std::time::Duration;
use url::Url;

/// Builds an HTTP client with proper configuration
///
/// # Arguments
///
/// * `config` - The listing source configuration
///
/// # Returns
///
/// * `Ok(Client)` - Successfully built HTTP client
/// * `Err(reqwest::Error)` - Failed to build client
pub fn build_http_client(config: &SourceConfig) -> Result<Client, reqwest::Error> {
    let mut headers = HeaderMap::new();
    headers.insert(
        ACCEPT,
        HeaderValue::from_static("text/html,application/xhtml+xml,application/xml;q=0.9,*/*;q=0.8"),
    );
    headers.insert(ACCEPT_LANGUAGE, HeaderValue::from_static("en-US,en;q=0.9"));

    Client::builder()
        .user_agent(config.user_agent.as_str())
        .default_headers(headers)
        .timeout(Duration::from_secs(config.timeout_secs))
        .connect_timeout(Duration::from_secs(config.connect_timeout_secs))
        .gzip(true)
        .brotli(true)
        .build()
}

/// Fetches listing pages over HTTP
///
/// Every page waits on the rate limiter once, then the transfer runs under the
/// retry policy.
pub struct HttpFetcher {
    client: Client,
    base_url: Url,
    page_size: u32,
    limiter: RateLimiter,
    retry: RetryPolicy,
}

impl HttpFetcher {
    /// Creates a fetcher from the source, rate-limit and retry settings
    pub fn new(config: &Config) -> Result<Self, IngestError> {
        let base_url = Url::parse(&config.source.base_url).map_err(|e| {
            ConfigError::InvalidUrl(format!("{}: {}", config.source.base_url, e))
        })?;
        let client = build_http_client(&config.source)?;

        Ok(Self {
            client,
            base_url,
            page_size: config.source.page_size,
            limiter: RateLimiter::from_config(&config.rate_limit),
            retry: RetryPolicy::from_config(&config.retry),
        })
    }

    /// Replaces the rate limiter
    pub fn with_rate_limiter(mut self, limiter: RateLimiter) -> Self {
        self.limiter = limiter;
        self
    }

    /// Replaces the retry policy
    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn page_size(&self) -> u32 {
        self.page_size
    }

    /// Builds the listing URL for one page
    ///
    /// `{base}/lots/[{category}/]?status=open&zip=..&miles=..&apage=N&ipp=SIZE[&q=TERM]`
    pub fn page_url(&self, query: &PageQuery, page: u32) -> Result<Url, FetchError> {
        let mut url = self.base_url.clone();
        {
            let mut segments = url.path_segments_mut().map_err(|_| {
                FetchError::InvalidRequest(format!("Base URL cannot hold a path: {}", self.base_url))
            })?;
            segments.pop_if_empty().push("lots");
            if let Some(category) = &query.category {
                segments.push(category);
            }
            segments.push("");
        }

        {
            let mut pairs = url.query_pairs_mut();
            pairs
                .append_pair("status", "open")
                .append_pair("zip", &query.zip_code)
                .append_pair("miles", &query.radius_miles.to_string())
                .append_pair("apage", &page.to_string())
                .append_pair("ipp", &self.page_size.to_string());
            if let Some(term) = &query.search_term {
                pairs.append_pair("q", term);
            }
        }

        Ok(url)
    }

    /// One transfer: GET, status check, lot extraction
    async fn fetch_once(&self, url: &Url) -> Result<Vec<Value>, FetchError> {
        let url_text = url.to_string();

        let response = self
            .client
            .get(url.clone())
            .send()
            .await
            .map_err(|e| classify_error(&url_text, e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status {
                url: url_text,
                status: status.as_u16(),
            });
        }

        let body = response
            .text()
            .await
            .map_err(|e| classify_error(&url_text, e))?;
        if body.trim().is_empty() {
            return Err(FetchError::EmptyBody { url: url_text });
        }

        extract_lots(&body).map_err(|reason| FetchError::MalformedPayload {
            url: url_text,
            reason,
        })
    }

    /// Waits on the rate limiter once, then runs `transfer` under the retry policy
    async fn paced<T, F, Fut>(&self, transfer: F) -> Result<T, FetchError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, FetchError>>,
    {
        self.limiter.wait().await;
        self.retry.execute(transfer).await
    }
}

impl PageSource for HttpFetcher {
    async fn fetch_page(&self, query: &PageQuery, page: u32) -> Result<PageResult, FetchError> {
        let url = self.page_url(query, page)?;

        tracing::debug!("Fetching {}", url);
        let records = self.paced(|| self.fetch_once(&url)).await?;
        Ok(PageResult::new(records, self.page_size as usize))
    }
}

fn classify_error(url: &str, error: reqwest::Error) -> FetchError {
    if error.is_builder() {
        FetchError::InvalidRequest(format!("{}: {}", url, error))
    } else if error.is_timeout() {
        FetchError::Timeout {
            url: url.to_string(),
        }
    } else {
        FetchError::Network {
            url: url.to_string(),
            source: error,
        }
    }
}
