use serde::Deserialize;

/// Search radii (miles) accepted by the listing site
pub const ALLOWED_RADII: [u32; 6] = [10, 25, 50, 100, 250, 500];

const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) \
     AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36";

/// Main configuration structure for one ingestion invocation
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub search: SearchConfig,
    #[serde(default)]
    pub source: SourceConfig,
    #[serde(rename = "rate-limit", default)]
    pub rate_limit: RateLimitConfig,
    #[serde(default)]
    pub retry: RetryConfig,
    #[serde(default)]
    pub storage: StorageConfig,
}

impl Config {
    /// Builds a configuration for the given zip code with every other
    /// setting at its default
    pub fn for_zip(zip_code: impl Into<String>) -> Self {
        Self {
            search: SearchConfig::new(zip_code),
            source: SourceConfig::default(),
            rate_limit: RateLimitConfig::default(),
            retry: RetryConfig::default(),
            storage: StorageConfig::default(),
        }
    }
}

/// What to search for
#[derive(Debug, Clone, Deserialize)]
pub struct SearchConfig {
    /// Center of the search area
    #[serde(rename = "zip-code")]
    pub zip_code: String,

    /// Search radius in miles, one of [`ALLOWED_RADII`]
    #[serde(rename = "radius-miles", default = "default_radius")]
    pub radius_miles: u32,

    /// Category slugs to scrape; empty means all open lots
    #[serde(default)]
    pub categories: Vec<String>,

    /// Optional free-text search term
    #[serde(rename = "search-term", default)]
    pub search_term: Option<String>,

    /// Caps the number of items found per invocation
    #[serde(rename = "test-mode", default)]
    pub test_mode: bool,

    /// Item cap applied when `test_mode` is set
    #[serde(rename = "test-limit", default = "default_test_limit")]
    pub test_limit: usize,
}

impl SearchConfig {
    pub fn new(zip_code: impl Into<String>) -> Self {
        Self {
            zip_code: zip_code.into(),
            radius_miles: default_radius(),
            categories: Vec::new(),
            search_term: None,
            test_mode: false,
            test_limit: default_test_limit(),
        }
    }

    /// The item cap for this invocation, if any
    pub fn item_cap(&self) -> Option<usize> {
        self.test_mode.then_some(self.test_limit)
    }
}

/// Listing site connection settings
#[derive(Debug, Clone, Deserialize)]
pub struct SourceConfig {
    #[serde(rename = "base-url", default = "default_base_url")]
    pub base_url: String,

    /// Items requested per page (`ipp` query parameter)
    #[serde(rename = "page-size", default = "default_page_size")]
    pub page_size: u32,

    #[serde(rename = "user-agent", default = "default_user_agent")]
    pub user_agent: String,

    #[serde(rename = "timeout-secs", default = "default_timeout_secs")]
    pub timeout_secs: u64,

    #[serde(rename = "connect-timeout-secs", default = "default_connect_timeout_secs")]
    pub connect_timeout_secs: u64,
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            page_size: default_page_size(),
            user_agent: default_user_agent(),
            timeout_secs: default_timeout_secs(),
            connect_timeout_secs: default_connect_timeout_secs(),
        }
    }
}

/// Delay drawn before every outbound request (milliseconds)
#[derive(Debug, Clone, Deserialize)]
pub struct RateLimitConfig {
    #[serde(rename = "min-delay-ms", default = "default_min_delay_ms")]
    pub min_delay_ms: u64,

    #[serde(rename = "max-delay-ms", default = "default_max_delay_ms")]
    pub max_delay_ms: u64,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            min_delay_ms: default_min_delay_ms(),
            max_delay_ms: default_max_delay_ms(),
        }
    }
}

/// Exponential backoff settings for page requests
#[derive(Debug, Clone, Deserialize)]
pub struct RetryConfig {
    #[serde(rename = "max-attempts", default = "default_max_attempts")]
    pub max_attempts: u32,

    /// First backoff wait; doubles with each further attempt
    #[serde(rename = "backoff-base-ms", default = "default_backoff_base_ms")]
    pub backoff_base_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            backoff_base_ms: default_backoff_base_ms(),
        }
    }
}

/// Storage backend selection
#[derive(Debug, Clone, Deserialize)]
pub struct StorageConfig {
    /// `sqlite:///path/to/file.db`, `sqlite::memory:` or `postgres://...`
    #[serde(rename = "database-url", default = "default_database_url")]
    pub database_url: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            database_url: default_database_url(),
        }
    }
}

fn default_radius() -> u32 {
    50
}

fn default_test_limit() -> usize {
    20
}

fn default_base_url() -> String {
    "https://hibid.com".to_string()
}

fn default_page_size() -> u32 {
    100
}

fn default_user_agent() -> String {
    DEFAULT_USER_AGENT.to_string()
}

fn default_timeout_secs() -> u64 {
    30
}

fn default_connect_timeout_secs() -> u64 {
    10
}

fn default_min_delay_ms() -> u64 {
    2000
}

fn default_max_delay_ms() -> u64 {
    5000
}

fn default_max_attempts() -> u32 {
    3
}

fn default_backoff_base_ms() -> u64 {
    5000
}

fn default_database_url() -> String {
    "sqlite:///hibid_auctions.db".to_string()
}
