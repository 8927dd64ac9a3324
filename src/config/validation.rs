use crate::config::types::{
    Config, RateLimitConfig, RetryConfig, SearchConfig, SourceConfig, StorageConfig, ALLOWED_RADII,
};
use crate::ConfigError;
use url::Url;

/// Validates the entire configuration
pub fn validate(config: &Config) -> Result<(), ConfigError> {
    validate_search_config(&config.search)?;
    validate_source_config(&config.source)?;
    validate_rate_limit_config(&config.rate_limit)?;
    validate_retry_config(&config.retry)?;
    validate_storage_config(&config.storage)?;
    Ok(())
}

/// Validates search parameters
fn validate_search_config(config: &SearchConfig) -> Result<(), ConfigError> {
    validate_zip_code(&config.zip_code)?;

    if !ALLOWED_RADII.contains(&config.radius_miles) {
        return Err(ConfigError::Validation(format!(
            "radius_miles must be one of {:?}, got {}",
            ALLOWED_RADII, config.radius_miles
        )));
    }

    for category in &config.categories {
        validate_category_slug(category)?;
    }

    if let Some(term) = &config.search_term {
        if term.trim().is_empty() {
            return Err(ConfigError::Validation(
                "search_term cannot be blank when set".to_string(),
            ));
        }
    }

    // The cap only matters when test mode is on
    if config.test_mode && config.test_limit < 1 {
        return Err(ConfigError::Validation(format!(
            "test_limit must be >= 1 in test mode, got {}",
            config.test_limit
        )));
    }

    Ok(())
}

/// Validates the listing site settings
fn validate_source_config(config: &SourceConfig) -> Result<(), ConfigError> {
    let url = Url::parse(&config.base_url)
        .map_err(|e| ConfigError::InvalidUrl(format!("Invalid base_url: {}", e)))?;

    if url.scheme() != "https" && url.scheme() != "http" {
        return Err(ConfigError::InvalidUrl(format!(
            "base_url must use http or https, got '{}'",
            config.base_url
        )));
    }

    if config.page_size < 1 || config.page_size > 1000 {
        return Err(ConfigError::Validation(format!(
            "page_size must be between 1 and 1000, got {}",
            config.page_size
        )));
    }

    if config.user_agent.trim().is_empty() {
        return Err(ConfigError::Validation(
            "user_agent cannot be empty".to_string(),
        ));
    }

    if config.timeout_secs == 0 || config.connect_timeout_secs == 0 {
        return Err(ConfigError::Validation(
            "timeouts must be at least one second".to_string(),
        ));
    }

    Ok(())
}

fn validate_rate_limit_config(config: &RateLimitConfig) -> Result<(), ConfigError> {
    if config.min_delay_ms > config.max_delay_ms {
        return Err(ConfigError::Validation(format!(
            "min_delay_ms ({}) must not exceed max_delay_ms ({})",
            config.min_delay_ms, config.max_delay_ms
        )));
    }
    Ok(())
}

fn validate_retry_config(config: &RetryConfig) -> Result<(), ConfigError> {
    if config.max_attempts < 1 {
        return Err(ConfigError::Validation(format!(
            "max_attempts must be >= 1, got {}",
            config.max_attempts
        )));
    }
    Ok(())
}

fn validate_storage_config(config: &StorageConfig) -> Result<(), ConfigError> {
    let url = config.database_url.as_str();
    let supported = ["sqlite:", "postgres://", "postgresql://"];

    if !supported.iter().any(|prefix| url.starts_with(prefix)) {
        return Err(ConfigError::InvalidUrl(format!(
            "database_url must start with one of {:?}, got '{}'",
            supported, url
        )));
    }
    Ok(())
}

/// Zip codes are five ASCII digits
fn validate_zip_code(zip: &str) -> Result<(), ConfigError> {
    if zip.is_empty() {
        return Err(ConfigError::Validation("zip_code is required".to_string()));
    }

    if zip.len() != 5 || !zip.chars().all(|c| c.is_ascii_digit()) {
        return Err(ConfigError::Validation(format!(
            "zip_code must be five digits, got '{}'",
            zip
        )));
    }

    Ok(())
}

/// Category slugs are path segments such as `cars` or `coins---currency`
fn validate_category_slug(slug: &str) -> Result<(), ConfigError> {
    if slug.is_empty() {
        return Err(ConfigError::Validation(
            "category slug cannot be empty".to_string(),
        ));
    }

    if !slug
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
    {
        return Err(ConfigError::Validation(format!(
            "category slug '{}' may only contain letters, digits, '-' and '_'",
            slug
        )));
    }

    Ok(())
}
