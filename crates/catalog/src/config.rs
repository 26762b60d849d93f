//! Catalog job configuration loaded from environment variables.
//!
//! # Environment Variables
//!
//! ## Required
//! - `QUICKLIST_DATABASE_URL` - `PostgreSQL` connection string
//! - `MARKET_API_URL` - Base URL of the external product-data source
//! - `MARKET_API_KEY` - API key for the product-data source
//! - `VISION_ENDPOINT_URL` - Base URL of the matching-index admin surface
//! - `VISION_API_KEY` - API key for the matching service
//! - `VISION_DEPLOYED_INDEX` - Deployed index identifier to publish into
//!
//! ## Optional
//! - `MARKET_TIMEOUT_SECS` - Per-call timeout for source lookups (default: 20)

use std::time::Duration;

use secrecy::SecretString;
use thiserror::Error;

/// Configuration errors that can occur during loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing environment variable: {0}")]
    MissingEnvVar(String),
    #[error("Invalid environment variable {0}: {1}")]
    InvalidEnvVar(String, String),
}

/// Configuration for catalog jobs (sync + index publishing).
#[derive(Debug, Clone)]
pub struct CatalogConfig {
    /// `PostgreSQL` database connection URL (contains password)
    pub database_url: SecretString,
    /// External product-data source configuration
    pub market: MarketFeedConfig,
    /// Matching-index admin configuration
    pub index: IndexConfig,
}

/// External product-data source configuration.
///
/// Implements `Debug` manually to redact the API key.
#[derive(Clone)]
pub struct MarketFeedConfig {
    /// Base URL of the source API.
    pub base_url: String,
    /// API key sent on every request.
    pub api_key: SecretString,
    /// Per-call timeout for lookups.
    pub timeout: Duration,
}

impl std::fmt::Debug for MarketFeedConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MarketFeedConfig")
            .field("base_url", &self.base_url)
            .field("api_key", &"[REDACTED]")
            .field("timeout", &self.timeout)
            .finish()
    }
}

/// Matching-index admin configuration.
///
/// Implements `Debug` manually to redact the API key.
#[derive(Clone)]
pub struct IndexConfig {
    /// Base URL of the matching service.
    pub base_url: String,
    /// API key for the matching service.
    pub api_key: SecretString,
    /// Deployed index identifier whose records we publish.
    pub deployed_index: String,
}

impl std::fmt::Debug for IndexConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IndexConfig")
            .field("base_url", &self.base_url)
            .field("api_key", &"[REDACTED]")
            .field("deployed_index", &self.deployed_index)
            .finish()
    }
}

impl CatalogConfig {
    /// Load configuration from environment variables.
    ///
    /// Calls `dotenvy::dotenv()` to load from `.env` file if present.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if required variables are missing or invalid.
    pub fn from_env() -> Result<Self, ConfigError> {
        // Load .env file if present (ignore errors if not found)
        let _ = dotenvy::dotenv();

        Ok(Self {
            database_url: get_database_url("QUICKLIST_DATABASE_URL")?,
            market: MarketFeedConfig::from_env()?,
            index: IndexConfig::from_env()?,
        })
    }
}

impl MarketFeedConfig {
    fn from_env() -> Result<Self, ConfigError> {
        let timeout_secs = get_env_or_default("MARKET_TIMEOUT_SECS", "20")
            .parse::<u64>()
            .map_err(|e| {
                ConfigError::InvalidEnvVar("MARKET_TIMEOUT_SECS".to_string(), e.to_string())
            })?;

        Ok(Self {
            base_url: get_required_env("MARKET_API_URL")?,
            api_key: get_required_secret("MARKET_API_KEY")?,
            timeout: Duration::from_secs(timeout_secs),
        })
    }
}

impl IndexConfig {
    /// Load the index configuration alone.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if required variables are missing.
    pub fn from_env() -> Result<Self, ConfigError> {
        Ok(Self {
            base_url: get_required_env("VISION_ENDPOINT_URL")?,
            api_key: get_required_secret("VISION_API_KEY")?,
            deployed_index: get_required_env("VISION_DEPLOYED_INDEX")?,
        })
    }
}

// =============================================================================
// Helper Functions
// =============================================================================

/// Get a required environment variable.
fn get_required_env(key: &str) -> Result<String, ConfigError> {
    std::env::var(key).map_err(|_| ConfigError::MissingEnvVar(key.to_string()))
}

/// Get a required environment variable as a secret.
fn get_required_secret(key: &str) -> Result<SecretString, ConfigError> {
    let value = get_required_env(key)?;
    Ok(SecretString::from(value))
}

/// Get database URL with fallback to generic `DATABASE_URL`.
fn get_database_url(primary_key: &str) -> Result<SecretString, ConfigError> {
    if let Ok(value) = std::env::var(primary_key) {
        return Ok(SecretString::from(value));
    }
    if let Ok(value) = std::env::var("DATABASE_URL") {
        return Ok(SecretString::from(value));
    }
    Err(ConfigError::MissingEnvVar(primary_key.to_string()))
}

/// Get an environment variable with a default value.
fn get_env_or_default(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_market_config_debug_redacts_key() {
        let config = MarketFeedConfig {
            base_url: "https://feed.example.com".to_string(),
            api_key: SecretString::from("mk_live_super_secret"),
            timeout: Duration::from_secs(20),
        };

        let debug_output = format!("{config:?}");
        assert!(debug_output.contains("feed.example.com"));
        assert!(debug_output.contains("[REDACTED]"));
        assert!(!debug_output.contains("mk_live_super_secret"));
    }

    #[test]
    fn test_index_config_debug_redacts_key() {
        let config = IndexConfig {
            base_url: "https://match.example.com".to_string(),
            api_key: SecretString::from("vk_live_super_secret"),
            deployed_index: "quicklist_products_v1".to_string(),
        };

        let debug_output = format!("{config:?}");
        assert!(debug_output.contains("quicklist_products_v1"));
        assert!(!debug_output.contains("vk_live_super_secret"));
    }
}
