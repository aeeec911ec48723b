//! Checkout engine configuration loaded from environment variables.
//!
//! # Environment Variables
//!
//! ## Required
//! - `MAREA_API_BASE_URL` - Base URL of the storefront backend API
//!
//! ## Optional
//! - `MAREA_API_TIMEOUT_SECS` - Per-request timeout (default: 10)
//! - `MAREA_SYNC_DEBOUNCE_MS` - Debounce delay for state pushes
//!   (default: the [`crate::policy::SYNC_DEBOUNCE`] policy value)

use std::time::Duration;

use thiserror::Error;
use url::Url;

use crate::policy;

/// Configuration errors that can occur during loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing environment variable: {0}")]
    MissingEnvVar(String),
    #[error("Invalid environment variable {0}: {1}")]
    InvalidEnvVar(String, String),
}

/// Checkout engine configuration.
#[derive(Debug, Clone)]
pub struct CheckoutConfig {
    /// Base URL of the storefront backend API
    pub api_base_url: Url,
    /// Per-request timeout for collaborator calls
    pub api_timeout: Duration,
    /// Debounce delay before a burst of edits becomes one state push
    pub sync_debounce: Duration,
}

impl CheckoutConfig {
    /// Load configuration from environment variables.
    ///
    /// Calls `dotenvy::dotenv()` to load from `.env` file if present.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if required variables are missing or any
    /// variable fails to parse.
    pub fn from_env() -> Result<Self, ConfigError> {
        // Load .env file if present (ignore errors if not found)
        let _ = dotenvy::dotenv();

        let api_base_url = get_required_env("MAREA_API_BASE_URL")?
            .parse::<Url>()
            .map_err(|e| {
                ConfigError::InvalidEnvVar("MAREA_API_BASE_URL".to_owned(), e.to_string())
            })?;

        let api_timeout = Duration::from_secs(
            get_env_or_default("MAREA_API_TIMEOUT_SECS", "10")
                .parse::<u64>()
                .map_err(|e| {
                    ConfigError::InvalidEnvVar("MAREA_API_TIMEOUT_SECS".to_owned(), e.to_string())
                })?,
        );

        let sync_debounce = match std::env::var("MAREA_SYNC_DEBOUNCE_MS") {
            Ok(value) => Duration::from_millis(value.parse::<u64>().map_err(|e| {
                ConfigError::InvalidEnvVar("MAREA_SYNC_DEBOUNCE_MS".to_owned(), e.to_string())
            })?),
            Err(_) => policy::SYNC_DEBOUNCE,
        };

        Ok(Self {
            api_base_url,
            api_timeout,
            sync_debounce,
        })
    }

    /// Configuration with defaults for a given backend URL, used by tests
    /// and embedding code that configures programmatically.
    #[must_use]
    pub fn for_base_url(api_base_url: Url) -> Self {
        Self {
            api_base_url,
            api_timeout: Duration::from_secs(10),
            sync_debounce: policy::SYNC_DEBOUNCE,
        }
    }
}

// =============================================================================
// Helper Functions
// =============================================================================

/// Get a required environment variable.
fn get_required_env(key: &str) -> Result<String, ConfigError> {
    std::env::var(key).map_err(|_| ConfigError::MissingEnvVar(key.to_owned()))
}

/// Get an environment variable with a default value.
fn get_env_or_default(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_owned())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_for_base_url_defaults() {
        let config =
            CheckoutConfig::for_base_url(Url::parse("https://api.marea.example").unwrap());
        assert_eq!(config.api_timeout, Duration::from_secs(10));
        assert_eq!(config.sync_debounce, policy::SYNC_DEBOUNCE);
    }

    #[test]
    fn test_missing_env_var_error_message() {
        let err = ConfigError::MissingEnvVar("MAREA_API_BASE_URL".to_owned());
        assert_eq!(
            err.to_string(),
            "Missing environment variable: MAREA_API_BASE_URL"
        );
    }
}
