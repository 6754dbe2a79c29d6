// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Configuration for the gateway client.

use std::time::Duration;

/// Default vendor API endpoint.
pub const DEFAULT_BASE_URL: &str = "https://api.trial.cloud.taranawireless.com";

/// Gateway configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct GatewayConfig {
    /// API key sent in the `x-api-key` header.
    pub api_key: String,
    /// Base URL of the vendor API, without a trailing slash.
    pub base_url: String,
    /// Per-request timeout.
    pub request_timeout: Duration,
    /// Skip TLS certificate verification.
    pub skip_cert_verification: bool,
    /// CPI identifier written into every configuration payload.
    pub cpi_id: String,
}

impl GatewayConfig {
    /// Create a configuration with default values for the given API key.
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into().trim().to_string(),
            base_url: DEFAULT_BASE_URL.to_string(),
            request_timeout: Duration::from_secs(30),
            skip_cert_verification: true,
            cpi_id: String::new(),
        }
    }

    /// Load configuration from environment variables.
    ///
    /// Environment variables:
    /// - `TARANA_API_KEY`: API key (required)
    /// - `TARANA_API_BASE_URL`: API base URL (default: trial cloud endpoint)
    /// - `TARANA_REQUEST_TIMEOUT_MS`: Request timeout in milliseconds (default: 30000)
    /// - `TARANA_SKIP_CERT_VERIFICATION`: Skip TLS verification (default: "true")
    /// - `CPI_ID`: CPI identifier for configuration payloads (default: empty)
    pub fn from_env() -> Result<Self, ConfigError> {
        let api_key = std::env::var("TARANA_API_KEY")
            .ok()
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
            .ok_or(ConfigError::MissingEnvVar("TARANA_API_KEY"))?;

        let base_url = std::env::var("TARANA_API_BASE_URL")
            .unwrap_or_else(|_| DEFAULT_BASE_URL.to_string())
            .trim_end_matches('/')
            .to_string();

        let request_timeout_ms: u64 = parse_env("TARANA_REQUEST_TIMEOUT_MS", 30_000)?;

        let skip_cert_verification = std::env::var("TARANA_SKIP_CERT_VERIFICATION")
            .map(|v| v.to_lowercase() == "true" || v == "1")
            .unwrap_or(true);

        let cpi_id = match std::env::var("CPI_ID") {
            Ok(v) if !v.trim().is_empty() => v.trim().to_string(),
            _ => {
                tracing::warn!("CPI_ID is not set, using an empty cpiId");
                String::new()
            }
        };

        Ok(Self {
            api_key,
            base_url,
            request_timeout: Duration::from_millis(request_timeout_ms),
            skip_cert_verification,
            cpi_id,
        })
    }

    /// Set the API base URL.
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    /// Set the request timeout.
    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    /// Enable or disable certificate verification skipping.
    pub fn with_skip_cert_verification(mut self, skip: bool) -> Self {
        self.skip_cert_verification = skip;
        self
    }

    /// Set the CPI identifier.
    pub fn with_cpi_id(mut self, cpi_id: impl Into<String>) -> Self {
        self.cpi_id = cpi_id.into();
        self
    }
}

/// Parse a numeric environment variable, falling back to `default` when unset.
pub fn parse_env<T: std::str::FromStr>(name: &'static str, default: T) -> Result<T, ConfigError> {
    match std::env::var(name) {
        Ok(value) => value.trim().parse().map_err(|_| ConfigError::InvalidValue {
            name,
            value: value.clone(),
        }),
        Err(_) => Ok(default),
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// A required environment variable is missing.
    #[error("Missing required environment variable: {0}")]
    MissingEnvVar(&'static str),
    /// An environment variable holds a value that cannot be parsed.
    #[error("Invalid value for {name}: {value:?}")]
    InvalidValue {
        /// Variable name.
        name: &'static str,
        /// Raw value found in the environment.
        value: String,
    },
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    fn clear_env() {
        // SAFETY: tests touching the environment are serialized.
        unsafe {
            std::env::remove_var("TARANA_API_KEY");
            std::env::remove_var("TARANA_API_BASE_URL");
            std::env::remove_var("TARANA_REQUEST_TIMEOUT_MS");
            std::env::remove_var("TARANA_SKIP_CERT_VERIFICATION");
            std::env::remove_var("CPI_ID");
        }
    }

    #[test]
    #[serial]
    fn test_from_env_requires_api_key() {
        clear_env();
        let err = GatewayConfig::from_env().unwrap_err();
        assert!(matches!(err, ConfigError::MissingEnvVar("TARANA_API_KEY")));
    }

    #[test]
    #[serial]
    fn test_from_env_defaults() {
        clear_env();
        unsafe {
            std::env::set_var("TARANA_API_KEY", "  secret-key \n");
        }

        let config = GatewayConfig::from_env().unwrap();
        assert_eq!(config.api_key, "secret-key");
        assert_eq!(config.base_url, DEFAULT_BASE_URL);
        assert_eq!(config.request_timeout, Duration::from_secs(30));
        assert!(config.skip_cert_verification);
        assert_eq!(config.cpi_id, "");
        clear_env();
    }

    #[test]
    #[serial]
    fn test_from_env_overrides() {
        clear_env();
        unsafe {
            std::env::set_var("TARANA_API_KEY", "k");
            std::env::set_var("TARANA_API_BASE_URL", "http://localhost:9000/");
            std::env::set_var("TARANA_REQUEST_TIMEOUT_MS", "1500");
            std::env::set_var("TARANA_SKIP_CERT_VERIFICATION", "false");
            std::env::set_var("CPI_ID", "cpi-7");
        }

        let config = GatewayConfig::from_env().unwrap();
        assert_eq!(config.base_url, "http://localhost:9000");
        assert_eq!(config.request_timeout, Duration::from_millis(1500));
        assert!(!config.skip_cert_verification);
        assert_eq!(config.cpi_id, "cpi-7");
        clear_env();
    }

    #[test]
    #[serial]
    fn test_from_env_rejects_bad_timeout() {
        clear_env();
        unsafe {
            std::env::set_var("TARANA_API_KEY", "k");
            std::env::set_var("TARANA_REQUEST_TIMEOUT_MS", "soon");
        }

        let err = GatewayConfig::from_env().unwrap_err();
        assert!(matches!(
            err,
            ConfigError::InvalidValue {
                name: "TARANA_REQUEST_TIMEOUT_MS",
                ..
            }
        ));
        clear_env();
    }

    #[test]
    fn test_builder_methods() {
        let config = GatewayConfig::new("key")
            .with_base_url("http://127.0.0.1:8080/")
            .with_request_timeout(Duration::from_secs(5))
            .with_skip_cert_verification(false)
            .with_cpi_id("cpi");

        assert_eq!(config.base_url, "http://127.0.0.1:8080");
        assert_eq!(config.request_timeout, Duration::from_secs(5));
        assert!(!config.skip_cert_verification);
        assert_eq!(config.cpi_id, "cpi");
    }
}
