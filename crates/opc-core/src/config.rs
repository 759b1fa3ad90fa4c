//! Configuration structures for OPC clients.
//!
//! [`OpcConfig`] carries the identity, endpoint and transport tuning shared by
//! every sub-API client.

use crate::Error;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;
use url::Url;
use validator::Validate;

/// Configuration for an OPC client instance.
#[derive(Clone, Serialize, Deserialize, Validate)]
pub struct OpcConfig {
    /// Identity domain (tenant) the user belongs to
    #[validate(length(min = 1))]
    pub identity_domain: String,

    /// Account username
    #[validate(length(min = 1))]
    pub username: String,

    /// Account password
    #[serde(default, skip_serializing)]
    pub password: String,

    /// Base URL of the sub-API endpoint
    #[validate(url)]
    pub api_endpoint: String,

    /// Total number of attempts made for one request
    #[validate(range(min = 1, max = 10))]
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    /// Request timeout in seconds
    #[validate(range(min = 1, max = 300))]
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,

    /// Whether to verify TLS certificates
    #[serde(default = "default_tls_verify")]
    pub tls_verify: bool,

    /// Optional path to custom CA certificate
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tls_ca_cert: Option<std::path::PathBuf>,
}

const fn default_max_retries() -> u32 {
    crate::client::DEFAULT_MAX_RETRIES
}

const fn default_request_timeout_secs() -> u64 {
    crate::client::DEFAULT_REQUEST_TIMEOUT
}

const fn default_tls_verify() -> bool {
    true
}

impl OpcConfig {
    /// Create a new client configuration with required parameters.
    ///
    /// # Errors
    ///
    /// Returns an error if the endpoint is not a URL or a required field is
    /// empty.
    pub fn new(
        identity_domain: impl Into<String>,
        username: impl Into<String>,
        password: impl Into<String>,
        api_endpoint: impl Into<String>,
    ) -> Result<Self, Error> {
        let config = Self {
            identity_domain: identity_domain.into(),
            username: username.into(),
            password: password.into(),
            api_endpoint: api_endpoint.into(),
            max_retries: default_max_retries(),
            request_timeout_secs: default_request_timeout_secs(),
            tls_verify: default_tls_verify(),
            tls_ca_cert: None,
        };

        config
            .validate()
            .map_err(|e| Error::ConfigError(format!("Invalid configuration: {e}")))?;

        Ok(config)
    }

    /// Set maximum request attempts.
    #[must_use]
    pub const fn with_max_retries(mut self, retries: u32) -> Self {
        self.max_retries = retries;
        self
    }

    /// Set request timeout in seconds.
    #[must_use]
    pub const fn with_timeout(mut self, seconds: u64) -> Self {
        self.request_timeout_secs = seconds;
        self
    }

    /// Set whether to verify TLS certificates.
    #[must_use]
    pub const fn with_tls_verify(mut self, verify: bool) -> Self {
        self.tls_verify = verify;
        self
    }

    /// Set custom CA certificate path.
    #[must_use]
    pub fn with_ca_cert(mut self, path: std::path::PathBuf) -> Self {
        self.tls_ca_cert = Some(path);
        self
    }

    /// Get the request timeout as a Duration.
    #[must_use]
    pub const fn timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    /// Parse and validate the API endpoint.
    ///
    /// # Errors
    ///
    /// Returns an error if the URL cannot be parsed.
    pub fn parse_endpoint(&self) -> Result<Url, Error> {
        Url::parse(&self.api_endpoint)
            .map_err(|e| Error::ConfigError(format!("Invalid API endpoint: {e}")))
    }
}

impl fmt::Debug for OpcConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OpcConfig")
            .field("identity_domain", &self.identity_domain)
            .field("username", &self.username)
            .field("password", &"[REDACTED]")
            .field("api_endpoint", &self.api_endpoint)
            .field("max_retries", &self.max_retries)
            .field("request_timeout_secs", &self.request_timeout_secs)
            .field("tls_verify", &self.tls_verify)
            .field("tls_ca_cert", &self.tls_ca_cert)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> OpcConfig {
        OpcConfig::new("mydomain", "jane", "s3cret", "https://api.example.com").unwrap()
    }

    #[test]
    fn test_opc_config_new() {
        let config = config();
        assert_eq!(config.identity_domain, "mydomain");
        assert_eq!(config.username, "jane");
        assert_eq!(config.max_retries, 3);
        assert_eq!(config.request_timeout_secs, 30);
        assert!(config.tls_verify);
        assert!(config.tls_ca_cert.is_none());
    }

    #[test]
    fn test_opc_config_invalid_endpoint() {
        let result = OpcConfig::new("mydomain", "jane", "pw", "not-a-url");
        assert!(matches!(result, Err(Error::ConfigError(_))));
    }

    #[test]
    fn test_opc_config_empty_domain() {
        let result = OpcConfig::new("", "jane", "pw", "https://api.example.com");
        assert!(result.is_err());
    }

    #[test]
    fn test_opc_config_builder() {
        let config = config()
            .with_max_retries(5)
            .with_timeout(60)
            .with_tls_verify(false);

        assert_eq!(config.max_retries, 5);
        assert_eq!(config.timeout(), Duration::from_secs(60));
        assert!(!config.tls_verify);
    }

    #[test]
    fn test_parse_endpoint() {
        let url = OpcConfig::new("d", "u", "p", "https://api.example.com:8443")
            .unwrap()
            .parse_endpoint()
            .unwrap();
        assert_eq!(url.scheme(), "https");
        assert_eq!(url.port(), Some(8443));
    }

    #[test]
    fn test_password_never_serialized_or_printed() {
        let config = config();
        let json = serde_json::to_string(&config).unwrap();
        assert!(!json.contains("s3cret"));
        assert!(!format!("{config:?}").contains("s3cret"));
    }

    #[test]
    fn test_deserialize_applies_defaults() {
        let config: OpcConfig = serde_json::from_str(
            r#"{
                "identity_domain": "d",
                "username": "u",
                "password": "p",
                "api_endpoint": "https://api.example.com"
            }"#,
        )
        .unwrap();
        assert_eq!(config.password, "p");
        assert_eq!(config.max_retries, 3);
        assert!(config.tls_verify);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_validation_retries_range() {
        let mut config = config();
        config.max_retries = 0;
        assert!(config.validate().is_err());

        config.max_retries = 11;
        assert!(config.validate().is_err());

        config.max_retries = 1;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_validation_timeout_range() {
        let mut config = config();
        config.request_timeout_secs = 0;
        assert!(config.validate().is_err());

        config.request_timeout_secs = 301;
        assert!(config.validate().is_err());
    }
}
