//! Error types for OPC control-plane operations.
//!
//! Every layer of the engine (transport, session, wait engine, resource
//! client) reports failures through [`Error`]. Provider responses keep their
//! HTTP status code so callers can special-case "not found".

use reqwest::StatusCode;
use serde::Deserialize;
use thiserror::Error;

/// Main error type for OPC operations.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum Error {
    /// The remote endpoint could not be reached
    #[error("Service unavailable: {0}")]
    ServiceUnavailable(String),

    /// HTTP request failed below the protocol level
    #[error("HTTP request failed: {0}")]
    HttpError(String),

    /// A single HTTP request exceeded its timeout
    #[error("Request timed out: {0}")]
    RequestTimeout(String),

    /// The provider answered with a non-success status
    #[error("OPC API error {status}: {message}")]
    Api {
        /// HTTP status code returned by the provider
        status: u16,
        /// Provider-supplied message
        message: String,
    },

    /// Response body did not match the expected shape
    #[error("Failed to decode response: {0}")]
    Decode(String),

    /// Request body could not be serialized
    #[error("Failed to encode request: {0}")]
    Encode(String),

    /// The authentication exchange failed
    #[error("Authentication failed: {0}")]
    Authentication(String),

    /// The provider accepted the request but the operation later failed
    #[error("Operation failed: {0}")]
    OperationFailed(String),

    /// A wait exceeded its budget before reaching a terminal state
    #[error("Timeout waiting for {0}")]
    Timeout(String),

    /// A wait was cancelled by its caller
    #[error("Cancelled while waiting for {0}")]
    Cancelled(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// Invalid endpoint
    #[error("Invalid endpoint: {0}")]
    InvalidEndpoint(String),

    /// Validation error
    #[error("Validation error: {0}")]
    ValidationError(String),
}

/// Specialized result type for OPC operations.
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Deserialize)]
struct ApiErrorBody {
    message: Option<String>,
}

impl Error {
    /// Build an [`Error::Api`] from a failed response's status and body.
    ///
    /// The provider usually returns `{"message": "..."}`; anything else is
    /// kept verbatim, and an empty body falls back to the status reason.
    #[must_use]
    pub fn from_response(status: StatusCode, body: &str) -> Self {
        let message = serde_json::from_str::<ApiErrorBody>(body)
            .ok()
            .and_then(|parsed| parsed.message)
            .unwrap_or_else(|| body.trim().to_string());

        let message = if message.is_empty() {
            status
                .canonical_reason()
                .unwrap_or("Unknown error")
                .to_string()
        } else {
            message
        };

        Self::Api {
            status: status.as_u16(),
            message,
        }
    }

    /// Returns the error code for this error type.
    #[must_use]
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::ServiceUnavailable(_) => "SERVICE_UNAVAILABLE",
            Self::HttpError(_) => "HTTP_ERROR",
            Self::RequestTimeout(_) => "REQUEST_TIMEOUT",
            Self::Api { status: 404, .. } => "NOT_FOUND",
            Self::Api { .. } => "API_ERROR",
            Self::Decode(_) => "DECODE_ERROR",
            Self::Encode(_) => "ENCODE_ERROR",
            Self::Authentication(_) => "AUTHENTICATION_FAILED",
            Self::OperationFailed(_) => "OPERATION_FAILED",
            Self::Timeout(_) => "TIMEOUT",
            Self::Cancelled(_) => "CANCELLED",
            Self::ConfigError(_) => "CONFIG_ERROR",
            Self::InvalidEndpoint(_) => "INVALID_ENDPOINT",
            Self::ValidationError(_) => "VALIDATION_ERROR",
        }
    }

    /// HTTP status code carried by a provider error, if any.
    #[must_use]
    pub const fn status_code(&self) -> Option<u16> {
        match self {
            Self::Api { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// Returns true if the provider reported the resource as absent (404).
    #[must_use]
    pub const fn is_not_found(&self) -> bool {
        matches!(self, Self::Api { status: 404, .. })
    }

    /// Returns true if a wait ran out of time.
    #[must_use]
    pub const fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout(_))
    }

    /// Returns true if re-sending the same request may succeed.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        match self {
            Self::ServiceUnavailable(_) | Self::HttpError(_) | Self::RequestTimeout(_) => true,
            Self::Api { status, .. } => *status == 429 || *status >= 500,
            _ => false,
        }
    }

    /// Returns true if this error should be logged as a serious error.
    #[must_use]
    pub const fn should_log(&self) -> bool {
        matches!(
            self,
            Self::ConfigError(_) | Self::Authentication(_) | Self::OperationFailed(_)
        )
    }
}

// Conversions from external error types
impl From<reqwest::Error> for Error {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            Self::RequestTimeout(err.to_string())
        } else if err.is_connect() {
            Self::ServiceUnavailable(err.to_string())
        } else if err.is_decode() {
            Self::Decode(err.to_string())
        } else {
            Self::HttpError(err.to_string())
        }
    }
}

impl From<url::ParseError> for Error {
    fn from(err: url::ParseError) -> Self {
        Self::InvalidEndpoint(err.to_string())
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Self::Decode(err.to_string())
    }
}

impl From<validator::ValidationErrors> for Error {
    fn from(err: validator::ValidationErrors) -> Self {
        Self::ValidationError(err.to_string())
    }
}
