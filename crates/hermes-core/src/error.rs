//! Error types for Hermes.
//!
//! This module provides the [`HermesError`] type, which every plugin hook,
//! initializer and handler reports failures with. Each error carries an
//! [`ErrorCategory`] and maps to the HTTP status code used when the error
//! turns into a failed response.
//!
//! # Response body
//!
//! An unrecovered error is rendered as:
//!
//! ```json
//! { "error": "human readable message", "errorCode": "OPTIONAL_CODE" }
//! ```
//!
//! `errorCode` is only present for HTTP-style errors created with an
//! explicit code (see [`HermesError::with_code`]).

use http::StatusCode;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use thiserror::Error;

/// Result type alias using [`HermesError`].
pub type HermesResult<T> = Result<T, HermesError>;

/// An error observed from several places at once.
///
/// The same failure is recorded on the request's last-error slot, memoized
/// by the middleware set and returned to strict-mode callers, so it is
/// shared rather than cloned.
pub type SharedError = Arc<HermesError>;

/// Categories of errors for classification and handling.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCategory {
    /// Malformed input (unparseable body, bad records).
    Validation,
    /// HTTP-style error with an explicit status code.
    Http,
    /// A plugin failed while producing its capability fragment.
    Plugin,
    /// A downstream service (queue, store) failed.
    External,
    /// A hook or handler panicked.
    Panic,
    /// Anything else.
    Internal,
}

impl ErrorCategory {
    /// Returns the default HTTP status code for this error category.
    ///
    /// [`ErrorCategory::Http`] errors carry their own status; the value
    /// returned here is only a fallback.
    #[must_use]
    pub const fn default_status_code(&self) -> StatusCode {
        match self {
            Self::Validation => StatusCode::BAD_REQUEST,
            Self::External => StatusCode::BAD_GATEWAY,
            Self::Http | Self::Plugin | Self::Panic | Self::Internal => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

/// Standard error type for Hermes.
///
/// # Example
///
/// ```
/// use hermes_core::{HermesError, ErrorCategory};
/// use http::StatusCode;
///
/// let error = HermesError::not_found("user 42 does not exist").with_code("USER_NOT_FOUND");
/// assert_eq!(error.category(), ErrorCategory::Http);
/// assert_eq!(error.status_code(), StatusCode::NOT_FOUND);
/// assert_eq!(error.message(), "user 42 does not exist");
/// ```
#[derive(Error, Debug)]
pub enum HermesError {
    /// Request input could not be understood.
    #[error("Validation error: {message}")]
    Validation {
        /// Human-readable error message.
        message: String,
    },

    /// HTTP-style error with a caller-chosen status code.
    #[error("HTTP {status}: {message}")]
    Http {
        /// Status code of the failed response.
        status: StatusCode,
        /// Optional machine-readable error code.
        error_code: Option<String>,
        /// Human-readable error message.
        message: String,
    },

    /// A plugin initializer failed.
    #[error("Plugin `{plugin}` failed: {message}")]
    Plugin {
        /// Name of the plugin.
        plugin: &'static str,
        /// Human-readable error message.
        message: String,
        /// The underlying error.
        #[source]
        source: Option<anyhow::Error>,
    },

    /// A downstream service failed.
    #[error("External service error ({service}): {message}")]
    External {
        /// Name of the external service.
        service: String,
        /// Human-readable error message.
        message: String,
    },

    /// A hook or handler panicked.
    #[error("Panic in {phase}: {message}")]
    Panic {
        /// Lifecycle phase that panicked.
        phase: &'static str,
        /// Panic payload, when it was a string.
        message: String,
    },

    /// JSON serialization or deserialization failed.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Internal error.
    #[error("Internal error: {message}")]
    Internal {
        /// Human-readable error message.
        message: String,
        /// The underlying error (not exposed to clients).
        #[source]
        source: Option<anyhow::Error>,
    },
}

impl HermesError {
    /// Creates a validation error.
    #[must_use]
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation {
            message: message.into(),
        }
    }

    /// Creates an HTTP-style error with an explicit status code.
    #[must_use]
    pub fn http(status: StatusCode, message: impl Into<String>) -> Self {
        Self::Http {
            status,
            error_code: None,
            message: message.into(),
        }
    }

    /// Creates a 400 Bad Request error.
    #[must_use]
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::http(StatusCode::BAD_REQUEST, message)
    }

    /// Creates a 401 Unauthorized error.
    #[must_use]
    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::http(StatusCode::UNAUTHORIZED, message)
    }

    /// Creates a 403 Forbidden error.
    #[must_use]
    pub fn forbidden(message: impl Into<String>) -> Self {
        Self::http(StatusCode::FORBIDDEN, message)
    }

    /// Creates a 404 Not Found error.
    #[must_use]
    pub fn not_found(message: impl Into<String>) -> Self {
        Self::http(StatusCode::NOT_FOUND, message)
    }

    /// Creates a 409 Conflict error.
    #[must_use]
    pub fn conflict(message: impl Into<String>) -> Self {
        Self::http(StatusCode::CONFLICT, message)
    }

    /// Creates a 422 Unprocessable Entity error.
    #[must_use]
    pub fn unprocessable(message: impl Into<String>) -> Self {
        Self::http(StatusCode::UNPROCESSABLE_ENTITY, message)
    }

    /// Creates a 504 Gateway Timeout error.
    #[must_use]
    pub fn timeout(message: impl Into<String>) -> Self {
        Self::http(StatusCode::GATEWAY_TIMEOUT, message)
    }

    /// Creates a 503 Service Unavailable error.
    #[must_use]
    pub fn unavailable(message: impl Into<String>) -> Self {
        Self::http(StatusCode::SERVICE_UNAVAILABLE, message)
    }

    /// Attaches a machine-readable error code to an HTTP-style error.
    ///
    /// Other variants are returned unchanged.
    #[must_use]
    pub fn with_code(self, code: impl Into<String>) -> Self {
        match self {
            Self::Http {
                status, message, ..
            } => Self::Http {
                status,
                error_code: Some(code.into()),
                message,
            },
            other => other,
        }
    }

    /// Creates a plugin initialization error.
    #[must_use]
    pub fn plugin(plugin: &'static str, message: impl Into<String>) -> Self {
        Self::Plugin {
            plugin,
            message: message.into(),
            source: None,
        }
    }

    /// Creates a plugin initialization error with a source error.
    pub fn plugin_with_source(
        plugin: &'static str,
        message: impl Into<String>,
        source: impl Into<anyhow::Error>,
    ) -> Self {
        Self::Plugin {
            plugin,
            message: message.into(),
            source: Some(source.into()),
        }
    }

    /// Creates an external service error.
    #[must_use]
    pub fn external(service: impl Into<String>, message: impl Into<String>) -> Self {
        Self::External {
            service: service.into(),
            message: message.into(),
        }
    }

    /// Creates a panic error for the given phase.
    #[must_use]
    pub fn panic(phase: &'static str, message: impl Into<String>) -> Self {
        Self::Panic {
            phase,
            message: message.into(),
        }
    }

    /// Creates an internal error.
    #[must_use]
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
            source: None,
        }
    }

    /// Creates an internal error with a source error.
    pub fn internal_with_source(
        message: impl Into<String>,
        source: impl Into<anyhow::Error>,
    ) -> Self {
        Self::Internal {
            message: message.into(),
            source: Some(source.into()),
        }
    }

    /// Returns the error category.
    #[must_use]
    pub const fn category(&self) -> ErrorCategory {
        match self {
            Self::Validation { .. } | Self::Serialization(_) => ErrorCategory::Validation,
            Self::Http { .. } => ErrorCategory::Http,
            Self::Plugin { .. } => ErrorCategory::Plugin,
            Self::External { .. } => ErrorCategory::External,
            Self::Panic { .. } => ErrorCategory::Panic,
            Self::Internal { .. } => ErrorCategory::Internal,
        }
    }

    /// Returns the HTTP status code of the failed response.
    #[must_use]
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::Http { status, .. } => *status,
            other => other.category().default_status_code(),
        }
    }

    /// Returns the bare message, without the category prefix used by `Display`.
    ///
    /// This is what clients see in the `error` field of a failed response.
    #[must_use]
    pub fn message(&self) -> String {
        match self {
            Self::Validation { message }
            | Self::Http { message, .. }
            | Self::Plugin { message, .. }
            | Self::External { message, .. }
            | Self::Panic { message, .. }
            | Self::Internal { message, .. } => message.clone(),
            Self::Serialization(e) => e.to_string(),
        }
    }

    /// Returns the machine-readable error code, if one was attached.
    #[must_use]
    pub fn error_code(&self) -> Option<&str> {
        match self {
            Self::Http { error_code, .. } => error_code.as_deref(),
            _ => None,
        }
    }

    /// Converts this error into the body of a failed response.
    #[must_use]
    pub fn to_body(&self) -> ErrorBody {
        ErrorBody {
            error: self.message(),
            error_code: self.error_code().map(str::to_string),
        }
    }
}

impl From<anyhow::Error> for HermesError {
    fn from(error: anyhow::Error) -> Self {
        match error.downcast::<HermesError>() {
            Ok(hermes) => hermes,
            Err(other) => Self::Internal {
                message: other.to_string(),
                source: Some(other),
            },
        }
    }
}

/// Serializable body of a failed response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorBody {
    /// Human-readable error message.
    pub error: String,
    /// Machine-readable error code.
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub error_code: Option<String>,
}
