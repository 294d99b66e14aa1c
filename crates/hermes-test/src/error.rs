//! Test error types.

use hermes_core::SharedError;
use thiserror::Error;

/// Errors that can occur during testing.
#[derive(Debug, Error)]
pub enum TestError {
    /// The event could not be built.
    #[error("event build error: {0}")]
    EventBuild(String),

    /// The response body is not what was asked for.
    #[error("body read error: {0}")]
    BodyRead(String),

    /// JSON serialization or deserialization failed.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// The invocation finished without completing the response.
    #[error("no response was delivered to the callback")]
    NoResponse,

    /// A strict-mode handler returned a phase error.
    #[error("handler error: {0}")]
    Handler(SharedError),
}

impl From<SharedError> for TestError {
    fn from(error: SharedError) -> Self {
        Self::Handler(error)
    }
}
