//! Error types for the label system client.

use serde_json::Value;
use thiserror::Error;

/// Result type for label system operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Error types for the label system client.
#[derive(Error, Debug)]
pub enum Error {
    /// The API answered with a non-success status.
    ///
    /// Displays as the backend-provided message alone, or `HTTP <status>`
    /// when the body carried none.
    #[error("{message}")]
    Api {
        /// HTTP status code
        status: u16,
        /// Error message
        message: String,
    },

    /// Network or HTTP error.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// JSON serialization/deserialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Query parameters could not be encoded.
    #[error("query encoding error: {0}")]
    Query(#[from] serde_urlencoded::ser::Error),

    /// Configuration error.
    #[error("Configuration error: {0}")]
    Config(String),

    /// Request timeout.
    #[error("Request timed out")]
    Timeout,
}

impl Error {
    /// Build an API error from a failed response's status and parsed body.
    pub(crate) fn from_body(status: u16, body: &Value) -> Self {
        let message = ["message", "detail"]
            .iter()
            .find_map(|field| {
                body.get(field)
                    .and_then(Value::as_str)
                    .filter(|m| !m.is_empty())
            })
            .map(str::to_string)
            .unwrap_or_else(|| format!("HTTP {}", status));

        Error::Api { status, message }
    }

    /// HTTP status of an API error, if this is one.
    pub fn status(&self) -> Option<u16> {
        match self {
            Error::Api { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// True when the request never produced an HTTP response.
    pub fn is_transport(&self) -> bool {
        matches!(self, Error::Http(_) | Error::Timeout)
    }
}
