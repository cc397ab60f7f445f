//! Error types for the photo search client

use bridge_traits::error::BridgeError;
use thiserror::Error;

/// Longest response body kept in an [`SearchError::HttpStatus`].
const MAX_ERROR_BODY: usize = 256;

/// Photo search errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SearchError {
    /// The request never produced a response (connect, DNS, TLS, timeout)
    #[error("Network error: {0}")]
    Network(String),

    /// The server answered with a non-2xx status
    #[error("HTTP status {status}: {body}")]
    HttpStatus { status: u16, body: String },

    /// Body is not JSON or lacks an expected key
    #[error("Failed to parse photo search response: {0}")]
    Parse(String),

    /// The API answered with `stat` other than `"ok"`
    #[error("Photo search API error: {message}")]
    Api { message: String },
}

impl SearchError {
    pub(crate) fn http_status(status: u16, body: &str) -> Self {
        let body = if body.len() > MAX_ERROR_BODY {
            let mut end = MAX_ERROR_BODY;
            while !body.is_char_boundary(end) {
                end -= 1;
            }
            format!("{}...", &body[..end])
        } else {
            body.to_string()
        };
        SearchError::HttpStatus { status, body }
    }

    pub(crate) fn missing_key(key: &str) -> Self {
        SearchError::Parse(format!("missing key '{}'", key))
    }
}

impl From<BridgeError> for SearchError {
    fn from(error: BridgeError) -> Self {
        SearchError::Network(error.to_string())
    }
}

/// Result type for photo search operations
pub type Result<T> = std::result::Result<T, SearchError>;
