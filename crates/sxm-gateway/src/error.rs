//! Gateway error types.

use thiserror::Error;

/// Errors surfaced by an exchange gateway.
///
/// All variants are transient from the maker's point of view: they are
/// logged and the next tick re-evaluates.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum GatewayError {
    #[error("HTTP client error: {0}")]
    HttpClient(String),

    #[error("HTTP {status}: {body}")]
    Status { status: u16, body: String },

    #[error("Response decode error: {0}")]
    Decode(String),

    #[error("Request rejected (code={code}): {message}")]
    Rejected { code: i64, message: String },
}

impl From<reqwest::Error> for GatewayError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_decode() {
            Self::Decode(e.to_string())
        } else {
            Self::HttpClient(e.to_string())
        }
    }
}

pub type GatewayResult<T> = Result<T, GatewayError>;
