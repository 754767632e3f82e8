//! Error types for bridge operations.

use thiserror::Error;

/// Result type alias for bridge operations.
pub type Result<T> = std::result::Result<T, Error>;

/// All errors that can arise from sync operations.
///
/// The orchestrator catches these per pairing; only malformed requests or
/// missing registry access surface above it.
#[derive(Debug, Error)]
pub enum Error {
    /// Credential exchange, refresh, or decryption failure.
    #[error("auth error: {0}")]
    Auth(String),

    /// A source or destination sheet is missing its header row.
    #[error("schema error: {0}")]
    Schema(String),

    /// Unparseable reference URL or missing required field.
    #[error("validation error: {0}")]
    Validation(String),

    /// Non-2xx response or timeout from either tabular store.
    #[error("upstream error: {0}")]
    Upstream(String),

    /// Required configuration or secret is absent.
    #[error("config error: {0}")]
    Config(String),
}

impl Error {
    pub(crate) fn auth(msg: impl Into<String>) -> Self {
        Error::Auth(msg.into())
    }

    pub(crate) fn schema(msg: impl Into<String>) -> Self {
        Error::Schema(msg.into())
    }

    pub(crate) fn validation(msg: impl Into<String>) -> Self {
        Error::Validation(msg.into())
    }

    pub(crate) fn upstream(msg: impl Into<String>) -> Self {
        Error::Upstream(msg.into())
    }

    pub(crate) fn config(msg: impl Into<String>) -> Self {
        Error::Config(msg.into())
    }
}

/// Transport and body-decoding failures from the HTTP clients.
impl From<ureq::Error> for Error {
    fn from(err: ureq::Error) -> Self {
        match err {
            ureq::Error::StatusCode(code) => {
                Error::Upstream(format!("request failed with status {}", code))
            }
            other => Error::Upstream(other.to_string()),
        }
    }
}
