//! Error types shared across ArenaGrid crates.

use thiserror::Error;

/// Result type alias for collaborator calls.
pub type ContractResult<T> = Result<T, ContractError>;

/// Failure reported by an external collaborator.
///
/// The variants separate an expected absence, which callers fall back
/// from, from a service failure that must be logged with its detail, and
/// from an unrecoverable error that aborts the current operation.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ContractError {
    #[error("{0} not available")]
    Unavailable(String),

    #[error("{service} error: {message}")]
    Service {
        service: &'static str,
        message: String,
    },

    #[error("fatal: {0}")]
    Fatal(String),
}

impl ContractError {
    pub fn service(service: &'static str, message: impl ToString) -> Self {
        Self::Service {
            service,
            message: message.to_string(),
        }
    }

    /// True for the "not found / not yet available" case.
    pub fn is_unavailable(&self) -> bool {
        matches!(self, Self::Unavailable(_))
    }
}

/// A `host:port` string that could not be parsed.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EndpointParseError {
    #[error("malformed endpoint {0:?}: missing ':' delimiter")]
    MissingDelimiter(String),

    #[error("malformed endpoint {0:?}: more than one ':' delimiter")]
    ExtraDelimiter(String),

    #[error("malformed endpoint {0:?}: empty host")]
    EmptyHost(String),

    #[error("malformed endpoint {0:?}: empty port")]
    EmptyPort(String),
}
