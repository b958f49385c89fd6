use std::time::Duration;

use thiserror::Error;

/// Classification of a single failed platform call.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PlatformError {
    #[error("rate limited, retry after {retry_after:?}")]
    RateLimited { retry_after: Duration },
    #[error("forbidden: {0}")]
    Forbidden(String),
    #[error("not found")]
    NotFound,
    #[error("transient network error: {0}")]
    Transient(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SnapshotError {
    #[error("invite fetch failed: {0}")]
    FetchFailed(#[from] PlatformError),
}

/// Terminal outcome of a role grant once the retry policy has run out.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AssignError {
    #[error("still rate limited after {attempts} attempts (last retry-after {retry_after:?})")]
    RateLimited { retry_after: Duration, attempts: u32 },
    #[error("missing permission to grant role: {0}")]
    Forbidden(String),
    #[error("member no longer in guild")]
    NotFound,
    #[error("network error after {attempts} attempts: {message}")]
    TransientNetworkError { message: String, attempts: u32 },
}

impl AssignError {
    /// The member left before the grant landed. Expected race, not an operator problem.
    pub fn is_benign(&self) -> bool {
        matches!(self, Self::NotFound)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SerializerError {
    #[error("shutting down, join was not started")]
    ShuttingDown,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MappingError {
    #[error("role '{role}' has an empty invite code")]
    EmptyCode { role: String },
    #[error("invite code '{code}' is bound to both '{first}' and '{second}'")]
    DuplicateCode {
        code: String,
        first: String,
        second: String,
    },
}
