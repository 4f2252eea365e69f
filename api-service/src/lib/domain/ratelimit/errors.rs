use std::time::Duration;

use thiserror::Error;

use crate::domain::ratelimit::models::RateLimit;

/// Failures of the counter backend or of limit configuration.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum RateLimitError {
    #[error("Invalid rate limit '{0}'")]
    InvalidLimit(String),

    #[error("Rate-limit backend unavailable: {0}")]
    BackendUnavailable(String),

    #[error("Rate-limit backend probe timed out after {0:?}")]
    ProbeTimeout(Duration),

    #[error("No distributed rate-limit backend configured")]
    NotConfigured,
}

/// Admission refused for a client.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("Rate limit exceeded: {limit}")]
pub struct RateLimitExceeded {
    /// The first limit that refused the request.
    pub limit: RateLimit,
    /// Time until that limit's current window closes.
    pub retry_after: Duration,
}
