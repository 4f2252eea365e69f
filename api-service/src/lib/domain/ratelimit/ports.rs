use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

use crate::domain::ratelimit::errors::RateLimitError;

/// Atomic counter storage backing the rate limiter.
#[async_trait]
pub trait CounterStore: Send + Sync + 'static {
    /// Short backend name for logs, e.g. `redis` or `memory`.
    fn backend(&self) -> &'static str;

    /// Increment `key` and return the post-increment count.
    ///
    /// A key that does not exist yet starts at zero and expires after `ttl`.
    /// Concurrent callers on the same key each observe a distinct count.
    ///
    /// # Errors
    /// * `BackendUnavailable` - Store could not be reached or timed out
    async fn increment(&self, key: &str, ttl: Duration) -> Result<u64, RateLimitError>;
}

/// Builds a connected counter store during backend selection.
#[async_trait]
pub trait BackendConnector: Send + Sync + 'static {
    fn name(&self) -> &str;

    /// Construct the store and perform a liveness round trip.
    ///
    /// # Errors
    /// * `BackendUnavailable` - Construction or liveness check failed
    /// * `NotConfigured` - No connection target available
    async fn connect(&self) -> Result<Arc<dyn CounterStore>, RateLimitError>;
}
