use std::sync::Arc;
use std::time::Duration;

use auth::Clock;
use auth::SystemClock;

use crate::domain::audit::events::AuditEvent;
use crate::domain::audit::events::AuditEventKind;
use crate::domain::audit::ports::AuditSink;
use crate::domain::ratelimit::errors::RateLimitError;
use crate::domain::ratelimit::errors::RateLimitExceeded;
use crate::domain::ratelimit::models::FailurePolicy;
use crate::domain::ratelimit::models::RateLimit;
use crate::domain::ratelimit::ports::CounterStore;

/// Fixed-window request limiter over a shared counter store.
///
/// Windows are aligned to the Unix epoch, so every process sharing a store
/// agrees on window boundaries. Each (client, limit, window) pair owns one
/// counter; a request is admitted only if every configured limit admits it.
pub struct RateLimiter {
    scope: String,
    limits: Vec<RateLimit>,
    store: Arc<dyn CounterStore>,
    failure_policy: FailurePolicy,
    clock: Arc<dyn Clock>,
    audit: Arc<dyn AuditSink>,
}

impl RateLimiter {
    /// Create a limiter for `scope` with the default fail-open policy.
    ///
    /// # Arguments
    /// * `scope` - Namespace for counter keys, e.g. `global` or `login`
    /// * `limits` - Limits applied jointly to each request
    /// * `store` - Counter backend chosen at startup
    /// * `audit` - Receives fail-open events
    pub fn new(
        scope: impl Into<String>,
        limits: Vec<RateLimit>,
        store: Arc<dyn CounterStore>,
        audit: Arc<dyn AuditSink>,
    ) -> Self {
        Self {
            scope: scope.into(),
            limits,
            store,
            failure_policy: FailurePolicy::default(),
            clock: Arc::new(SystemClock),
            audit,
        }
    }

    pub fn with_failure_policy(mut self, failure_policy: FailurePolicy) -> Self {
        self.failure_policy = failure_policy;
        self
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn scope(&self) -> &str {
        &self.scope
    }

    pub fn limits(&self) -> &[RateLimit] {
        &self.limits
    }

    pub fn backend(&self) -> &'static str {
        self.store.backend()
    }

    /// Count a request from `client_key` against the configured limits.
    pub async fn allow(&self, client_key: &str) -> bool {
        self.check(client_key).await.is_ok()
    }

    /// Count a request from `client_key` against explicit `limits`.
    pub async fn allow_with(&self, client_key: &str, limits: &[RateLimit]) -> bool {
        self.check_limits(client_key, limits).await.is_ok()
    }

    /// Count a request against the configured limits.
    ///
    /// # Errors
    /// * `RateLimitExceeded` - A limit's ceiling was passed, or the backend
    ///   failed under `FailClosed`
    pub async fn check(&self, client_key: &str) -> Result<(), RateLimitExceeded> {
        self.check_limits(client_key, &self.limits).await
    }

    /// Count a request against `limits`.
    ///
    /// Every limit is incremented even after one has refused, so counters
    /// reflect all attempted traffic. The first refusing limit is reported.
    /// The failure policy only decides for requests no reachable limit refused.
    pub async fn check_limits(
        &self,
        client_key: &str,
        limits: &[RateLimit],
    ) -> Result<(), RateLimitExceeded> {
        let now = self.clock.now().timestamp();
        let mut refused: Option<RateLimitExceeded> = None;
        let mut unchecked: Option<(RateLimit, Duration, RateLimitError)> = None;

        for limit in limits {
            let window_secs = limit.window_secs().max(1) as i64;
            let window_start = now - now.rem_euclid(window_secs);
            let remaining = Duration::from_secs((window_start + window_secs - now).max(1) as u64);
            let key = self.counter_key(client_key, window_secs, window_start);

            match self.store.increment(&key, remaining).await {
                Ok(count) if count > limit.max_requests => {
                    tracing::debug!(
                        scope = %self.scope,
                        client = %client_key,
                        limit = %limit,
                        count,
                        "Rate limit exceeded"
                    );
                    refused.get_or_insert(RateLimitExceeded {
                        limit: *limit,
                        retry_after: remaining,
                    });
                }
                Ok(_) => {}
                Err(e) => {
                    unchecked.get_or_insert((*limit, remaining, e));
                }
            }
        }

        match (refused, unchecked) {
            (Some(exceeded), _) => Err(exceeded),
            (None, Some((limit, remaining, e))) => {
                self.on_backend_error(client_key, &limit, remaining, e)
                    .await
            }
            (None, None) => Ok(()),
        }
    }

    async fn on_backend_error(
        &self,
        client_key: &str,
        limit: &RateLimit,
        retry_after: Duration,
        error: RateLimitError,
    ) -> Result<(), RateLimitExceeded> {
        match self.failure_policy {
            FailurePolicy::FailOpen => {
                tracing::warn!(
                    scope = %self.scope,
                    client = %client_key,
                    backend = self.store.backend(),
                    error = %error,
                    "Rate-limit backend error, admitting request"
                );
                let event = AuditEvent::new(AuditEventKind::RateLimitFailOpen {
                    scope: self.scope.clone(),
                    client_key: client_key.to_string(),
                    error: error.to_string(),
                });
                if let Err(e) = self.audit.record(&event).await {
                    tracing::error!("Failed to record rate-limit audit event: {}", e);
                }
                Ok(())
            }
            FailurePolicy::FailClosed => {
                tracing::warn!(
                    scope = %self.scope,
                    client = %client_key,
                    backend = self.store.backend(),
                    error = %error,
                    "Rate-limit backend error, refusing request"
                );
                Err(RateLimitExceeded {
                    limit: *limit,
                    retry_after,
                })
            }
        }
    }

    fn counter_key(&self, client_key: &str, window_secs: i64, window_start: i64) -> String {
        format!(
            "ratelimit:{}:{}:{}:{}",
            self.scope, client_key, window_secs, window_start
        )
    }
}
