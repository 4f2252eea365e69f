use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use auth::Clock;
use auth::SystemClock;
use chrono::DateTime;
use chrono::Utc;
use tokio::sync::Mutex;

use crate::domain::ratelimit::errors::RateLimitError;
use crate::domain::ratelimit::ports::CounterStore;

struct Counter {
    count: u64,
    expires_at: DateTime<Utc>,
}

/// In-process counter store.
///
/// Counters are private to this process and lost on restart. Expired counters
/// are dropped lazily when new keys are created.
pub struct MemoryCounterStore {
    counters: Mutex<HashMap<String, Counter>>,
    clock: Arc<dyn Clock>,
}

impl MemoryCounterStore {
    pub fn new() -> Self {
        Self {
            counters: Mutex::new(HashMap::new()),
            clock: Arc::new(SystemClock),
        }
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Number of live counters, including expired ones not yet purged.
    pub async fn len(&self) -> usize {
        self.counters.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

impl Default for MemoryCounterStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl CounterStore for MemoryCounterStore {
    fn backend(&self) -> &'static str {
        "memory"
    }

    async fn increment(&self, key: &str, ttl: Duration) -> Result<u64, RateLimitError> {
        let now = self.clock.now();
        let ttl = chrono::Duration::from_std(ttl)
            .map_err(|e| RateLimitError::BackendUnavailable(e.to_string()))?;
        let mut counters = self.counters.lock().await;

        if let Some(counter) = counters.get_mut(key) {
            if counter.expires_at > now {
                counter.count += 1;
                return Ok(counter.count);
            }
        }

        counters.retain(|_, counter| counter.expires_at > now);
        counters.insert(
            key.to_string(),
            Counter {
                count: 1,
                expires_at: now + ttl,
            },
        );
        Ok(1)
    }
}
