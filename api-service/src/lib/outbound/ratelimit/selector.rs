use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use crate::domain::audit::events::AuditEvent;
use crate::domain::audit::events::AuditEventKind;
use crate::domain::audit::ports::AuditSink;
use crate::domain::ratelimit::errors::RateLimitError;
use crate::domain::ratelimit::ports::BackendConnector;
use crate::domain::ratelimit::ports::CounterStore;
use crate::outbound::ratelimit::memory::MemoryCounterStore;

/// Terminal state of backend selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackendState {
    /// Counters live in a store shared across processes.
    Distributed,
    /// Counters are private to this process.
    LocalFallback,
}

impl fmt::Display for BackendState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BackendState::Distributed => write!(f, "distributed"),
            BackendState::LocalFallback => write!(f, "local_fallback"),
        }
    }
}

/// Outcome of `BackendSelector::select`.
pub struct SelectedBackend {
    pub state: BackendState,
    /// Name of the connector that succeeded, or `memory`
    pub backend: String,
    pub store: Arc<dyn CounterStore>,
}

impl fmt::Debug for SelectedBackend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SelectedBackend")
            .field("state", &self.state)
            .field("backend", &self.backend)
            .finish_non_exhaustive()
    }
}

/// Chooses the rate-limit counter store once at startup.
///
/// Connectors are tried in order, each bounded by the probe timeout. The first
/// one to connect wins; if none does, an in-process store is used instead.
pub struct BackendSelector {
    connectors: Vec<Box<dyn BackendConnector>>,
    probe_timeout: Duration,
    audit: Arc<dyn AuditSink>,
}

impl BackendSelector {
    pub const DEFAULT_PROBE_TIMEOUT: Duration = Duration::from_secs(5);

    pub fn new(probe_timeout: Duration, audit: Arc<dyn AuditSink>) -> Self {
        Self {
            connectors: Vec::new(),
            probe_timeout,
            audit,
        }
    }

    pub fn with_connector(mut self, connector: impl BackendConnector) -> Self {
        self.connectors.push(Box::new(connector));
        self
    }

    /// Probe connectors and settle on a backend. Never fails.
    pub async fn select(&self) -> SelectedBackend {
        let mut failures: Vec<String> = Vec::new();

        for connector in &self.connectors {
            match self.probe(connector.as_ref()).await {
                Ok(store) => {
                    tracing::info!(
                        backend = connector.name(),
                        "Rate limiting uses distributed counter store"
                    );
                    let selected = SelectedBackend {
                        state: BackendState::Distributed,
                        backend: connector.name().to_string(),
                        store,
                    };
                    self.record(&selected, None).await;
                    return selected;
                }
                Err(e) => {
                    tracing::debug!(backend = connector.name(), error = %e, "Backend probe failed");
                    failures.push(format!("{}: {}", connector.name(), e));
                }
            }
        }

        let reason = if failures.is_empty() {
            RateLimitError::NotConfigured.to_string()
        } else {
            failures.join("; ")
        };

        tracing::warn!(
            reason = %reason,
            "Rate limiting degraded to in-process counters; limits are per instance and reset on restart"
        );

        let selected = SelectedBackend {
            state: BackendState::LocalFallback,
            backend: "memory".to_string(),
            store: Arc::new(MemoryCounterStore::new()),
        };
        self.record(&selected, Some(reason)).await;
        selected
    }

    async fn probe(
        &self,
        connector: &dyn BackendConnector,
    ) -> Result<Arc<dyn CounterStore>, RateLimitError> {
        match tokio::time::timeout(self.probe_timeout, connector.connect()).await {
            Ok(result) => result,
            Err(_) => Err(RateLimitError::ProbeTimeout(self.probe_timeout)),
        }
    }

    async fn record(&self, selected: &SelectedBackend, reason: Option<String>) {
        let event = AuditEvent::new(AuditEventKind::BackendSelected {
            backend: selected.backend.clone(),
            state: selected.state.to_string(),
            reason,
        });
        if let Err(e) = self.audit.record(&event).await {
            tracing::error!("Failed to record backend selection audit event: {}", e);
        }
    }
}
