use async_trait::async_trait;

use crate::domain::audit::events::AuditEvent;
use crate::domain::audit::ports::AuditError;
use crate::domain::audit::ports::AuditSink;

/// Audit sink writing one structured `tracing` record per event.
///
/// Records go to the `audit` target so subscribers can route them separately
/// from operational logs.
#[derive(Debug, Clone, Default)]
pub struct TracingAuditSink;

impl TracingAuditSink {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl AuditSink for TracingAuditSink {
    async fn record(&self, event: &AuditEvent) -> Result<(), AuditError> {
        let payload = serde_json::to_string(event)
            .map_err(|e| AuditError::SerializationFailed(e.to_string()))?;

        tracing::info!(
            target: "audit",
            event_id = %event.event_id,
            event_type = event.event_type(),
            payload = %payload,
            "Audit event"
        );

        Ok(())
    }
}
