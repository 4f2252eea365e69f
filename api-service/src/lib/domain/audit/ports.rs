use async_trait::async_trait;
use thiserror::Error;

use crate::domain::audit::events::AuditEvent;

#[derive(Debug, Clone, Error)]
pub enum AuditError {
    #[error("Failed to serialize audit event: {0}")]
    SerializationFailed(String),

    #[error("Failed to record audit event: {0}")]
    RecordFailed(String),
}

/// Destination for audit events.
///
/// Callers treat recording as best effort: a failing sink is logged and never
/// fails the operation that produced the event.
#[async_trait]
pub trait AuditSink: Send + Sync + 'static {
    /// Record a single event.
    ///
    /// # Errors
    /// * `SerializationFailed` - Event could not be encoded
    /// * `RecordFailed` - Sink rejected the event
    async fn record(&self, event: &AuditEvent) -> Result<(), AuditError>;
}
