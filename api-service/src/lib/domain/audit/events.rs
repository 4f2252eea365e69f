use chrono::DateTime;
use chrono::Utc;
use serde::Serialize;
use uuid::Uuid;

/// Security-relevant occurrence worth keeping a trail of.
#[derive(Debug, Clone, Serialize)]
pub struct AuditEvent {
    pub event_id: String,
    pub occurred_at: DateTime<Utc>,
    #[serde(flatten)]
    pub kind: AuditEventKind,
}

/// What happened, with the facts needed to reconstruct it later.
///
/// Never carries passwords, hashes or tokens.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "event_type", rename_all = "snake_case")]
pub enum AuditEventKind {
    LoginSucceeded {
        user_id: String,
        username: String,
    },
    LoginFailed {
        identifier: String,
        failed_attempts: Option<u32>,
    },
    PasswordChanged {
        user_id: String,
    },
    UserDeactivated {
        user_id: String,
    },
    BackendSelected {
        backend: String,
        state: String,
        reason: Option<String>,
    },
    RateLimitFailOpen {
        scope: String,
        client_key: String,
        error: String,
    },
}

impl AuditEvent {
    pub fn new(kind: AuditEventKind) -> Self {
        Self {
            event_id: Uuid::new_v4().to_string(),
            occurred_at: Utc::now(),
            kind,
        }
    }

    pub fn event_type(&self) -> &'static str {
        match self.kind {
            AuditEventKind::LoginSucceeded { .. } => "login_succeeded",
            AuditEventKind::LoginFailed { .. } => "login_failed",
            AuditEventKind::PasswordChanged { .. } => "password_changed",
            AuditEventKind::UserDeactivated { .. } => "user_deactivated",
            AuditEventKind::BackendSelected { .. } => "backend_selected",
            AuditEventKind::RateLimitFailOpen { .. } => "rate_limit_fail_open",
        }
    }
}
