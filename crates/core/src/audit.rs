use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::types::{AlertId, AuditId, OrgId, UserId};

/// Who performed an audited action.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[serde(tag = "kind", content = "user_id", rename_all = "snake_case")]
pub enum Actor {
    /// A human caller, identified by user id.
    User(UserId),
    /// The platform itself (escalation engine, routing, workers).
    System,
}

/// One durable audit trail entry. Every alert mutation records one.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct AuditEntry {
    pub id: AuditId,
    pub organization_id: OrgId,
    pub alert_id: AlertId,
    pub actor: Actor,
    /// Action name (`create`, `acknowledge`, `close`, `snooze`, `assign`,
    /// `escalate`, `delete`).
    pub action: String,
    #[serde(default)]
    pub detail: Option<String>,
    pub at: DateTime<Utc>,
}

impl AuditEntry {
    /// Record an action against an alert.
    #[must_use]
    pub fn record(
        organization_id: OrgId,
        alert_id: AlertId,
        actor: Actor,
        action: impl Into<String>,
        at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: AuditId::generate(),
            organization_id,
            alert_id,
            actor,
            action: action.into(),
            detail: None,
            at,
        }
    }

    /// Attach free-form detail.
    #[must_use]
    pub fn with_detail(mut self, detail: impl Into<String>) -> Self {
        self.detail = Some(detail.into());
        self
    }
}
