use std::collections::{BTreeSet, HashMap};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::PulsarError;
use crate::priority::Priority;
use crate::types::{AlertId, OrgId, PolicyId, TeamId, UserId};

/// Lifecycle state of an alert.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[serde(rename_all = "snake_case")]
pub enum AlertStatus {
    Open,
    Acknowledged,
    Snoozed,
    Closed,
}

impl AlertStatus {
    /// Stable string form.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Open => "open",
            Self::Acknowledged => "acknowledged",
            Self::Snoozed => "snoozed",
            Self::Closed => "closed",
        }
    }

    /// Closed is the only terminal state.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Closed)
    }
}

/// A single discrete signal from a monitoring system; the unit of response.
///
/// Escalation state lives in the escalation event record; the alert carries
/// only the denormalised summary fields (`escalation_level`,
/// `last_escalated_at`).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct Alert {
    /// Unique alert identifier.
    pub id: AlertId,

    /// Owning organization.
    pub organization_id: OrgId,

    /// Optional vendor external key, used for replay deduplication.
    #[serde(default)]
    pub source_id: Option<String>,

    /// Originating system (e.g. `"prometheus"`, `"grafana"`).
    pub source: String,

    /// Short human-readable summary.
    pub message: String,

    /// Longer free-form description.
    #[serde(default)]
    pub description: String,

    /// Set of classification tags.
    #[serde(default)]
    pub tags: BTreeSet<String>,

    /// Opaque vendor-specific fields carried through unchanged.
    #[serde(default)]
    #[cfg_attr(feature = "openapi", schema(value_type = Object))]
    pub custom_fields: HashMap<String, serde_json::Value>,

    /// Urgency classification.
    pub priority: Priority,

    /// Current lifecycle state.
    pub status: AlertStatus,

    /// Assigned user; mutually exclusive with `assigned_team_id`.
    #[serde(default)]
    pub assigned_user_id: Option<UserId>,

    /// Assigned team; mutually exclusive with `assigned_user_id`.
    #[serde(default)]
    pub assigned_team_id: Option<TeamId>,

    /// Escalation policy driving tier progression, if any.
    #[serde(default)]
    pub escalation_policy_id: Option<PolicyId>,

    /// Denormalised current escalation level (monotonically non-decreasing
    /// while the alert is active).
    #[serde(default)]
    pub escalation_level: u32,

    /// When the escalation engine last fired for this alert.
    #[serde(default)]
    pub last_escalated_at: Option<DateTime<Utc>>,

    /// Creation instant.
    pub created_at: DateTime<Utc>,

    /// Set when the alert transitions to `acknowledged`.
    #[serde(default)]
    pub acknowledged_at: Option<DateTime<Utc>>,

    /// Who acknowledged.
    #[serde(default)]
    pub acknowledged_by: Option<UserId>,

    /// Set when the alert transitions to `closed` (terminal).
    #[serde(default)]
    pub closed_at: Option<DateTime<Utc>>,

    /// Who closed.
    #[serde(default)]
    pub closed_by: Option<UserId>,

    /// Free-form close reason.
    #[serde(default)]
    pub close_reason: Option<String>,

    /// Snooze expiry; must be after `created_at` while snoozed.
    #[serde(default)]
    pub snoozed_until: Option<DateTime<Utc>>,

    /// Last mutation instant.
    pub updated_at: DateTime<Utc>,
}

/// Canonical alert-creation request, produced by API callers and by the
/// incoming webhook adapter. The lifecycle service validates, routes, and
/// persists it.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct NewAlert {
    pub source: String,
    #[serde(default)]
    pub source_id: Option<String>,
    pub message: String,
    #[serde(default)]
    pub description: String,
    /// Defaults to P3 when absent (after token/routing defaults apply).
    #[serde(default)]
    pub priority: Option<Priority>,
    #[serde(default)]
    pub tags: BTreeSet<String>,
    #[serde(default)]
    #[cfg_attr(feature = "openapi", schema(value_type = Object))]
    pub custom_fields: HashMap<String, serde_json::Value>,
    /// Direct policy assignment; routing rules may override it.
    #[serde(default)]
    pub escalation_policy_id: Option<PolicyId>,
}

impl NewAlert {
    /// Materialise the request into an open alert owned by `org`.
    #[must_use]
    pub fn into_alert(self, org: OrgId, now: DateTime<Utc>) -> Alert {
        let mut alert = Alert::new(
            org,
            self.source,
            self.message,
            self.priority.unwrap_or_default(),
            now,
        );
        alert.source_id = self.source_id;
        alert.description = self.description;
        alert.tags = self.tags;
        alert.custom_fields = self.custom_fields;
        alert.escalation_policy_id = self.escalation_policy_id;
        alert
    }
}

impl Alert {
    /// Create a new open alert with required fields.
    #[must_use]
    pub fn new(
        organization_id: OrgId,
        source: impl Into<String>,
        message: impl Into<String>,
        priority: Priority,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id: AlertId::generate(),
            organization_id,
            source_id: None,
            source: source.into(),
            message: message.into(),
            description: String::new(),
            tags: BTreeSet::new(),
            custom_fields: HashMap::new(),
            priority,
            status: AlertStatus::Open,
            assigned_user_id: None,
            assigned_team_id: None,
            escalation_policy_id: None,
            escalation_level: 0,
            last_escalated_at: None,
            created_at: now,
            acknowledged_at: None,
            acknowledged_by: None,
            closed_at: None,
            closed_by: None,
            close_reason: None,
            snoozed_until: None,
            updated_at: now,
        }
    }

    /// Set the vendor external key.
    #[must_use]
    pub fn with_source_id(mut self, source_id: impl Into<String>) -> Self {
        self.source_id = Some(source_id.into());
        self
    }

    /// Set the description.
    #[must_use]
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    /// Replace the tag set.
    #[must_use]
    pub fn with_tags(mut self, tags: BTreeSet<String>) -> Self {
        self.tags = tags;
        self
    }

    /// Replace the opaque custom fields.
    #[must_use]
    pub fn with_custom_fields(mut self, fields: HashMap<String, serde_json::Value>) -> Self {
        self.custom_fields = fields;
        self
    }

    /// Set the escalation policy.
    #[must_use]
    pub fn with_policy(mut self, policy_id: PolicyId) -> Self {
        self.escalation_policy_id = Some(policy_id);
        self
    }

    /// Whether the alert still participates in escalation.
    #[must_use]
    pub const fn is_active(&self) -> bool {
        matches!(self.status, AlertStatus::Open)
    }

    /// Check the structural invariants of the record.
    pub fn validate(&self) -> Result<(), PulsarError> {
        if self.assigned_user_id.is_some() && self.assigned_team_id.is_some() {
            return Err(PulsarError::validation(
                "alert cannot be assigned to both a user and a team",
            ));
        }
        match self.status {
            AlertStatus::Acknowledged => {
                if self.acknowledged_at.is_none() {
                    return Err(PulsarError::validation(
                        "acknowledged alert is missing acknowledged_at",
                    ));
                }
            }
            AlertStatus::Closed => {
                if self.closed_at.is_none() {
                    return Err(PulsarError::validation("closed alert is missing closed_at"));
                }
            }
            AlertStatus::Snoozed => match self.snoozed_until {
                Some(until) if until > self.created_at => {}
                _ => {
                    return Err(PulsarError::validation(
                        "snoozed alert requires snoozed_until after created_at",
                    ));
                }
            },
            AlertStatus::Open => {}
        }
        if self.message.trim().is_empty() {
            return Err(PulsarError::validation("alert message cannot be empty"));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base() -> Alert {
        Alert::new(
            OrgId::generate(),
            "prometheus",
            "High CPU",
            Priority::P2,
            Utc::now(),
        )
    }

    #[test]
    fn new_alert_is_open() {
        let alert = base();
        assert_eq!(alert.status, AlertStatus::Open);
        assert!(alert.is_active());
        assert_eq!(alert.escalation_level, 0);
        alert.validate().unwrap();
    }

    #[test]
    fn builder_fields() {
        let alert = base()
            .with_source_id("ext-42")
            .with_description("cpu above 95% for 10m")
            .with_policy(PolicyId::generate());
        assert_eq!(alert.source_id.as_deref(), Some("ext-42"));
        assert!(alert.escalation_policy_id.is_some());
    }

    #[test]
    fn dual_assignment_rejected() {
        let mut alert = base();
        alert.assigned_user_id = Some(UserId::generate());
        alert.assigned_team_id = Some(TeamId::generate());
        assert!(alert.validate().is_err());
    }

    #[test]
    fn acknowledged_requires_timestamp() {
        let mut alert = base();
        alert.status = AlertStatus::Acknowledged;
        assert!(alert.validate().is_err());
        alert.acknowledged_at = Some(Utc::now());
        alert.validate().unwrap();
    }

    #[test]
    fn snoozed_requires_future_expiry() {
        let mut alert = base();
        alert.status = AlertStatus::Snoozed;
        alert.snoozed_until = Some(alert.created_at - chrono::Duration::minutes(1));
        assert!(alert.validate().is_err());
        alert.snoozed_until = Some(alert.created_at + chrono::Duration::minutes(30));
        alert.validate().unwrap();
    }

    #[test]
    fn empty_message_rejected() {
        let mut alert = base();
        alert.message = "   ".into();
        assert!(alert.validate().is_err());
    }

    #[test]
    fn serde_roundtrip() {
        let mut alert = base().with_source_id("k");
        alert.tags.insert("prometheus".into());
        let json = serde_json::to_string(&alert).unwrap();
        let back: Alert = serde_json::from_str(&json).unwrap();
        assert_eq!(back.id, alert.id);
        assert_eq!(back.tags, alert.tags);
        assert_eq!(back.status, AlertStatus::Open);
    }

    #[test]
    fn closed_is_terminal() {
        assert!(AlertStatus::Closed.is_terminal());
        assert!(!AlertStatus::Acknowledged.is_terminal());
    }
}
