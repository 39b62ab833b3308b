use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::types::{EventId, OrgId};

/// Event names published on the bus, broadcast to WebSocket subscribers,
/// and delivered to outgoing webhook endpoints.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub enum EventType {
    #[serde(rename = "alert.created")]
    AlertCreated,
    #[serde(rename = "alert.acknowledged")]
    AlertAcknowledged,
    #[serde(rename = "alert.closed")]
    AlertClosed,
    #[serde(rename = "alert.snoozed")]
    AlertSnoozed,
    #[serde(rename = "alert.assigned")]
    AlertAssigned,
    #[serde(rename = "alert.escalated")]
    AlertEscalated,
    #[serde(rename = "incident.created")]
    IncidentCreated,
    #[serde(rename = "incident.updated")]
    IncidentUpdated,
    #[serde(rename = "incident.timeline.added")]
    IncidentTimelineAdded,
}

impl EventType {
    /// Stable dotted string form.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::AlertCreated => "alert.created",
            Self::AlertAcknowledged => "alert.acknowledged",
            Self::AlertClosed => "alert.closed",
            Self::AlertSnoozed => "alert.snoozed",
            Self::AlertAssigned => "alert.assigned",
            Self::AlertEscalated => "alert.escalated",
            Self::IncidentCreated => "incident.created",
            Self::IncidentUpdated => "incident.updated",
            Self::IncidentTimelineAdded => "incident.timeline.added",
        }
    }
}

impl std::fmt::Display for EventType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The envelope shared by the event bus, the WebSocket framing, and the
/// outgoing webhook body.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct EventEnvelope {
    pub event_type: EventType,
    pub event_id: EventId,
    pub organization_id: OrgId,
    pub timestamp: DateTime<Utc>,
    #[cfg_attr(feature = "openapi", schema(value_type = Object))]
    pub data: serde_json::Value,
}

impl EventEnvelope {
    /// Build an envelope stamped at `now` with a fresh event id.
    #[must_use]
    pub fn new(
        event_type: EventType,
        organization_id: OrgId,
        data: serde_json::Value,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            event_type,
            event_id: EventId::generate(),
            organization_id,
            timestamp: now,
            data,
        }
    }
}
