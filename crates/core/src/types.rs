use std::fmt;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

macro_rules! newtype_id {
    ($name:ident, $doc:expr) => {
        #[doc = $doc]
        #[derive(
            Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
        )]
        #[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
        #[cfg_attr(feature = "openapi", schema(value_type = String))]
        #[serde(transparent)]
        pub struct $name(Uuid);

        impl $name {
            /// Generate a fresh random identifier.
            #[must_use]
            pub fn generate() -> Self {
                Self(Uuid::new_v4())
            }

            /// Wrap an existing UUID.
            #[must_use]
            pub const fn from_uuid(id: Uuid) -> Self {
                Self(id)
            }

            /// Return the inner UUID.
            #[must_use]
            pub const fn as_uuid(&self) -> Uuid {
                self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                self.0.fmt(f)
            }
        }

        impl From<Uuid> for $name {
            fn from(id: Uuid) -> Self {
                Self(id)
            }
        }

        impl std::str::FromStr for $name {
            type Err = uuid::Error;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                Ok(Self(Uuid::parse_str(s)?))
            }
        }
    };
}

newtype_id!(OrgId, "Identifies an organization (tenant root).");
newtype_id!(UserId, "Identifies a user.");
newtype_id!(TeamId, "Identifies a team within an organization.");
newtype_id!(AlertId, "Identifies an alert.");
newtype_id!(ScheduleId, "Identifies an on-call schedule.");
newtype_id!(RotationId, "Identifies a rotation within a schedule.");
newtype_id!(OverrideId, "Identifies a schedule override.");
newtype_id!(PolicyId, "Identifies an escalation policy.");
newtype_id!(RuleId, "Identifies an escalation rule within a policy.");
newtype_id!(EscalationEventId, "Identifies an alert escalation state record.");
newtype_id!(RoutingRuleId, "Identifies a routing rule.");
newtype_id!(ChannelId, "Identifies a notification channel.");
newtype_id!(NotificationId, "Identifies a notification log record.");
newtype_id!(EndpointId, "Identifies an outgoing webhook endpoint.");
newtype_id!(DeliveryId, "Identifies an outgoing webhook delivery.");
newtype_id!(TokenId, "Identifies an incoming webhook token.");
newtype_id!(EventId, "Identifies a published event envelope.");
newtype_id!(AuditId, "Identifies an audit trail entry.");
newtype_id!(IncidentId, "Identifies an incident (interface-level only).");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generate_is_unique() {
        let a = AlertId::generate();
        let b = AlertId::generate();
        assert_ne!(a, b);
    }

    #[test]
    fn serde_roundtrip_as_string() {
        let id = OrgId::generate();
        let json = serde_json::to_string(&id).unwrap();
        assert!(json.starts_with('"'));
        let back: OrgId = serde_json::from_str(&json).unwrap();
        assert_eq!(back, id);
    }

    #[test]
    fn display_matches_uuid() {
        let raw = Uuid::new_v4();
        let id = UserId::from_uuid(raw);
        assert_eq!(id.to_string(), raw.to_string());
    }

    #[test]
    fn parse_from_str() {
        let id = TeamId::generate();
        let parsed: TeamId = id.to_string().parse().unwrap();
        assert_eq!(parsed, id);
    }

    #[test]
    fn parse_rejects_garbage() {
        assert!("not-a-uuid".parse::<AlertId>().is_err());
    }
}
