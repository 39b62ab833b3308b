use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::channel::ChannelKind;
use crate::types::{OrgId, TeamId, UserId};

/// Tenant root. Every other entity carries its `organization_id`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct Organization {
    pub id: OrgId,
    pub name: String,
    pub created_at: DateTime<Utc>,
}

/// A platform user.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct User {
    pub id: UserId,
    pub organization_id: OrgId,
    /// Globally unique email address.
    pub email: String,
    pub display_name: String,
    #[serde(default = "default_true")]
    pub active: bool,
    #[serde(default)]
    pub email_verified: bool,
    /// Channels the user wants notifications on, in preference order.
    /// Intersected with org-enabled channels at fan-out time.
    #[serde(default = "default_channels")]
    pub preferred_channels: Vec<ChannelKind>,
    pub created_at: DateTime<Utc>,
}

fn default_true() -> bool {
    true
}

fn default_channels() -> Vec<ChannelKind> {
    vec![ChannelKind::Email]
}

impl User {
    /// Create an active, unverified user with the default channel set.
    #[must_use]
    pub fn new(
        organization_id: OrgId,
        email: impl Into<String>,
        display_name: impl Into<String>,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id: UserId::generate(),
            organization_id,
            email: email.into(),
            display_name: display_name.into(),
            active: true,
            email_verified: false,
            preferred_channels: default_channels(),
            created_at: now,
        }
    }
}

/// Role of a user inside a team.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[serde(rename_all = "snake_case")]
pub enum TeamRole {
    Lead,
    Member,
}

/// Membership entry within a team.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct TeamMember {
    pub user_id: UserId,
    pub role: TeamRole,
}

/// A named group of users; name unique within the organization.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct Team {
    pub id: TeamId,
    pub organization_id: OrgId,
    pub name: String,
    #[serde(default)]
    pub members: Vec<TeamMember>,
    pub created_at: DateTime<Utc>,
}

impl Team {
    /// Create an empty team.
    #[must_use]
    pub fn new(organization_id: OrgId, name: impl Into<String>, now: DateTime<Utc>) -> Self {
        Self {
            id: TeamId::generate(),
            organization_id,
            name: name.into(),
            members: Vec::new(),
            created_at: now,
        }
    }

    /// The user ids of all members.
    #[must_use]
    pub fn member_ids(&self) -> Vec<UserId> {
        self.members.iter().map(|m| m.user_id).collect()
    }

    /// Whether the given user belongs to this team.
    #[must_use]
    pub fn has_member(&self, user_id: UserId) -> bool {
        self.members.iter().any(|m| m.user_id == user_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn user_defaults() {
        let user = User::new(OrgId::generate(), "a@example.com", "Alice", Utc::now());
        assert!(user.active);
        assert!(!user.email_verified);
        assert_eq!(user.preferred_channels, vec![ChannelKind::Email]);
    }

    #[test]
    fn team_membership() {
        let mut team = Team::new(OrgId::generate(), "sre", Utc::now());
        let u = UserId::generate();
        team.members.push(TeamMember {
            user_id: u,
            role: TeamRole::Lead,
        });
        assert!(team.has_member(u));
        assert!(!team.has_member(UserId::generate()));
        assert_eq!(team.member_ids(), vec![u]);
    }

    #[test]
    fn user_deserializes_with_defaults() {
        let json = format!(
            r#"{{"id":"{}","organization_id":"{}","email":"b@example.com","display_name":"Bob","created_at":"2026-01-01T00:00:00Z"}}"#,
            UserId::generate(),
            OrgId::generate()
        );
        let user: User = serde_json::from_str(&json).unwrap();
        assert!(user.active);
        assert_eq!(user.preferred_channels, vec![ChannelKind::Email]);
    }
}
