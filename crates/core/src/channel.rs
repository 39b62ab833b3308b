use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::priority::Priority;
use crate::types::{AlertId, ChannelId, NotificationId, OrgId, RuleId, UserId};

/// Kinds of notification delivery channels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[serde(rename_all = "snake_case")]
pub enum ChannelKind {
    Email,
    Slack,
    Teams,
    Webhook,
    Sms,
    Push,
}

impl ChannelKind {
    /// Stable string form.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Email => "email",
            Self::Slack => "slack",
            Self::Teams => "teams",
            Self::Webhook => "webhook",
            Self::Sms => "sms",
            Self::Push => "push",
        }
    }
}

impl std::fmt::Display for ChannelKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An organization-level notification channel configuration.
///
/// `provider_config` is opaque to the core: the concrete provider adapter
/// (SMTP relay, Slack app, etc.) interprets it.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct NotificationChannel {
    pub id: ChannelId,
    pub organization_id: OrgId,
    pub kind: ChannelKind,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    #[cfg_attr(feature = "openapi", schema(value_type = Object))]
    pub provider_config: serde_json::Value,
    pub created_at: DateTime<Utc>,
}

fn default_enabled() -> bool {
    true
}

impl NotificationChannel {
    /// Create an enabled channel with the given provider configuration.
    #[must_use]
    pub fn new(
        organization_id: OrgId,
        kind: ChannelKind,
        provider_config: serde_json::Value,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id: ChannelId::generate(),
            organization_id,
            kind,
            enabled: true,
            provider_config,
            created_at: now,
        }
    }
}

/// A single queued/delivered notification to one recipient on one channel.
///
/// The tuple `(alert_id, escalation_rule_id, cycle, user_id, channel)` is
/// the fan-out idempotency key: at most one record per tuple, so a rule
/// fire cannot double-notify within a tick while repeat cycles still
/// re-notify.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct NotificationRecord {
    pub id: NotificationId,
    pub organization_id: OrgId,
    pub alert_id: AlertId,
    /// The escalation rule whose fire produced this notification, when the
    /// notification came from the escalation engine.
    #[serde(default)]
    pub escalation_rule_id: Option<RuleId>,
    /// The repeat cycle the fire belonged to (0 for the first pass).
    #[serde(default)]
    pub cycle: u32,
    pub user_id: UserId,
    pub channel: ChannelKind,
    pub priority: Priority,
    pub subject: String,
    pub body: String,
    pub created_at: DateTime<Utc>,
}

impl NotificationRecord {
    /// The idempotency key for escalation fan-out.
    #[must_use]
    pub fn dedup_key(&self) -> String {
        format!(
            "{}:{}:{}:{}:{}",
            self.alert_id,
            self.escalation_rule_id
                .map_or_else(|| "-".to_owned(), |r| r.to_string()),
            self.cycle,
            self.user_id,
            self.channel
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn channel_kind_strings() {
        assert_eq!(ChannelKind::Email.as_str(), "email");
        assert_eq!(ChannelKind::Sms.to_string(), "sms");
        let json = serde_json::to_string(&ChannelKind::Teams).unwrap();
        assert_eq!(json, "\"teams\"");
    }

    #[test]
    fn channel_defaults_enabled() {
        let ch = NotificationChannel::new(
            OrgId::generate(),
            ChannelKind::Slack,
            serde_json::json!({"webhook_url": "https://hooks.slack test"}),
            Utc::now(),
        );
        assert!(ch.enabled);
    }

    #[test]
    fn dedup_key_distinguishes_channels() {
        let base = NotificationRecord {
            id: NotificationId::generate(),
            organization_id: OrgId::generate(),
            alert_id: AlertId::generate(),
            escalation_rule_id: Some(RuleId::generate()),
            cycle: 0,
            user_id: UserId::generate(),
            channel: ChannelKind::Email,
            priority: Priority::P2,
            subject: "s".into(),
            body: "b".into(),
            created_at: Utc::now(),
        };
        let mut other = base.clone();
        other.channel = ChannelKind::Sms;
        assert_ne!(base.dedup_key(), other.dedup_key());
    }
}
