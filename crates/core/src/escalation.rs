use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::channel::ChannelKind;
use crate::error::PulsarError;
use crate::types::{
    AlertId, EscalationEventId, OrgId, PolicyId, RuleId, ScheduleId, TeamId, UserId,
};

/// An ordered chain of tiers, each describing who to notify and the delay
/// before advancing.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct EscalationPolicy {
    pub id: PolicyId,
    pub organization_id: OrgId,
    pub name: String,
    /// Whether the chain restarts from level 0 after the last rule fires.
    #[serde(default)]
    pub repeat_enabled: bool,
    /// Maximum number of completed repeat cycles; `None` means unbounded.
    #[serde(default)]
    pub repeat_count: Option<u32>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl EscalationPolicy {
    /// Create a non-repeating policy.
    #[must_use]
    pub fn new(organization_id: OrgId, name: impl Into<String>, now: DateTime<Utc>) -> Self {
        Self {
            id: PolicyId::generate(),
            organization_id,
            name: name.into(),
            repeat_enabled: false,
            repeat_count: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Enable repeating with an optional cycle cap.
    #[must_use]
    pub fn with_repeat(mut self, repeat_count: Option<u32>) -> Self {
        self.repeat_enabled = true;
        self.repeat_count = repeat_count;
        self
    }
}

/// The concrete kind of an escalation target, a tagged variant over the
/// three stable notifiable kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[serde(tag = "type", content = "target_id", rename_all = "snake_case")]
pub enum TargetRef {
    User(UserId),
    Team(TeamId),
    Schedule(ScheduleId),
}

/// One notification target of an escalation rule.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct EscalationTarget {
    #[serde(flatten)]
    pub target: TargetRef,
    /// When set, narrows the recipient's channel set to this single kind.
    #[serde(default)]
    pub channel_override: Option<ChannelKind>,
}

impl EscalationTarget {
    /// Target a single user.
    #[must_use]
    pub const fn user(id: UserId) -> Self {
        Self {
            target: TargetRef::User(id),
            channel_override: None,
        }
    }

    /// Target every member of a team.
    #[must_use]
    pub const fn team(id: TeamId) -> Self {
        Self {
            target: TargetRef::Team(id),
            channel_override: None,
        }
    }

    /// Target whoever is on call for a schedule at fire time.
    #[must_use]
    pub const fn schedule(id: ScheduleId) -> Self {
        Self {
            target: TargetRef::Schedule(id),
            channel_override: None,
        }
    }
}

/// One tier of an escalation policy.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct EscalationRule {
    pub id: RuleId,
    pub policy_id: PolicyId,
    /// 0-indexed position within the policy; fires in ascending order.
    pub position: u32,
    /// Minutes to wait before this tier fires (measured from the previous
    /// tier's fire, or from alert creation for position 0).
    pub delay_minutes: u32,
    pub targets: Vec<EscalationTarget>,
}

impl EscalationRule {
    /// Create a rule for the given policy.
    #[must_use]
    pub fn new(
        policy_id: PolicyId,
        position: u32,
        delay_minutes: u32,
        targets: Vec<EscalationTarget>,
    ) -> Self {
        Self {
            id: RuleId::generate(),
            policy_id,
            position,
            delay_minutes,
            targets,
        }
    }

    /// The tier delay as a chrono duration.
    #[must_use]
    pub fn delay(&self) -> chrono::Duration {
        chrono::Duration::minutes(i64::from(self.delay_minutes))
    }
}

/// Lifecycle state of an escalation event record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[serde(rename_all = "snake_case")]
pub enum EscalationState {
    /// Waiting for `next_fire_at`.
    Pending,
    /// Cancelled because the alert was acknowledged, closed, or snoozed.
    Acknowledged,
    /// The policy ran to exhaustion.
    Completed,
}

impl EscalationState {
    /// Whether no further fires can happen.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Acknowledged | Self::Completed)
    }
}

/// Per-alert escalation state; exactly one non-terminal record exists per
/// open alert with a policy. Mutated only by the escalation engine and the
/// transactional cancellation in the lifecycle service.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct EscalationEvent {
    pub id: EscalationEventId,
    pub organization_id: OrgId,
    pub alert_id: AlertId,
    pub policy_id: PolicyId,
    /// The rule most recently fired (or about to fire).
    #[serde(default)]
    pub current_rule_id: Option<RuleId>,
    /// 0-indexed position of the next rule to fire.
    pub current_level: u32,
    /// Completed repeat cycles.
    #[serde(default)]
    pub repeat_count: u32,
    /// When the next tier fires; `None` once terminal.
    #[serde(default)]
    pub next_fire_at: Option<DateTime<Utc>>,
    pub state: EscalationState,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl EscalationEvent {
    /// Create the pending record for a freshly opened alert.
    #[must_use]
    pub fn start(
        organization_id: OrgId,
        alert_id: AlertId,
        policy_id: PolicyId,
        first_fire_at: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id: EscalationEventId::generate(),
            organization_id,
            alert_id,
            policy_id,
            current_rule_id: None,
            current_level: 0,
            repeat_count: 0,
            next_fire_at: Some(first_fire_at),
            state: EscalationState::Pending,
            created_at: now,
            updated_at: now,
        }
    }

    /// Whether a tick at `now` should process this record.
    #[must_use]
    pub fn is_due(&self, now: DateTime<Utc>) -> bool {
        self.state == EscalationState::Pending
            && self.next_fire_at.is_some_and(|at| at <= now)
    }

    /// Transition to a terminal state, clearing the fire schedule.
    pub fn finish(&mut self, state: EscalationState, now: DateTime<Utc>) -> Result<(), PulsarError> {
        if !state.is_terminal() {
            return Err(PulsarError::validation(
                "finish requires a terminal escalation state",
            ));
        }
        self.state = state;
        self.next_fire_at = None;
        self.updated_at = now;
        Ok(())
    }
}
