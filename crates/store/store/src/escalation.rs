use async_trait::async_trait;
use chrono::{DateTime, Utc};
use pulsar_core::{
    AlertId, EscalationEvent, EscalationEventId, EscalationPolicy, EscalationRule, OrgId, PolicyId,
    RuleId,
};

use crate::error::StoreError;

/// Port over escalation policies and their ordered rules.
#[async_trait]
pub trait PolicyRepo: Send + Sync {
    async fn create(&self, policy: EscalationPolicy) -> Result<(), StoreError>;
    async fn get(&self, org: OrgId, id: PolicyId) -> Result<EscalationPolicy, StoreError>;
    async fn update(&self, policy: EscalationPolicy) -> Result<(), StoreError>;
    async fn delete(&self, org: OrgId, id: PolicyId) -> Result<(), StoreError>;
    async fn list(&self, org: OrgId) -> Result<Vec<EscalationPolicy>, StoreError>;

    /// Insert or replace a rule (keyed by rule id).
    async fn upsert_rule(&self, rule: EscalationRule) -> Result<(), StoreError>;

    /// Rules of a policy ordered by `position` ascending.
    async fn rules(&self, policy_id: PolicyId) -> Result<Vec<EscalationRule>, StoreError>;

    async fn remove_rule(&self, id: RuleId) -> Result<(), StoreError>;
}

/// Port over per-alert escalation state records.
///
/// Mutated only by the escalation engine and by the lifecycle service's
/// transactional cancellation.
#[async_trait]
pub trait EscalationEventRepo: Send + Sync {
    async fn create(&self, event: EscalationEvent) -> Result<(), StoreError>;

    async fn get(&self, id: EscalationEventId) -> Result<EscalationEvent, StoreError>;

    /// The single non-terminal record for an alert, if any.
    async fn active_for_alert(
        &self,
        alert_id: AlertId,
    ) -> Result<Option<EscalationEvent>, StoreError>;

    /// All pending records with `next_fire_at <= now`, capped at `limit`.
    async fn due(&self, now: DateTime<Utc>, limit: usize)
    -> Result<Vec<EscalationEvent>, StoreError>;

    async fn update(&self, event: EscalationEvent) -> Result<(), StoreError>;

    /// Atomically cancel the pending record for an alert, if one exists.
    /// Returns whether a record was cancelled. The caller holds the alert
    /// lock so this cannot race a tick that already reloaded the alert.
    async fn cancel_pending_for_alert(
        &self,
        alert_id: AlertId,
        now: DateTime<Utc>,
    ) -> Result<bool, StoreError>;
}
