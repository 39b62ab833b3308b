use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::mapref::entry::Entry;

use pulsar_core::{
    AlertId, EscalationEvent, EscalationEventId, EscalationPolicy, EscalationRule, EscalationState,
    OrgId, PolicyId, RuleId,
};
use pulsar_store::{EscalationEventRepo, PolicyRepo, StoreError};

use crate::MemoryStore;

#[async_trait]
impl PolicyRepo for MemoryStore {
    async fn create(&self, policy: EscalationPolicy) -> Result<(), StoreError> {
        match self.policies.entry(policy.id) {
            Entry::Occupied(_) => Err(StoreError::conflict(format!(
                "policy {} already exists",
                policy.id
            ))),
            Entry::Vacant(vacant) => {
                vacant.insert(policy);
                Ok(())
            }
        }
    }

    async fn get(&self, org: OrgId, id: PolicyId) -> Result<EscalationPolicy, StoreError> {
        self.policies
            .get(&id)
            .filter(|p| p.organization_id == org)
            .map(|p| p.clone())
            .ok_or_else(|| StoreError::not_found(format!("policy {id}")))
    }

    async fn update(&self, policy: EscalationPolicy) -> Result<(), StoreError> {
        match self.policies.entry(policy.id) {
            Entry::Occupied(mut occupied) => {
                if occupied.get().organization_id != policy.organization_id {
                    return Err(StoreError::not_found(format!("policy {}", policy.id)));
                }
                occupied.insert(policy);
                Ok(())
            }
            Entry::Vacant(_) => Err(StoreError::not_found(format!("policy {}", policy.id))),
        }
    }

    async fn delete(&self, org: OrgId, id: PolicyId) -> Result<(), StoreError> {
        let removed = self
            .policies
            .remove_if(&id, |_, p| p.organization_id == org);
        if removed.is_none() {
            return Err(StoreError::not_found(format!("policy {id}")));
        }
        self.policy_rules.retain(|_, r| r.policy_id != id);
        Ok(())
    }

    async fn list(&self, org: OrgId) -> Result<Vec<EscalationPolicy>, StoreError> {
        let mut policies: Vec<EscalationPolicy> = self
            .policies
            .iter()
            .filter(|p| p.organization_id == org)
            .map(|p| p.clone())
            .collect();
        policies.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(policies)
    }

    async fn upsert_rule(&self, rule: EscalationRule) -> Result<(), StoreError> {
        if !self.policies.contains_key(&rule.policy_id) {
            return Err(StoreError::not_found(format!("policy {}", rule.policy_id)));
        }
        self.policy_rules.insert(rule.id, rule);
        Ok(())
    }

    async fn rules(&self, policy_id: PolicyId) -> Result<Vec<EscalationRule>, StoreError> {
        let mut rules: Vec<EscalationRule> = self
            .policy_rules
            .iter()
            .filter(|r| r.policy_id == policy_id)
            .map(|r| r.clone())
            .collect();
        rules.sort_by_key(|r| r.position);
        Ok(rules)
    }

    async fn remove_rule(&self, id: RuleId) -> Result<(), StoreError> {
        if self.policy_rules.remove(&id).is_none() {
            return Err(StoreError::not_found(format!("escalation rule {id}")));
        }
        Ok(())
    }
}

#[async_trait]
impl EscalationEventRepo for MemoryStore {
    async fn create(&self, event: EscalationEvent) -> Result<(), StoreError> {
        // Exactly one non-terminal record per alert.
        let has_active = self
            .escalation_events
            .iter()
            .any(|e| e.alert_id == event.alert_id && !e.state.is_terminal());
        if has_active {
            return Err(StoreError::conflict(format!(
                "alert {} already has an active escalation event",
                event.alert_id
            )));
        }
        match self.escalation_events.entry(event.id) {
            Entry::Occupied(_) => Err(StoreError::conflict(format!(
                "escalation event {} already exists",
                event.id
            ))),
            Entry::Vacant(vacant) => {
                vacant.insert(event);
                Ok(())
            }
        }
    }

    async fn get(&self, id: EscalationEventId) -> Result<EscalationEvent, StoreError> {
        self.escalation_events
            .get(&id)
            .map(|e| e.clone())
            .ok_or_else(|| StoreError::not_found(format!("escalation event {id}")))
    }

    async fn active_for_alert(
        &self,
        alert_id: AlertId,
    ) -> Result<Option<EscalationEvent>, StoreError> {
        Ok(self
            .escalation_events
            .iter()
            .find(|e| e.alert_id == alert_id && !e.state.is_terminal())
            .map(|e| e.clone()))
    }

    async fn due(
        &self,
        now: DateTime<Utc>,
        limit: usize,
    ) -> Result<Vec<EscalationEvent>, StoreError> {
        let mut due: Vec<EscalationEvent> = self
            .escalation_events
            .iter()
            .filter(|e| e.is_due(now))
            .map(|e| e.clone())
            .collect();
        due.sort_by(|a, b| a.next_fire_at.cmp(&b.next_fire_at).then(a.id.cmp(&b.id)));
        due.truncate(limit);
        Ok(due)
    }

    async fn update(&self, event: EscalationEvent) -> Result<(), StoreError> {
        match self.escalation_events.entry(event.id) {
            Entry::Occupied(mut occupied) => {
                occupied.insert(event);
                Ok(())
            }
            Entry::Vacant(_) => Err(StoreError::not_found(format!(
                "escalation event {}",
                event.id
            ))),
        }
    }

    async fn cancel_pending_for_alert(
        &self,
        alert_id: AlertId,
        now: DateTime<Utc>,
    ) -> Result<bool, StoreError> {
        let mut cancelled = false;
        for mut entry in self.escalation_events.iter_mut() {
            if entry.alert_id == alert_id && entry.state == EscalationState::Pending {
                entry.state = EscalationState::Acknowledged;
                entry.next_fire_at = None;
                entry.updated_at = now;
                cancelled = true;
            }
        }
        Ok(cancelled)
    }
}
