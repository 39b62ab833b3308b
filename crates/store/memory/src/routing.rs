use async_trait::async_trait;
use dashmap::mapref::entry::Entry;

use pulsar_core::{OrgId, RoutingRule, RoutingRuleId};
use pulsar_store::{RoutingRuleRepo, StoreError};

use crate::MemoryStore;

#[async_trait]
impl RoutingRuleRepo for MemoryStore {
    async fn create(&self, rule: RoutingRule) -> Result<(), StoreError> {
        match self.routing_rules.entry(rule.id) {
            Entry::Occupied(_) => Err(StoreError::conflict(format!(
                "routing rule {} already exists",
                rule.id
            ))),
            Entry::Vacant(vacant) => {
                vacant.insert(rule);
                Ok(())
            }
        }
    }

    async fn get(&self, org: OrgId, id: RoutingRuleId) -> Result<RoutingRule, StoreError> {
        self.routing_rules
            .get(&id)
            .filter(|r| r.organization_id == org)
            .map(|r| r.clone())
            .ok_or_else(|| StoreError::not_found(format!("routing rule {id}")))
    }

    async fn update(&self, rule: RoutingRule) -> Result<(), StoreError> {
        match self.routing_rules.entry(rule.id) {
            Entry::Occupied(mut occupied) => {
                if occupied.get().organization_id != rule.organization_id {
                    return Err(StoreError::not_found(format!("routing rule {}", rule.id)));
                }
                occupied.insert(rule);
                Ok(())
            }
            Entry::Vacant(_) => Err(StoreError::not_found(format!("routing rule {}", rule.id))),
        }
    }

    async fn delete(&self, org: OrgId, id: RoutingRuleId) -> Result<(), StoreError> {
        let removed = self
            .routing_rules
            .remove_if(&id, |_, r| r.organization_id == org);
        if removed.is_none() {
            return Err(StoreError::not_found(format!("routing rule {id}")));
        }
        Ok(())
    }

    async fn list(&self, org: OrgId) -> Result<Vec<RoutingRule>, StoreError> {
        let mut rules: Vec<RoutingRule> = self
            .routing_rules
            .iter()
            .filter(|r| r.organization_id == org)
            .map(|r| r.clone())
            .collect();
        rules.sort_by(|a, b| a.priority.cmp(&b.priority).then(a.id.cmp(&b.id)));
        Ok(rules)
    }

    async fn list_enabled(&self, org: OrgId) -> Result<Vec<RoutingRule>, StoreError> {
        let mut rules: Vec<RoutingRule> = self
            .routing_rules
            .iter()
            .filter(|r| r.organization_id == org && r.enabled)
            .map(|r| r.clone())
            .collect();
        rules.sort_by(|a, b| a.priority.cmp(&b.priority).then(a.id.cmp(&b.id)));
        Ok(rules)
    }
}
