use async_trait::async_trait;
use dashmap::mapref::entry::Entry;

use pulsar_core::{Alert, AlertId, OrgId, PolicyId};
use pulsar_store::{AlertFilter, AlertRepo, Page, StoreError};

use crate::MemoryStore;

fn matches(alert: &Alert, filter: &AlertFilter) -> bool {
    if filter.status.is_some_and(|s| alert.status != s) {
        return false;
    }
    if filter.priority.is_some_and(|p| alert.priority != p) {
        return false;
    }
    if filter
        .source
        .as_ref()
        .is_some_and(|s| &alert.source != s)
    {
        return false;
    }
    if filter
        .assigned_user_id
        .is_some_and(|u| alert.assigned_user_id != Some(u))
    {
        return false;
    }
    if filter
        .assigned_team_id
        .is_some_and(|t| alert.assigned_team_id != Some(t))
    {
        return false;
    }
    if filter
        .tag
        .as_ref()
        .is_some_and(|tag| !alert.tags.contains(tag))
    {
        return false;
    }
    if filter
        .created_after
        .is_some_and(|after| alert.created_at < after)
    {
        return false;
    }
    if filter
        .created_before
        .is_some_and(|before| alert.created_at > before)
    {
        return false;
    }
    true
}

#[async_trait]
impl AlertRepo for MemoryStore {
    async fn create(&self, alert: Alert) -> Result<(), StoreError> {
        match self.alerts.entry(alert.id) {
            Entry::Occupied(_) => Err(StoreError::conflict(format!(
                "alert {} already exists",
                alert.id
            ))),
            Entry::Vacant(vacant) => {
                vacant.insert(alert);
                Ok(())
            }
        }
    }

    async fn get(&self, org: OrgId, id: AlertId) -> Result<Alert, StoreError> {
        self.alerts
            .get(&id)
            .filter(|a| a.organization_id == org)
            .map(|a| a.clone())
            .ok_or_else(|| StoreError::not_found(format!("alert {id}")))
    }

    async fn find_by_source_id(
        &self,
        org: OrgId,
        source: &str,
        source_id: &str,
    ) -> Result<Option<Alert>, StoreError> {
        Ok(self
            .alerts
            .iter()
            .find(|a| {
                a.organization_id == org
                    && a.source == source
                    && a.source_id.as_deref() == Some(source_id)
            })
            .map(|a| a.clone()))
    }

    async fn update(&self, alert: Alert) -> Result<(), StoreError> {
        match self.alerts.entry(alert.id) {
            Entry::Occupied(mut occupied) => {
                if occupied.get().organization_id != alert.organization_id {
                    return Err(StoreError::not_found(format!("alert {}", alert.id)));
                }
                occupied.insert(alert);
                Ok(())
            }
            Entry::Vacant(_) => Err(StoreError::not_found(format!("alert {}", alert.id))),
        }
    }

    async fn delete(&self, org: OrgId, id: AlertId) -> Result<(), StoreError> {
        let removed = self
            .alerts
            .remove_if(&id, |_, a| a.organization_id == org);
        if removed.is_none() {
            return Err(StoreError::not_found(format!("alert {id}")));
        }
        Ok(())
    }

    async fn list(&self, org: OrgId, filter: &AlertFilter) -> Result<Page<Alert>, StoreError> {
        let mut items: Vec<Alert> = self
            .alerts
            .iter()
            .filter(|a| a.organization_id == org && matches(a, filter))
            .map(|a| a.clone())
            .collect();
        // Newest first, id as the deterministic tie-break.
        items.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
        let total = items.len();
        let items = filter.page.unwrap_or_default().slice(&items);
        Ok(Page { items, total })
    }

    async fn open_with_policy(
        &self,
        org: OrgId,
        policy_id: PolicyId,
    ) -> Result<Vec<Alert>, StoreError> {
        Ok(self
            .alerts
            .iter()
            .filter(|a| {
                a.organization_id == org
                    && a.escalation_policy_id == Some(policy_id)
                    && !a.status.is_terminal()
            })
            .map(|a| a.clone())
            .collect())
    }
}
