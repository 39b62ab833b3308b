use async_trait::async_trait;

use pulsar_core::{AuditEntry, OrgId};
use pulsar_store::{AuditFilter, AuditRepo, Page, StoreError};

use crate::MemoryStore;

#[async_trait]
impl AuditRepo for MemoryStore {
    async fn record(&self, entry: AuditEntry) -> Result<(), StoreError> {
        self.audit.lock().await.push(entry);
        Ok(())
    }

    async fn list(&self, org: OrgId, filter: &AuditFilter) -> Result<Page<AuditEntry>, StoreError> {
        let trail = self.audit.lock().await;
        let mut entries: Vec<AuditEntry> = trail
            .iter()
            .filter(|e| {
                e.organization_id == org && filter.alert_id.is_none_or(|a| e.alert_id == a)
            })
            .cloned()
            .collect();
        drop(trail);
        // Newest first; insertion order breaks equal timestamps.
        entries.reverse();
        let total = entries.len();
        let items = filter.page.unwrap_or_default().slice(&entries);
        Ok(Page { items, total })
    }
}
