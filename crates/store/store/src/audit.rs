use async_trait::async_trait;
use pulsar_core::{AuditEntry, OrgId};

use crate::error::StoreError;
use crate::filter::{AuditFilter, Page};

/// Port over the append-only audit trail.
#[async_trait]
pub trait AuditRepo: Send + Sync {
    /// Append an entry. Entries are never mutated or deleted.
    async fn record(&self, entry: AuditEntry) -> Result<(), StoreError>;

    /// Query the trail, newest first.
    async fn list(&self, org: OrgId, filter: &AuditFilter) -> Result<Page<AuditEntry>, StoreError>;
}
