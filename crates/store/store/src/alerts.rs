use async_trait::async_trait;
use pulsar_core::{Alert, AlertId, OrgId};

use crate::error::StoreError;
use crate::filter::{AlertFilter, Page};

/// Typed port over alert persistence.
///
/// Implementations must be safe for parallel calls. Multi-row atomicity
/// (alert transition + escalation cancellation) is the caller's concern,
/// serialised through [`AlertLocks`](crate::locks::AlertLocks).
#[async_trait]
pub trait AlertRepo: Send + Sync {
    /// Persist a new alert. Fails with `Conflict` if the id exists.
    async fn create(&self, alert: Alert) -> Result<(), StoreError>;

    /// Fetch one alert; cross-tenant ids report `NotFound`.
    async fn get(&self, org: OrgId, id: AlertId) -> Result<Alert, StoreError>;

    /// Find an alert by its vendor external key for replay deduplication.
    async fn find_by_source_id(
        &self,
        org: OrgId,
        source: &str,
        source_id: &str,
    ) -> Result<Option<Alert>, StoreError>;

    /// Overwrite an existing alert.
    async fn update(&self, alert: Alert) -> Result<(), StoreError>;

    /// Remove an alert (admin operation).
    async fn delete(&self, org: OrgId, id: AlertId) -> Result<(), StoreError>;

    /// List alerts matching the filter, newest first.
    async fn list(&self, org: OrgId, filter: &AlertFilter) -> Result<Page<Alert>, StoreError>;

    /// All open alerts referencing the given escalation policy, across the
    /// organization. Used by policy deletion (set-null + stop).
    async fn open_with_policy(
        &self,
        org: OrgId,
        policy_id: pulsar_core::PolicyId,
    ) -> Result<Vec<Alert>, StoreError>;
}
