use async_trait::async_trait;
use pulsar_core::{OrgId, RoutingRule, RoutingRuleId};

use crate::error::StoreError;

/// Port over ingestion routing rules.
#[async_trait]
pub trait RoutingRuleRepo: Send + Sync {
    async fn create(&self, rule: RoutingRule) -> Result<(), StoreError>;
    async fn get(&self, org: OrgId, id: RoutingRuleId) -> Result<RoutingRule, StoreError>;
    async fn update(&self, rule: RoutingRule) -> Result<(), StoreError>;
    async fn delete(&self, org: OrgId, id: RoutingRuleId) -> Result<(), StoreError>;
    async fn list(&self, org: OrgId) -> Result<Vec<RoutingRule>, StoreError>;

    /// Enabled rules ordered by `priority` ascending, the evaluation order.
    async fn list_enabled(&self, org: OrgId) -> Result<Vec<RoutingRule>, StoreError>;
}
