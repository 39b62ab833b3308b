use async_trait::async_trait;
use pulsar_core::{
    AlertId, ChannelId, ChannelKind, NotificationChannel, NotificationRecord, OrgId, RuleId,
    UserDndSettings, UserId,
};

use crate::error::StoreError;
use crate::filter::{NotificationFilter, Page};

/// Port over organization notification channels.
#[async_trait]
pub trait ChannelRepo: Send + Sync {
    async fn create(&self, channel: NotificationChannel) -> Result<(), StoreError>;
    async fn get(&self, org: OrgId, id: ChannelId) -> Result<NotificationChannel, StoreError>;
    async fn update(&self, channel: NotificationChannel) -> Result<(), StoreError>;
    async fn delete(&self, org: OrgId, id: ChannelId) -> Result<(), StoreError>;
    async fn list(&self, org: OrgId) -> Result<Vec<NotificationChannel>, StoreError>;

    /// The set of channel kinds enabled for the organization.
    async fn enabled_kinds(
        &self,
        org: OrgId,
    ) -> Result<std::collections::BTreeSet<ChannelKind>, StoreError>;
}

/// Port over per-user do-not-disturb settings.
#[async_trait]
pub trait DndRepo: Send + Sync {
    async fn get(&self, org: OrgId, user_id: UserId)
    -> Result<Option<UserDndSettings>, StoreError>;
    async fn upsert(&self, settings: UserDndSettings) -> Result<(), StoreError>;
    async fn delete(&self, org: OrgId, user_id: UserId) -> Result<(), StoreError>;
}

/// Port over the notification log.
#[async_trait]
pub trait NotificationRepo: Send + Sync {
    async fn record(&self, record: NotificationRecord) -> Result<(), StoreError>;

    /// Whether a record already exists for the fan-out idempotency key
    /// `(alert, escalation rule, cycle, recipient, channel)`.
    async fn exists(
        &self,
        alert_id: AlertId,
        rule_id: Option<RuleId>,
        cycle: u32,
        user_id: UserId,
        channel: ChannelKind,
    ) -> Result<bool, StoreError>;

    async fn list(
        &self,
        org: OrgId,
        filter: &NotificationFilter,
    ) -> Result<Page<NotificationRecord>, StoreError>;

    /// Notification records for one alert, oldest first. Test and audit
    /// surface for the cancellation-correctness property.
    async fn for_alert(&self, alert_id: AlertId) -> Result<Vec<NotificationRecord>, StoreError>;
}
