use async_trait::async_trait;
use chrono::{DateTime, Utc};
use pulsar_core::{
    DeliveryId, EndpointId, EventType, IncomingWebhookToken, OrgId, TokenId, WebhookDelivery,
    WebhookEndpoint,
};

use crate::error::StoreError;
use crate::filter::{DeliveryFilter, Page};

/// Port over outgoing webhook endpoint registrations.
#[async_trait]
pub trait EndpointRepo: Send + Sync {
    async fn create(&self, endpoint: WebhookEndpoint) -> Result<(), StoreError>;
    async fn get(&self, org: OrgId, id: EndpointId) -> Result<WebhookEndpoint, StoreError>;
    /// Worker-side lookup without tenant scoping (the delivery row already
    /// carries the organization).
    async fn get_any(&self, id: EndpointId) -> Result<WebhookEndpoint, StoreError>;
    async fn update(&self, endpoint: WebhookEndpoint) -> Result<(), StoreError>;
    async fn delete(&self, org: OrgId, id: EndpointId) -> Result<(), StoreError>;
    async fn list(&self, org: OrgId) -> Result<Vec<WebhookEndpoint>, StoreError>;

    /// Enabled endpoints of the organization subscribed to `event_type`.
    async fn enabled_for_event(
        &self,
        org: OrgId,
        event_type: EventType,
    ) -> Result<Vec<WebhookEndpoint>, StoreError>;
}

/// Port over the persistent outgoing delivery queue.
#[async_trait]
pub trait DeliveryRepo: Send + Sync {
    async fn create(&self, delivery: WebhookDelivery) -> Result<(), StoreError>;
    async fn get(&self, org: OrgId, id: DeliveryId) -> Result<WebhookDelivery, StoreError>;
    async fn update(&self, delivery: WebhookDelivery) -> Result<(), StoreError>;

    /// Pending deliveries due at `now` (no `next_retry_at`, or one that has
    /// elapsed), oldest first, capped at `limit`.
    async fn due(&self, now: DateTime<Utc>, limit: usize)
    -> Result<Vec<WebhookDelivery>, StoreError>;

    async fn list(
        &self,
        org: OrgId,
        endpoint_id: EndpointId,
        filter: &DeliveryFilter,
    ) -> Result<Page<WebhookDelivery>, StoreError>;
}

/// Port over incoming webhook tokens.
#[async_trait]
pub trait TokenRepo: Send + Sync {
    async fn create(&self, token: IncomingWebhookToken) -> Result<(), StoreError>;
    async fn get(&self, org: OrgId, id: TokenId) -> Result<IncomingWebhookToken, StoreError>;

    /// Resolve the URL-path secret to its token record.
    async fn find_by_token(&self, token: &str)
    -> Result<Option<IncomingWebhookToken>, StoreError>;

    async fn update(&self, token: IncomingWebhookToken) -> Result<(), StoreError>;
    async fn delete(&self, org: OrgId, id: TokenId) -> Result<(), StoreError>;
    async fn list(&self, org: OrgId) -> Result<Vec<IncomingWebhookToken>, StoreError>;
}
