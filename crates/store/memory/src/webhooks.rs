use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::mapref::entry::Entry;

use pulsar_core::{
    DeliveryId, EndpointId, EventType, IncomingWebhookToken, OrgId, TokenId, WebhookDelivery,
    WebhookEndpoint,
};
use pulsar_store::{DeliveryFilter, DeliveryRepo, EndpointRepo, Page, StoreError, TokenRepo};

use crate::MemoryStore;

#[async_trait]
impl EndpointRepo for MemoryStore {
    async fn create(&self, endpoint: WebhookEndpoint) -> Result<(), StoreError> {
        endpoint
            .validate()
            .map_err(|e| StoreError::invalid(e.to_string()))?;
        match self.endpoints.entry(endpoint.id) {
            Entry::Occupied(_) => Err(StoreError::conflict(format!(
                "endpoint {} already exists",
                endpoint.id
            ))),
            Entry::Vacant(vacant) => {
                vacant.insert(endpoint);
                Ok(())
            }
        }
    }

    async fn get(&self, org: OrgId, id: EndpointId) -> Result<WebhookEndpoint, StoreError> {
        self.endpoints
            .get(&id)
            .filter(|e| e.organization_id == org)
            .map(|e| e.clone())
            .ok_or_else(|| StoreError::not_found(format!("endpoint {id}")))
    }

    async fn get_any(&self, id: EndpointId) -> Result<WebhookEndpoint, StoreError> {
        self.endpoints
            .get(&id)
            .map(|e| e.clone())
            .ok_or_else(|| StoreError::not_found(format!("endpoint {id}")))
    }

    async fn update(&self, endpoint: WebhookEndpoint) -> Result<(), StoreError> {
        match self.endpoints.entry(endpoint.id) {
            Entry::Occupied(mut occupied) => {
                if occupied.get().organization_id != endpoint.organization_id {
                    return Err(StoreError::not_found(format!("endpoint {}", endpoint.id)));
                }
                occupied.insert(endpoint);
                Ok(())
            }
            Entry::Vacant(_) => Err(StoreError::not_found(format!("endpoint {}", endpoint.id))),
        }
    }

    async fn delete(&self, org: OrgId, id: EndpointId) -> Result<(), StoreError> {
        let removed = self
            .endpoints
            .remove_if(&id, |_, e| e.organization_id == org);
        if removed.is_none() {
            return Err(StoreError::not_found(format!("endpoint {id}")));
        }
        Ok(())
    }

    async fn list(&self, org: OrgId) -> Result<Vec<WebhookEndpoint>, StoreError> {
        let mut endpoints: Vec<WebhookEndpoint> = self
            .endpoints
            .iter()
            .filter(|e| e.organization_id == org)
            .map(|e| e.clone())
            .collect();
        endpoints.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(endpoints)
    }

    async fn enabled_for_event(
        &self,
        org: OrgId,
        event_type: EventType,
    ) -> Result<Vec<WebhookEndpoint>, StoreError> {
        Ok(self
            .endpoints
            .iter()
            .filter(|e| e.organization_id == org && e.accepts(event_type))
            .map(|e| e.clone())
            .collect())
    }
}

#[async_trait]
impl DeliveryRepo for MemoryStore {
    async fn create(&self, delivery: WebhookDelivery) -> Result<(), StoreError> {
        match self.deliveries.entry(delivery.id) {
            Entry::Occupied(_) => Err(StoreError::conflict(format!(
                "delivery {} already exists",
                delivery.id
            ))),
            Entry::Vacant(vacant) => {
                vacant.insert(delivery);
                Ok(())
            }
        }
    }

    async fn get(&self, org: OrgId, id: DeliveryId) -> Result<WebhookDelivery, StoreError> {
        self.deliveries
            .get(&id)
            .filter(|d| d.organization_id == org)
            .map(|d| d.clone())
            .ok_or_else(|| StoreError::not_found(format!("delivery {id}")))
    }

    async fn update(&self, delivery: WebhookDelivery) -> Result<(), StoreError> {
        match self.deliveries.entry(delivery.id) {
            Entry::Occupied(mut occupied) => {
                occupied.insert(delivery);
                Ok(())
            }
            Entry::Vacant(_) => Err(StoreError::not_found(format!("delivery {}", delivery.id))),
        }
    }

    async fn due(
        &self,
        now: DateTime<Utc>,
        limit: usize,
    ) -> Result<Vec<WebhookDelivery>, StoreError> {
        let mut due: Vec<WebhookDelivery> = self
            .deliveries
            .iter()
            .filter(|d| d.is_due(now))
            .map(|d| d.clone())
            .collect();
        due.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)));
        due.truncate(limit);
        Ok(due)
    }

    async fn list(
        &self,
        org: OrgId,
        endpoint_id: EndpointId,
        filter: &DeliveryFilter,
    ) -> Result<Page<WebhookDelivery>, StoreError> {
        let mut deliveries: Vec<WebhookDelivery> = self
            .deliveries
            .iter()
            .filter(|d| {
                d.organization_id == org
                    && d.endpoint_id == endpoint_id
                    && filter.state.is_none_or(|s| d.state == s)
            })
            .map(|d| d.clone())
            .collect();
        deliveries.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
        let total = deliveries.len();
        let items = filter.page.unwrap_or_default().slice(&deliveries);
        Ok(Page { items, total })
    }
}

#[async_trait]
impl TokenRepo for MemoryStore {
    async fn create(&self, token: IncomingWebhookToken) -> Result<(), StoreError> {
        if self.tokens.iter().any(|t| t.token == token.token) {
            return Err(StoreError::conflict("token secret already in use"));
        }
        match self.tokens.entry(token.id) {
            Entry::Occupied(_) => Err(StoreError::conflict(format!(
                "token {} already exists",
                token.id
            ))),
            Entry::Vacant(vacant) => {
                vacant.insert(token);
                Ok(())
            }
        }
    }

    async fn get(&self, org: OrgId, id: TokenId) -> Result<IncomingWebhookToken, StoreError> {
        self.tokens
            .get(&id)
            .filter(|t| t.organization_id == org)
            .map(|t| t.clone())
            .ok_or_else(|| StoreError::not_found(format!("token {id}")))
    }

    async fn find_by_token(
        &self,
        token: &str,
    ) -> Result<Option<IncomingWebhookToken>, StoreError> {
        Ok(self
            .tokens
            .iter()
            .find(|t| t.token == token)
            .map(|t| t.clone()))
    }

    async fn update(&self, token: IncomingWebhookToken) -> Result<(), StoreError> {
        match self.tokens.entry(token.id) {
            Entry::Occupied(mut occupied) => {
                if occupied.get().organization_id != token.organization_id {
                    return Err(StoreError::not_found(format!("token {}", token.id)));
                }
                occupied.insert(token);
                Ok(())
            }
            Entry::Vacant(_) => Err(StoreError::not_found(format!("token {}", token.id))),
        }
    }

    async fn delete(&self, org: OrgId, id: TokenId) -> Result<(), StoreError> {
        let removed = self.tokens.remove_if(&id, |_, t| t.organization_id == org);
        if removed.is_none() {
            return Err(StoreError::not_found(format!("token {id}")));
        }
        Ok(())
    }

    async fn list(&self, org: OrgId) -> Result<Vec<IncomingWebhookToken>, StoreError> {
        let mut tokens: Vec<IncomingWebhookToken> = self
            .tokens
            .iter()
            .filter(|t| t.organization_id == org)
            .map(|t| t.clone())
            .collect();
        tokens.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)));
        Ok(tokens)
    }
}
