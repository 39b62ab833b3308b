use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::warn;

use pulsar_bus::EventBus;
use pulsar_core::{EventEnvelope, EventType, OrgId, WebhookDelivery};
use pulsar_store::{DeliveryRepo, EndpointRepo};

/// Publishes platform events to the in-process bus and queues one webhook
/// delivery per subscribed endpoint.
///
/// Both paths are fire-and-forget: bus delivery is best-effort by design,
/// and a failed delivery enqueue is logged without aborting the caller's
/// transition.
pub struct EventEmitter {
    bus: Arc<EventBus>,
    endpoints: Arc<dyn EndpointRepo>,
    deliveries: Arc<dyn DeliveryRepo>,
}

impl EventEmitter {
    /// Create an emitter over the bus and the webhook queue.
    #[must_use]
    pub fn new(
        bus: Arc<EventBus>,
        endpoints: Arc<dyn EndpointRepo>,
        deliveries: Arc<dyn DeliveryRepo>,
    ) -> Self {
        Self {
            bus,
            endpoints,
            deliveries,
        }
    }

    /// Emit one event: broadcast the envelope and enqueue webhook
    /// deliveries for every enabled endpoint subscribed to the type.
    pub async fn emit(
        &self,
        event_type: EventType,
        org: OrgId,
        data: serde_json::Value,
        now: DateTime<Utc>,
    ) {
        let envelope = EventEnvelope::new(event_type, org, data, now);
        self.bus.publish(&envelope);

        let endpoints = match self.endpoints.enabled_for_event(org, event_type).await {
            Ok(endpoints) => endpoints,
            Err(err) => {
                warn!(org_id = %org, event_type = %event_type, error = %err, "failed to load webhook endpoints");
                return;
            }
        };

        for endpoint in endpoints {
            let payload = match serde_json::to_value(&envelope) {
                Ok(payload) => payload,
                Err(err) => {
                    warn!(event_id = %envelope.event_id, error = %err, "failed to serialise event envelope");
                    return;
                }
            };
            let delivery = WebhookDelivery::queue(org, endpoint.id, event_type, payload, now);
            if let Err(err) = self.deliveries.create(delivery).await {
                warn!(
                    endpoint_id = %endpoint.id,
                    event_type = %event_type,
                    error = %err,
                    "failed to enqueue webhook delivery"
                );
            }
        }
    }
}
