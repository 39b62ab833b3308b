use std::collections::{BTreeSet, HashMap};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::PulsarError;
use crate::event::EventType;
use crate::priority::Priority;
use crate::types::{DeliveryId, EndpointId, OrgId, TokenId};

/// An outgoing webhook endpoint registration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct WebhookEndpoint {
    pub id: EndpointId,
    pub organization_id: OrgId,
    pub name: String,
    pub url: String,
    /// Per-endpoint signing secret, generated at creation and never
    /// re-emitted through the API.
    pub secret: String,
    /// Event types this endpoint receives; empty means all.
    #[serde(default)]
    pub event_mask: BTreeSet<EventType>,
    #[serde(default = "default_timeout_s")]
    pub timeout_s: u64,
    /// Retries after the initial attempt before the delivery is failed.
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    /// Fixed delay between attempts.
    #[serde(default = "default_retry_delay_s")]
    pub retry_delay_s: u64,
    /// Extra request headers; cannot override the protocol headers.
    #[serde(default)]
    pub custom_headers: HashMap<String, String>,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    pub created_at: DateTime<Utc>,
}

fn default_timeout_s() -> u64 {
    30
}

fn default_max_retries() -> u32 {
    3
}

fn default_retry_delay_s() -> u64 {
    60
}

fn default_enabled() -> bool {
    true
}

impl WebhookEndpoint {
    /// Create an enabled endpoint with a freshly generated secret.
    #[must_use]
    pub fn new(
        organization_id: OrgId,
        name: impl Into<String>,
        url: impl Into<String>,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id: EndpointId::generate(),
            organization_id,
            name: name.into(),
            url: url.into(),
            secret: generate_secret(),
            event_mask: BTreeSet::new(),
            timeout_s: default_timeout_s(),
            max_retries: default_max_retries(),
            retry_delay_s: default_retry_delay_s(),
            custom_headers: HashMap::new(),
            enabled: true,
            created_at: now,
        }
    }

    /// Whether this endpoint subscribes to the given event type.
    #[must_use]
    pub fn accepts(&self, event_type: EventType) -> bool {
        self.enabled && (self.event_mask.is_empty() || self.event_mask.contains(&event_type))
    }

    /// Validate URL shape and retry settings.
    pub fn validate(&self) -> Result<(), PulsarError> {
        if !self.url.starts_with("http://") && !self.url.starts_with("https://") {
            return Err(PulsarError::validation("endpoint url must be http(s)"));
        }
        if self.timeout_s == 0 {
            return Err(PulsarError::validation("endpoint timeout must be positive"));
        }
        Ok(())
    }
}

/// Generate an opaque endpoint secret.
#[must_use]
pub fn generate_secret() -> String {
    format!("{}{}", Uuid::new_v4().simple(), Uuid::new_v4().simple())
}

/// Delivery lifecycle state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[serde(rename_all = "snake_case")]
pub enum DeliveryState {
    Pending,
    Success,
    Failed,
}

/// One queued or completed outgoing webhook delivery. Created by the event
/// fan-out, mutated only by the delivery worker.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct WebhookDelivery {
    pub id: DeliveryId,
    pub organization_id: OrgId,
    pub endpoint_id: EndpointId,
    pub event_type: EventType,
    #[cfg_attr(feature = "openapi", schema(value_type = Object))]
    pub payload: serde_json::Value,
    #[serde(default)]
    pub attempt_count: u32,
    pub state: DeliveryState,
    /// When the next attempt is due; `None` means due immediately while
    /// pending, irrelevant once terminal.
    #[serde(default)]
    pub next_retry_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub last_response_status: Option<u16>,
    /// Truncated response body or transport error of the last attempt.
    #[serde(default)]
    pub last_error: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl WebhookDelivery {
    /// Queue a new delivery, due immediately.
    #[must_use]
    pub fn queue(
        organization_id: OrgId,
        endpoint_id: EndpointId,
        event_type: EventType,
        payload: serde_json::Value,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id: DeliveryId::generate(),
            organization_id,
            endpoint_id,
            event_type,
            payload,
            attempt_count: 0,
            state: DeliveryState::Pending,
            next_retry_at: None,
            last_response_status: None,
            last_error: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Whether the worker should attempt this delivery at `now`.
    #[must_use]
    pub fn is_due(&self, now: DateTime<Utc>) -> bool {
        self.state == DeliveryState::Pending
            && self.next_retry_at.is_none_or(|at| at <= now)
    }
}

/// Supported inbound integration payload dialects.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[serde(rename_all = "snake_case")]
pub enum IntegrationKind {
    Prometheus,
    Grafana,
    Datadog,
    Generic,
}

/// A token gating an unauthenticated inbound webhook path.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct IncomingWebhookToken {
    pub id: TokenId,
    pub organization_id: OrgId,
    /// The opaque secret carried in the URL path.
    pub token: String,
    pub integration_kind: IntegrationKind,
    /// Fills the alert priority only when the payload carries none.
    #[serde(default)]
    pub default_priority: Option<Priority>,
    /// Merged (set union) into every ingested alert's tags.
    #[serde(default)]
    pub default_tags: BTreeSet<String>,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    /// Total requests observed on this token.
    #[serde(default)]
    pub request_count: u64,
    pub created_at: DateTime<Utc>,
}

impl IncomingWebhookToken {
    /// Create an enabled token with a fresh secret.
    #[must_use]
    pub fn new(organization_id: OrgId, integration_kind: IntegrationKind, now: DateTime<Utc>) -> Self {
        Self {
            id: TokenId::generate(),
            organization_id,
            token: generate_secret(),
            integration_kind,
            default_priority: None,
            default_tags: BTreeSet::new(),
            enabled: true,
            request_count: 0,
            created_at: now,
        }
    }
}
