use std::collections::{BTreeSet, HashMap};

use axum::Json;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use serde::{Deserialize, Serialize};

use pulsar_core::{
    DeliveryId, DeliveryState, EndpointId, EventType, IncomingWebhookToken, IntegrationKind,
    Priority, PulsarError, TokenId, WebhookEndpoint,
};
use pulsar_store::{
    DeliveryFilter, DeliveryRepo as _, EndpointRepo as _, PageRequest, TokenRepo as _,
};

use super::AppState;
use crate::auth::CallerIdentity;
use crate::error::ApiError;

/// Endpoint representation with the signing secret masked. The secret is
/// emitted exactly once, in the create response.
#[derive(Debug, Serialize)]
pub struct EndpointView {
    #[serde(flatten)]
    endpoint: WebhookEndpoint,
}

impl EndpointView {
    fn masked(mut endpoint: WebhookEndpoint) -> Self {
        endpoint.secret = "********".to_owned();
        Self { endpoint }
    }
}

/// Body for endpoint create/update.
#[derive(Debug, Deserialize)]
pub struct EndpointBody {
    pub name: String,
    pub url: String,
    #[serde(default)]
    pub event_mask: BTreeSet<EventType>,
    #[serde(default)]
    pub timeout_s: Option<u64>,
    #[serde(default)]
    pub max_retries: Option<u32>,
    #[serde(default)]
    pub retry_delay_s: Option<u64>,
    #[serde(default)]
    pub custom_headers: HashMap<String, String>,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
}

fn default_enabled() -> bool {
    true
}

/// `GET /api/v1/webhooks`
pub async fn list(
    State(state): State<AppState>,
    axum::Extension(identity): axum::Extension<CallerIdentity>,
) -> Result<impl IntoResponse, ApiError> {
    let endpoints = state.repos.endpoints.list(identity.organization_id).await?;
    let masked: Vec<EndpointView> = endpoints.into_iter().map(EndpointView::masked).collect();
    Ok(Json(masked))
}

/// `POST /api/v1/webhooks`
///
/// The only response that ever carries the signing secret.
pub async fn create(
    State(state): State<AppState>,
    axum::Extension(identity): axum::Extension<CallerIdentity>,
    Json(body): Json<EndpointBody>,
) -> Result<impl IntoResponse, ApiError> {
    let mut endpoint = WebhookEndpoint::new(
        identity.organization_id,
        body.name,
        body.url,
        state.now(),
    );
    endpoint.event_mask = body.event_mask;
    if let Some(timeout) = body.timeout_s {
        endpoint.timeout_s = timeout;
    }
    if let Some(max_retries) = body.max_retries {
        endpoint.max_retries = max_retries;
    }
    if let Some(delay) = body.retry_delay_s {
        endpoint.retry_delay_s = delay;
    }
    endpoint.custom_headers = body.custom_headers;
    endpoint.enabled = body.enabled;
    endpoint.validate()?;
    state.repos.endpoints.create(endpoint.clone()).await?;
    Ok((StatusCode::CREATED, Json(endpoint)))
}

/// `GET /api/v1/webhooks/{id}`
pub async fn get_one(
    State(state): State<AppState>,
    axum::Extension(identity): axum::Extension<CallerIdentity>,
    Path(id): Path<EndpointId>,
) -> Result<impl IntoResponse, ApiError> {
    let endpoint = state
        .repos
        .endpoints
        .get(identity.organization_id, id)
        .await?;
    Ok(Json(EndpointView::masked(endpoint)))
}

/// `PUT /api/v1/webhooks/{id}` -- the secret is never rotated here.
pub async fn update(
    State(state): State<AppState>,
    axum::Extension(identity): axum::Extension<CallerIdentity>,
    Path(id): Path<EndpointId>,
    Json(body): Json<EndpointBody>,
) -> Result<impl IntoResponse, ApiError> {
    let mut endpoint = state
        .repos
        .endpoints
        .get(identity.organization_id, id)
        .await?;
    endpoint.name = body.name;
    endpoint.url = body.url;
    endpoint.event_mask = body.event_mask;
    if let Some(timeout) = body.timeout_s {
        endpoint.timeout_s = timeout;
    }
    if let Some(max_retries) = body.max_retries {
        endpoint.max_retries = max_retries;
    }
    if let Some(delay) = body.retry_delay_s {
        endpoint.retry_delay_s = delay;
    }
    endpoint.custom_headers = body.custom_headers;
    endpoint.enabled = body.enabled;
    endpoint.validate()?;
    state.repos.endpoints.update(endpoint.clone()).await?;
    Ok(Json(EndpointView::masked(endpoint)))
}

/// `DELETE /api/v1/webhooks/{id}`
pub async fn delete_one(
    State(state): State<AppState>,
    axum::Extension(identity): axum::Extension<CallerIdentity>,
    Path(id): Path<EndpointId>,
) -> Result<impl IntoResponse, ApiError> {
    state
        .repos
        .endpoints
        .delete(identity.organization_id, id)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Query for delivery listings.
#[derive(Debug, Default, Deserialize)]
pub struct DeliveryQuery {
    pub state: Option<DeliveryState>,
    pub limit: Option<usize>,
    pub offset: Option<usize>,
}

/// `GET /api/v1/webhooks/{id}/deliveries`
pub async fn list_deliveries(
    State(state): State<AppState>,
    axum::Extension(identity): axum::Extension<CallerIdentity>,
    Path(id): Path<EndpointId>,
    Query(query): Query<DeliveryQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let org = identity.organization_id;
    state.repos.endpoints.get(org, id).await?;
    let filter = DeliveryFilter {
        state: query.state,
        page: Some(PageRequest {
            limit: query.limit.unwrap_or(50).min(500),
            offset: query.offset.unwrap_or(0),
        }),
    };
    let page = state.repos.deliveries.list(org, id, &filter).await?;
    Ok(Json(serde_json::json!({
        "deliveries": page.items,
        "total": page.total,
    })))
}

/// `POST /api/v1/webhooks/{id}/deliveries/{delivery_id}/redeliver`
///
/// Re-queues a failed delivery with a fresh retry budget.
pub async fn redeliver(
    State(state): State<AppState>,
    axum::Extension(identity): axum::Extension<CallerIdentity>,
    Path((id, delivery_id)): Path<(EndpointId, DeliveryId)>,
) -> Result<impl IntoResponse, ApiError> {
    let org = identity.organization_id;
    state.repos.endpoints.get(org, id).await?;
    let mut delivery = state.repos.deliveries.get(org, delivery_id).await?;
    if delivery.state != DeliveryState::Failed {
        return Err(ApiError::from(PulsarError::conflict(
            "only failed deliveries can be redelivered",
        )));
    }
    delivery.state = DeliveryState::Pending;
    delivery.attempt_count = 0;
    delivery.next_retry_at = None;
    delivery.last_error = None;
    delivery.updated_at = state.now();
    state.repos.deliveries.update(delivery.clone()).await?;
    Ok(Json(delivery))
}

/// Body for creating an incoming webhook token.
#[derive(Debug, Deserialize)]
pub struct TokenBody {
    pub integration_kind: IntegrationKind,
    #[serde(default)]
    pub default_priority: Option<Priority>,
    #[serde(default)]
    pub default_tags: BTreeSet<String>,
}

/// `GET /api/v1/webhook-tokens`
pub async fn list_tokens(
    State(state): State<AppState>,
    axum::Extension(identity): axum::Extension<CallerIdentity>,
) -> Result<impl IntoResponse, ApiError> {
    let tokens = state.repos.tokens.list(identity.organization_id).await?;
    Ok(Json(tokens))
}

/// `POST /api/v1/webhook-tokens`
pub async fn create_token(
    State(state): State<AppState>,
    axum::Extension(identity): axum::Extension<CallerIdentity>,
    Json(body): Json<TokenBody>,
) -> Result<impl IntoResponse, ApiError> {
    let mut token = IncomingWebhookToken::new(
        identity.organization_id,
        body.integration_kind,
        state.now(),
    );
    token.default_priority = body.default_priority;
    token.default_tags = body.default_tags;
    state.repos.tokens.create(token.clone()).await?;
    Ok((StatusCode::CREATED, Json(token)))
}

/// `DELETE /api/v1/webhook-tokens/{id}`
pub async fn delete_token(
    State(state): State<AppState>,
    axum::Extension(identity): axum::Extension<CallerIdentity>,
    Path(id): Path<TokenId>,
) -> Result<impl IntoResponse, ApiError> {
    state
        .repos
        .tokens
        .delete(identity.organization_id, id)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}
