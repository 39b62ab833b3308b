use axum::Json;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use serde::Deserialize;

use pulsar_core::{Condition, RouteAction, RoutingRule, RoutingRuleId};

use pulsar_store::RoutingRuleRepo as _;

use super::AppState;
use crate::auth::CallerIdentity;
use crate::error::ApiError;

/// Body for routing rule create/update.
#[derive(Debug, Deserialize)]
pub struct RuleBody {
    pub name: String,
    pub priority: i64,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    pub condition: Condition,
    pub actions: Vec<RouteAction>,
}

fn default_enabled() -> bool {
    true
}

/// `GET /api/v1/routing-rules`
pub async fn list(
    State(state): State<AppState>,
    axum::Extension(identity): axum::Extension<CallerIdentity>,
) -> Result<impl IntoResponse, ApiError> {
    let rules = state
        .repos
        .routing_rules
        .list(identity.organization_id)
        .await?;
    Ok(Json(rules))
}

/// `POST /api/v1/routing-rules`
pub async fn create(
    State(state): State<AppState>,
    axum::Extension(identity): axum::Extension<CallerIdentity>,
    Json(body): Json<RuleBody>,
) -> Result<impl IntoResponse, ApiError> {
    let mut rule = RoutingRule::new(
        identity.organization_id,
        body.name,
        body.priority,
        body.condition,
        body.actions,
        state.now(),
    );
    rule.enabled = body.enabled;
    state.repos.routing_rules.create(rule.clone()).await?;
    Ok((StatusCode::CREATED, Json(rule)))
}

/// `GET /api/v1/routing-rules/{id}`
pub async fn get_one(
    State(state): State<AppState>,
    axum::Extension(identity): axum::Extension<CallerIdentity>,
    Path(id): Path<RoutingRuleId>,
) -> Result<impl IntoResponse, ApiError> {
    let rule = state
        .repos
        .routing_rules
        .get(identity.organization_id, id)
        .await?;
    Ok(Json(rule))
}

/// `PUT /api/v1/routing-rules/{id}`
pub async fn update(
    State(state): State<AppState>,
    axum::Extension(identity): axum::Extension<CallerIdentity>,
    Path(id): Path<RoutingRuleId>,
    Json(body): Json<RuleBody>,
) -> Result<impl IntoResponse, ApiError> {
    let mut rule = state
        .repos
        .routing_rules
        .get(identity.organization_id, id)
        .await?;
    rule.name = body.name;
    rule.priority = body.priority;
    rule.enabled = body.enabled;
    rule.condition = body.condition;
    rule.actions = body.actions;
    rule.updated_at = state.now();
    state.repos.routing_rules.update(rule.clone()).await?;
    Ok(Json(rule))
}

/// `DELETE /api/v1/routing-rules/{id}`
pub async fn delete_one(
    State(state): State<AppState>,
    axum::Extension(identity): axum::Extension<CallerIdentity>,
    Path(id): Path<RoutingRuleId>,
) -> Result<impl IntoResponse, ApiError> {
    state
        .repos
        .routing_rules
        .delete(identity.organization_id, id)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}
