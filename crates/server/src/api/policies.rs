use axum::Json;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use serde::Deserialize;

use pulsar_core::{
    EscalationPolicy, EscalationRule, EscalationTarget, PolicyId, RuleId, TargetRef,
};

use pulsar_store::{PolicyRepo as _, ScheduleRepo as _, TeamRepo as _, UserRepo as _};

use super::AppState;
use crate::auth::CallerIdentity;
use crate::error::ApiError;

/// Body for policy create/update.
#[derive(Debug, Deserialize)]
pub struct PolicyBody {
    pub name: String,
    #[serde(default)]
    pub repeat_enabled: bool,
    #[serde(default)]
    pub repeat_count: Option<u32>,
}

/// `GET /api/v1/escalation-policies`
pub async fn list(
    State(state): State<AppState>,
    axum::Extension(identity): axum::Extension<CallerIdentity>,
) -> Result<impl IntoResponse, ApiError> {
    let policies = state.repos.policies.list(identity.organization_id).await?;
    Ok(Json(policies))
}

/// `POST /api/v1/escalation-policies`
pub async fn create(
    State(state): State<AppState>,
    axum::Extension(identity): axum::Extension<CallerIdentity>,
    Json(body): Json<PolicyBody>,
) -> Result<impl IntoResponse, ApiError> {
    let mut policy =
        EscalationPolicy::new(identity.organization_id, body.name, state.now());
    policy.repeat_enabled = body.repeat_enabled;
    policy.repeat_count = body.repeat_count;
    state.repos.policies.create(policy.clone()).await?;
    Ok((StatusCode::CREATED, Json(policy)))
}

/// `GET /api/v1/escalation-policies/{id}`
pub async fn get_one(
    State(state): State<AppState>,
    axum::Extension(identity): axum::Extension<CallerIdentity>,
    Path(id): Path<PolicyId>,
) -> Result<impl IntoResponse, ApiError> {
    let policy = state
        .repos
        .policies
        .get(identity.organization_id, id)
        .await?;
    let rules = state.repos.policies.rules(id).await?;
    Ok(Json(serde_json::json!({
        "policy": policy,
        "rules": rules,
    })))
}

/// `PUT /api/v1/escalation-policies/{id}`
pub async fn update(
    State(state): State<AppState>,
    axum::Extension(identity): axum::Extension<CallerIdentity>,
    Path(id): Path<PolicyId>,
    Json(body): Json<PolicyBody>,
) -> Result<impl IntoResponse, ApiError> {
    let mut policy = state
        .repos
        .policies
        .get(identity.organization_id, id)
        .await?;
    policy.name = body.name;
    policy.repeat_enabled = body.repeat_enabled;
    policy.repeat_count = body.repeat_count;
    policy.updated_at = state.now();
    state.repos.policies.update(policy.clone()).await?;
    Ok(Json(policy))
}

/// `DELETE /api/v1/escalation-policies/{id}`
///
/// Set-null + stop: open alerts referencing the policy are detached and
/// their pending escalations cancelled.
pub async fn delete_one(
    State(state): State<AppState>,
    axum::Extension(identity): axum::Extension<CallerIdentity>,
    Path(id): Path<PolicyId>,
) -> Result<impl IntoResponse, ApiError> {
    let org = identity.organization_id;
    state.repos.policies.delete(org, id).await?;
    let detached = state.service.detach_policy(org, id).await?;
    Ok(Json(serde_json::json!({ "detached_alerts": detached })))
}

/// Body for rule upsert.
#[derive(Debug, Deserialize)]
pub struct RuleBody {
    pub position: u32,
    pub delay_minutes: u32,
    pub targets: Vec<EscalationTarget>,
}

/// `GET /api/v1/escalation-policies/{id}/rules`
pub async fn list_rules(
    State(state): State<AppState>,
    axum::Extension(identity): axum::Extension<CallerIdentity>,
    Path(id): Path<PolicyId>,
) -> Result<impl IntoResponse, ApiError> {
    state
        .repos
        .policies
        .get(identity.organization_id, id)
        .await?;
    let rules = state.repos.policies.rules(id).await?;
    Ok(Json(rules))
}

/// `POST /api/v1/escalation-policies/{id}/rules`
pub async fn upsert_rule(
    State(state): State<AppState>,
    axum::Extension(identity): axum::Extension<CallerIdentity>,
    Path(id): Path<PolicyId>,
    Json(body): Json<RuleBody>,
) -> Result<impl IntoResponse, ApiError> {
    let org = identity.organization_id;
    state.repos.policies.get(org, id).await?;
    // Referential checks per target kind.
    for target in &body.targets {
        match target.target {
            TargetRef::User(user_id) => {
                state.repos.users.get(org, user_id).await?;
            }
            TargetRef::Team(team_id) => {
                state.repos.teams.get(org, team_id).await?;
            }
            TargetRef::Schedule(schedule_id) => {
                state.repos.schedules.get(org, schedule_id).await?;
            }
        }
    }
    let rule = EscalationRule::new(id, body.position, body.delay_minutes, body.targets);
    state.repos.policies.upsert_rule(rule.clone()).await?;
    Ok((StatusCode::CREATED, Json(rule)))
}

/// `DELETE /api/v1/escalation-policies/{id}/rules/{rule_id}`
pub async fn remove_rule(
    State(state): State<AppState>,
    axum::Extension(identity): axum::Extension<CallerIdentity>,
    Path((id, rule_id)): Path<(PolicyId, RuleId)>,
) -> Result<impl IntoResponse, ApiError> {
    state
        .repos
        .policies
        .get(identity.organization_id, id)
        .await?;
    state.repos.policies.remove_rule(rule_id).await?;
    Ok(StatusCode::NO_CONTENT)
}
