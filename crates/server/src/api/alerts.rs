use axum::Json;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use chrono::{DateTime, Utc};
use serde::Deserialize;

use pulsar_core::{Actor, AlertId, AlertStatus, NewAlert, Priority, PulsarError, TeamId, UserId};
use pulsar_engine::CreateOutcome;
use pulsar_store::{AlertFilter, AlertRepo as _, PageRequest};

use super::AppState;
use crate::auth::CallerIdentity;
use crate::error::ApiError;

fn actor_of(identity: &CallerIdentity) -> Actor {
    identity.user_id.map_or(Actor::System, Actor::User)
}

fn acting_user(identity: &CallerIdentity) -> Result<UserId, ApiError> {
    identity.user_id.ok_or_else(|| {
        ApiError::from(PulsarError::Forbidden(
            "this operation requires a user credential".into(),
        ))
    })
}

/// Query parameters for `GET /alerts`.
#[derive(Debug, Default, Deserialize)]
pub struct ListQuery {
    pub status: Option<AlertStatus>,
    pub priority: Option<Priority>,
    pub source: Option<String>,
    pub tag: Option<String>,
    pub assigned_user_id: Option<UserId>,
    pub assigned_team_id: Option<TeamId>,
    pub limit: Option<usize>,
    pub offset: Option<usize>,
}

impl ListQuery {
    fn into_filter(self) -> AlertFilter {
        AlertFilter {
            status: self.status,
            priority: self.priority,
            source: self.source,
            assigned_user_id: self.assigned_user_id,
            assigned_team_id: self.assigned_team_id,
            tag: self.tag,
            created_after: None,
            created_before: None,
            page: Some(PageRequest {
                limit: self.limit.unwrap_or(50).min(500),
                offset: self.offset.unwrap_or(0),
            }),
        }
    }
}

/// `GET /api/v1/alerts`
pub async fn list(
    State(state): State<AppState>,
    axum::Extension(identity): axum::Extension<CallerIdentity>,
    Query(query): Query<ListQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let page = state
        .service
        .list(identity.organization_id, &query.into_filter())
        .await?;
    Ok(Json(serde_json::json!({
        "alerts": page.items,
        "total": page.total,
    })))
}

/// `POST /api/v1/alerts`
pub async fn create(
    State(state): State<AppState>,
    axum::Extension(identity): axum::Extension<CallerIdentity>,
    Json(request): Json<NewAlert>,
) -> Result<impl IntoResponse, ApiError> {
    let outcome = state
        .service
        .create(identity.organization_id, request, actor_of(&identity))
        .await?;
    match outcome {
        CreateOutcome::Created(alert) => Ok((StatusCode::CREATED, Json(serde_json::json!(alert)))),
        CreateOutcome::Duplicate(alert) => Ok((StatusCode::OK, Json(serde_json::json!(alert)))),
        CreateOutcome::Suppressed => Ok((
            StatusCode::ACCEPTED,
            Json(serde_json::json!({"suppressed": true})),
        )),
    }
}

/// `GET /api/v1/alerts/{id}`
pub async fn get_one(
    State(state): State<AppState>,
    axum::Extension(identity): axum::Extension<CallerIdentity>,
    Path(id): Path<AlertId>,
) -> Result<impl IntoResponse, ApiError> {
    let alert = state.service.get(identity.organization_id, id).await?;
    Ok(Json(alert))
}

/// Body for `PATCH /alerts/{id}`: partial content update.
#[derive(Debug, Deserialize)]
pub struct PatchAlert {
    pub message: Option<String>,
    pub description: Option<String>,
    pub priority: Option<Priority>,
    pub tags: Option<std::collections::BTreeSet<String>>,
}

/// `PATCH /api/v1/alerts/{id}`
pub async fn patch(
    State(state): State<AppState>,
    axum::Extension(identity): axum::Extension<CallerIdentity>,
    Path(id): Path<AlertId>,
    Json(body): Json<PatchAlert>,
) -> Result<impl IntoResponse, ApiError> {
    let org = identity.organization_id;
    let _guard = state.repos.alert_locks.lock(id).await;
    let mut alert = state.repos.alerts.get(org, id).await?;
    if let Some(message) = body.message {
        alert.message = message;
    }
    if let Some(description) = body.description {
        alert.description = description;
    }
    if let Some(priority) = body.priority {
        alert.priority = priority;
    }
    if let Some(tags) = body.tags {
        alert.tags = tags;
    }
    alert.updated_at = state.now();
    alert.validate()?;
    state.repos.alerts.update(alert.clone()).await?;
    Ok(Json(alert))
}

/// `DELETE /api/v1/alerts/{id}` (admin operation).
pub async fn delete_one(
    State(state): State<AppState>,
    axum::Extension(identity): axum::Extension<CallerIdentity>,
    Path(id): Path<AlertId>,
) -> Result<impl IntoResponse, ApiError> {
    state
        .service
        .delete(identity.organization_id, id, actor_of(&identity))
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

/// `POST /api/v1/alerts/{id}/acknowledge`
pub async fn acknowledge(
    State(state): State<AppState>,
    axum::Extension(identity): axum::Extension<CallerIdentity>,
    Path(id): Path<AlertId>,
) -> Result<impl IntoResponse, ApiError> {
    let user = acting_user(&identity)?;
    let alert = state
        .service
        .acknowledge(identity.organization_id, id, user)
        .await?;
    Ok(Json(alert))
}

/// Body for `POST /alerts/{id}/close`.
#[derive(Debug, Default, Deserialize)]
pub struct CloseBody {
    pub reason: Option<String>,
}

/// `POST /api/v1/alerts/{id}/close`
pub async fn close(
    State(state): State<AppState>,
    axum::Extension(identity): axum::Extension<CallerIdentity>,
    Path(id): Path<AlertId>,
    Json(body): Json<CloseBody>,
) -> Result<impl IntoResponse, ApiError> {
    let user = acting_user(&identity)?;
    let reason = body.reason;
    let alert = state
        .service
        .close(identity.organization_id, id, user, reason)
        .await?;
    Ok(Json(alert))
}

/// Body for `POST /alerts/{id}/snooze`.
#[derive(Debug, Deserialize)]
pub struct SnoozeBody {
    pub until: DateTime<Utc>,
}

/// `POST /api/v1/alerts/{id}/snooze`
pub async fn snooze(
    State(state): State<AppState>,
    axum::Extension(identity): axum::Extension<CallerIdentity>,
    Path(id): Path<AlertId>,
    Json(body): Json<SnoozeBody>,
) -> Result<impl IntoResponse, ApiError> {
    let user = acting_user(&identity)?;
    let alert = state
        .service
        .snooze(identity.organization_id, id, body.until, user)
        .await?;
    Ok(Json(alert))
}

/// Body for `POST /alerts/{id}/assign`: exactly one of the two.
#[derive(Debug, Default, Deserialize)]
pub struct AssignBody {
    pub user_id: Option<UserId>,
    pub team_id: Option<TeamId>,
}

/// `POST /api/v1/alerts/{id}/assign`
pub async fn assign(
    State(state): State<AppState>,
    axum::Extension(identity): axum::Extension<CallerIdentity>,
    Path(id): Path<AlertId>,
    Json(body): Json<AssignBody>,
) -> Result<impl IntoResponse, ApiError> {
    let alert = state
        .service
        .assign(
            identity.organization_id,
            id,
            body.user_id,
            body.team_id,
            actor_of(&identity),
        )
        .await?;
    Ok(Json(alert))
}
