use axum::Json;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use serde::Deserialize;

use pulsar_core::{
    DayOfWeek, OverrideId, Rotation, RotationId, RotationKind, Schedule, ScheduleId,
    ScheduleOverride, TeamId, UserId, validate_timezone,
};

use pulsar_store::{ScheduleRepo as _, TeamRepo as _, UserRepo as _};

use super::AppState;
use crate::auth::CallerIdentity;
use crate::error::ApiError;

/// Body for schedule create/update.
#[derive(Debug, Deserialize)]
pub struct ScheduleBody {
    pub name: String,
    pub timezone: String,
    #[serde(default)]
    pub team_id: Option<TeamId>,
}

/// `GET /api/v1/schedules`
pub async fn list(
    State(state): State<AppState>,
    axum::Extension(identity): axum::Extension<CallerIdentity>,
) -> Result<impl IntoResponse, ApiError> {
    let schedules = state.repos.schedules.list(identity.organization_id).await?;
    Ok(Json(schedules))
}

/// `POST /api/v1/schedules`
pub async fn create(
    State(state): State<AppState>,
    axum::Extension(identity): axum::Extension<CallerIdentity>,
    Json(body): Json<ScheduleBody>,
) -> Result<impl IntoResponse, ApiError> {
    let org = identity.organization_id;
    if let Some(team_id) = body.team_id {
        state.repos.teams.get(org, team_id).await?;
    }
    let mut schedule = Schedule::new(org, body.name, body.timezone, state.now())?;
    schedule.team_id = body.team_id;
    state.repos.schedules.create(schedule.clone()).await?;
    Ok((StatusCode::CREATED, Json(schedule)))
}

/// `GET /api/v1/schedules/{id}`
pub async fn get_one(
    State(state): State<AppState>,
    axum::Extension(identity): axum::Extension<CallerIdentity>,
    Path(id): Path<ScheduleId>,
) -> Result<impl IntoResponse, ApiError> {
    let schedule = state
        .repos
        .schedules
        .get(identity.organization_id, id)
        .await?;
    Ok(Json(schedule))
}

/// `PUT /api/v1/schedules/{id}`
pub async fn update(
    State(state): State<AppState>,
    axum::Extension(identity): axum::Extension<CallerIdentity>,
    Path(id): Path<ScheduleId>,
    Json(body): Json<ScheduleBody>,
) -> Result<impl IntoResponse, ApiError> {
    let org = identity.organization_id;
    validate_timezone(&body.timezone)?;
    if let Some(team_id) = body.team_id {
        state.repos.teams.get(org, team_id).await?;
    }
    let mut schedule = state.repos.schedules.get(org, id).await?;
    schedule.name = body.name;
    schedule.timezone = body.timezone;
    schedule.team_id = body.team_id;
    schedule.updated_at = state.now();
    state.repos.schedules.update(schedule.clone()).await?;
    Ok(Json(schedule))
}

/// `DELETE /api/v1/schedules/{id}`
pub async fn delete_one(
    State(state): State<AppState>,
    axum::Extension(identity): axum::Extension<CallerIdentity>,
    Path(id): Path<ScheduleId>,
) -> Result<impl IntoResponse, ApiError> {
    state
        .repos
        .schedules
        .delete(identity.organization_id, id)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Body for adding a rotation lane.
#[derive(Debug, Deserialize)]
pub struct RotationBody {
    pub kind: RotationKind,
    pub length: u32,
    pub start_date: NaiveDate,
    pub start_time: NaiveTime,
    pub handoff_time: NaiveTime,
    #[serde(default)]
    pub handoff_day: Option<DayOfWeek>,
    pub participants: Vec<UserId>,
}

/// `GET /api/v1/schedules/{id}/rotations`
pub async fn list_rotations(
    State(state): State<AppState>,
    axum::Extension(identity): axum::Extension<CallerIdentity>,
    Path(id): Path<ScheduleId>,
) -> Result<impl IntoResponse, ApiError> {
    // Scope check before touching the child collection.
    state
        .repos
        .schedules
        .get(identity.organization_id, id)
        .await?;
    let rotations = state.repos.schedules.rotations(id).await?;
    Ok(Json(rotations))
}

/// `POST /api/v1/schedules/{id}/rotations`
pub async fn add_rotation(
    State(state): State<AppState>,
    axum::Extension(identity): axum::Extension<CallerIdentity>,
    Path(id): Path<ScheduleId>,
    Json(body): Json<RotationBody>,
) -> Result<impl IntoResponse, ApiError> {
    let org = identity.organization_id;
    state.repos.schedules.get(org, id).await?;
    for participant in &body.participants {
        state.repos.users.get(org, *participant).await?;
    }
    let rotation = Rotation {
        id: RotationId::generate(),
        schedule_id: id,
        kind: body.kind,
        length: body.length,
        start_date: body.start_date,
        start_time: body.start_time,
        handoff_time: body.handoff_time,
        handoff_day: body.handoff_day,
        participants: body.participants,
        created_at: state.now(),
    };
    rotation.validate()?;
    state.repos.schedules.add_rotation(rotation.clone()).await?;
    Ok((StatusCode::CREATED, Json(rotation)))
}

/// `DELETE /api/v1/schedules/{id}/rotations/{rotation_id}`
pub async fn remove_rotation(
    State(state): State<AppState>,
    axum::Extension(identity): axum::Extension<CallerIdentity>,
    Path((id, rotation_id)): Path<(ScheduleId, RotationId)>,
) -> Result<impl IntoResponse, ApiError> {
    state
        .repos
        .schedules
        .get(identity.organization_id, id)
        .await?;
    state.repos.schedules.remove_rotation(rotation_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Body for adding an override window.
#[derive(Debug, Deserialize)]
pub struct OverrideBody {
    pub user_id: UserId,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

/// `GET /api/v1/schedules/{id}/overrides`
pub async fn list_overrides(
    State(state): State<AppState>,
    axum::Extension(identity): axum::Extension<CallerIdentity>,
    Path(id): Path<ScheduleId>,
) -> Result<impl IntoResponse, ApiError> {
    state
        .repos
        .schedules
        .get(identity.organization_id, id)
        .await?;
    let overrides = state.repos.schedules.list_overrides(id).await?;
    Ok(Json(overrides))
}

/// `POST /api/v1/schedules/{id}/overrides`
pub async fn add_override(
    State(state): State<AppState>,
    axum::Extension(identity): axum::Extension<CallerIdentity>,
    Path(id): Path<ScheduleId>,
    Json(body): Json<OverrideBody>,
) -> Result<impl IntoResponse, ApiError> {
    let org = identity.organization_id;
    state.repos.schedules.get(org, id).await?;
    state.repos.users.get(org, body.user_id).await?;
    let record = ScheduleOverride {
        id: OverrideId::generate(),
        schedule_id: id,
        user_id: body.user_id,
        start: body.start,
        end: body.end,
        created_at: state.now(),
    };
    record.validate()?;
    state.repos.schedules.add_override(record.clone()).await?;
    Ok((StatusCode::CREATED, Json(record)))
}

/// `DELETE /api/v1/schedules/{id}/overrides/{override_id}`
pub async fn remove_override(
    State(state): State<AppState>,
    axum::Extension(identity): axum::Extension<CallerIdentity>,
    Path((id, override_id)): Path<(ScheduleId, OverrideId)>,
) -> Result<impl IntoResponse, ApiError> {
    state
        .repos
        .schedules
        .get(identity.organization_id, id)
        .await?;
    state.repos.schedules.remove_override(override_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Query for the on-call lookup; defaults to "now".
#[derive(Debug, Default, Deserialize)]
pub struct OnCallQuery {
    pub at: Option<DateTime<Utc>>,
}

/// `GET /api/v1/schedules/{id}/oncall?at=...`
pub async fn oncall(
    State(state): State<AppState>,
    axum::Extension(identity): axum::Extension<CallerIdentity>,
    Path(id): Path<ScheduleId>,
    Query(query): Query<OnCallQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let at = query.at.unwrap_or_else(|| state.now());
    let oncall = state
        .resolver
        .resolve(identity.organization_id, id, at)
        .await
        .map_err(|err| match err {
            pulsar_oncall::OnCallError::NoOnCall(_) => {
                ApiError::from(pulsar_core::PulsarError::not_found(err.to_string()))
            }
            pulsar_oncall::OnCallError::Store(e) => ApiError::from(e),
            pulsar_oncall::OnCallError::Invalid(e) => ApiError::from(e),
        })?;
    Ok(Json(serde_json::json!({
        "user_id": oncall.user_id,
        "shift_start": oncall.shift_start,
        "shift_end": oncall.shift_end,
        "is_override": oncall.is_override,
    })))
}
