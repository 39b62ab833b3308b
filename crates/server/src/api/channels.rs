use axum::Json;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use serde::Deserialize;

use pulsar_core::{
    ChannelId, ChannelKind, DndOverride, NotificationChannel, UserDndSettings, UserId, WeeklySlot,
    validate_timezone,
};

use pulsar_store::{ChannelRepo as _, DndRepo as _, UserRepo as _};

use super::AppState;
use crate::auth::CallerIdentity;
use crate::error::ApiError;

/// Body for channel create/update.
#[derive(Debug, Deserialize)]
pub struct ChannelBody {
    pub kind: ChannelKind,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    #[serde(default)]
    pub provider_config: serde_json::Value,
}

fn default_enabled() -> bool {
    true
}

/// `GET /api/v1/channels`
pub async fn list(
    State(state): State<AppState>,
    axum::Extension(identity): axum::Extension<CallerIdentity>,
) -> Result<impl IntoResponse, ApiError> {
    let channels = state.repos.channels.list(identity.organization_id).await?;
    Ok(Json(channels))
}

/// `POST /api/v1/channels`
pub async fn create(
    State(state): State<AppState>,
    axum::Extension(identity): axum::Extension<CallerIdentity>,
    Json(body): Json<ChannelBody>,
) -> Result<impl IntoResponse, ApiError> {
    let mut channel = NotificationChannel::new(
        identity.organization_id,
        body.kind,
        body.provider_config,
        state.now(),
    );
    channel.enabled = body.enabled;
    state.repos.channels.create(channel.clone()).await?;
    Ok((StatusCode::CREATED, Json(channel)))
}

/// `PUT /api/v1/channels/{id}`
pub async fn update(
    State(state): State<AppState>,
    axum::Extension(identity): axum::Extension<CallerIdentity>,
    Path(id): Path<ChannelId>,
    Json(body): Json<ChannelBody>,
) -> Result<impl IntoResponse, ApiError> {
    let mut channel = state
        .repos
        .channels
        .get(identity.organization_id, id)
        .await?;
    channel.kind = body.kind;
    channel.enabled = body.enabled;
    channel.provider_config = body.provider_config;
    state.repos.channels.update(channel.clone()).await?;
    Ok(Json(channel))
}

/// `DELETE /api/v1/channels/{id}`
pub async fn delete_one(
    State(state): State<AppState>,
    axum::Extension(identity): axum::Extension<CallerIdentity>,
    Path(id): Path<ChannelId>,
) -> Result<impl IntoResponse, ApiError> {
    state
        .repos
        .channels
        .delete(identity.organization_id, id)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Body for `PUT /users/{id}/dnd`.
#[derive(Debug, Deserialize)]
pub struct DndBody {
    pub enabled: bool,
    pub timezone: String,
    #[serde(default)]
    pub weekly_slots: Vec<WeeklySlot>,
    #[serde(default)]
    pub overrides: Vec<DndOverride>,
    #[serde(default)]
    pub allow_p1_override: bool,
}

/// `GET /api/v1/users/{id}/dnd`
pub async fn get_dnd(
    State(state): State<AppState>,
    axum::Extension(identity): axum::Extension<CallerIdentity>,
    Path(user_id): Path<UserId>,
) -> Result<impl IntoResponse, ApiError> {
    let settings = state
        .repos
        .dnd
        .get(identity.organization_id, user_id)
        .await?;
    Ok(Json(settings))
}

/// `PUT /api/v1/users/{id}/dnd`
pub async fn put_dnd(
    State(state): State<AppState>,
    axum::Extension(identity): axum::Extension<CallerIdentity>,
    Path(user_id): Path<UserId>,
    Json(body): Json<DndBody>,
) -> Result<impl IntoResponse, ApiError> {
    let org = identity.organization_id;
    state.repos.users.get(org, user_id).await?;
    validate_timezone(&body.timezone)?;
    for window in &body.overrides {
        if window.end <= window.start {
            return Err(ApiError::bad_request("DND override end must be after start"));
        }
    }
    let settings = UserDndSettings {
        user_id,
        organization_id: org,
        enabled: body.enabled,
        timezone: body.timezone,
        weekly_slots: body.weekly_slots,
        overrides: body.overrides,
        allow_p1_override: body.allow_p1_override,
        updated_at: state.now(),
    };
    state.repos.dnd.upsert(settings.clone()).await?;
    Ok(Json(settings))
}

/// `DELETE /api/v1/users/{id}/dnd`
pub async fn delete_dnd(
    State(state): State<AppState>,
    axum::Extension(identity): axum::Extension<CallerIdentity>,
    Path(user_id): Path<UserId>,
) -> Result<impl IntoResponse, ApiError> {
    state
        .repos
        .dnd
        .delete(identity.organization_id, user_id)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}
