use axum::Json;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use serde::Deserialize;

use pulsar_core::{ChannelKind, PulsarError, User, UserId};
use pulsar_store::UserRepo as _;

use super::AppState;
use crate::auth::CallerIdentity;
use crate::error::ApiError;

/// Body for user provisioning. Email verification and credential flows
/// are external; this surface only manages the directory record.
#[derive(Debug, Deserialize)]
pub struct CreateUser {
    pub email: String,
    pub display_name: String,
    #[serde(default)]
    pub preferred_channels: Option<Vec<ChannelKind>>,
}

/// Body for user updates.
#[derive(Debug, Deserialize)]
pub struct UpdateUser {
    pub display_name: Option<String>,
    pub active: Option<bool>,
    pub preferred_channels: Option<Vec<ChannelKind>>,
}

/// `GET /api/v1/users`
pub async fn list(
    State(state): State<AppState>,
    axum::Extension(identity): axum::Extension<CallerIdentity>,
) -> Result<impl IntoResponse, ApiError> {
    let users = state.repos.users.list(identity.organization_id).await?;
    Ok(Json(users))
}

/// `POST /api/v1/users`
pub async fn create(
    State(state): State<AppState>,
    axum::Extension(identity): axum::Extension<CallerIdentity>,
    Json(body): Json<CreateUser>,
) -> Result<impl IntoResponse, ApiError> {
    if !body.email.contains('@') {
        return Err(ApiError::from(PulsarError::validation(
            "email must contain '@'",
        )));
    }
    let mut user = User::new(
        identity.organization_id,
        body.email,
        body.display_name,
        state.now(),
    );
    if let Some(channels) = body.preferred_channels {
        user.preferred_channels = channels;
    }
    state.repos.users.create(user.clone()).await?;
    Ok((StatusCode::CREATED, Json(user)))
}

/// `GET /api/v1/users/{id}`
pub async fn get_one(
    State(state): State<AppState>,
    axum::Extension(identity): axum::Extension<CallerIdentity>,
    Path(id): Path<UserId>,
) -> Result<impl IntoResponse, ApiError> {
    let user = state.repos.users.get(identity.organization_id, id).await?;
    Ok(Json(user))
}

/// `PUT /api/v1/users/{id}`
pub async fn update(
    State(state): State<AppState>,
    axum::Extension(identity): axum::Extension<CallerIdentity>,
    Path(id): Path<UserId>,
    Json(body): Json<UpdateUser>,
) -> Result<impl IntoResponse, ApiError> {
    let mut user = state.repos.users.get(identity.organization_id, id).await?;
    if let Some(display_name) = body.display_name {
        user.display_name = display_name;
    }
    if let Some(active) = body.active {
        user.active = active;
    }
    if let Some(channels) = body.preferred_channels {
        user.preferred_channels = channels;
    }
    state.repos.users.update(user.clone()).await?;
    Ok(Json(user))
}

/// `DELETE /api/v1/users/{id}`
pub async fn delete_one(
    State(state): State<AppState>,
    axum::Extension(identity): axum::Extension<CallerIdentity>,
    Path(id): Path<UserId>,
) -> Result<impl IntoResponse, ApiError> {
    state
        .repos
        .users
        .delete(identity.organization_id, id)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}
