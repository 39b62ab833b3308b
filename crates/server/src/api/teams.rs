use axum::Json;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use serde::Deserialize;

use pulsar_core::{Team, TeamId, TeamMember};
use pulsar_store::{TeamRepo as _, UserRepo as _};

use super::AppState;
use crate::auth::CallerIdentity;
use crate::error::ApiError;

/// Body for team create/update.
#[derive(Debug, Deserialize)]
pub struct TeamBody {
    pub name: String,
    #[serde(default)]
    pub members: Vec<TeamMember>,
}

/// `GET /api/v1/teams`
pub async fn list(
    State(state): State<AppState>,
    axum::Extension(identity): axum::Extension<CallerIdentity>,
) -> Result<impl IntoResponse, ApiError> {
    let teams = state.repos.teams.list(identity.organization_id).await?;
    Ok(Json(teams))
}

/// `POST /api/v1/teams`
pub async fn create(
    State(state): State<AppState>,
    axum::Extension(identity): axum::Extension<CallerIdentity>,
    Json(body): Json<TeamBody>,
) -> Result<impl IntoResponse, ApiError> {
    let org = identity.organization_id;
    // Members must belong to the organization.
    for member in &body.members {
        state.repos.users.get(org, member.user_id).await?;
    }
    let mut team = Team::new(org, body.name, state.now());
    team.members = body.members;
    state.repos.teams.create(team.clone()).await?;
    Ok((StatusCode::CREATED, Json(team)))
}

/// `GET /api/v1/teams/{id}`
pub async fn get_one(
    State(state): State<AppState>,
    axum::Extension(identity): axum::Extension<CallerIdentity>,
    Path(id): Path<TeamId>,
) -> Result<impl IntoResponse, ApiError> {
    let team = state.repos.teams.get(identity.organization_id, id).await?;
    Ok(Json(team))
}

/// `PUT /api/v1/teams/{id}`
pub async fn update(
    State(state): State<AppState>,
    axum::Extension(identity): axum::Extension<CallerIdentity>,
    Path(id): Path<TeamId>,
    Json(body): Json<TeamBody>,
) -> Result<impl IntoResponse, ApiError> {
    let org = identity.organization_id;
    for member in &body.members {
        state.repos.users.get(org, member.user_id).await?;
    }
    let mut team = state.repos.teams.get(org, id).await?;
    team.name = body.name;
    team.members = body.members;
    state.repos.teams.update(team.clone()).await?;
    Ok(Json(team))
}

/// `DELETE /api/v1/teams/{id}`
pub async fn delete_one(
    State(state): State<AppState>,
    axum::Extension(identity): axum::Extension<CallerIdentity>,
    Path(id): Path<TeamId>,
) -> Result<impl IntoResponse, ApiError> {
    state.repos.teams.delete(identity.organization_id, id).await?;
    Ok(StatusCode::NO_CONTENT)
}
