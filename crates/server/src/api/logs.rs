use axum::Json;
use axum::extract::{Query, State};
use axum::response::IntoResponse;
use serde::Deserialize;

use pulsar_core::{AlertId, UserId};
use pulsar_store::{
    AuditFilter, AuditRepo as _, NotificationFilter, NotificationRepo as _, PageRequest,
};

use super::AppState;
use crate::auth::CallerIdentity;
use crate::error::ApiError;

/// Query for the notification log.
#[derive(Debug, Default, Deserialize)]
pub struct NotificationQuery {
    pub alert_id: Option<AlertId>,
    pub user_id: Option<UserId>,
    pub limit: Option<usize>,
    pub offset: Option<usize>,
}

/// `GET /api/v1/notifications`
pub async fn notifications(
    State(state): State<AppState>,
    axum::Extension(identity): axum::Extension<CallerIdentity>,
    Query(query): Query<NotificationQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let filter = NotificationFilter {
        alert_id: query.alert_id,
        user_id: query.user_id,
        page: Some(PageRequest {
            limit: query.limit.unwrap_or(50).min(500),
            offset: query.offset.unwrap_or(0),
        }),
    };
    let page = state
        .repos
        .notifications
        .list(identity.organization_id, &filter)
        .await?;
    Ok(Json(serde_json::json!({
        "notifications": page.items,
        "total": page.total,
    })))
}

/// Query for the audit trail.
#[derive(Debug, Default, Deserialize)]
pub struct AuditQuery {
    pub alert_id: Option<AlertId>,
    pub limit: Option<usize>,
    pub offset: Option<usize>,
}

/// `GET /api/v1/audit`
pub async fn audit(
    State(state): State<AppState>,
    axum::Extension(identity): axum::Extension<CallerIdentity>,
    Query(query): Query<AuditQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let filter = AuditFilter {
        alert_id: query.alert_id,
        page: Some(PageRequest {
            limit: query.limit.unwrap_or(50).min(500),
            offset: query.offset.unwrap_or(0),
        }),
    };
    let page = state
        .repos
        .audit
        .list(identity.organization_id, &filter)
        .await?;
    Ok(Json(serde_json::json!({
        "entries": page.items,
        "total": page.total,
    })))
}
