use axum::Json;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use tracing::{debug, warn};

use pulsar_core::{Actor, PulsarError};
use pulsar_engine::CreateOutcome;
use pulsar_ingest::{apply_token_defaults, canonicalise};

use pulsar_store::TokenRepo as _;

use super::AppState;
use crate::error::ApiError;

/// `POST /webhook/{token}` -- unauthenticated, token-gated ingestion.
///
/// Resolves the token, dispatches on its integration kind, applies token
/// defaults, bumps the request counter, and hands each canonical alert to
/// the lifecycle service.
pub async fn receive(
    State(state): State<AppState>,
    Path(token): Path<String>,
    Json(payload): Json<serde_json::Value>,
) -> Result<impl IntoResponse, ApiError> {
    let Some(mut record) = state.repos.tokens.find_by_token(&token).await? else {
        return Err(ApiError::from(PulsarError::not_found("unknown token")));
    };
    if !record.enabled {
        return Err(ApiError::from(PulsarError::Forbidden(
            "token is disabled".into(),
        )));
    }

    let requests = canonicalise(record.integration_kind, &payload)
        .map_err(|e| ApiError::bad_request(e.to_string()))?;

    record.request_count += 1;
    if let Err(err) = state.repos.tokens.update(record.clone()).await {
        warn!(token_id = %record.id, error = %err, "failed to bump token request counter");
    }

    let mut created = 0usize;
    let mut suppressed = 0usize;
    let mut duplicates = 0usize;
    for mut request in requests {
        apply_token_defaults(&mut request, &record);
        match state
            .service
            .create(record.organization_id, request, Actor::System)
            .await
        {
            Ok(CreateOutcome::Created(_)) => created += 1,
            Ok(CreateOutcome::Suppressed) => suppressed += 1,
            Ok(CreateOutcome::Duplicate(_)) => duplicates += 1,
            Err(err) => {
                // One bad entry does not abort the rest of the batch.
                warn!(error = %err, "failed to create ingested alert");
            }
        }
    }

    debug!(
        token_id = %record.id,
        created, suppressed, duplicates,
        "incoming webhook processed"
    );
    Ok((
        StatusCode::ACCEPTED,
        Json(serde_json::json!({
            "created": created,
            "suppressed": suppressed,
            "duplicates": duplicates,
        })),
    ))
}
