use axum::extract::{Request, State};
use axum::middleware::Next;
use axum::response::Response;

use pulsar_core::PulsarError;

use crate::api::AppState;
use crate::error::ApiError;

fn unauthorized(msg: &str) -> ApiError {
    ApiError::from(PulsarError::Unauthorized(msg.to_owned()))
}

/// Require a bearer JWT or an `X-API-Key` credential and attach the
/// resolved [`CallerIdentity`](super::CallerIdentity) to the request.
pub async fn require_auth(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let headers = request.headers();

    let identity = if let Some(raw) = headers.get("X-API-Key").and_then(|v| v.to_str().ok()) {
        state
            .auth
            .authenticate_api_key(raw)
            .ok_or_else(|| unauthorized("invalid API key"))?
    } else if let Some(raw) = headers
        .get(axum::http::header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
    {
        let token = raw
            .strip_prefix("Bearer ")
            .ok_or_else(|| unauthorized("malformed Authorization header"))?;
        state.auth.authenticate_bearer(token)?
    } else {
        return Err(unauthorized("missing credentials"));
    };

    request.extensions_mut().insert(identity);
    Ok(next.run(request).await)
}
