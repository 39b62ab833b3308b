use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use thiserror::Error;
use tracing::error;

use pulsar_core::PulsarError;
use pulsar_store::StoreError;

/// Errors surfaced through the HTTP API.
///
/// Handlers return this type; the [`IntoResponse`] impl translates the
/// platform taxonomy into status codes uniformly, always with an
/// `{"error": "<message>"}` body.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error(transparent)]
    Platform(#[from] PulsarError),

    /// Request body or parameter failed to parse.
    #[error("{0}")]
    BadRequest(String),
}

impl From<StoreError> for ApiError {
    fn from(err: StoreError) -> Self {
        Self::Platform(err.into())
    }
}

impl ApiError {
    /// Shorthand for a 400.
    pub fn bad_request(msg: impl Into<String>) -> Self {
        Self::BadRequest(msg.into())
    }

    fn status(&self) -> StatusCode {
        match self {
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::Platform(err) => match err {
                PulsarError::Validation(_) => StatusCode::BAD_REQUEST,
                PulsarError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
                PulsarError::Forbidden(_) => StatusCode::FORBIDDEN,
                PulsarError::NotFound(_) => StatusCode::NOT_FOUND,
                PulsarError::Conflict(_) => StatusCode::CONFLICT,
                PulsarError::RateLimited => StatusCode::TOO_MANY_REQUESTS,
                PulsarError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
                PulsarError::DependencyFailure(_) => StatusCode::BAD_GATEWAY,
            },
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status == StatusCode::INTERNAL_SERVER_ERROR {
            // Internal errors always leave a correlated log line.
            error!(error = %self, "internal error serving request");
        }
        let body = serde_json::json!({ "error": self.to_string() });
        (status, axum::Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn taxonomy_maps_to_statuses() {
        let cases = [
            (
                ApiError::from(PulsarError::validation("bad")),
                StatusCode::BAD_REQUEST,
            ),
            (
                ApiError::from(PulsarError::Unauthorized("no token".into())),
                StatusCode::UNAUTHORIZED,
            ),
            (
                ApiError::from(PulsarError::Forbidden("scope".into())),
                StatusCode::FORBIDDEN,
            ),
            (
                ApiError::from(PulsarError::not_found("alert")),
                StatusCode::NOT_FOUND,
            ),
            (
                ApiError::from(PulsarError::conflict("already closed")),
                StatusCode::CONFLICT,
            ),
            (
                ApiError::from(PulsarError::internal("boom")),
                StatusCode::INTERNAL_SERVER_ERROR,
            ),
            (
                ApiError::from(PulsarError::DependencyFailure("502".into())),
                StatusCode::BAD_GATEWAY,
            ),
        ];
        for (err, expected) in cases {
            assert_eq!(err.status(), expected);
        }
    }

    #[test]
    fn store_errors_pass_through_taxonomy() {
        let err = ApiError::from(StoreError::not_found("alert 9"));
        assert_eq!(err.status(), StatusCode::NOT_FOUND);
    }
}
