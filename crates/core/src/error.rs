use thiserror::Error;

/// The platform-wide error taxonomy.
///
/// Every fallible surface maps into one of these kinds; the HTTP layer
/// translates them uniformly into status codes, and background workers log
/// them with structured fields instead of surfacing them to users.
#[derive(Debug, Error)]
pub enum PulsarError {
    /// Malformed input, invalid enum value, missing required field, or a
    /// violated domain invariant.
    #[error("{0}")]
    Validation(String),

    /// Missing or invalid credential.
    #[error("{0}")]
    Unauthorized(String),

    /// Authenticated but lacking the required scope or role.
    #[error("{0}")]
    Forbidden(String),

    /// Unknown identifier, or an identifier belonging to another tenant.
    #[error("{0}")]
    NotFound(String),

    /// Duplicate unique key or an illegal state transition.
    #[error("{0}")]
    Conflict(String),

    /// Too many requests.
    #[error("rate limit exceeded")]
    RateLimited,

    /// Unexpected failure. Always logged with a correlation id at the
    /// boundary that produced it.
    #[error("internal error: {0}")]
    Internal(String),

    /// A downstream provider returned a non-success response for a
    /// synchronous call.
    #[error("dependency failure: {0}")]
    DependencyFailure(String),
}

impl PulsarError {
    /// Build a [`PulsarError::Validation`].
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    /// Build a [`PulsarError::NotFound`].
    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::NotFound(msg.into())
    }

    /// Build a [`PulsarError::Conflict`].
    pub fn conflict(msg: impl Into<String>) -> Self {
        Self::Conflict(msg.into())
    }

    /// Build a [`PulsarError::Internal`].
    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }

    /// Whether retrying the same call later could succeed.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        matches!(self, Self::RateLimited | Self::DependencyFailure(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_is_bare_message() {
        let err = PulsarError::validation("priority is required");
        assert_eq!(err.to_string(), "priority is required");
    }

    #[test]
    fn retryable_kinds() {
        assert!(PulsarError::RateLimited.is_retryable());
        assert!(PulsarError::DependencyFailure("502 from provider".into()).is_retryable());
        assert!(!PulsarError::not_found("no such alert").is_retryable());
    }
}
