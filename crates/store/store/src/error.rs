use pulsar_core::PulsarError;
use thiserror::Error;

/// Errors surfaced by repository ports.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The identifier does not exist in the caller's organization.
    /// Cross-tenant access reports this kind, never `Conflict`.
    #[error("not found: {0}")]
    NotFound(String),

    /// A uniqueness or state-transition violation.
    #[error("conflict: {0}")]
    Conflict(String),

    /// The record fails a structural invariant.
    #[error("invalid: {0}")]
    Invalid(String),

    /// The backend itself failed.
    #[error("backend error: {0}")]
    Backend(String),
}

impl StoreError {
    /// Build a [`StoreError::NotFound`].
    pub fn not_found(what: impl Into<String>) -> Self {
        Self::NotFound(what.into())
    }

    /// Build a [`StoreError::Conflict`].
    pub fn conflict(msg: impl Into<String>) -> Self {
        Self::Conflict(msg.into())
    }

    /// Build a [`StoreError::Invalid`].
    pub fn invalid(msg: impl Into<String>) -> Self {
        Self::Invalid(msg.into())
    }
}

impl From<StoreError> for PulsarError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound(msg) => Self::NotFound(msg),
            StoreError::Conflict(msg) => Self::Conflict(msg),
            StoreError::Invalid(msg) => Self::Validation(msg),
            StoreError::Backend(msg) => Self::Internal(msg),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn maps_into_taxonomy() {
        assert!(matches!(
            PulsarError::from(StoreError::not_found("alert 7")),
            PulsarError::NotFound(_)
        ));
        assert!(matches!(
            PulsarError::from(StoreError::invalid("bad")),
            PulsarError::Validation(_)
        ));
        assert!(matches!(
            PulsarError::from(StoreError::Backend("io".into())),
            PulsarError::Internal(_)
        ));
    }
}
