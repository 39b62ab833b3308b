pub mod api_key;
pub mod jwt;
pub mod middleware;

use std::collections::HashMap;

use pulsar_core::{OrgId, PulsarError, UserId};
use tracing::warn;

use crate::config::AuthConfig;

use self::api_key::ApiKeyEntry;
use self::jwt::JwtManager;

/// The authenticated caller attached to each request.
#[derive(Debug, Clone)]
pub struct CallerIdentity {
    pub organization_id: OrgId,
    /// Absent for org-scoped machine keys.
    pub user_id: Option<UserId>,
    /// `"jwt"` or `"api_key"`.
    pub auth_method: &'static str,
}

/// Validates bearer JWTs and `X-API-Key` credentials.
///
/// Credential issuance (registration, login, refresh, OTP) is an external
/// collaborator; this provider only validates what those flows minted.
pub struct AuthProvider {
    jwt: Option<JwtManager>,
    api_keys: HashMap<String, ApiKeyEntry>,
}

impl AuthProvider {
    /// Build the provider from configuration.
    #[must_use]
    pub fn from_config(config: &AuthConfig) -> Self {
        let jwt = if config.jwt_secret.is_empty() {
            warn!("no JWT secret configured, bearer tokens are rejected");
            None
        } else {
            Some(JwtManager::new(
                &config.jwt_secret,
                config.access_ttl_seconds,
            ))
        };
        Self {
            jwt,
            api_keys: api_key::build_table(&config.api_keys),
        }
    }

    /// Validate a bearer access token.
    pub fn authenticate_bearer(&self, token: &str) -> Result<CallerIdentity, PulsarError> {
        let Some(jwt) = &self.jwt else {
            return Err(PulsarError::Unauthorized(
                "bearer authentication is not configured".into(),
            ));
        };
        jwt.validate(token)
    }

    /// Validate an `X-API-Key` credential.
    #[must_use]
    pub fn authenticate_api_key(&self, raw_key: &str) -> Option<CallerIdentity> {
        api_key::authenticate(raw_key, &self.api_keys)
    }

    /// Issue an access token (used by operational tooling and tests; the
    /// login flow itself lives outside this service).
    pub fn issue_token(&self, org: OrgId, user: UserId) -> Result<String, PulsarError> {
        let Some(jwt) = &self.jwt else {
            return Err(PulsarError::Unauthorized(
                "bearer authentication is not configured".into(),
            ));
        };
        jwt.issue(org, user)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ApiKeyConfig;

    fn config_with_secret() -> AuthConfig {
        AuthConfig {
            jwt_secret: "0123456789abcdef0123456789abcdef".into(),
            jwt_refresh_secret: String::new(),
            access_ttl_seconds: 900,
            refresh_ttl_seconds: 3600,
            api_keys: vec![],
        }
    }

    #[test]
    fn jwt_roundtrip() {
        let provider = AuthProvider::from_config(&config_with_secret());
        let org = OrgId::generate();
        let user = UserId::generate();
        let token = provider.issue_token(org, user).unwrap();
        let identity = provider.authenticate_bearer(&token).unwrap();
        assert_eq!(identity.organization_id, org);
        assert_eq!(identity.user_id, Some(user));
        assert_eq!(identity.auth_method, "jwt");
    }

    #[test]
    fn garbage_token_rejected() {
        let provider = AuthProvider::from_config(&config_with_secret());
        assert!(provider.authenticate_bearer("not.a.jwt").is_err());
    }

    #[test]
    fn unconfigured_jwt_rejects() {
        let provider = AuthProvider::from_config(&AuthConfig::default());
        assert!(provider.authenticate_bearer("anything").is_err());
    }

    #[test]
    fn api_key_lookup() {
        let org = OrgId::generate();
        let mut config = config_with_secret();
        config.api_keys.push(ApiKeyConfig {
            key_hash: api_key::hash_key("super-secret-key"),
            organization_id: org.to_string(),
            user_id: None,
        });
        let provider = AuthProvider::from_config(&config);

        let identity = provider.authenticate_api_key("super-secret-key").unwrap();
        assert_eq!(identity.organization_id, org);
        assert_eq!(identity.auth_method, "api_key");
        assert!(provider.authenticate_api_key("wrong-key").is_none());
    }
}
