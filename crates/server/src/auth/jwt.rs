use jsonwebtoken::{DecodingKey, EncodingKey, Header, Validation, decode, encode};
use serde::{Deserialize, Serialize};

use pulsar_core::{OrgId, PulsarError, UserId};

use super::CallerIdentity;

#[derive(Debug, Serialize, Deserialize)]
struct Claims {
    /// Acting user id.
    sub: String,
    /// Organization scope.
    org: String,
    exp: u64,
    iat: u64,
}

/// HS256 access-token codec.
pub struct JwtManager {
    encoding: EncodingKey,
    decoding: DecodingKey,
    ttl_seconds: u64,
}

impl JwtManager {
    /// Build from the shared secret and token lifetime.
    #[must_use]
    pub fn new(secret: &str, ttl_seconds: u64) -> Self {
        Self {
            encoding: EncodingKey::from_secret(secret.as_bytes()),
            decoding: DecodingKey::from_secret(secret.as_bytes()),
            ttl_seconds,
        }
    }

    /// Issue a token scoped to `(org, user)`.
    pub fn issue(&self, org: OrgId, user: UserId) -> Result<String, PulsarError> {
        #[allow(clippy::cast_sign_loss)]
        let now = chrono::Utc::now().timestamp() as u64;
        let claims = Claims {
            sub: user.to_string(),
            org: org.to_string(),
            exp: now + self.ttl_seconds,
            iat: now,
        };
        encode(&Header::default(), &claims, &self.encoding)
            .map_err(|e| PulsarError::internal(format!("failed to sign token: {e}")))
    }

    /// Validate a token and extract the caller identity.
    pub fn validate(&self, token: &str) -> Result<CallerIdentity, PulsarError> {
        let data = decode::<Claims>(token, &self.decoding, &Validation::default())
            .map_err(|e| PulsarError::Unauthorized(format!("invalid token: {e}")))?;
        let organization_id = data
            .claims
            .org
            .parse()
            .map_err(|_| PulsarError::Unauthorized("invalid org claim".into()))?;
        let user_id = data
            .claims
            .sub
            .parse()
            .map_err(|_| PulsarError::Unauthorized("invalid sub claim".into()))?;
        Ok(CallerIdentity {
            organization_id,
            user_id: Some(user_id),
            auth_method: "jwt",
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn expired_token_rejected() {
        let secret = "0123456789abcdef0123456789abcdef";
        #[allow(clippy::cast_sign_loss)]
        let now = chrono::Utc::now().timestamp() as u64;
        let stale = Claims {
            sub: UserId::generate().to_string(),
            org: OrgId::generate().to_string(),
            exp: now - 3600,
            iat: now - 7200,
        };
        let token = encode(
            &Header::default(),
            &stale,
            &EncodingKey::from_secret(secret.as_bytes()),
        )
        .unwrap();
        let manager = JwtManager::new(secret, 900);
        assert!(manager.validate(&token).is_err());
    }

    #[test]
    fn wrong_secret_rejected() {
        let issuer = JwtManager::new("0123456789abcdef0123456789abcdef", 900);
        let verifier = JwtManager::new("fedcba9876543210fedcba9876543210", 900);
        let token = issuer.issue(OrgId::generate(), UserId::generate()).unwrap();
        assert!(verifier.validate(&token).is_err());
    }
}
