use std::collections::HashMap;

use sha2::{Digest, Sha256};
use subtle::ConstantTimeEq;
use tracing::warn;

use pulsar_core::{OrgId, UserId};

use super::CallerIdentity;
use crate::config::ApiKeyConfig;

/// One provisioned API key, resolved from configuration.
#[derive(Debug, Clone)]
pub struct ApiKeyEntry {
    pub organization_id: OrgId,
    pub user_id: Option<UserId>,
}

/// SHA-256 hex digest of a raw key, the form stored in configuration.
#[must_use]
pub fn hash_key(raw: &str) -> String {
    hex::encode(Sha256::digest(raw.as_bytes()))
}

/// Build the digest-keyed lookup table, skipping malformed entries.
#[must_use]
pub fn build_table(configs: &[ApiKeyConfig]) -> HashMap<String, ApiKeyEntry> {
    let mut table = HashMap::new();
    for config in configs {
        let Ok(organization_id) = config.organization_id.parse::<OrgId>() else {
            warn!(org = %config.organization_id, "skipping API key with invalid organization id");
            continue;
        };
        let user_id = match &config.user_id {
            Some(raw) => match raw.parse::<UserId>() {
                Ok(id) => Some(id),
                Err(_) => {
                    warn!(user = %raw, "skipping API key with invalid user id");
                    continue;
                }
            },
            None => None,
        };
        table.insert(
            config.key_hash.to_ascii_lowercase(),
            ApiKeyEntry {
                organization_id,
                user_id,
            },
        );
    }
    table
}

/// Authenticate a raw key against the table. The candidate digest is
/// compared in constant time against every entry so lookup timing does not
/// reveal digest prefixes.
#[must_use]
pub fn authenticate(
    raw_key: &str,
    table: &HashMap<String, ApiKeyEntry>,
) -> Option<CallerIdentity> {
    let candidate = hash_key(raw_key);
    let mut matched: Option<&ApiKeyEntry> = None;
    for (digest, entry) in table {
        if digest.as_bytes().ct_eq(candidate.as_bytes()).into() {
            matched = Some(entry);
        }
    }
    matched.map(|entry| CallerIdentity {
        organization_id: entry.organization_id,
        user_id: entry.user_id,
        auth_method: "api_key",
    })
}
