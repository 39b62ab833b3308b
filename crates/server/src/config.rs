use std::path::Path;

use serde::Deserialize;

/// Top-level configuration, loaded from a TOML file with `PULSAR_*`
/// environment overrides for the deployment surface (§ env vars below).
#[derive(Debug, Default, Deserialize)]
pub struct PulsarConfig {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub auth: AuthConfig,
    #[serde(default)]
    pub cors: CorsConfig,
    #[serde(default)]
    pub workers: WorkersConfig,
    #[serde(default)]
    pub telemetry: TelemetryConfig,
}

/// HTTP bind configuration.
#[derive(Debug, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    /// Bounded drain window for in-flight requests and workers.
    #[serde(default = "default_shutdown_timeout")]
    pub shutdown_timeout_seconds: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            shutdown_timeout_seconds: default_shutdown_timeout(),
        }
    }
}

fn default_host() -> String {
    "127.0.0.1".to_owned()
}

fn default_port() -> u16 {
    8080
}

fn default_shutdown_timeout() -> u64 {
    10
}

/// Persistence configuration. The bundled backend is in-memory; the URL is
/// carried for durable backends plugged in behind the repository ports.
#[derive(Debug, Default, Deserialize)]
pub struct DatabaseConfig {
    #[serde(default)]
    pub url: Option<String>,
}

/// One provisioned API key. The key itself never appears in config files;
/// only its SHA-256 hex digest does.
#[derive(Debug, Clone, Deserialize)]
pub struct ApiKeyConfig {
    /// SHA-256 hex of the raw key.
    pub key_hash: String,
    /// Organization the key is scoped to.
    pub organization_id: String,
    /// Optional acting user for audit attribution.
    #[serde(default)]
    pub user_id: Option<String>,
}

/// Authentication configuration.
#[derive(Debug, Default, Deserialize)]
pub struct AuthConfig {
    /// HS256 secret for access tokens; must be at least 32 bytes.
    #[serde(default)]
    pub jwt_secret: String,
    /// HS256 secret for refresh tokens; must be at least 32 bytes.
    #[serde(default)]
    pub jwt_refresh_secret: String,
    #[serde(default = "default_access_ttl")]
    pub access_ttl_seconds: u64,
    #[serde(default = "default_refresh_ttl")]
    pub refresh_ttl_seconds: u64,
    #[serde(default)]
    pub api_keys: Vec<ApiKeyConfig>,
}

fn default_access_ttl() -> u64 {
    15 * 60
}

fn default_refresh_ttl() -> u64 {
    7 * 24 * 3600
}

/// CORS configuration.
#[derive(Debug, Default, Deserialize)]
pub struct CorsConfig {
    /// Allowed origins; empty means same-origin only.
    #[serde(default)]
    pub allowed_origins: Vec<String>,
}

/// Background worker tick configuration.
#[derive(Debug, Deserialize)]
pub struct WorkersConfig {
    /// Escalation tick period; must be at most half the smallest rule
    /// delay in use.
    #[serde(default = "default_escalation_tick")]
    pub escalation_tick_seconds: u64,
    #[serde(default = "default_webhook_tick")]
    pub webhook_tick_seconds: u64,
    #[serde(default = "default_webhook_batch")]
    pub webhook_batch_size: usize,
    #[serde(default = "default_webhook_concurrency")]
    pub webhook_concurrency: usize,
}

impl Default for WorkersConfig {
    fn default() -> Self {
        Self {
            escalation_tick_seconds: default_escalation_tick(),
            webhook_tick_seconds: default_webhook_tick(),
            webhook_batch_size: default_webhook_batch(),
            webhook_concurrency: default_webhook_concurrency(),
        }
    }
}

fn default_escalation_tick() -> u64 {
    15
}

fn default_webhook_tick() -> u64 {
    10
}

fn default_webhook_batch() -> usize {
    50
}

fn default_webhook_concurrency() -> usize {
    64
}

/// OpenTelemetry export configuration.
#[derive(Debug, Deserialize)]
pub struct TelemetryConfig {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default = "default_otlp_endpoint")]
    pub endpoint: String,
    #[serde(default = "default_service_name")]
    pub service_name: String,
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            endpoint: default_otlp_endpoint(),
            service_name: default_service_name(),
            log_level: default_log_level(),
        }
    }
}

fn default_otlp_endpoint() -> String {
    "http://127.0.0.1:4317".to_owned()
}

fn default_service_name() -> String {
    "pulsar".to_owned()
}

fn default_log_level() -> String {
    "info".to_owned()
}

impl PulsarConfig {
    /// Load from a TOML file (missing file means defaults), then apply
    /// environment overrides.
    pub fn load(path: &Path) -> Result<Self, String> {
        let mut config = if path.exists() {
            let raw = std::fs::read_to_string(path)
                .map_err(|e| format!("failed to read {}: {e}", path.display()))?;
            toml::from_str(&raw).map_err(|e| format!("failed to parse {}: {e}", path.display()))?
        } else {
            Self::default()
        };
        config.apply_env();
        Ok(config)
    }

    /// Apply `PULSAR_*` environment overrides.
    pub fn apply_env(&mut self) {
        if let Ok(v) = std::env::var("PULSAR_HOST") {
            self.server.host = v;
        }
        if let Ok(v) = std::env::var("PULSAR_PORT")
            && let Ok(port) = v.parse()
        {
            self.server.port = port;
        }
        if let Ok(v) = std::env::var("PULSAR_DATABASE_URL") {
            self.database.url = Some(v);
        }
        if let Ok(v) = std::env::var("PULSAR_JWT_SECRET") {
            self.auth.jwt_secret = v;
        }
        if let Ok(v) = std::env::var("PULSAR_JWT_REFRESH_SECRET") {
            self.auth.jwt_refresh_secret = v;
        }
        if let Ok(v) = std::env::var("PULSAR_ACCESS_TTL_SECONDS")
            && let Ok(ttl) = v.parse()
        {
            self.auth.access_ttl_seconds = ttl;
        }
        if let Ok(v) = std::env::var("PULSAR_REFRESH_TTL_SECONDS")
            && let Ok(ttl) = v.parse()
        {
            self.auth.refresh_ttl_seconds = ttl;
        }
        if let Ok(v) = std::env::var("PULSAR_CORS_ALLOWED_ORIGINS") {
            self.cors.allowed_origins = v
                .split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_owned)
                .collect();
        }
        if let Ok(v) = std::env::var("PULSAR_ESCALATION_TICK_SECONDS")
            && let Ok(seconds) = v.parse()
        {
            self.workers.escalation_tick_seconds = seconds;
        }
        if let Ok(v) = std::env::var("PULSAR_WEBHOOK_TICK_SECONDS")
            && let Ok(seconds) = v.parse()
        {
            self.workers.webhook_tick_seconds = seconds;
        }
        if let Ok(v) = std::env::var("PULSAR_WEBHOOK_CONCURRENCY")
            && let Ok(cap) = v.parse()
        {
            self.workers.webhook_concurrency = cap;
        }
        if let Ok(v) = std::env::var("PULSAR_OTEL_ENDPOINT") {
            self.telemetry.enabled = true;
            self.telemetry.endpoint = v;
        }
        if let Ok(v) = std::env::var("PULSAR_LOG_LEVEL") {
            self.telemetry.log_level = v;
        }
    }

    /// Validate secret strength (both >= 32 bytes) when any JWT auth is
    /// configured, and the worker tick periods.
    pub fn validate(&self) -> Result<(), String> {
        if !self.auth.jwt_secret.is_empty() && self.auth.jwt_secret.len() < 32 {
            return Err("auth.jwt_secret must be at least 32 bytes".into());
        }
        if !self.auth.jwt_refresh_secret.is_empty() && self.auth.jwt_refresh_secret.len() < 32 {
            return Err("auth.jwt_refresh_secret must be at least 32 bytes".into());
        }
        if self.workers.escalation_tick_seconds == 0 || self.workers.webhook_tick_seconds == 0 {
            return Err("worker tick periods must be positive".into());
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_sane() {
        let config = PulsarConfig::default();
        assert_eq!(config.server.port, 8080);
        assert_eq!(config.workers.escalation_tick_seconds, 15);
        assert_eq!(config.workers.webhook_concurrency, 64);
        assert!(!config.telemetry.enabled);
        config.validate().unwrap();
    }

    #[test]
    fn parses_toml() {
        let raw = r#"
            [server]
            host = "0.0.0.0"
            port = 9090

            [auth]
            jwt_secret = "0123456789abcdef0123456789abcdef"
            jwt_refresh_secret = "fedcba9876543210fedcba9876543210"

            [[auth.api_keys]]
            key_hash = "deadbeef"
            organization_id = "2c3c4b1a-0000-0000-0000-000000000000"

            [workers]
            escalation_tick_seconds = 5
        "#;
        let config: PulsarConfig = toml::from_str(raw).unwrap();
        assert_eq!(config.server.host, "0.0.0.0");
        assert_eq!(config.server.port, 9090);
        assert_eq!(config.auth.api_keys.len(), 1);
        assert_eq!(config.workers.escalation_tick_seconds, 5);
        config.validate().unwrap();
    }

    #[test]
    fn short_secret_rejected() {
        let mut config = PulsarConfig::default();
        config.auth.jwt_secret = "short".into();
        assert!(config.validate().is_err());
    }

    #[test]
    fn zero_tick_rejected() {
        let mut config = PulsarConfig::default();
        config.workers.escalation_tick_seconds = 0;
        assert!(config.validate().is_err());
    }
}
