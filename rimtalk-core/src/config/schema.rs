//! Configuration schema structures with serde support

use super::error::ValidationError;
use super::secrets::SecretString;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use uuid::Uuid;

/// Default endpoint of the Player2 chat-completion service
pub const DEFAULT_BASE_URL: &str = "https://api.player2.game/v1";

/// Client identifier registered for RimTalk with the Player2 service
pub const DEFAULT_GAME_CLIENT_ID: Uuid = Uuid::from_u128(0x019a8368_b00b_72bc_b367_2825079dc6fb);

/// Root configuration for a chat client
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct ClientConfig {
    /// Base URL of the service, without a trailing `/chat/completions`
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Bearer token (supports environment variable interpolation)
    #[serde(default)]
    pub api_key: SecretString,

    /// Value of the `X-Game-Client-Id` header
    #[serde(default = "default_game_client_id")]
    pub game_client_id: Uuid,

    /// Connection settings
    #[serde(default)]
    pub connection: ConnectionConfig,

    /// Availability monitoring
    #[serde(default)]
    pub health: HealthConfig,

    /// Main-thread dispatcher settings
    #[serde(default)]
    pub dispatcher: DispatcherConfig,
}

/// HTTP connection settings
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct ConnectionConfig {
    /// Connection timeout in milliseconds
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_ms: u64,

    /// Whole-request timeout in milliseconds
    #[serde(default = "default_request_timeout")]
    pub request_timeout_ms: u64,

    /// Maximum idle connections kept per host
    #[serde(default = "default_max_idle")]
    pub max_idle_per_host: usize,
}

/// Health probe settings
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct HealthConfig {
    /// Probe cooldown in milliseconds; also the background loop period
    #[serde(default = "default_health_interval")]
    pub interval_ms: u64,

    /// Whether the background loop may be started
    #[serde(default = "default_true")]
    pub enabled: bool,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct DispatcherConfig {
    /// Queue length above which enqueueing logs a warning
    #[serde(default = "default_soft_limit")]
    pub soft_limit: usize,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            api_key: SecretString::default(),
            game_client_id: default_game_client_id(),
            connection: ConnectionConfig::default(),
            health: HealthConfig::default(),
            dispatcher: DispatcherConfig::default(),
        }
    }
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            connect_timeout_ms: default_connect_timeout(),
            request_timeout_ms: default_request_timeout(),
            max_idle_per_host: default_max_idle(),
        }
    }
}

impl Default for HealthConfig {
    fn default() -> Self {
        Self {
            interval_ms: default_health_interval(),
            enabled: true,
        }
    }
}

impl Default for DispatcherConfig {
    fn default() -> Self {
        Self {
            soft_limit: default_soft_limit(),
        }
    }
}

fn default_base_url() -> String { DEFAULT_BASE_URL.to_string() }
fn default_game_client_id() -> Uuid { DEFAULT_GAME_CLIENT_ID }
fn default_connect_timeout() -> u64 { 10_000 }
fn default_request_timeout() -> u64 { 60_000 }
fn default_max_idle() -> usize { 10 }
fn default_health_interval() -> u64 { 60_000 }
fn default_soft_limit() -> usize { 5000 }
fn default_true() -> bool { true }

impl ClientConfig {
    /// Create a configuration for the default service with the given key
    pub fn new(api_key: impl Into<SecretString>) -> Self {
        Self {
            api_key: api_key.into(),
            ..Default::default()
        }
    }

    /// Point the client at a different service root
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    /// Override the health probe cooldown
    pub fn with_health_interval(mut self, interval: Duration) -> Self {
        self.health.interval_ms = interval.as_millis() as u64;
        self
    }

    /// Health probe cooldown as a `Duration`
    pub fn health_interval(&self) -> Duration {
        Duration::from_millis(self.health.interval_ms)
    }

    /// Base URL with any trailing slash removed
    pub fn trimmed_base_url(&self) -> &str {
        self.base_url.trim_end_matches('/')
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.api_key.is_empty() {
            return Err(ValidationError::required("api_key")
                .with_context("A Player2 API key is required to send requests"));
        }

        if self.base_url.is_empty() {
            return Err(ValidationError::required("base_url"));
        }

        match url::Url::parse(&self.base_url) {
            Ok(url) => {
                if url.scheme() != "http" && url.scheme() != "https" {
                    return Err(ValidationError::invalid_url(
                        "base_url",
                        format!("URL scheme must be http or https, got: {}", url.scheme()),
                    ));
                }
            }
            Err(e) => return Err(ValidationError::invalid_url("base_url", e.to_string())),
        }

        self.connection.validate("connection")?;

        if self.health.interval_ms == 0 {
            return Err(ValidationError::out_of_range(
                "health.interval_ms",
                "Probe interval must be positive",
            ));
        }

        if self.dispatcher.soft_limit == 0 {
            return Err(ValidationError::out_of_range(
                "dispatcher.soft_limit",
                "Soft limit must be positive",
            ));
        }

        Ok(())
    }
}

impl ConnectionConfig {
    /// Validate connection settings
    pub fn validate(&self, path: &str) -> Result<(), ValidationError> {
        if self.connect_timeout_ms == 0 {
            return Err(ValidationError::out_of_range(
                format!("{}.connect_timeout_ms", path),
                "Timeout must be positive",
            ));
        }

        if self.request_timeout_ms == 0 {
            return Err(ValidationError::out_of_range(
                format!("{}.request_timeout_ms", path),
                "Timeout must be positive",
            ));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_match_player2_service() {
        let config = ClientConfig::default();
        assert_eq!(config.base_url, DEFAULT_BASE_URL);
        assert_eq!(
            config.game_client_id.to_string(),
            "019a8368-b00b-72bc-b367-2825079dc6fb"
        );
        assert_eq!(config.health_interval(), Duration::from_secs(60));
        assert_eq!(config.dispatcher.soft_limit, 5000);
    }

    #[test]
    fn test_missing_api_key_is_rejected() {
        let err = ClientConfig::default().validate().unwrap_err();
        assert_eq!(err.field_path, "api_key");
    }

    #[test]
    fn test_non_http_scheme_is_rejected() {
        let config = ClientConfig::new("key").with_base_url("ftp://example.com");
        let err = config.validate().unwrap_err();
        assert_eq!(err.field_path, "base_url");
    }

    #[test]
    fn test_zero_interval_is_rejected() {
        let mut config = ClientConfig::new("key");
        config.health.interval_ms = 0;
        let err = config.validate().unwrap_err();
        assert_eq!(err.field_path, "health.interval_ms");
    }

    #[test]
    fn test_trailing_slash_is_trimmed() {
        let config = ClientConfig::new("key").with_base_url("http://localhost:4315/v1/");
        assert_eq!(config.trimmed_base_url(), "http://localhost:4315/v1");
    }
}
