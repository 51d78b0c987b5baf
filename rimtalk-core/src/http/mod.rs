//! HTTP transport for the chat-completion service
//!
//! This module implements the HTTP layer for RimTalk, handling:
//! - Client construction and connection pooling
//! - Authentication and client-identification headers
//! - Buffered and streamed completion requests
//! - Error mapping, with quota exhaustion kept distinct

pub mod client;
pub mod error;

pub use client::ChatClient;

use crate::config::ClientConfig;
use crate::error::{ClientError, ClientResult};
use crate::protocol::{Payload, Turn};
use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue, AUTHORIZATION};
use reqwest::Client;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// `X-Game-Client-Id`: the registered game client identifier
pub const GAME_CLIENT_ID_HEADER: HeaderName = HeaderName::from_static("x-game-client-id");

/// Default user agent
const USER_AGENT: &str = concat!("rimtalk-core/", env!("CARGO_PKG_VERSION"));

/// The request surface consumed by prompt orchestration.
///
/// Both operations return `Ok(None)` when `session` is cancelled before
/// the request settles.
#[async_trait]
pub trait ChatExecutor: Send + Sync {
    /// Send a request and wait for the whole response
    async fn send_buffered(
        &self,
        instruction: &str,
        turns: &[Turn],
        session: &CancellationToken,
    ) -> ClientResult<Option<Payload>>;

    /// Send a streaming request, forwarding each text delta as it arrives
    async fn send_streaming(
        &self,
        instruction: &str,
        turns: &[Turn],
        on_delta: &mut (dyn for<'s> FnMut(&'s str) + Send),
        session: &CancellationToken,
    ) -> ClientResult<Option<Payload>>;
}

/// Build the pooled HTTP client from connection settings.
///
/// No whole-request timeout is set here: it applies per request to buffered
/// calls and probes only, so a long stream is never cut off mid-response.
pub fn build_http_client(config: &ClientConfig) -> ClientResult<Client> {
    Client::builder()
        .pool_max_idle_per_host(config.connection.max_idle_per_host)
        .pool_idle_timeout(Duration::from_secs(90))
        .connect_timeout(Duration::from_millis(config.connection.connect_timeout_ms))
        .user_agent(USER_AGENT)
        .gzip(true)
        .build()
        .map_err(|e| ClientError::Configuration(format!("Failed to create HTTP client: {}", e)))
}

/// Headers sent on every request: bearer token and game client id
pub fn auth_headers(config: &ClientConfig) -> ClientResult<HeaderMap> {
    let mut headers = HeaderMap::new();

    let mut bearer = HeaderValue::from_str(&format!("Bearer {}", config.api_key.expose_secret()))
        .map_err(|_| {
            ClientError::Configuration("API key contains invalid header characters".to_string())
        })?;
    bearer.set_sensitive(true);
    headers.insert(AUTHORIZATION, bearer);

    let client_id = HeaderValue::from_str(&config.game_client_id.to_string())
        .map_err(|e| ClientError::Configuration(format!("Invalid game client id: {}", e)))?;
    headers.insert(GAME_CLIENT_ID_HEADER, client_id);

    Ok(headers)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_auth_headers() {
        let headers = auth_headers(&ClientConfig::new("p2-key")).unwrap();
        assert_eq!(headers.get(AUTHORIZATION).unwrap(), "Bearer p2-key");
        assert!(headers.get(AUTHORIZATION).unwrap().is_sensitive());
        assert_eq!(
            headers.get(GAME_CLIENT_ID_HEADER).unwrap(),
            "019a8368-b00b-72bc-b367-2825079dc6fb"
        );
    }

    #[test]
    fn test_invalid_key_is_configuration_error() {
        let result = auth_headers(&ClientConfig::new("bad\nkey"));
        assert!(matches!(result, Err(ClientError::Configuration(_))));
    }
}
