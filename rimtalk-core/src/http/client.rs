//! Player2 chat client implementation using reqwest

use crate::config::ClientConfig;
use crate::error::{ClientError, ClientResult};
use crate::health::{HealthMonitor, MonitorHandle};
use crate::http::error::map_http_error;
use crate::http::{auth_headers, build_http_client, ChatExecutor};
use crate::protocol::{build_messages, CompletionResponse, Payload, RequestEnvelope, Turn};
use crate::stream::{JsonObjectStream, StreamPipeline};
use async_trait::async_trait;
use futures_util::StreamExt;
use reqwest::header::{HeaderMap, HeaderValue, CONTENT_TYPE};
use reqwest::{Client, Response};
use serde::de::DeserializeOwned;
use std::future::Future;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};
use uuid::Uuid;

/// Client for the Player2 chat-completion service.
///
/// Every send first passes the health gate, then posts to
/// `{base}/chat/completions`. Each streaming call owns its own decoding
/// pipeline, so concurrent calls on one client never share line state.
#[derive(Debug)]
pub struct ChatClient {
    http: Client,
    completions_url: String,
    headers: HeaderMap,
    request_timeout: Duration,
    monitor: Arc<HealthMonitor>,
    monitor_handle: Mutex<Option<MonitorHandle>>,
}

impl ChatClient {
    /// Create a client from its configuration. Nothing is sent until the
    /// first request or until monitoring is started.
    pub fn new(config: ClientConfig) -> ClientResult<Self> {
        let http = build_http_client(&config)?;

        let mut headers = auth_headers(&config)?;
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

        let monitor = HealthMonitor::with_http_client(http.clone(), &config)?;
        debug!(
            "Player2 client created for {} (api key: {}, game client: {})",
            config.trimmed_base_url(),
            config.api_key.partial_redact(),
            config.game_client_id
        );

        Ok(Self {
            http,
            completions_url: format!("{}/chat/completions", config.trimmed_base_url()),
            headers,
            request_timeout: Duration::from_millis(config.connection.request_timeout_ms),
            monitor: Arc::new(monitor),
            monitor_handle: Mutex::new(None),
        })
    }

    /// The availability monitor scoped to this client
    pub fn health(&self) -> &Arc<HealthMonitor> {
        &self.monitor
    }

    /// Start background health probing for the lifetime of `session`.
    ///
    /// Returns false when a loop is already running or cannot be started.
    pub fn start_monitoring(&self, session: &CancellationToken) -> bool {
        let mut slot = self.monitor_handle.lock().unwrap_or_else(|p| p.into_inner());
        if slot.as_ref().is_some_and(|h| !h.is_finished()) {
            return false;
        }

        match self.monitor.start(session) {
            Some(handle) => {
                *slot = Some(handle);
                true
            }
            None => false,
        }
    }

    /// Stop background health probing, if running
    pub fn stop_monitoring(&self) {
        let handle = self
            .monitor_handle
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .take();
        if let Some(handle) = handle {
            handle.stop();
        }
    }

    /// Send a request and wait for the complete response.
    ///
    /// Returns `Ok(None)` if `session` is cancelled first.
    pub async fn send_buffered(
        &self,
        instruction: &str,
        turns: &[Turn],
        session: &CancellationToken,
    ) -> ClientResult<Option<Payload>> {
        let body = prepare_body(instruction, turns, false)?;
        let request_id = Uuid::new_v4();

        until_session_ends(session, request_id, self.execute_buffered(body, request_id)).await
    }

    /// Send a streaming request, invoking `on_delta` with each non-empty
    /// text increment in arrival order.
    ///
    /// Returns `Ok(None)` if `session` is cancelled first.
    pub async fn send_streaming<F>(
        &self,
        instruction: &str,
        turns: &[Turn],
        on_delta: F,
        session: &CancellationToken,
    ) -> ClientResult<Option<Payload>>
    where
        F: FnMut(&str) + Send,
    {
        let body = prepare_body(instruction, turns, true)?;
        let request_id = Uuid::new_v4();

        until_session_ends(
            session,
            request_id,
            self.execute_streaming(body, request_id, on_delta),
        )
        .await
    }

    /// Streaming request whose text is a JSON array of objects; each object
    /// is deserialized as `T` and handed to `on_item` as soon as it closes.
    pub async fn send_streaming_json<T, F>(
        &self,
        instruction: &str,
        turns: &[Turn],
        mut on_item: F,
        session: &CancellationToken,
    ) -> ClientResult<Option<Payload>>
    where
        T: DeserializeOwned,
        F: FnMut(T) + Send,
    {
        let mut parser = JsonObjectStream::<T>::new();
        let on_delta = move |delta: &str| {
            for item in parser.push(delta) {
                on_item(item);
            }
        };

        self.send_streaming(instruction, turns, on_delta, session)
            .await
    }

    async fn execute_buffered(&self, body: String, request_id: Uuid) -> ClientResult<Payload> {
        self.monitor.ensure_fresh().await;

        let response = self.post(&body, request_id, false).await?;
        let status = response.status();
        let text = response.text().await.map_err(|e| {
            error!("Failed to read Player2 response body [request_id: {}]: {}", request_id, e);
            ClientError::from(e)
        })?;
        debug!("Player2 API response: {} [request_id: {}]\n{}", status.as_u16(), request_id, text);

        let completion: CompletionResponse = serde_json::from_str(&text).map_err(|e| {
            error!("Failed to parse Player2 response [request_id: {}]: {}", request_id, e);
            ClientError::request_failed(
                Some(status.as_u16()),
                format!("Invalid response format: {} [request_id: {}]", e, request_id),
            )
        })?;

        let content = completion.first_content().unwrap_or_default().to_string();
        let tokens = completion.total_tokens();
        Ok(Payload::new(body, content, tokens))
    }

    async fn execute_streaming<F>(
        &self,
        body: String,
        request_id: Uuid,
        on_delta: F,
    ) -> ClientResult<Payload>
    where
        F: FnMut(&str) + Send,
    {
        self.monitor.ensure_fresh().await;

        let response = self.post(&body, request_id, true).await?;
        let mut pipeline = StreamPipeline::new(on_delta);
        let mut bytes = response.bytes_stream();

        while let Some(delivery) = bytes.next().await {
            let delivery = delivery.map_err(|e| {
                error!("Player2 streaming request failed [request_id: {}]: {}", request_id, e);
                ClientError::from(e)
            })?;
            pipeline.receive(&delivery);
        }

        let summary = pipeline.finish();
        debug!(
            "Player2 streaming response completed. Tokens: {} (id: {:?}, finish_reason: {:?}) [request_id: {}]",
            summary.total_tokens, summary.id, summary.finish_reason, request_id
        );

        Ok(Payload::new(body, summary.full_text, summary.total_tokens))
    }

    /// POST the body and turn any non-success status into an error
    async fn post(&self, body: &str, request_id: Uuid, streaming: bool) -> ClientResult<Response> {
        let mode = if streaming { "streaming " } else { "" };
        debug!(
            "Player2 API {}request: {} [request_id: {}]\n{}",
            mode, self.completions_url, request_id, body
        );

        let mut request = self
            .http
            .post(&self.completions_url)
            .headers(self.headers.clone())
            .body(body.to_string());
        if !streaming {
            request = request.timeout(self.request_timeout);
        }

        let response = request
            .send()
            .await
            .map_err(|e| {
                error!("Player2 {}request failed [request_id: {}]: {}", mode, request_id, e);
                ClientError::from(e)
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.ok();
            error!(
                "Player2 {}request failed: {} [request_id: {}]",
                mode,
                status.as_u16(),
                request_id
            );
            return Err(map_http_error(status, body, request_id));
        }

        Ok(response)
    }
}

impl Drop for ChatClient {
    fn drop(&mut self) {
        self.stop_monitoring();
    }
}

#[async_trait]
impl ChatExecutor for ChatClient {
    async fn send_buffered(
        &self,
        instruction: &str,
        turns: &[Turn],
        session: &CancellationToken,
    ) -> ClientResult<Option<Payload>> {
        ChatClient::send_buffered(self, instruction, turns, session).await
    }

    async fn send_streaming(
        &self,
        instruction: &str,
        turns: &[Turn],
        on_delta: &mut (dyn for<'s> FnMut(&'s str) + Send),
        session: &CancellationToken,
    ) -> ClientResult<Option<Payload>> {
        ChatClient::send_streaming(self, instruction, turns, on_delta, session).await
    }
}

/// Build and serialize the request envelope
fn prepare_body(instruction: &str, turns: &[Turn], stream: bool) -> ClientResult<String> {
    let messages = build_messages(instruction, turns)?;
    Ok(RequestEnvelope::new(messages, stream).to_json()?)
}

/// Race a request against the end of the governing session
async fn until_session_ends<Fut>(
    session: &CancellationToken,
    request_id: Uuid,
    request: Fut,
) -> ClientResult<Option<Payload>>
where
    Fut: Future<Output = ClientResult<Payload>>,
{
    tokio::select! {
        biased;
        _ = session.cancelled() => {
            info!("Session ended before Player2 request settled [request_id: {}]", request_id);
            Ok(None)
        }
        result = request => result.map(Some),
    }
}
