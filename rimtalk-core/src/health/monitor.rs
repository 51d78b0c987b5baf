//! Health probes, the pre-request gate, and the background probe loop

use super::HealthState;
use crate::config::{ClientConfig, SecretString};
use crate::error::ClientResult;
use crate::http::{auth_headers, build_http_client};
use reqwest::header::HeaderMap;
use reqwest::{Client, StatusCode};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Mutex as AsyncMutex;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

/// Result of a single probe. Probes never fail the caller; the outcome is
/// only logged and reported.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProbeOutcome {
    /// The endpoint answered 200
    Healthy,
    /// The endpoint answered with another status
    Unhealthy { status: u16 },
    /// The request did not complete
    Failed(String),
    /// No API key is configured, nothing was sent
    Skipped,
}

/// Probes `GET {base}/health` and tracks freshness for one client
#[derive(Debug)]
pub struct HealthMonitor {
    http: Client,
    url: String,
    headers: HeaderMap,
    api_key: SecretString,
    interval: Duration,
    request_timeout: Duration,
    loop_enabled: bool,
    state: Arc<HealthState>,
    /// Serializes probes so the gate and the loop never probe concurrently
    probe_lock: AsyncMutex<()>,
    probes_sent: AtomicU64,
}

impl HealthMonitor {
    /// Create a monitor with its own HTTP client
    pub fn new(config: &ClientConfig) -> ClientResult<Self> {
        Self::with_http_client(build_http_client(config)?, config)
    }

    /// Create a monitor sharing an existing connection pool
    pub fn with_http_client(http: Client, config: &ClientConfig) -> ClientResult<Self> {
        Ok(Self {
            http,
            url: format!("{}/health", config.trimmed_base_url()),
            headers: auth_headers(config)?,
            api_key: config.api_key.clone(),
            interval: config.health_interval(),
            request_timeout: Duration::from_millis(config.connection.request_timeout_ms),
            loop_enabled: config.health.enabled,
            state: Arc::new(HealthState::new()),
            probe_lock: AsyncMutex::new(()),
            probes_sent: AtomicU64::new(0),
        })
    }

    pub fn state(&self) -> &Arc<HealthState> {
        &self.state
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Number of probe requests actually sent
    pub fn probes_sent(&self) -> u64 {
        self.probes_sent.load(Ordering::Relaxed)
    }

    /// Probe the health endpoint once
    pub async fn probe(&self) -> ProbeOutcome {
        let _guard = self.probe_lock.lock().await;
        self.probe_locked().await
    }

    /// Probe synchronously if the last probe is older than the interval.
    ///
    /// Returns `None` when the state was fresh and nothing was sent.
    pub async fn ensure_fresh(&self) -> Option<ProbeOutcome> {
        if !self.state.is_stale(self.interval, Instant::now()) {
            return None;
        }

        let _guard = self.probe_lock.lock().await;

        // Another caller may have probed while we waited for the lock
        if !self.state.is_stale(self.interval, Instant::now()) {
            return None;
        }

        Some(self.probe_locked().await)
    }

    async fn probe_locked(&self) -> ProbeOutcome {
        if self.api_key.is_empty() {
            debug!("Skipping Player2 health check: no API key configured");
            return ProbeOutcome::Skipped;
        }

        self.probes_sent.fetch_add(1, Ordering::Relaxed);
        let result = self
            .http
            .get(&self.url)
            .headers(self.headers.clone())
            .timeout(self.request_timeout)
            .send()
            .await;

        self.state.record_probe(Instant::now());

        match result {
            Ok(response) if response.status() == StatusCode::OK => {
                debug!("Player2 health check successful");
                ProbeOutcome::Healthy
            }
            Ok(response) => {
                let status = response.status();
                let body = response.text().await.unwrap_or_default();
                warn!("Player2 health check failed: {} - {}", status.as_u16(), body);
                ProbeOutcome::Unhealthy {
                    status: status.as_u16(),
                }
            }
            Err(e) => {
                warn!("Player2 health check exception: {}", e);
                ProbeOutcome::Failed(e.to_string())
            }
        }
    }

    /// Start the background probe loop.
    ///
    /// The loop waits one interval, probes, and repeats until the handle is
    /// stopped or `session` is cancelled. Returns `None` without starting
    /// anything when a loop is already running, the loop is disabled, or
    /// no API key is configured.
    pub fn start(self: &Arc<Self>, session: &CancellationToken) -> Option<MonitorHandle> {
        if !self.loop_enabled {
            debug!("Player2 health check loop disabled by configuration");
            return None;
        }

        if self.interval.is_zero() {
            warn!("Not starting Player2 health check loop: interval is zero");
            return None;
        }

        if self.api_key.is_empty() {
            debug!("Not starting Player2 health check loop: no API key configured");
            return None;
        }

        if !self.state.try_activate() {
            debug!("Player2 health check loop already running");
            return None;
        }

        let stop = CancellationToken::new();
        let task = tokio::spawn(Arc::clone(self).run(session.clone(), stop.clone()));
        debug!("Player2 health check loop started (interval {:?})", self.interval);

        Some(MonitorHandle {
            stop,
            state: Arc::clone(&self.state),
            task,
        })
    }

    async fn run(self: Arc<Self>, session: CancellationToken, stop: CancellationToken) {
        let start = tokio::time::Instant::now() + self.interval;
        let mut ticker = tokio::time::interval_at(start, self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = stop.cancelled() => break,
                _ = session.cancelled() => {
                    self.state.deactivate();
                    break;
                }
                _ = ticker.tick() => {}
            }

            if !self.state.is_active() {
                break;
            }

            tokio::select! {
                _ = stop.cancelled() => break,
                _ = session.cancelled() => {
                    self.state.deactivate();
                    break;
                }
                _ = self.probe() => {}
            }
        }

        debug!("Player2 health check loop stopped");
    }
}

/// Owner of a running background probe loop
#[derive(Debug)]
pub struct MonitorHandle {
    stop: CancellationToken,
    state: Arc<HealthState>,
    task: JoinHandle<()>,
}

impl MonitorHandle {
    /// Deactivate the loop. It does not restart on its own.
    pub fn stop(&self) {
        self.state.deactivate();
        self.stop.cancel();
    }

    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }

    /// Wait for the loop task to exit
    pub async fn join(self) {
        if let Err(e) = self.task.await {
            warn!("Player2 health check loop ended abnormally: {}", e);
        }
    }
}
