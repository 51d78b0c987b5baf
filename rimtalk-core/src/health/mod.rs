//! Availability monitoring for the chat-completion service
//!
//! Each client owns a [`HealthState`] recording when the health endpoint
//! was last probed. The [`HealthMonitor`] keeps it fresh in two ways: a
//! background loop started explicitly with [`HealthMonitor::start`], and
//! the [`HealthMonitor::ensure_fresh`] gate run before every request.

mod monitor;

pub use monitor::{HealthMonitor, MonitorHandle, ProbeOutcome};

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;
use std::time::{Duration, Instant};

/// Per-client availability state
#[derive(Debug, Default)]
pub struct HealthState {
    last_probed: Mutex<Option<Instant>>,
    active: AtomicBool,
}

impl HealthState {
    pub fn new() -> Self {
        Self::default()
    }

    /// When the last probe settled, whatever its outcome
    pub fn last_probed(&self) -> Option<Instant> {
        *self.last_probed.lock().unwrap_or_else(|p| p.into_inner())
    }

    pub fn record_probe(&self, at: Instant) {
        *self.last_probed.lock().unwrap_or_else(|p| p.into_inner()) = Some(at);
    }

    /// True when no probe has happened within `interval` of `now`
    pub fn is_stale(&self, interval: Duration, now: Instant) -> bool {
        match self.last_probed() {
            Some(at) => now.saturating_duration_since(at) > interval,
            None => true,
        }
    }

    /// Whether a background loop is currently running
    pub fn is_active(&self) -> bool {
        self.active.load(Ordering::Acquire)
    }

    /// Claim the background loop slot; false if it is already taken
    fn try_activate(&self) -> bool {
        self.active
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }

    fn deactivate(&self) {
        self.active.store(false, Ordering::Release);
    }
}
