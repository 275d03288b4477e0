//! Liveness watchdog.
//!
//! Tracks the time of the last confirmed trade. When that is older than
//! the configured timeout the watchdog warns, waits out a grace period,
//! and then reports [`TraderError::LivenessTimeout`] so the binary can
//! exit and let its supervisor restart it.
//!
//! Only a confirmed swap counts as activity. Blocks arriving or cycles
//! skipping below the threshold do not, so a long quiet market ends up
//! looking exactly like a stalled connection.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tokio::time::Instant;
use tracing::{error, info, warn};

use crate::types::TraderError;

#[derive(Debug, Clone)]
pub struct WatchdogConfig {
    /// Maximum time without a confirmed trade before draining.
    pub timeout: Duration,
    /// How long the drain phase waits before giving up.
    pub grace_period: Duration,
}

impl Default for WatchdogConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(60),
            grace_period: Duration::from_secs(60),
        }
    }
}

/// Process-wide liveness state, shared by `Arc` between the decision
/// loop, the confirmation watchers and the dashboard.
#[derive(Debug)]
pub struct WatchdogMonitor {
    config: WatchdogConfig,
    origin: Instant,
    /// Milliseconds since `origin` of the last confirmed trade.
    last_activity_ms: AtomicU64,
    drains: AtomicU64,
}

impl WatchdogMonitor {
    /// Start the clock now; construction counts as the initial activity.
    pub fn new(config: WatchdogConfig) -> Self {
        Self {
            config,
            origin: Instant::now(),
            last_activity_ms: AtomicU64::new(0),
            drains: AtomicU64::new(0),
        }
    }

    pub fn config(&self) -> &WatchdogConfig {
        &self.config
    }

    fn now_ms(&self) -> u64 {
        self.origin.elapsed().as_millis() as u64
    }

    /// Record a confirmed trade. Never moves the timestamp backwards.
    pub fn mark_activity(&self) {
        let now = self.now_ms();
        self.last_activity_ms.fetch_max(now, Ordering::SeqCst);
    }

    /// Milliseconds since `origin` of the last confirmed trade.
    pub fn last_activity_ms(&self) -> u64 {
        self.last_activity_ms.load(Ordering::SeqCst)
    }

    /// Time since the last confirmed trade.
    pub fn idle(&self) -> Duration {
        Duration::from_millis(self.now_ms().saturating_sub(self.last_activity_ms()))
    }

    pub fn is_stale(&self) -> bool {
        self.idle() > self.config.timeout
    }

    /// Number of drain phases entered since start.
    pub fn drains(&self) -> u64 {
        self.drains.load(Ordering::SeqCst)
    }

    /// No-op while fresh. Once stale, warns, sleeps the grace period and
    /// re-checks; still stale after that is a fatal timeout.
    pub async fn check_liveness(&self) -> Result<(), TraderError> {
        if !self.is_stale() {
            return Ok(());
        }

        self.drains.fetch_add(1, Ordering::SeqCst);
        warn!(
            idle_ms = self.idle().as_millis() as u64,
            timeout_ms = self.config.timeout.as_millis() as u64,
            grace_secs = self.config.grace_period.as_secs(),
            "No confirmed trade within liveness timeout, shutting down after grace period unless one confirms"
        );

        tokio::time::sleep(self.config.grace_period).await;

        if self.is_stale() {
            let idle_ms = self.idle().as_millis() as u64;
            error!(idle_ms, "Watchdog grace period exhausted, exiting");
            return Err(TraderError::LivenessTimeout {
                idle_ms,
                timeout_ms: self.config.timeout.as_millis() as u64,
            });
        }

        info!("Trade confirmed during grace period, watchdog recovered");
        Ok(())
    }
}
