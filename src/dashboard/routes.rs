//! Dashboard API route handlers.
//!
//! All endpoints return JSON except `/health`. State is shared via
//! `Arc<DashboardState>`.

use axum::{extract::State, http::StatusCode, Json};
use serde::Serialize;
use std::sync::Arc;

use crate::engine::watchdog::WatchdogMonitor;
use crate::engine::SharedStats;
use crate::types::TraderStats;

// ---------------------------------------------------------------------------
// Shared state
// ---------------------------------------------------------------------------

/// Shared state accessible by all route handlers.
pub struct DashboardState {
    pub stats: SharedStats,
    pub watchdog: Arc<WatchdogMonitor>,
}

impl DashboardState {
    pub fn new(stats: SharedStats, watchdog: Arc<WatchdogMonitor>) -> Self {
        Self { stats, watchdog }
    }
}

pub type AppState = Arc<DashboardState>;

// ---------------------------------------------------------------------------
// Response types
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize)]
pub struct StatusResponse {
    #[serde(flatten)]
    pub stats: TraderStats,
    pub idle_ms: u64,
    pub liveness_timeout_ms: u64,
    pub stale: bool,
    pub drains: u64,
    pub uptime_secs: i64,
}

// ---------------------------------------------------------------------------
// Route handlers
// ---------------------------------------------------------------------------

/// GET /api/status
pub async fn get_status(State(state): State<AppState>) -> Json<StatusResponse> {
    let stats = state.stats.read().await.clone();
    let uptime = (chrono::Utc::now() - stats.started_at).num_seconds();
    let wd = &state.watchdog;

    Json(StatusResponse {
        stats,
        idle_ms: wd.idle().as_millis() as u64,
        liveness_timeout_ms: wd.config().timeout.as_millis() as u64,
        stale: wd.is_stale(),
        drains: wd.drains(),
        uptime_secs: uptime,
    })
}

/// GET /health. 503 once the watchdog considers the trader stalled.
pub async fn health(State(state): State<AppState>) -> (StatusCode, &'static str) {
    if state.watchdog.is_stale() {
        (StatusCode::SERVICE_UNAVAILABLE, "stale")
    } else {
        (StatusCode::OK, "ok")
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
