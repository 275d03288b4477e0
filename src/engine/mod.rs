//! Core engine: the block-driven decide, swap, confirm loop.
//!
//! - `decision`: one cycle per block, owns the sample window
//! - `executor`: swap submission and confirmation tracking
//! - `watchdog`: liveness monitor that ends a stalled process

pub mod decision;
pub mod executor;
pub mod watchdog;

use std::sync::Arc;
use tokio::sync::RwLock;

use crate::types::TraderStats;

/// Running counters, written by the decision loop and read by the dashboard.
pub type SharedStats = Arc<RwLock<TraderStats>>;
