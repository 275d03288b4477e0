//! Shared types for the auction trader.
//!
//! These types form the data model used across the strategy, engine,
//! chain and dashboard modules, so none of those need to depend on
//! each other for plain data.

use chrono::{DateTime, Utc};
use ethers::types::{H256, U256};
use serde::{Deserialize, Serialize};
use std::fmt;

/// A quoted output amount for the fixed trade amount.
pub type Quote = U256;

// ---------------------------------------------------------------------------
// Block events
// ---------------------------------------------------------------------------

/// A new-block notification delivered by the block feed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlockEvent {
    pub hash: H256,
    pub received_at: DateTime<Utc>,
}

impl BlockEvent {
    pub fn new(hash: H256) -> Self {
        Self {
            hash,
            received_at: Utc::now(),
        }
    }
}

// ---------------------------------------------------------------------------
// Transactions
// ---------------------------------------------------------------------------

/// A submitted swap whose on-chain outcome is not yet known.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingSwap {
    pub nonce: U256,
    pub hash: H256,
    pub amount_in: U256,
    pub min_out: U256,
    pub submitted_at: DateTime<Utc>,
}

impl fmt::Display for PendingSwap {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "nonce {} hash {:?}", self.nonce, self.hash)
    }
}

/// Receipt data for a swap that was mined successfully.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ConfirmedSwap {
    pub block_number: Option<u64>,
    pub gas_used: Option<U256>,
}

/// Final outcome of a submitted swap. Written exactly once per swap.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TxOutcome {
    Confirmed(ConfirmedSwap),
    Failed { reason: String },
}

impl TxOutcome {
    pub fn is_confirmed(&self) -> bool {
        matches!(self, TxOutcome::Confirmed(_))
    }
}

impl fmt::Display for TxOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TxOutcome::Confirmed(c) => match c.block_number {
                Some(n) => write!(f, "confirmed in block {n}"),
                None => write!(f, "confirmed"),
            },
            TxOutcome::Failed { reason } => write!(f, "failed: {reason}"),
        }
    }
}

// ---------------------------------------------------------------------------
// Cycle reporting
// ---------------------------------------------------------------------------

/// What a single decision cycle ended up doing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CycleOutcome {
    /// Window was empty; the quote seeded it and no trade was evaluated.
    Seeded,
    /// Quote stayed below the threshold.
    Skipped,
    /// Quote cleared the threshold but the balance guard refused the trade.
    InsufficientBalance { balance: U256 },
    /// Swap could not be submitted; confirmation tracking was skipped.
    SubmissionFailed { reason: String },
    /// Swap was submitted and mined successfully.
    Confirmed { swap: PendingSwap, polls: u64 },
    /// Swap was submitted but reverted or was dropped.
    Reverted {
        swap: PendingSwap,
        polls: u64,
        reason: String,
    },
    /// A read failed or arithmetic overflowed; the sample was not recorded.
    Aborted { reason: String },
}

impl CycleOutcome {
    pub fn label(&self) -> &'static str {
        match self {
            CycleOutcome::Seeded => "seeded",
            CycleOutcome::Skipped => "skipped",
            CycleOutcome::InsufficientBalance { .. } => "insufficient_balance",
            CycleOutcome::SubmissionFailed { .. } => "submission_failed",
            CycleOutcome::Confirmed { .. } => "confirmed",
            CycleOutcome::Reverted { .. } => "reverted",
            CycleOutcome::Aborted { .. } => "aborted",
        }
    }

    /// Whether the quote cleared the threshold this cycle.
    pub fn triggered(&self) -> bool {
        matches!(
            self,
            CycleOutcome::InsufficientBalance { .. }
                | CycleOutcome::SubmissionFailed { .. }
                | CycleOutcome::Confirmed { .. }
                | CycleOutcome::Reverted { .. }
        )
    }
}

impl fmt::Display for CycleOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Summary of one block-triggered decision cycle.
#[derive(Debug, Clone)]
pub struct CycleReport {
    pub cycle_number: u64,
    pub block: Option<H256>,
    pub quote: Option<Quote>,
    pub threshold: Option<U256>,
    pub outcome: CycleOutcome,
    pub timestamp: DateTime<Utc>,
}

impl fmt::Display for CycleReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let quote = self.quote.map(|q| q.to_string()).unwrap_or_else(|| "-".into());
        let threshold = self
            .threshold
            .map(|t| t.to_string())
            .unwrap_or_else(|| "-".into());
        write!(
            f,
            "Cycle #{}: quote={} threshold={} outcome={}",
            self.cycle_number, quote, threshold, self.outcome,
        )
    }
}

// ---------------------------------------------------------------------------
// Running statistics (memory only)
// ---------------------------------------------------------------------------

/// Counters accumulated since process start. Never persisted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TraderStats {
    pub cycles: u64,
    pub triggers: u64,
    pub submissions: u64,
    pub confirmed: u64,
    pub reverted: u64,
    pub submission_failures: u64,
    pub aborted: u64,
    /// Decimal string; `U256` does not fit in JSON numbers.
    pub last_quote: Option<String>,
    pub last_threshold: Option<String>,
    pub window_len: usize,
    pub started_at: DateTime<Utc>,
}

impl TraderStats {
    pub fn new() -> Self {
        Self {
            cycles: 0,
            triggers: 0,
            submissions: 0,
            confirmed: 0,
            reverted: 0,
            submission_failures: 0,
            aborted: 0,
            last_quote: None,
            last_threshold: None,
            window_len: 0,
            started_at: Utc::now(),
        }
    }

    /// Fold one cycle report into the counters.
    pub fn record(&mut self, report: &CycleReport, window_len: usize) {
        self.cycles += 1;
        if report.outcome.triggered() {
            self.triggers += 1;
        }
        match &report.outcome {
            CycleOutcome::Confirmed { .. } => {
                self.submissions += 1;
                self.confirmed += 1;
            }
            CycleOutcome::Reverted { .. } => {
                self.submissions += 1;
                self.reverted += 1;
            }
            CycleOutcome::SubmissionFailed { .. } => self.submission_failures += 1,
            CycleOutcome::Aborted { .. } => self.aborted += 1,
            _ => {}
        }
        if let Some(q) = report.quote {
            self.last_quote = Some(q.to_string());
        }
        self.last_threshold = report.threshold.map(|t| t.to_string());
        self.window_len = window_len;
    }
}

impl Default for TraderStats {
    fn default() -> Self {
        Self::new()
    }
}

// ---------------------------------------------------------------------------
// Error types
// ---------------------------------------------------------------------------

/// Domain errors for the trading loop.
#[derive(Debug, thiserror::Error)]
pub enum TraderError {
    #[error("RPC read failed ({call}): {message}")]
    Network { call: &'static str, message: String },

    #[error("Swap submission rejected: {0}")]
    Submission(String),

    #[error("Swap failed on-chain ({hash:?}): {message}")]
    Confirmation { hash: H256, message: String },

    #[error("Threshold requested on an empty sample window")]
    EmptyWindow,

    #[error("No confirmed trade for {idle_ms}ms (limit {timeout_ms}ms), grace period exhausted")]
    LivenessTimeout { idle_ms: u64, timeout_ms: u64 },

    #[error("Arithmetic overflow in {0}")]
    Overflow(&'static str),

    #[error("Block feed closed")]
    FeedClosed,
}

impl TraderError {
    /// Errors that must end the process rather than just the current cycle.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            TraderError::LivenessTimeout { .. } | TraderError::FeedClosed
        )
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
