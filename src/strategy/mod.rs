//! Strategy: the mean-plus-deviation entry rule and its slippage bound.

pub mod slippage;
pub mod stats;

use ethers::types::U256;
use tracing::debug;

use crate::types::{Quote, TraderError};
use stats::SampleWindow;

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

/// Parameters of the mean-plus-deviation entry rule.
#[derive(Debug, Clone)]
pub struct StrategyParams {
    /// Fixed input amount quoted and swapped every cycle (token base units).
    pub trade_amount: U256,
    /// Decimals used when rendering amounts in logs.
    pub token_decimals: u32,
    /// Tolerance subtracted from the quote to get the minimum output.
    pub slippage_percent: u32,
    /// Number of recent quotes kept in the window.
    pub window_size: usize,
    /// Standard deviations above the mean, in percent. Truncated to whole
    /// deviations, so 150 means 1 sd.
    pub threshold_multiplier_percent: u32,
    /// Refuse to trade when the account balance is below `trade_amount`.
    pub enforce_balance_check: bool,
}

impl Default for StrategyParams {
    fn default() -> Self {
        Self {
            trade_amount: U256::exp10(17) * U256::from(3u8), // 0.3 tokens at 18 decimals
            token_decimals: 18,
            slippage_percent: 60,
            window_size: 20,
            threshold_multiplier_percent: 150,
            enforce_balance_check: true,
        }
    }
}

// ---------------------------------------------------------------------------
// Signal
// ---------------------------------------------------------------------------

/// What the entry rule says about one quote.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Signal {
    /// No baseline yet; record the quote and do nothing else.
    Seed,
    /// Quote below the threshold.
    Skip { threshold: U256 },
    /// Quote at or above the threshold; swap with at least `min_out`.
    Trade { threshold: U256, min_out: U256 },
}

impl Signal {
    pub fn threshold(&self) -> Option<U256> {
        match self {
            Signal::Seed => None,
            Signal::Skip { threshold } | Signal::Trade { threshold, .. } => Some(*threshold),
        }
    }
}

// ---------------------------------------------------------------------------
// Strategy
// ---------------------------------------------------------------------------

/// Evaluates quotes against the window baseline.
///
/// The strategy never mutates the window: callers evaluate against the
/// window as it stood before the quote and append afterwards.
pub struct ThresholdStrategy {
    params: StrategyParams,
}

impl ThresholdStrategy {
    pub fn new(params: StrategyParams) -> Self {
        Self { params }
    }

    pub fn params(&self) -> &StrategyParams {
        &self.params
    }

    /// An empty window sized for these parameters.
    pub fn empty_window(&self) -> SampleWindow {
        SampleWindow::new(self.params.window_size)
    }

    pub fn evaluate(&self, window: &SampleWindow, quote: Quote) -> Result<Signal, TraderError> {
        let threshold = match window.threshold(self.params.threshold_multiplier_percent) {
            Ok(t) => t,
            Err(TraderError::EmptyWindow) => return Ok(Signal::Seed),
            Err(e) => return Err(e),
        };

        if quote < threshold {
            debug!(%quote, %threshold, "Quote below threshold");
            return Ok(Signal::Skip { threshold });
        }

        let min_out = slippage::min_acceptable(quote, self.params.slippage_percent)?;
        Ok(Signal::Trade { threshold, min_out })
    }

    /// Whether `balance` covers one trade. Always true when the guard is off.
    pub fn balance_sufficient(&self, balance: U256) -> bool {
        !self.params.enforce_balance_check || balance >= self.params.trade_amount
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
