//! Decision loop: one cycle per block.
//!
//! Each cycle: liveness check, read quote and balance, compare the quote
//! with the threshold of the window as it stood before this cycle, trade or
//! skip, then append the quote. Cycles never overlap; blocks that arrive
//! while a cycle is running are discarded so the next cycle starts on a
//! fresh block.

use chrono::Utc;
use ethers::types::{H256, U256};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

use super::executor::TransactionExecutor;
use super::watchdog::WatchdogMonitor;
use super::SharedStats;
use crate::chain::AuctionVenue;
use crate::strategy::stats::SampleWindow;
use crate::strategy::{Signal, ThresholdStrategy};
use crate::types::{
    BlockEvent, CycleOutcome, CycleReport, Quote, TraderError, TxOutcome,
};

pub struct DecisionLoop {
    venue: Arc<dyn AuctionVenue>,
    strategy: ThresholdStrategy,
    executor: TransactionExecutor,
    watchdog: Arc<WatchdogMonitor>,
    window: SampleWindow,
    /// Confirmation poll interval and below-threshold pause.
    poll_interval: Duration,
    cycle_count: u64,
    stats: SharedStats,
}

impl DecisionLoop {
    pub fn new(
        venue: Arc<dyn AuctionVenue>,
        strategy: ThresholdStrategy,
        watchdog: Arc<WatchdogMonitor>,
        poll_interval: Duration,
    ) -> Self {
        let executor = TransactionExecutor::new(Arc::clone(&venue), Arc::clone(&watchdog));
        let window = strategy.empty_window();
        Self {
            venue,
            strategy,
            executor,
            watchdog,
            window,
            poll_interval,
            cycle_count: 0,
            stats: SharedStats::default(),
        }
    }

    /// Start from an existing window instead of an empty one.
    pub fn with_window(mut self, window: SampleWindow) -> Self {
        self.window = window;
        self
    }

    pub fn window(&self) -> &SampleWindow {
        &self.window
    }

    pub fn cycle_count(&self) -> u64 {
        self.cycle_count
    }

    /// Handle to the running counters, for the dashboard.
    pub fn stats(&self) -> SharedStats {
        Arc::clone(&self.stats)
    }

    fn fmt_amount(&self, v: U256) -> String {
        let decimals = self.strategy.params().token_decimals;
        ethers::utils::format_units(v, decimals).unwrap_or_else(|_| v.to_string())
    }

    /// Read one quote and put it in the window. Used once at startup.
    pub async fn seed(&mut self) -> Result<Quote, TraderError> {
        let quote = self.venue.quote(self.strategy.params().trade_amount).await?;
        self.window.push(quote);
        info!(
            quote = %self.fmt_amount(quote),
            window = self.window.len(),
            "Window seeded"
        );
        Ok(quote)
    }

    /// Consume block events until a fatal error.
    ///
    /// If no block shows up for a whole liveness timeout the watchdog is
    /// checked anyway, so a dead feed cannot hide a stall.
    pub async fn run(&mut self, mut blocks: mpsc::Receiver<BlockEvent>) -> Result<(), TraderError> {
        let idle_check = self.watchdog.config().timeout;
        info!(
            window = self.window.len(),
            capacity = self.window.capacity(),
            "Decision loop started"
        );

        loop {
            let block = tokio::select! {
                event = blocks.recv() => match event {
                    Some(event) => Some(event),
                    None => {
                        error!("Block feed closed");
                        return Err(TraderError::FeedClosed);
                    }
                },
                _ = tokio::time::sleep(idle_check) => None,
            };

            match block {
                Some(event) => {
                    debug!(
                        block = ?event.hash,
                        queued_ms = (Utc::now() - event.received_at).num_milliseconds(),
                        "Block received"
                    );
                    match self.run_cycle(Some(event.hash)).await {
                        Ok(report) => log_cycle_report(&report),
                        Err(e) if e.is_fatal() => return Err(e),
                        Err(e) => warn!(error = %e, "Cycle failed, waiting for next block"),
                    }
                }
                None => {
                    warn!(
                        waited_ms = idle_check.as_millis() as u64,
                        "No block received within liveness timeout"
                    );
                    self.watchdog.check_liveness().await?;
                }
            }

            let stale = drain_pending(&mut blocks);
            if stale > 0 {
                debug!(stale, "Discarded blocks that arrived mid-cycle");
            }
        }
    }

    /// Run one full cycle. Only fatal errors are returned as `Err`;
    /// everything else ends up in the report's outcome.
    pub async fn run_cycle(&mut self, block: Option<H256>) -> Result<CycleReport, TraderError> {
        self.cycle_count += 1;
        let cycle = self.cycle_count;

        self.watchdog.check_liveness().await?;

        let amount_in = self.strategy.params().trade_amount;
        let (quote, balance) = match self.read_market(amount_in).await {
            Ok(v) => v,
            Err(e) => {
                warn!(cycle, error = %e, "Market read failed, retrying next block");
                let outcome = CycleOutcome::Aborted {
                    reason: e.to_string(),
                };
                return Ok(self.finish(cycle, block, None, None, outcome).await);
            }
        };

        // Evaluated against the window before this quote goes in.
        let signal = match self.strategy.evaluate(&self.window, quote) {
            Ok(s) => s,
            Err(e) => {
                error!(cycle, quote = %quote, error = %e, "Threshold computation failed");
                if matches!(e, TraderError::Overflow(_)) {
                    // The window is not appended to, so it cannot change.
                    warn!(
                        cycle,
                        window = self.window.len(),
                        "Sample window overflows, every cycle will abort until restart"
                    );
                }
                let outcome = CycleOutcome::Aborted {
                    reason: e.to_string(),
                };
                return Ok(self.finish(cycle, block, Some(quote), None, outcome).await);
            }
        };
        let threshold = signal.threshold();

        let outcome = match signal {
            Signal::Seed => {
                info!(cycle, quote = %self.fmt_amount(quote), "Empty window, seeding");
                CycleOutcome::Seeded
            }
            Signal::Skip { threshold } => {
                info!(
                    cycle,
                    quote = %self.fmt_amount(quote),
                    threshold = %self.fmt_amount(threshold),
                    "Quote below threshold, skipping"
                );
                tokio::time::sleep(self.poll_interval).await;
                CycleOutcome::Skipped
            }
            Signal::Trade { threshold, min_out } => {
                self.trade(cycle, quote, threshold, min_out, balance).await?
            }
        };

        self.window.push(quote);
        Ok(self.finish(cycle, block, Some(quote), threshold, outcome).await)
    }

    async fn read_market(&self, amount_in: U256) -> Result<(Quote, U256), TraderError> {
        let quote = self.venue.quote(amount_in).await?;
        let balance = self.venue.balance().await?;
        Ok((quote, balance))
    }

    /// Trade branch. Returns `Err` only when the watchdog gives up while
    /// waiting for confirmation.
    async fn trade(
        &self,
        cycle: u64,
        quote: Quote,
        threshold: U256,
        min_out: U256,
        balance: U256,
    ) -> Result<CycleOutcome, TraderError> {
        let amount_in = self.strategy.params().trade_amount;

        if !self.strategy.balance_sufficient(balance) {
            warn!(
                cycle,
                balance = %self.fmt_amount(balance),
                needed = %self.fmt_amount(amount_in),
                "Quote cleared threshold but balance is insufficient"
            );
            return Ok(CycleOutcome::InsufficientBalance { balance });
        }

        info!(
            cycle,
            quote = %self.fmt_amount(quote),
            threshold = %self.fmt_amount(threshold),
            min_out = %self.fmt_amount(min_out),
            "Quote cleared threshold, swapping"
        );

        let swap = match self.executor.submit(amount_in, min_out).await {
            Ok(swap) => swap,
            Err(e) => {
                return Ok(CycleOutcome::SubmissionFailed {
                    reason: e.to_string(),
                })
            }
        };

        let mut cell = self.executor.await_confirmation(&swap);
        let mut polls: u64 = 0;
        loop {
            info!(hash = ?swap.hash, waited_polls = polls, "Waiting for confirmation");
            tokio::time::sleep(self.poll_interval).await;
            self.watchdog.check_liveness().await?;
            polls += 1;

            match cell.try_outcome() {
                None => continue,
                Some(TxOutcome::Confirmed(_)) => {
                    return Ok(CycleOutcome::Confirmed { swap, polls });
                }
                Some(TxOutcome::Failed { reason }) => {
                    return Ok(CycleOutcome::Reverted {
                        swap,
                        polls,
                        reason,
                    });
                }
            }
        }
    }

    async fn finish(
        &self,
        cycle: u64,
        block: Option<H256>,
        quote: Option<Quote>,
        threshold: Option<U256>,
        outcome: CycleOutcome,
    ) -> CycleReport {
        let report = CycleReport {
            cycle_number: cycle,
            block,
            quote,
            threshold,
            outcome,
            timestamp: Utc::now(),
        };
        let mut stats = self.stats.write().await;
        stats.record(&report, self.window.len());
        report
    }
}

/// Drop queued block events; returns how many were discarded.
fn drain_pending(blocks: &mut mpsc::Receiver<BlockEvent>) -> usize {
    let mut n = 0;
    while blocks.try_recv().is_ok() {
        n += 1;
    }
    n
}

/// Log a one-line cycle summary.
fn log_cycle_report(report: &CycleReport) {
    info!(
        cycle = report.cycle_number,
        block = ?report.block,
        quote = ?report.quote.map(|q| q.to_string()),
        threshold = ?report.threshold.map(|t| t.to_string()),
        outcome = %report.outcome,
        "Cycle complete"
    );
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
