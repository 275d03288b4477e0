//! Transaction executor.
//!
//! Submits bounded-slippage swaps through an [`AuctionVenue`] and tracks
//! their confirmation. Confirmation runs as its own task and reports
//! through a [`ConfirmationCell`]: a oneshot channel, so the outcome is
//! written at most once and the decision loop can look at it without
//! blocking.

use ethers::types::U256;
use std::sync::Arc;
use tokio::sync::oneshot::{self, error::TryRecvError};
use tracing::{error, info, warn};

use super::watchdog::WatchdogMonitor;
use crate::chain::AuctionVenue;
use crate::types::{PendingSwap, TraderError, TxOutcome};

// ---------------------------------------------------------------------------
// Confirmation cell
// ---------------------------------------------------------------------------

/// Read side of a swap's single-writer outcome slot.
#[derive(Debug)]
pub struct ConfirmationCell {
    rx: oneshot::Receiver<TxOutcome>,
    resolved: Option<TxOutcome>,
}

impl ConfirmationCell {
    /// A connected writer/reader pair.
    pub fn channel() -> (oneshot::Sender<TxOutcome>, Self) {
        let (tx, rx) = oneshot::channel();
        (tx, Self { rx, resolved: None })
    }

    /// Non-blocking look at the outcome; `None` while still pending.
    ///
    /// A writer that went away without writing counts as a failure.
    pub fn try_outcome(&mut self) -> Option<TxOutcome> {
        if self.resolved.is_none() {
            self.resolved = match self.rx.try_recv() {
                Ok(outcome) => Some(outcome),
                Err(TryRecvError::Empty) => None,
                Err(TryRecvError::Closed) => Some(TxOutcome::Failed {
                    reason: "confirmation watcher exited without a result".into(),
                }),
            };
        }
        self.resolved.clone()
    }
}

// ---------------------------------------------------------------------------
// Executor
// ---------------------------------------------------------------------------

pub struct TransactionExecutor {
    venue: Arc<dyn AuctionVenue>,
    watchdog: Arc<WatchdogMonitor>,
}

impl TransactionExecutor {
    pub fn new(venue: Arc<dyn AuctionVenue>, watchdog: Arc<WatchdogMonitor>) -> Self {
        Self { venue, watchdog }
    }

    /// Send the swap. On error nothing was broadcast that needs tracking.
    pub async fn submit(
        &self,
        trade_amount: U256,
        min_acceptable: U256,
    ) -> Result<PendingSwap, TraderError> {
        match self.venue.submit_swap(trade_amount, min_acceptable).await {
            Ok(swap) => {
                info!(
                    venue = self.venue.name(),
                    nonce = %swap.nonce,
                    hash = ?swap.hash,
                    amount_in = %trade_amount,
                    min_out = %min_acceptable,
                    "Swap submitted"
                );
                Ok(swap)
            }
            Err(e) => {
                error!(
                    venue = self.venue.name(),
                    amount_in = %trade_amount,
                    min_out = %min_acceptable,
                    error = %e,
                    "Swap submission failed"
                );
                Err(e)
            }
        }
    }

    /// Spawn the confirmation watcher for `swap`.
    ///
    /// The watcher writes exactly one outcome. A confirmed swap is the
    /// only thing that marks watchdog activity; a failed one is logged.
    pub fn await_confirmation(&self, swap: &PendingSwap) -> ConfirmationCell {
        let (tx, cell) = ConfirmationCell::channel();
        let venue = Arc::clone(&self.venue);
        let watchdog = Arc::clone(&self.watchdog);
        let swap = swap.clone();

        tokio::spawn(async move {
            let outcome = match venue.confirm(&swap).await {
                Ok(confirmed) => {
                    watchdog.mark_activity();
                    info!(
                        hash = ?swap.hash,
                        nonce = %swap.nonce,
                        block = ?confirmed.block_number,
                        gas_used = ?confirmed.gas_used,
                        "Swap confirmed"
                    );
                    TxOutcome::Confirmed(confirmed)
                }
                Err(e) => {
                    warn!(hash = ?swap.hash, nonce = %swap.nonce, error = %e, "Swap failed");
                    TxOutcome::Failed {
                        reason: e.to_string(),
                    }
                }
            };
            // Receiver gone means the loop no longer cares; nothing to do.
            let _ = tx.send(outcome);
        });

        cell
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chain::MockAuctionVenue as MockVenue;
    use crate::engine::watchdog::WatchdogConfig;
    use crate::types::ConfirmedSwap;
    use chrono::Utc;
    use ethers::types::H256;
    use std::time::Duration;

    fn swap() -> PendingSwap {
        PendingSwap {
            nonce: U256::from(3u64),
            hash: H256::repeat_byte(0x11),
            amount_in: U256::from(10u64),
            min_out: U256::from(64u64),
            submitted_at: Utc::now(),
        }
    }

    fn watchdog() -> Arc<WatchdogMonitor> {
        Arc::new(WatchdogMonitor::new(WatchdogConfig {
            timeout: Duration::from_secs(10),
            grace_period: Duration::from_secs(60),
        }))
    }

    async fn settle(cell: &mut ConfirmationCell) -> TxOutcome {
        loop {
            if let Some(o) = cell.try_outcome() {
                return o;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    }

    #[test]
    fn test_cell_pending_then_resolved_once() {
        let (tx, mut cell) = ConfirmationCell::channel();
        assert_eq!(cell.try_outcome(), None);
        tx.send(TxOutcome::Failed { reason: "x".into() }).unwrap();
        let first = cell.try_outcome();
        assert!(matches!(first, Some(TxOutcome::Failed { .. })));
        assert_eq!(cell.try_outcome(), first);
    }

    #[test]
    fn test_cell_closed_writer_is_failure() {
        let (tx, mut cell) = ConfirmationCell::channel();
        drop(tx);
        assert!(matches!(cell.try_outcome(), Some(TxOutcome::Failed { .. })));
    }

    #[tokio::test]
    async fn test_submit_passes_through_swap() {
        let mut venue = MockVenue::new();
        venue.expect_name().return_const("mock".to_string());
        venue
            .expect_submit_swap()
            .withf(|a, m| *a == U256::from(10u64) && *m == U256::from(64u64))
            .times(1)
            .returning(|_, _| Ok(swap()));

        let exec = TransactionExecutor::new(Arc::new(venue), watchdog());
        let pending = exec.submit(U256::from(10u64), U256::from(64u64)).await.unwrap();
        assert_eq!(pending.nonce, U256::from(3u64));
    }

    #[tokio::test]
    async fn test_submit_error_propagates() {
        let mut venue = MockVenue::new();
        venue.expect_name().return_const("mock".to_string());
        venue
            .expect_submit_swap()
            .returning(|_, _| Err(TraderError::Submission("insufficient funds".into())));

        let exec = TransactionExecutor::new(Arc::new(venue), watchdog());
        let err = exec.submit(U256::one(), U256::one()).await.unwrap_err();
        assert!(matches!(err, TraderError::Submission(_)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_confirmed_marks_watchdog() {
        let mut venue = MockVenue::new();
        venue.expect_confirm().times(1).returning(|_| {
            Ok(ConfirmedSwap {
                block_number: Some(99),
                gas_used: None,
            })
        });
        let wd = watchdog();
        tokio::time::advance(Duration::from_secs(5)).await;
        let before = wd.last_activity_ms();

        let exec = TransactionExecutor::new(Arc::new(venue), Arc::clone(&wd));
        let mut cell = exec.await_confirmation(&swap());
        let outcome = settle(&mut cell).await;

        assert!(outcome.is_confirmed());
        assert!(wd.last_activity_ms() > before);
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_leaves_watchdog_alone() {
        let mut venue = MockVenue::new();
        venue.expect_confirm().times(1).returning(|s| {
            Err(TraderError::Confirmation {
                hash: s.hash,
                message: "reverted".into(),
            })
        });
        let wd = watchdog();
        tokio::time::advance(Duration::from_secs(5)).await;
        let before = wd.last_activity_ms();

        let exec = TransactionExecutor::new(Arc::new(venue), Arc::clone(&wd));
        let mut cell = exec.await_confirmation(&swap());
        let outcome = settle(&mut cell).await;

        assert!(matches!(outcome, TxOutcome::Failed { .. }));
        assert_eq!(wd.last_activity_ms(), before);
    }
}
