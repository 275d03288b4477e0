//! End-to-end runs of the decision loop against the mock venue.
//!
//! All tests run on paused tokio time, so poll intervals, liveness
//! timeouts and grace periods elapse instantly and deterministically.

use ethers::types::{H256, U256};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;

use auction_trader::chain::AuctionVenue;
use auction_trader::engine::decision::DecisionLoop;
use auction_trader::engine::watchdog::{WatchdogConfig, WatchdogMonitor};
use auction_trader::strategy::{StrategyParams, ThresholdStrategy};
use auction_trader::types::{BlockEvent, CycleOutcome, TraderError};

use crate::mock_venue::MockVenue;

const TRADE_AMOUNT: u64 = 10;

fn watchdog(timeout_secs: u64, grace_secs: u64) -> Arc<WatchdogMonitor> {
    Arc::new(WatchdogMonitor::new(WatchdogConfig {
        timeout: Duration::from_secs(timeout_secs),
        grace_period: Duration::from_secs(grace_secs),
    }))
}

fn trader(venue: &Arc<MockVenue>, wd: &Arc<WatchdogMonitor>) -> DecisionLoop {
    let strategy = ThresholdStrategy::new(StrategyParams {
        trade_amount: U256::from(TRADE_AMOUNT),
        ..StrategyParams::default()
    });
    let venue: Arc<dyn AuctionVenue> = Arc::clone(venue) as Arc<dyn AuctionVenue>;
    DecisionLoop::new(
        venue,
        strategy,
        Arc::clone(wd),
        Duration::from_secs(1),
    )
}

#[tokio::test(start_paused = true)]
async fn test_spike_after_quiet_market_trades_once() {
    // seed 100; 90 and 95 stay under the threshold; 1000 clears it
    let venue = Arc::new(MockVenue::new(&[100, 90, 95, 1_000], 1_000));
    let wd = watchdog(60, 60);
    let mut dl = trader(&venue, &wd);

    dl.seed().await.unwrap();

    let r1 = dl.run_cycle(Some(H256::repeat_byte(1))).await.unwrap();
    assert_eq!(r1.outcome, CycleOutcome::Skipped);
    assert_eq!(r1.threshold, Some(U256::from(100u64)));

    let r2 = dl.run_cycle(Some(H256::repeat_byte(2))).await.unwrap();
    assert_eq!(r2.outcome, CycleOutcome::Skipped);
    // mean 95, sd 5
    assert_eq!(r2.threshold, Some(U256::from(100u64)));

    let r3 = dl.run_cycle(Some(H256::repeat_byte(3))).await.unwrap();
    // mean 95, sd 4: 150% truncates to a multiplier of 1
    assert_eq!(r3.threshold, Some(U256::from(99u64)));
    assert!(matches!(r3.outcome, CycleOutcome::Confirmed { .. }));

    let swaps = venue.submitted();
    assert_eq!(swaps.len(), 1);
    assert_eq!(swaps[0].amount_in, U256::from(TRADE_AMOUNT));
    // 60% slippage tolerance on a quote of 1000
    assert_eq!(swaps[0].min_out, U256::from(400u64));
    assert_eq!(venue.confirm_calls(), 1);
    assert_eq!(venue.current_balance(), U256::from(1_000 - TRADE_AMOUNT));

    let window: Vec<u64> = dl.window().iter().map(|q| q.as_u64()).collect();
    assert_eq!(window, vec![100, 90, 95, 1_000]);

    let stats = dl.stats();
    let stats = stats.read().await;
    assert_eq!(stats.cycles, 3);
    assert_eq!(stats.triggers, 1);
    assert_eq!(stats.confirmed, 1);
}

#[tokio::test(start_paused = true)]
async fn test_submission_failure_never_tracks_confirmation() {
    let venue = Arc::new(MockVenue::new(&[100, 1_000], 1_000));
    venue.set_submit_error(Some("replacement transaction underpriced"));
    let wd = watchdog(60, 60);
    let mut dl = trader(&venue, &wd);

    dl.seed().await.unwrap();
    let report = dl.run_cycle(None).await.unwrap();

    assert!(matches!(report.outcome, CycleOutcome::SubmissionFailed { .. }));
    assert!(venue.submitted().is_empty());
    assert_eq!(venue.confirm_calls(), 0);
    assert_eq!(dl.window().len(), 2);
    assert_eq!(wd.last_activity_ms(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_reverted_swap_keeps_trading() {
    let venue = Arc::new(MockVenue::new(&[100, 1_000, 50], 1_000));
    venue.set_revert(true);
    let wd = watchdog(60, 60);
    let mut dl = trader(&venue, &wd);

    dl.seed().await.unwrap();
    let reverted = dl.run_cycle(None).await.unwrap();
    assert!(matches!(reverted.outcome, CycleOutcome::Reverted { .. }));
    assert_eq!(venue.confirm_calls(), 1);
    assert_eq!(wd.last_activity_ms(), 0);

    let next = dl.run_cycle(None).await.unwrap();
    assert_eq!(next.outcome, CycleOutcome::Skipped);
    assert_eq!(dl.window().len(), 3);
}

#[tokio::test(start_paused = true)]
async fn test_read_failure_aborts_cycle_then_recovers() {
    let venue = Arc::new(MockVenue::new(&[100, 90], 1_000));
    let wd = watchdog(60, 60);
    let mut dl = trader(&venue, &wd);

    dl.seed().await.unwrap();
    venue.set_quote_error(Some("502 Bad Gateway"));
    let aborted = dl.run_cycle(None).await.unwrap();
    assert!(matches!(aborted.outcome, CycleOutcome::Aborted { .. }));
    assert_eq!(dl.window().len(), 1);

    venue.set_quote_error(None);
    let next = dl.run_cycle(None).await.unwrap();
    assert_eq!(next.outcome, CycleOutcome::Skipped);
    assert_eq!(dl.window().len(), 2);
    assert_eq!(dl.cycle_count(), 2);
}

#[tokio::test(start_paused = true)]
async fn test_blocks_queued_during_a_cycle_are_discarded() {
    let venue = Arc::new(MockVenue::new(&[100], 1_000));
    let wd = watchdog(60, 60);
    let mut dl = trader(&venue, &wd);

    let (tx, rx) = mpsc::channel(8);
    for i in 1..=3u8 {
        tx.send(BlockEvent::new(H256::repeat_byte(i))).await.unwrap();
    }
    drop(tx);

    let err = dl.run(rx).await.unwrap_err();
    assert!(matches!(err, TraderError::FeedClosed));
    assert_eq!(dl.cycle_count(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_silent_feed_trips_watchdog() {
    let venue = Arc::new(MockVenue::new(&[100], 1_000));
    let wd = watchdog(10, 5);
    let mut dl = trader(&venue, &wd);

    // Sender stays alive but never sends.
    let (_tx, rx) = mpsc::channel::<BlockEvent>(8);
    let err = dl.run(rx).await.unwrap_err();

    assert!(matches!(err, TraderError::LivenessTimeout { .. }));
    assert_eq!(wd.drains(), 1);
    assert_eq!(dl.cycle_count(), 0);
}
