//! Auction trader entry point.
//!
//! Loads configuration, initialises structured logging, connects to the
//! chain, seeds the sample window and hands the block feed to the
//! decision loop. Returns non-zero when the watchdog gives up, so a
//! supervisor can restart the process.

use anyhow::{Context, Result};
use std::sync::Arc;
use tracing::{error, info};

use auction_trader::chain::ethers_venue::EthersVenue;
use auction_trader::chain::AuctionVenue;
use auction_trader::config;
use auction_trader::dashboard::{self, routes::DashboardState};
use auction_trader::engine::decision::DecisionLoop;
use auction_trader::engine::watchdog::WatchdogMonitor;
use auction_trader::strategy::ThresholdStrategy;

/// Queued blocks beyond this are dropped; the loop only needs the latest.
const BLOCK_CHANNEL_CAPACITY: usize = 16;

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present (non-fatal if missing)
    let _ = dotenv::dotenv();

    let cfg = config::AppConfig::load_default()?;

    init_logging();

    let params = cfg.strategy_params()?;
    info!(
        chain_id = cfg.chain.chain_id,
        auction = ?cfg.chain.auction_contract,
        trade_amount = %cfg.strategy.trade_amount,
        slippage_percent = params.slippage_percent,
        window_size = params.window_size,
        threshold_multiplier_percent = params.threshold_multiplier_percent,
        liveness_timeout_ms = cfg.watchdog.liveness_timeout_ms,
        "Auction trader starting up"
    );

    // -- Initialise components -------------------------------------------

    let signing_key = cfg.signing_key()?;
    let ethers_venue = Arc::new(EthersVenue::connect(&cfg.chain, &signing_key)?);
    let venue: Arc<dyn AuctionVenue> = ethers_venue.clone();

    let watchdog = Arc::new(WatchdogMonitor::new(cfg.watchdog_config()));
    let mut decision = DecisionLoop::new(
        venue,
        ThresholdStrategy::new(params),
        Arc::clone(&watchdog),
        cfg.poll_interval(),
    );

    // A first quote that cannot be read means the node or contract is wrong.
    decision
        .seed()
        .await
        .context("Failed to read initial quote")?;

    if cfg.dashboard.enabled {
        let state = Arc::new(DashboardState::new(decision.stats(), Arc::clone(&watchdog)));
        dashboard::spawn_dashboard(state, cfg.dashboard.port);
    }

    // -- Main loop -------------------------------------------------------

    let blocks = ethers_venue.spawn_block_feed(BLOCK_CHANNEL_CAPACITY);
    info!("Listening for new blocks");

    if let Err(e) = decision.run(blocks).await {
        error!(
            error = %e,
            cycles = decision.cycle_count(),
            "Decision loop stopped"
        );
        return Err(e.into());
    }

    Ok(())
}

/// Initialise the `tracing` subscriber.
fn init_logging() {
    use tracing_subscriber::{fmt, EnvFilter};

    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("auction_trader=info"));

    let json_logging = std::env::var("TRADER_LOG_JSON").is_ok();

    if json_logging {
        fmt()
            .json()
            .with_env_filter(env_filter)
            .with_target(true)
            .with_thread_ids(true)
            .init();
    } else {
        fmt()
            .with_env_filter(env_filter)
            .with_target(true)
            .init();
    }
}
