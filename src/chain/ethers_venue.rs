//! `ethers`-backed auction venue.
//!
//! Talks JSON-RPC over HTTP to the configured node. Reads go through the
//! generated contract bindings; swaps are signed locally by a
//! `LocalWallet` wrapped in `SignerMiddleware`, with the nonce fetched
//! explicitly so it can be logged alongside the hash.
//!
//! Contract surface:
//!   ticket:  balanceOf(address) view returns (uint256)
//!   auction: getY(uint256 x) view returns (uint256)
//!            swap(uint256 x, uint256 minY) returns (uint256 y)

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::Utc;
use ethers::contract::abigen;
use ethers::middleware::SignerMiddleware;
use ethers::providers::{Http, Middleware, PendingTransaction, Provider};
use ethers::signers::{LocalWallet, Signer};
use ethers::types::{Address, BlockId, BlockNumber, U256, U64};
use secrecy::{ExposeSecret, SecretString};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use super::blocks::{forward_blocks, FeedEnd};
use super::AuctionVenue;
use crate::config::ChainConfig;
use crate::types::{BlockEvent, ConfirmedSwap, PendingSwap, Quote, TraderError};

abigen!(
    TicketToken,
    r#"[
        function balanceOf(address owner) external view returns (uint256)
    ]"#;

    Auction,
    r#"[
        function swap(uint256 x, uint256 minY) external returns (uint256 y)
        function getY(uint256 x) external view returns (uint256)
    ]"#;
);

const VENUE_NAME: &str = "ethers";

/// Delay before re-installing a block filter that failed or expired.
const FEED_RETRY_DELAY: Duration = Duration::from_secs(2);

type Client = SignerMiddleware<Provider<Http>, LocalWallet>;

pub struct EthersVenue {
    client: Arc<Client>,
    ticket: TicketToken<Client>,
    auction: Auction<Client>,
    account: Address,
    confirmations: usize,
}

impl EthersVenue {
    /// Build the provider, signer and contract bindings. No network calls.
    pub fn connect(cfg: &ChainConfig, signing_key: &SecretString) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(cfg.request_timeout_secs))
            .build()
            .context("Failed to build HTTP client")?;
        let url = reqwest::Url::parse(&cfg.rpc_endpoint)
            .with_context(|| format!("Invalid RPC endpoint: {}", cfg.rpc_endpoint))?;
        let provider = Provider::new(Http::new_with_client(url, http))
            .interval(Duration::from_millis(cfg.block_poll_interval_ms));

        let wallet = signing_key
            .expose_secret()
            .trim()
            .parse::<LocalWallet>()
            .context("Signing key is not a valid secp256k1 private key")?
            .with_chain_id(cfg.chain_id);
        let signer_address = wallet.address();
        let account = cfg.account_address.unwrap_or(signer_address);
        if account != signer_address {
            warn!(
                account = ?account,
                signer = ?signer_address,
                "Configured account differs from signer; balance is read for the account"
            );
        }

        let client = Arc::new(SignerMiddleware::new(provider, wallet));
        let ticket = TicketToken::new(cfg.ticket_contract, Arc::clone(&client));
        let auction = Auction::new(cfg.auction_contract, Arc::clone(&client));

        info!(
            rpc = %cfg.rpc_endpoint,
            chain_id = cfg.chain_id,
            auction = ?cfg.auction_contract,
            ticket = ?cfg.ticket_contract,
            signer = ?signer_address,
            "Chain client ready"
        );

        Ok(Self {
            client,
            ticket,
            auction,
            account,
            confirmations: cfg.confirmations,
        })
    }

    /// Spawn a task that forwards new blocks into a channel of `capacity`.
    ///
    /// The block filter is re-installed whenever it fails or its stream
    /// ends; the task stops once the receiver is dropped.
    pub fn spawn_block_feed(&self, capacity: usize) -> mpsc::Receiver<BlockEvent> {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        let client = Arc::clone(&self.client);

        tokio::spawn(async move {
            loop {
                match client.provider().watch_blocks().await {
                    Ok(stream) => {
                        if forward_blocks(stream, &tx).await == FeedEnd::ReceiverGone {
                            debug!("Block feed receiver dropped, stopping");
                            return;
                        }
                        warn!("Block filter stream ended, re-installing");
                    }
                    Err(e) => warn!(error = %e, "Failed to install block filter"),
                }
                if tx.is_closed() {
                    return;
                }
                tokio::time::sleep(FEED_RETRY_DELAY).await;
            }
        });

        rx
    }
}

#[async_trait]
impl AuctionVenue for EthersVenue {
    async fn quote(&self, amount_in: U256) -> Result<Quote, TraderError> {
        self.auction
            .get_y(amount_in)
            .call()
            .await
            .map_err(|e| TraderError::Network {
                call: "getY",
                message: e.to_string(),
            })
    }

    async fn balance(&self) -> Result<U256, TraderError> {
        self.ticket
            .balance_of(self.account)
            .call()
            .await
            .map_err(|e| TraderError::Network {
                call: "balanceOf",
                message: e.to_string(),
            })
    }

    async fn submit_swap(
        &self,
        amount_in: U256,
        min_out: U256,
    ) -> Result<PendingSwap, TraderError> {
        let nonce = self
            .client
            .get_transaction_count(
                self.client.address(),
                Some(BlockId::Number(BlockNumber::Pending)),
            )
            .await
            .map_err(|e| TraderError::Submission(format!("nonce lookup: {e}")))?;

        let call = self.auction.swap(amount_in, min_out).nonce(nonce);
        let pending = call
            .send()
            .await
            .map_err(|e| TraderError::Submission(e.to_string()))?;

        Ok(PendingSwap {
            nonce,
            hash: pending.tx_hash(),
            amount_in,
            min_out,
            submitted_at: Utc::now(),
        })
    }

    async fn confirm(&self, swap: &PendingSwap) -> Result<ConfirmedSwap, TraderError> {
        let receipt = PendingTransaction::new(swap.hash, self.client.provider())
            .confirmations(self.confirmations)
            .await
            .map_err(|e| TraderError::Confirmation {
                hash: swap.hash,
                message: e.to_string(),
            })?;

        let receipt = receipt.ok_or_else(|| TraderError::Confirmation {
            hash: swap.hash,
            message: "dropped from mempool".into(),
        })?;

        if receipt.status == Some(U64::zero()) {
            return Err(TraderError::Confirmation {
                hash: swap.hash,
                message: "reverted".into(),
            });
        }

        Ok(ConfirmedSwap {
            block_number: receipt.block_number.map(|n| n.as_u64()),
            gas_used: receipt.gas_used,
        })
    }

    fn name(&self) -> &str {
        VENUE_NAME
    }
}
