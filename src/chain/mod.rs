//! Chain integration.
//!
//! Defines the `AuctionVenue` trait the engine trades through and provides:
//! - `ethers_venue`: JSON-RPC implementation over `ethers` (ticket token +
//!   auction contract, locally signed transactions)
//! - `blocks`: new-block feed forwarding into the decision loop's channel

pub mod blocks;
pub mod ethers_venue;

use async_trait::async_trait;
use ethers::types::U256;

use crate::types::{ConfirmedSwap, PendingSwap, Quote, TraderError};

/// Abstraction over the auction contract and the account trading on it.
///
/// Reads fail with [`TraderError::Network`], submission with
/// [`TraderError::Submission`], and confirmation with
/// [`TraderError::Confirmation`].
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait AuctionVenue: Send + Sync {
    /// Output the auction would give right now for `amount_in` (`getY`).
    async fn quote(&self, amount_in: U256) -> Result<Quote, TraderError>;

    /// Ticket balance of the trading account (`balanceOf`).
    async fn balance(&self) -> Result<U256, TraderError>;

    /// Send `swap(amount_in, min_out)` and return as soon as the node
    /// accepts it.
    async fn submit_swap(&self, amount_in: U256, min_out: U256)
        -> Result<PendingSwap, TraderError>;

    /// Wait until `swap` is mined. Reverted or dropped transactions are errors.
    async fn confirm(&self, swap: &PendingSwap) -> Result<ConfirmedSwap, TraderError>;

    /// Venue name for logging.
    fn name(&self) -> &str;
}
