//! Mock venue for integration testing.
//!
//! Provides a deterministic `AuctionVenue` implementation that replays
//! scripted quotes, debits the balance on every swap, and records what
//! was submitted and confirmed. Everything is in memory.

use async_trait::async_trait;
use chrono::Utc;
use ethers::types::{H256, U256};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use auction_trader::chain::AuctionVenue;
use auction_trader::types::{ConfirmedSwap, PendingSwap, Quote, TraderError};

/// A scripted auction venue.
///
/// Quotes are served in order; once the script runs out the last quote
/// repeats. Failure switches affect every subsequent call until cleared.
pub struct MockVenue {
    quotes: Mutex<VecDeque<Quote>>,
    last_quote: Mutex<Quote>,
    balance: Mutex<U256>,
    submitted: Mutex<Vec<PendingSwap>>,
    confirm_calls: AtomicUsize,
    quote_error: Mutex<Option<String>>,
    submit_error: Mutex<Option<String>>,
    revert: Mutex<bool>,
}

impl MockVenue {
    pub fn new(quotes: &[u64], balance: u64) -> Self {
        Self {
            quotes: Mutex::new(quotes.iter().map(|q| U256::from(*q)).collect()),
            last_quote: Mutex::new(U256::zero()),
            balance: Mutex::new(U256::from(balance)),
            submitted: Mutex::new(Vec::new()),
            confirm_calls: AtomicUsize::new(0),
            quote_error: Mutex::new(None),
            submit_error: Mutex::new(None),
            revert: Mutex::new(false),
        }
    }

    /// Make quote reads fail until cleared with `None`.
    pub fn set_quote_error(&self, msg: Option<&str>) {
        *self.quote_error.lock().unwrap() = msg.map(str::to_string);
    }

    /// Make swap submission fail until cleared with `None`.
    pub fn set_submit_error(&self, msg: Option<&str>) {
        *self.submit_error.lock().unwrap() = msg.map(str::to_string);
    }

    /// Make every submitted swap revert on-chain.
    pub fn set_revert(&self, revert: bool) {
        *self.revert.lock().unwrap() = revert;
    }

    pub fn submitted(&self) -> Vec<PendingSwap> {
        self.submitted.lock().unwrap().clone()
    }

    pub fn confirm_calls(&self) -> usize {
        self.confirm_calls.load(Ordering::SeqCst)
    }

    pub fn current_balance(&self) -> U256 {
        *self.balance.lock().unwrap()
    }
}

#[async_trait]
impl AuctionVenue for MockVenue {
    async fn quote(&self, _amount_in: U256) -> Result<Quote, TraderError> {
        if let Some(msg) = self.quote_error.lock().unwrap().as_ref() {
            return Err(TraderError::Network {
                call: "getY",
                message: msg.clone(),
            });
        }
        let mut last = self.last_quote.lock().unwrap();
        if let Some(next) = self.quotes.lock().unwrap().pop_front() {
            *last = next;
        }
        Ok(*last)
    }

    async fn balance(&self) -> Result<U256, TraderError> {
        Ok(self.current_balance())
    }

    async fn submit_swap(
        &self,
        amount_in: U256,
        min_out: U256,
    ) -> Result<PendingSwap, TraderError> {
        if let Some(msg) = self.submit_error.lock().unwrap().as_ref() {
            return Err(TraderError::Submission(msg.clone()));
        }

        let mut balance = self.balance.lock().unwrap();
        if *balance < amount_in {
            return Err(TraderError::Submission("insufficient funds".into()));
        }
        *balance -= amount_in;

        let mut submitted = self.submitted.lock().unwrap();
        let nonce = submitted.len() as u64;
        let swap = PendingSwap {
            nonce: U256::from(nonce),
            hash: H256::from_low_u64_be(nonce + 1),
            amount_in,
            min_out,
            submitted_at: Utc::now(),
        };
        submitted.push(swap.clone());
        Ok(swap)
    }

    async fn confirm(&self, swap: &PendingSwap) -> Result<ConfirmedSwap, TraderError> {
        self.confirm_calls.fetch_add(1, Ordering::SeqCst);
        if *self.revert.lock().unwrap() {
            return Err(TraderError::Confirmation {
                hash: swap.hash,
                message: "execution reverted".into(),
            });
        }
        Ok(ConfirmedSwap {
            block_number: Some(1_000 + swap.nonce.as_u64()),
            gas_used: Some(U256::from(90_000u64)),
        })
    }

    fn name(&self) -> &str {
        "mock"
    }
}
