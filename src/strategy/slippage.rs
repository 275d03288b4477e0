//! Slippage bound for swap submission.

use ethers::types::U256;

use crate::types::{Quote, TraderError};

/// Minimum acceptable output: `quote * (100 - slippage_percent) / 100`.
///
/// `slippage_percent` above 100 is clamped to 100 (accept anything).
pub fn min_acceptable(quote: Quote, slippage_percent: u32) -> Result<U256, TraderError> {
    let keep = 100 - slippage_percent.min(100);
    let scaled = quote
        .checked_mul(U256::from(keep))
        .ok_or(TraderError::Overflow("slippage bound"))?;
    Ok(scaled / U256::from(100u64))
}
