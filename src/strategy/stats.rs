//! Sliding-window quote statistics.
//!
//! Keeps the most recent N quotes and derives the entry threshold
//! `mean + stddev * (multiplier / 100)` using exact 256-bit integer
//! arithmetic. Every division truncates, including the multiplier ratio
//! itself: 150% scales the deviation by 1, 250% by 2.

use ethers::types::U256;
use std::collections::VecDeque;

use crate::types::{Quote, TraderError};

// ---------------------------------------------------------------------------
// Window
// ---------------------------------------------------------------------------

/// Bounded, order-preserving window of the most recent quotes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SampleWindow {
    capacity: usize,
    samples: VecDeque<Quote>,
}

impl SampleWindow {
    /// Create an empty window holding at most `capacity` samples.
    ///
    /// A zero capacity is clamped to one so the window can always seed.
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            capacity,
            samples: VecDeque::with_capacity(capacity),
        }
    }

    /// Build a window from existing samples, keeping only the newest `capacity`.
    pub fn from_samples(capacity: usize, samples: impl IntoIterator<Item = Quote>) -> Self {
        let mut window = Self::new(capacity);
        for s in samples {
            window.push(s);
        }
        window
    }

    /// Append in place, evicting the oldest sample on overflow.
    pub fn push(&mut self, sample: Quote) {
        if self.samples.len() == self.capacity {
            self.samples.pop_front();
        }
        self.samples.push_back(sample);
    }

    /// Return a new window with `sample` appended; `self` is left untouched.
    pub fn append(&self, sample: Quote) -> Self {
        let mut next = self.clone();
        next.push(sample);
        next
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Samples oldest first.
    pub fn iter(&self) -> impl Iterator<Item = &Quote> {
        self.samples.iter()
    }

    pub fn latest(&self) -> Option<Quote> {
        self.samples.back().copied()
    }

    pub fn to_vec(&self) -> Vec<Quote> {
        self.samples.iter().copied().collect()
    }

    /// `sum / count`, truncating.
    pub fn mean(&self) -> Result<U256, TraderError> {
        mean(self.samples.iter().copied(), self.samples.len())
    }

    /// Population variance around the truncated mean, truncating.
    pub fn variance(&self) -> Result<U256, TraderError> {
        let mu = self.mean()?;
        variance_around(self.samples.iter().copied(), self.samples.len(), mu)
    }

    /// `integer_sqrt(variance)`.
    pub fn stddev(&self) -> Result<U256, TraderError> {
        Ok(integer_sqrt(self.variance()?))
    }

    /// Entry threshold for this window; see [`threshold`].
    pub fn threshold(&self, multiplier_percent: u32) -> Result<U256, TraderError> {
        threshold(self, multiplier_percent)
    }
}

// ---------------------------------------------------------------------------
// Statistics
// ---------------------------------------------------------------------------

fn mean(samples: impl Iterator<Item = U256>, count: usize) -> Result<U256, TraderError> {
    if count == 0 {
        return Err(TraderError::EmptyWindow);
    }
    let mut sum = U256::zero();
    for s in samples {
        sum = sum.checked_add(s).ok_or(TraderError::Overflow("window sum"))?;
    }
    Ok(sum / U256::from(count))
}

fn variance_around(
    samples: impl Iterator<Item = U256>,
    count: usize,
    mu: U256,
) -> Result<U256, TraderError> {
    if count == 0 {
        return Err(TraderError::EmptyWindow);
    }
    let mut acc = U256::zero();
    for x in samples {
        let diff = if x >= mu { x - mu } else { mu - x };
        let sq = diff
            .checked_mul(diff)
            .ok_or(TraderError::Overflow("squared deviation"))?;
        acc = acc
            .checked_add(sq)
            .ok_or(TraderError::Overflow("sum of squared deviations"))?;
    }
    Ok(acc / U256::from(count))
}

/// `mean + integer_sqrt(variance) * (multiplier_percent / 100)` over the window.
///
/// The ratio is truncated before it scales the deviation, so any
/// multiplier below 100% contributes nothing.
///
/// Fails with [`TraderError::EmptyWindow`] when there is nothing to average
/// and with [`TraderError::Overflow`] instead of wrapping.
pub fn threshold(window: &SampleWindow, multiplier_percent: u32) -> Result<U256, TraderError> {
    let mu = window.mean()?;
    let var = variance_around(window.iter().copied(), window.len(), mu)?;
    let sd = integer_sqrt(var);
    let ratio = U256::from(multiplier_percent / 100);
    let scaled = sd
        .checked_mul(ratio)
        .ok_or(TraderError::Overflow("scaled deviation"))?;
    mu.checked_add(scaled)
        .ok_or(TraderError::Overflow("threshold"))
}

/// Floor square root by Newton's method.
///
/// Returns the unique `r` with `r*r <= v < (r+1)*(r+1)`.
pub fn integer_sqrt(v: U256) -> U256 {
    let two = U256::from(2u8);
    // (v + 1) / 2 without overflowing at U256::MAX
    let mut z = v / two + v % two;
    let mut y = v;
    while z < y {
        y = z;
        z = (v / z + z) / two;
    }
    y
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
