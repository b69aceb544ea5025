//! Change Detector
//!
//! Decides whether a new price moved far enough from the previous snapshot to
//! be worth an alert.
//!
//! The threshold is compared against the unrounded percentage; the reported
//! `change_percent` is then rounded to 2 decimals half-away-from-zero
//! (0.005 -> 0.01, 0.025 -> 0.03, -0.025 -> -0.03).

use rust_decimal::{Decimal, RoundingStrategy};
use rust_decimal_macros::dec;

use crate::types::Direction;

/// Minimum absolute move, in percent, that produces an alert
pub const DEFAULT_THRESHOLD_PCT: Decimal = dec!(0.01);

/// Smallest usable threshold. Any raw move at or above it rounds to a
/// non-zero percentage, so the reported sign always matches the direction.
pub const MIN_THRESHOLD_PCT: Decimal = dec!(0.005);

const PERCENT_DP: u32 = 2;

/// A detected, alert-worthy move
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PriceChange {
    pub change_percent: Decimal,
    pub direction: Direction,
}

#[derive(Debug, Clone, Copy)]
pub struct ChangeDetector {
    threshold_pct: Decimal,
}

impl Default for ChangeDetector {
    fn default() -> Self {
        Self::new(DEFAULT_THRESHOLD_PCT)
    }
}

impl ChangeDetector {
    /// Thresholds below [`MIN_THRESHOLD_PCT`] are raised to it
    pub fn new(threshold_pct: Decimal) -> Self {
        Self {
            threshold_pct: threshold_pct.abs().max(MIN_THRESHOLD_PCT),
        }
    }

    /// `None` when there is no usable previous price or the move is below
    /// the threshold.
    pub fn detect(&self, old_price: Option<Decimal>, new_price: Decimal) -> Option<PriceChange> {
        let old = old_price.filter(|p| *p > Decimal::ZERO)?;

        let raw = new_price
            .checked_sub(old)?
            .checked_div(old)?
            .checked_mul(dec!(100))?;

        if raw.abs() < self.threshold_pct {
            return None;
        }

        let change_percent =
            raw.round_dp_with_strategy(PERCENT_DP, RoundingStrategy::MidpointAwayFromZero);
        let direction = if change_percent >= Decimal::ZERO {
            Direction::Up
        } else {
            Direction::Down
        };

        Some(PriceChange {
            change_percent,
            direction,
        })
    }
}

/// [`ChangeDetector::detect`] with the default 0.01% threshold
pub fn detect(old_price: Option<Decimal>, new_price: Decimal) -> Option<PriceChange> {
    ChangeDetector::default().detect(old_price, new_price)
}
