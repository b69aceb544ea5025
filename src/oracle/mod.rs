//! Oracle module - Multi-source market data for the overview read path
//!
//! Pulls quotes from CoinGecko and Alpha Vantage, normalizes them into
//! [`Instrument`](crate::types::Instrument)s and assembles the cached,
//! failure-tolerant composite overview.

mod aggregator;
mod cache;
pub mod normalizer;
pub mod sources;
pub mod sparkline;

pub use aggregator::{OverviewAggregator, OverviewError, OverviewSettings, Universe};
pub use cache::OverviewCache;

use rust_decimal::Decimal;

/// Price and 24h change for one upstream id
#[derive(Debug, Clone, PartialEq)]
pub struct Quote {
    pub price: Decimal,
    pub change_24h_pct: Decimal,
}

impl Quote {
    pub fn new(price: Decimal, change_24h_pct: Decimal) -> Self {
        Self {
            price,
            change_24h_pct,
        }
    }
}
