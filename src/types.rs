//! Core types used throughout MarketPulse
//!
//! Defines instruments, snapshots, alerts and the composite overview.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Asset classes served by the overview and tracked by the snapshot job
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AssetClass {
    Crypto,
    Stock,
    Index,
}

impl AssetClass {
    /// Parse from string
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "crypto" => Some(AssetClass::Crypto),
            "stock" | "stocks" => Some(AssetClass::Stock),
            "index" | "indices" => Some(AssetClass::Index),
            _ => None,
        }
    }
}

impl fmt::Display for AssetClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AssetClass::Crypto => write!(f, "Crypto"),
            AssetClass::Stock => write!(f, "Stock"),
            AssetClass::Index => write!(f, "Index"),
        }
    }
}

/// Price move direction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Direction {
    Up,
    Down,
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Direction::Up => write!(f, "Up"),
            Direction::Down => write!(f, "Down"),
        }
    }
}

/// An asset the system knows how to query upstream
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrackedAsset {
    /// Upstream identifier ("bitcoin" for CoinGecko, "AAPL" for Alpha Vantage)
    pub id: String,
    /// Short ticker shown to users
    pub symbol: String,
    /// Display name
    pub name: String,
}

impl TrackedAsset {
    pub fn new(id: &str, symbol: &str, name: &str) -> Self {
        Self {
            id: id.to_string(),
            symbol: symbol.to_string(),
            name: name.to_string(),
        }
    }
}

/// A priced asset at read time
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Instrument {
    pub symbol: String,
    pub display_name: String,
    pub asset_class: AssetClass,
    pub price_usd: Decimal,
    #[serde(rename = "change24h")]
    pub change_24h_percent: Decimal,
    /// Normalized values in [0, 1]; empty when no series was built
    #[serde(rename = "sparkline7d")]
    pub sparkline: Vec<f64>,
}

/// A persisted price observation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    pub id: Uuid,
    pub symbol: String,
    pub asset_class: AssetClass,
    #[serde(with = "rust_decimal::serde::str")]
    pub price: Decimal,
    pub timestamp_utc: DateTime<Utc>,
}

impl Snapshot {
    pub fn new(symbol: &str, asset_class: AssetClass, price: Decimal, ts: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4(),
            symbol: symbol.to_string(),
            asset_class,
            price,
            timestamp_utc: ts,
        }
    }
}

/// A persisted price-move event
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Alert {
    pub id: Uuid,
    pub symbol: String,
    pub asset_class: AssetClass,
    #[serde(with = "rust_decimal::serde::str")]
    pub old_price: Decimal,
    #[serde(with = "rust_decimal::serde::str")]
    pub new_price: Decimal,
    /// Signed, rounded to 2 decimals
    #[serde(with = "rust_decimal::serde::str")]
    pub change_percent: Decimal,
    pub direction: Direction,
    pub created_utc: DateTime<Utc>,
}

/// The combined Crypto/Stocks/Indices answer to one overview read
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CompositeOverview {
    pub crypto: Vec<Instrument>,
    pub stocks: Vec<Instrument>,
    pub indices: Vec<Instrument>,
}

impl CompositeOverview {
    /// Slice for one asset class
    pub fn class(&self, class: AssetClass) -> &[Instrument] {
        match class {
            AssetClass::Crypto => &self.crypto,
            AssetClass::Stock => &self.stocks,
            AssetClass::Index => &self.indices,
        }
    }

    /// True when no class carries a single instrument
    pub fn is_empty(&self) -> bool {
        self.crypto.is_empty() && self.stocks.is_empty() && self.indices.is_empty()
    }

    pub fn len(&self) -> usize {
        self.crypto.len() + self.stocks.len() + self.indices.len()
    }
}
