//! MarketPulse Library
//!
//! Crypto price snapshots with move alerts, and a cached multi-asset market
//! overview (crypto, stocks, indices).

pub mod config;
pub mod logging;
pub mod monitor;
pub mod oracle;
pub mod persistence;
pub mod service;
pub mod types;

pub use service::MarketService;
