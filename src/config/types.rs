//! Configuration section types

use serde::Deserialize;

use crate::types::TrackedAsset;

#[derive(Debug, Clone, Deserialize)]
pub struct CryptoConfig {
    /// CoinGecko API base URL
    pub base_url: String,
    /// Assets polled by the snapshot job and shown in the overview
    #[serde(default = "default_crypto_assets")]
    pub assets: Vec<TrackedAsset>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MarketConfig {
    /// Alpha Vantage API base URL
    pub base_url: String,
    /// Alpha Vantage API key (falls back to ALPHAVANTAGE_API_KEY)
    pub api_key: String,
    #[serde(default = "default_stocks")]
    pub stocks: Vec<TrackedAsset>,
    #[serde(default = "default_indices")]
    pub indices: Vec<TrackedAsset>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SnapshotConfig {
    /// Seconds between snapshot cycles
    pub interval_secs: u64,
    /// Minimum absolute move, in percent, that produces an alert
    pub threshold_pct: f64,
    /// Run one cycle immediately at startup instead of waiting a full interval
    pub run_on_start: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct OverviewConfig {
    /// TTL of the stocks and indices caches in seconds
    pub cache_ttl_secs: u64,
    /// Days of crypto history used for sparklines
    pub history_days: u32,
    /// Fetch real daily closes for stock/index sparklines
    pub daily_history: bool,
    /// Number of daily closes used when `daily_history` is on
    pub daily_points: usize,
    /// Length of synthesized sparklines
    pub synthetic_points: usize,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PersistenceConfig {
    /// "csv" or "memory"
    pub backend: String,
    /// Data directory for the CSV backend
    pub data_dir: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct HttpConfig {
    /// Upper bound for every upstream request
    pub timeout_ms: u64,
    pub user_agent: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    /// Emit JSON log lines instead of the human-readable format
    pub json: bool,
    /// Filter used when RUST_LOG is not set
    pub filter: String,
}

pub fn default_crypto_assets() -> Vec<TrackedAsset> {
    vec![
        TrackedAsset::new("bitcoin", "BTC", "Bitcoin"),
        TrackedAsset::new("ethereum", "ETH", "Ethereum"),
        TrackedAsset::new("solana", "SOL", "Solana"),
        TrackedAsset::new("ripple", "XRP", "Ripple"),
        TrackedAsset::new("litecoin", "LTC", "Litecoin"),
    ]
}

pub fn default_stocks() -> Vec<TrackedAsset> {
    vec![
        TrackedAsset::new("AAPL", "AAPL", "Apple"),
        TrackedAsset::new("MSFT", "MSFT", "Microsoft"),
        TrackedAsset::new("NVDA", "NVDA", "NVIDIA"),
        TrackedAsset::new("TSLA", "TSLA", "Tesla"),
        TrackedAsset::new("ADBE", "ADBE", "Adobe"),
    ]
}

/// Index exposure is tracked through the ETFs that mirror each index
pub fn default_indices() -> Vec<TrackedAsset> {
    vec![
        TrackedAsset::new("SPY", "SPY", "S&P 500"),
        TrackedAsset::new("QQQ", "QQQ", "Nasdaq 100"),
        TrackedAsset::new("DIA", "DIA", "Dow Jones"),
        TrackedAsset::new("EWJ", "EWJ", "Japan (Nikkei)"),
        TrackedAsset::new("EEM", "EEM", "Emerging Markets"),
    ]
}
