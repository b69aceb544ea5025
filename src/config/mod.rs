//! Configuration management for MarketPulse
//!
//! Loads from optional config files + environment variables via .env

mod types;

pub use types::*;

use anyhow::{bail, Context, Result};
use config::{Config, Environment, File};
use rust_decimal::Decimal;
use serde::Deserialize;
use std::str::FromStr;
use std::time::Duration;

/// Main application configuration
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub crypto: CryptoConfig,
    pub market: MarketConfig,
    pub snapshot: SnapshotConfig,
    pub overview: OverviewConfig,
    pub persistence: PersistenceConfig,
    pub http: HttpConfig,
    pub logging: LoggingConfig,
}

impl AppConfig {
    /// Load configuration from file and environment
    pub fn load() -> Result<Self> {
        // Load .env file first
        dotenvy::dotenv().ok();

        let config = Config::builder()
            // Crypto source defaults
            .set_default("crypto.base_url", "https://api.coingecko.com/api/v3")?
            // Traditional market defaults
            .set_default("market.base_url", "https://www.alphavantage.co")?
            .set_default("market.api_key", "")?
            // Snapshot job defaults
            .set_default("snapshot.interval_secs", 300)?
            .set_default("snapshot.threshold_pct", 0.01)?
            .set_default("snapshot.run_on_start", true)?
            // Overview defaults
            .set_default("overview.cache_ttl_secs", 60)?
            .set_default("overview.history_days", 7)?
            .set_default("overview.daily_history", false)?
            .set_default("overview.daily_points", 7)?
            .set_default("overview.synthetic_points", 20)?
            // Persistence defaults
            .set_default("persistence.backend", "csv")?
            .set_default("persistence.data_dir", "./data")?
            // HTTP defaults
            .set_default("http.timeout_ms", 10_000)?
            .set_default(
                "http.user_agent",
                concat!("marketpulse/", env!("CARGO_PKG_VERSION")),
            )?
            // Logging defaults
            .set_default("logging.json", false)?
            .set_default("logging.filter", "marketpulse=info")?
            // Load config file if exists
            .add_source(File::with_name("config/default").required(false))
            .add_source(File::with_name("config/local").required(false))
            // Override with environment variables (MARKETPULSE__*)
            .add_source(Environment::with_prefix("MARKETPULSE").separator("__"))
            .build()
            .context("Failed to build configuration")?;

        let mut app_config: AppConfig = config
            .try_deserialize()
            .context("Failed to deserialize configuration")?;

        if app_config.market.api_key.trim().is_empty() {
            if let Ok(key) = std::env::var("ALPHAVANTAGE_API_KEY") {
                app_config.market.api_key = key;
            }
        }

        app_config.validate()?;
        Ok(app_config)
    }

    /// Reject settings the runtime cannot work with
    pub fn validate(&self) -> Result<()> {
        if self.snapshot.interval_secs == 0 {
            bail!("snapshot.interval_secs must be greater than zero");
        }
        if !self.snapshot.threshold_pct.is_finite() || self.snapshot.threshold_pct < 0.005 {
            bail!("snapshot.threshold_pct must be at least 0.005");
        }
        if self.http.timeout_ms == 0 {
            bail!("http.timeout_ms must be greater than zero");
        }
        if self.crypto.assets.is_empty() {
            bail!("crypto.assets must list at least one asset");
        }
        match self.persistence.backend.as_str() {
            "csv" | "memory" => {}
            other => bail!("Unknown persistence.backend '{}' (expected csv or memory)", other),
        }
        Ok(())
    }

    pub fn snapshot_interval(&self) -> Duration {
        Duration::from_secs(self.snapshot.interval_secs)
    }

    pub fn cache_ttl(&self) -> Duration {
        Duration::from_secs(self.overview.cache_ttl_secs)
    }

    pub fn http_timeout(&self) -> Duration {
        Duration::from_millis(self.http.timeout_ms)
    }

    /// Alert threshold as a decimal percentage
    pub fn threshold(&self) -> Decimal {
        Decimal::from_str(&self.snapshot.threshold_pct.to_string())
            .unwrap_or(crate::monitor::DEFAULT_THRESHOLD_PCT)
    }

    /// Generate a digest of the config (without secrets) for logging
    pub fn digest(&self) -> String {
        format!(
            "crypto={:?} stocks={} indices={} interval={}s threshold={}% ttl={}s backend={} api_key_set={}",
            self.crypto
                .assets
                .iter()
                .map(|a| a.symbol.as_str())
                .collect::<Vec<_>>(),
            self.market.stocks.len(),
            self.market.indices.len(),
            self.snapshot.interval_secs,
            self.snapshot.threshold_pct,
            self.overview.cache_ttl_secs,
            self.persistence.backend,
            !self.market.api_key.trim().is_empty()
        )
    }
}

impl std::fmt::Display for AppConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.digest())
    }
}
