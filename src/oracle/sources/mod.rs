//! Upstream quote source implementations (CoinGecko, Alpha Vantage)

mod alphavantage;
mod coingecko;

pub use alphavantage::AlphaVantageClient;
pub use coingecko::CoinGeckoClient;

use async_trait::async_trait;
use std::collections::HashMap;
use thiserror::Error;

use crate::oracle::Quote;

/// Why an upstream call produced no usable quote
#[derive(Debug, Error)]
pub enum SourceError {
    /// Network, DNS, TLS or timeout failure
    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),
    /// The upstream answered with a non-success HTTP status
    #[error("upstream returned HTTP {0}")]
    Status(reqwest::StatusCode),
    /// A rate-limit marker was embedded in an otherwise successful response
    #[error("rate limited for {id}: {message}")]
    RateLimited { id: String, message: String },
    /// The payload could not be read as a quote
    #[error("malformed payload for {id}: {reason}")]
    Malformed { id: String, reason: String },
    /// The upstream has nothing for the requested id
    #[error("no data for {0}")]
    NoData(String),
    /// The source is missing required credentials
    #[error("source not configured: {0}")]
    NotConfigured(&'static str),
}

impl SourceError {
    /// Client-level failures abort a whole batch; everything else is per-id
    pub fn is_client_failure(&self) -> bool {
        matches!(
            self,
            SourceError::Transport(_) | SourceError::Status(_) | SourceError::NotConfigured(_)
        )
    }
}

/// Batched crypto quote source
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait CryptoQuoteSource: Send + Sync {
    /// Get the source name
    fn name(&self) -> &'static str;

    /// Price and 24h change for every requested id the upstream knows about.
    ///
    /// Ids missing from the response, or whose price is malformed, are left
    /// out of the map. The whole call fails only on client-level errors.
    async fn fetch_quotes(&self, ids: &[String]) -> Result<HashMap<String, Quote>, SourceError>;

    /// Raw USD prices of the trailing `days` of history, oldest first
    async fn fetch_history(&self, id: &str, days: u32) -> Result<Vec<f64>, SourceError>;
}

/// Per-symbol traditional market quote source
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait MarketQuoteSource: Send + Sync {
    /// Get the source name
    fn name(&self) -> &'static str;

    /// Latest quote for one symbol
    async fn fetch_quote(&self, symbol: &str) -> Result<Quote, SourceError>;

    /// The most recent `count` daily closes, oldest first
    async fn fetch_daily_closes(&self, symbol: &str, count: usize)
        -> Result<Vec<f64>, SourceError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn client_failures_are_distinguished_from_per_id_failures() {
        assert!(SourceError::Status(reqwest::StatusCode::BAD_GATEWAY).is_client_failure());
        assert!(SourceError::NotConfigured("api key").is_client_failure());
        assert!(!SourceError::NoData("AAPL".to_string()).is_client_failure());
        assert!(!SourceError::RateLimited {
            id: "AAPL".to_string(),
            message: "slow down".to_string()
        }
        .is_client_failure());
        assert!(!SourceError::Malformed {
            id: "AAPL".to_string(),
            reason: "price".to_string()
        }
        .is_client_failure());
    }
}
