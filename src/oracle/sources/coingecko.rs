//! CoinGecko REST client
//!
//! Batched spot prices via `/simple/price` and per-coin history via
//! `/coins/{id}/market_chart`.

use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde_json::Value;
use std::collections::HashMap;
use std::time::Duration;
use tracing::{debug, warn};

use crate::oracle::normalizer;
use crate::oracle::sources::{CryptoQuoteSource, SourceError};
use crate::oracle::Quote;

pub const COINGECKO_API_URL: &str = "https://api.coingecko.com/api/v3";

/// REST client for the CoinGecko public API
#[derive(Debug, Clone)]
pub struct CoinGeckoClient {
    client: Client,
    base_url: String,
}

impl CoinGeckoClient {
    /// Create a new client; every request is bounded by `timeout`
    pub fn new(base_url: &str, timeout: Duration, user_agent: &str) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .user_agent(user_agent)
            .build()
            .context("Failed to create CoinGecko HTTP client")?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    async fn get_json(&self, url: &str, query: &[(&str, &str)], id: &str) -> Result<Value, SourceError> {
        let response = self.client.get(url).query(query).send().await?;

        let status = response.status();
        if !status.is_success() {
            return Err(SourceError::Status(status));
        }

        let body = response.text().await?;
        serde_json::from_str(&body).map_err(|e| SourceError::Malformed {
            id: id.to_string(),
            reason: e.to_string(),
        })
    }
}

#[async_trait]
impl CryptoQuoteSource for CoinGeckoClient {
    fn name(&self) -> &'static str {
        "CoinGecko"
    }

    async fn fetch_quotes(&self, ids: &[String]) -> Result<HashMap<String, Quote>, SourceError> {
        let joined = ids.join(",");
        let url = format!("{}/simple/price", self.base_url);
        let root = self
            .get_json(
                &url,
                &[
                    ("ids", joined.as_str()),
                    ("vs_currencies", "usd"),
                    ("include_24hr_change", "true"),
                ],
                &joined,
            )
            .await?;

        let mut quotes = HashMap::with_capacity(ids.len());
        for id in ids {
            let Some(entry) = root.get(id) else {
                debug!(source = %self.name(), id = %id, "No price returned");
                continue;
            };
            match normalizer::parse_coingecko_entry(id, entry) {
                Ok(quote) => {
                    quotes.insert(id.clone(), quote);
                }
                Err(e) => {
                    warn!(source = %self.name(), id = %id, error = %e, "Skipping malformed quote");
                }
            }
        }

        debug!(
            source = %self.name(),
            requested = ids.len(),
            received = quotes.len(),
            "Fetched batched quotes"
        );
        Ok(quotes)
    }

    async fn fetch_history(&self, id: &str, days: u32) -> Result<Vec<f64>, SourceError> {
        let url = format!("{}/coins/{}/market_chart", self.base_url, id);
        let days = days.to_string();
        let root = self
            .get_json(&url, &[("vs_currency", "usd"), ("days", days.as_str())], id)
            .await?;

        let prices = normalizer::parse_market_chart(&root);
        debug!(source = %self.name(), id = %id, points = prices.len(), "Fetched history");
        Ok(prices)
    }
}
