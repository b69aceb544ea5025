//! Alpha Vantage REST client
//!
//! One `GLOBAL_QUOTE` call per symbol (the API has no batch endpoint) and an
//! optional `TIME_SERIES_DAILY` lookup for real sparklines. Throttling is
//! reported inside 200 responses, so every body is scanned for the
//! rate-limit marker before it is read as data.

use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde_json::Value;
use std::time::Duration;
use tracing::debug;

use crate::oracle::normalizer;
use crate::oracle::sources::{MarketQuoteSource, SourceError};
use crate::oracle::Quote;

pub const ALPHAVANTAGE_API_URL: &str = "https://www.alphavantage.co";

/// REST client for Alpha Vantage
#[derive(Clone)]
pub struct AlphaVantageClient {
    client: Client,
    base_url: String,
    api_key: String,
}

impl std::fmt::Debug for AlphaVantageClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AlphaVantageClient")
            .field("base_url", &self.base_url)
            .field("api_key", &"<redacted>")
            .finish()
    }
}

impl AlphaVantageClient {
    /// Create a new client; every request is bounded by `timeout`
    pub fn new(base_url: &str, api_key: &str, timeout: Duration, user_agent: &str) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .user_agent(user_agent)
            .build()
            .context("Failed to create Alpha Vantage HTTP client")?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.trim().to_string(),
        })
    }

    async fn query(&self, function: &str, symbol: &str) -> Result<Value, SourceError> {
        if self.api_key.is_empty() {
            return Err(SourceError::NotConfigured("ALPHAVANTAGE_API_KEY"));
        }

        let url = format!("{}/query", self.base_url);
        // The key travels in the query string, keep it out of error messages
        let response = self
            .client
            .get(&url)
            .query(&[
                ("function", function),
                ("symbol", symbol),
                ("apikey", self.api_key.as_str()),
            ])
            .send()
            .await
            .map_err(|e| SourceError::Transport(e.without_url()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(SourceError::Status(status));
        }

        let body = response
            .text()
            .await
            .map_err(|e| SourceError::Transport(e.without_url()))?;
        serde_json::from_str(&body).map_err(|e| SourceError::Malformed {
            id: symbol.to_string(),
            reason: e.to_string(),
        })
    }
}

#[async_trait]
impl MarketQuoteSource for AlphaVantageClient {
    fn name(&self) -> &'static str {
        "AlphaVantage"
    }

    async fn fetch_quote(&self, symbol: &str) -> Result<Quote, SourceError> {
        let root = self.query("GLOBAL_QUOTE", symbol).await?;
        let quote = normalizer::parse_global_quote(symbol, &root)?;
        debug!(source = %self.name(), symbol = %symbol, price = %quote.price, "Fetched quote");
        Ok(quote)
    }

    async fn fetch_daily_closes(
        &self,
        symbol: &str,
        count: usize,
    ) -> Result<Vec<f64>, SourceError> {
        let root = self.query("TIME_SERIES_DAILY", symbol).await?;
        normalizer::parse_daily_closes(symbol, &root, count)
    }
}
