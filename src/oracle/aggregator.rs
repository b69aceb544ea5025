//! Overview Aggregator - Combines crypto, stock and index data
//!
//! Fetches the three asset classes concurrently. Crypto is always live;
//! stocks and indices go through the per-class TTL cache. Any class that comes
//! back empty or failed is filled from the last successful composite, and the
//! read only fails when nothing has ever been available.

use futures_util::future::join_all;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, error, info, warn};

use crate::config::AppConfig;
use crate::oracle::cache::OverviewCache;
use crate::oracle::normalizer::to_instrument;
use crate::oracle::sources::{CryptoQuoteSource, MarketQuoteSource, SourceError};
use crate::oracle::sparkline;
use crate::types::{AssetClass, CompositeOverview, Instrument, TrackedAsset};

#[derive(Debug, Error)]
pub enum OverviewError {
    /// No live data and no earlier composite to fall back to
    #[error("No market data available")]
    Unavailable,
    #[error(transparent)]
    Source(#[from] SourceError),
}

/// Assets shown in the overview, per class, in display order
#[derive(Debug, Clone, Default)]
pub struct Universe {
    pub crypto: Vec<TrackedAsset>,
    pub stocks: Vec<TrackedAsset>,
    pub indices: Vec<TrackedAsset>,
}

impl Universe {
    pub fn from_config(config: &AppConfig) -> Self {
        Self {
            crypto: config.crypto.assets.clone(),
            stocks: config.market.stocks.clone(),
            indices: config.market.indices.clone(),
        }
    }

    fn assets(&self, class: AssetClass) -> &[TrackedAsset] {
        match class {
            AssetClass::Crypto => &self.crypto,
            AssetClass::Stock => &self.stocks,
            AssetClass::Index => &self.indices,
        }
    }
}

#[derive(Debug, Clone)]
pub struct OverviewSettings {
    /// TTL of the stock and index caches
    pub cache_ttl: Duration,
    /// Days of crypto history behind each sparkline
    pub history_days: u32,
    /// Use real daily closes for stock/index sparklines
    pub daily_history: bool,
    pub daily_points: usize,
    pub synthetic_points: usize,
}

impl Default for OverviewSettings {
    fn default() -> Self {
        Self {
            cache_ttl: Duration::from_secs(60),
            history_days: 7,
            daily_history: false,
            daily_points: 7,
            synthetic_points: sparkline::SYNTHETIC_POINTS,
        }
    }
}

impl OverviewSettings {
    pub fn from_config(config: &AppConfig) -> Self {
        Self {
            cache_ttl: config.cache_ttl(),
            history_days: config.overview.history_days,
            daily_history: config.overview.daily_history,
            daily_points: config.overview.daily_points,
            synthetic_points: config.overview.synthetic_points,
        }
    }
}

/// Read path for the composite market overview
pub struct OverviewAggregator {
    crypto: Arc<dyn CryptoQuoteSource>,
    market: Arc<dyn MarketQuoteSource>,
    universe: Universe,
    settings: OverviewSettings,
    cache: Arc<OverviewCache>,
}

impl OverviewAggregator {
    pub fn new(
        crypto: Arc<dyn CryptoQuoteSource>,
        market: Arc<dyn MarketQuoteSource>,
        universe: Universe,
        settings: OverviewSettings,
        cache: Arc<OverviewCache>,
    ) -> Self {
        Self {
            crypto,
            market,
            universe,
            settings,
            cache,
        }
    }

    pub fn cache(&self) -> &Arc<OverviewCache> {
        &self.cache
    }

    /// Assemble the composite overview.
    ///
    /// Never fails once any composite has been served before; degraded
    /// answers are still answers.
    pub async fn overview(&self) -> Result<CompositeOverview, OverviewError> {
        let (crypto, stocks, indices) = tokio::join!(
            self.fetch_crypto(),
            self.fetch_cached(AssetClass::Stock),
            self.fetch_cached(AssetClass::Index),
        );

        let last = self.cache.last_good();
        let composite = CompositeOverview {
            crypto: resolve_class(AssetClass::Crypto, crypto, last.as_ref()),
            stocks: resolve_class(AssetClass::Stock, stocks, last.as_ref()),
            indices: resolve_class(AssetClass::Index, indices, last.as_ref()),
        };

        if !composite.is_empty() {
            self.cache.set_last_good(composite.clone());
            info!(
                crypto = composite.crypto.len(),
                stocks = composite.stocks.len(),
                indices = composite.indices.len(),
                total = composite.len(),
                "Market overview assembled"
            );
            return Ok(composite);
        }

        if let Some(last) = last {
            warn!("No class produced data, serving last successful overview");
            return Ok(last);
        }

        error!("No market data available from any source");
        Err(OverviewError::Unavailable)
    }

    /// Live crypto quotes keyed by symbol, without sparklines
    pub async fn live_crypto(&self) -> Result<BTreeMap<String, Instrument>, OverviewError> {
        let ids = ids_of(&self.universe.crypto);
        let quotes = self.crypto.fetch_quotes(&ids).await?;

        Ok(self
            .universe
            .crypto
            .iter()
            .filter_map(|asset| {
                quotes.get(&asset.id).map(|quote| {
                    (
                        asset.symbol.clone(),
                        to_instrument(asset, AssetClass::Crypto, quote, Vec::new()),
                    )
                })
            })
            .collect())
    }

    /// Crypto is never cached: one batched quote call, then one history call
    /// per instrument for its sparkline.
    pub async fn fetch_crypto(&self) -> Result<Vec<Instrument>, SourceError> {
        let ids = ids_of(&self.universe.crypto);
        let quotes = self.crypto.fetch_quotes(&ids).await?;

        let priced: Vec<_> = self
            .universe
            .crypto
            .iter()
            .filter_map(|asset| quotes.get(&asset.id).map(|quote| (asset, quote)))
            .collect();

        let sparklines = join_all(priced.iter().map(|(asset, _)| self.crypto_sparkline(asset))).await;

        Ok(priced
            .into_iter()
            .zip(sparklines)
            .map(|((asset, quote), spark)| to_instrument(asset, AssetClass::Crypto, quote, spark))
            .collect())
    }

    async fn crypto_sparkline(&self, asset: &TrackedAsset) -> Vec<f64> {
        match self
            .crypto
            .fetch_history(&asset.id, self.settings.history_days)
            .await
        {
            Ok(history) => {
                if history.is_empty() {
                    warn!(symbol = %asset.symbol, "Empty history, using synthesized sparkline");
                }
                sparkline::from_history_or_synthetic(&history, self.settings.synthetic_points)
            }
            Err(e) => {
                warn!(symbol = %asset.symbol, error = %e, "History fetch failed, using synthesized sparkline");
                sparkline::synthesize(self.settings.synthetic_points)
            }
        }
    }

    async fn fetch_cached(&self, class: AssetClass) -> Result<Vec<Instrument>, SourceError> {
        self.cache
            .get_or_refresh(class, self.settings.cache_ttl, || self.fetch_market_class(class))
            .await
    }

    /// One quote call per symbol, sequentially to stay inside the upstream
    /// rate limit. Symbols that fail are skipped; the class only fails when
    /// nothing was fetched and a client-level error occurred.
    async fn fetch_market_class(&self, class: AssetClass) -> Result<Vec<Instrument>, SourceError> {
        let assets = self.universe.assets(class);
        let mut instruments = Vec::with_capacity(assets.len());
        let mut client_error = None;

        for asset in assets {
            match self.market.fetch_quote(&asset.id).await {
                Ok(quote) => {
                    let spark = self.market_sparkline(asset).await;
                    instruments.push(to_instrument(asset, class, &quote, spark));
                }
                Err(e @ SourceError::NotConfigured(_)) => {
                    warn!(class = %class, error = %e, "Market source not configured");
                    return Err(e);
                }
                Err(e) if e.is_client_failure() => {
                    warn!(class = %class, symbol = %asset.symbol, error = %e, "Quote request failed");
                    client_error = Some(e);
                }
                Err(e) => {
                    warn!(class = %class, symbol = %asset.symbol, error = %e, "No usable quote");
                }
            }
        }

        debug!(class = %class, fetched = instruments.len(), requested = assets.len(), "Class refreshed");

        match client_error {
            Some(e) if instruments.is_empty() => Err(e),
            _ => Ok(instruments),
        }
    }

    async fn market_sparkline(&self, asset: &TrackedAsset) -> Vec<f64> {
        if !self.settings.daily_history {
            return sparkline::synthesize(self.settings.synthetic_points);
        }

        match self
            .market
            .fetch_daily_closes(&asset.id, self.settings.daily_points)
            .await
        {
            Ok(closes) => {
                sparkline::from_history_or_synthetic(&closes, self.settings.synthetic_points)
            }
            Err(e) => {
                debug!(symbol = %asset.symbol, error = %e, "Daily closes unavailable, using synthesized sparkline");
                sparkline::synthesize(self.settings.synthetic_points)
            }
        }
    }
}

fn ids_of(assets: &[TrackedAsset]) -> Vec<String> {
    assets.iter().map(|a| a.id.clone()).collect()
}

/// Live non-empty data wins; otherwise the class slice of the last composite
fn resolve_class(
    class: AssetClass,
    live: Result<Vec<Instrument>, SourceError>,
    last: Option<&CompositeOverview>,
) -> Vec<Instrument> {
    let fallback = || {
        last.map(|l| l.class(class).to_vec())
            .filter(|slice| !slice.is_empty())
    };

    match live {
        Ok(instruments) if !instruments.is_empty() => instruments,
        Ok(_) => {
            warn!(class = %class, "Live fetch returned nothing, using last overview");
            fallback().unwrap_or_default()
        }
        Err(e) => {
            warn!(class = %class, error = %e, "Live fetch failed, using last overview");
            fallback().unwrap_or_default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::oracle::sources::{MockCryptoQuoteSource, MockMarketQuoteSource};
    use crate::oracle::Quote;
    use rust_decimal_macros::dec;
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use std::sync::Mutex;

    fn universe() -> Universe {
        Universe {
            crypto: vec![
                TrackedAsset::new("bitcoin", "BTC", "Bitcoin"),
                TrackedAsset::new("ethereum", "ETH", "Ethereum"),
                TrackedAsset::new("solana", "SOL", "Solana"),
            ],
            stocks: vec![TrackedAsset::new("AAPL", "AAPL", "Apple")],
            indices: vec![TrackedAsset::new("SPY", "SPY", "S&P 500")],
        }
    }

    fn all_crypto_quotes() -> HashMap<String, Quote> {
        HashMap::from([
            ("bitcoin".to_string(), Quote::new(dec!(60000), dec!(1.5))),
            ("ethereum".to_string(), Quote::new(dec!(3000), dec!(-0.4))),
            ("solana".to_string(), Quote::new(dec!(150), dec!(2))),
        ])
    }

    fn status_error() -> SourceError {
        SourceError::Status(reqwest::StatusCode::SERVICE_UNAVAILABLE)
    }

    /// Crypto source that succeeds while `healthy` is set
    fn crypto_source(healthy: Arc<AtomicBool>) -> MockCryptoQuoteSource {
        let mut crypto = MockCryptoQuoteSource::new();
        crypto.expect_fetch_quotes().returning(move |_ids| {
            if healthy.load(Ordering::SeqCst) {
                Ok(all_crypto_quotes())
            } else {
                Err(status_error())
            }
        });
        crypto
            .expect_fetch_history()
            .returning(|_id, _days| Ok(vec![1.0, 2.0, 3.0]));
        crypto
    }

    /// Market source recording every quote request
    fn market_source(calls: Arc<Mutex<Vec<String>>>, healthy: Arc<AtomicBool>) -> MockMarketQuoteSource {
        let mut market = MockMarketQuoteSource::new();
        market.expect_fetch_quote().returning(move |symbol| {
            calls.lock().unwrap().push(symbol.to_string());
            if healthy.load(Ordering::SeqCst) {
                Ok(Quote::new(dec!(100), dec!(0.5)))
            } else {
                Err(status_error())
            }
        });
        market
    }

    fn aggregator(crypto: MockCryptoQuoteSource, market: MockMarketQuoteSource) -> OverviewAggregator {
        OverviewAggregator::new(
            Arc::new(crypto),
            Arc::new(market),
            universe(),
            OverviewSettings::default(),
            Arc::new(OverviewCache::new()),
        )
    }

    #[tokio::test(start_paused = true)]
    async fn overview_combines_all_classes_with_real_crypto_sparklines() {
        let calls = Arc::new(Mutex::new(Vec::new()));
        let agg = aggregator(
            crypto_source(Arc::new(AtomicBool::new(true))),
            market_source(calls.clone(), Arc::new(AtomicBool::new(true))),
        );

        let overview = agg.overview().await.unwrap();
        assert_eq!(overview.crypto.len(), 3);
        assert_eq!(overview.stocks.len(), 1);
        assert_eq!(overview.indices.len(), 1);
        assert_eq!(overview.crypto[0].symbol, "BTC");
        assert_eq!(overview.crypto[0].sparkline, vec![0.0, 0.5, 1.0]);
        assert_eq!(overview.stocks[0].sparkline.len(), sparkline::SYNTHETIC_POINTS);
        assert_eq!(overview.indices[0].asset_class, AssetClass::Index);
        assert!(agg.cache().last_good().is_some());
    }

    #[tokio::test(start_paused = true)]
    async fn failed_crypto_falls_back_to_last_overview_while_others_stay_fresh() {
        let crypto_ok = Arc::new(AtomicBool::new(true));
        let calls = Arc::new(Mutex::new(Vec::new()));
        let agg = aggregator(
            crypto_source(crypto_ok.clone()),
            market_source(calls.clone(), Arc::new(AtomicBool::new(true))),
        );

        let first = agg.overview().await.unwrap();
        assert_eq!(first.crypto.len(), 3);

        crypto_ok.store(false, Ordering::SeqCst);
        tokio::time::advance(Duration::from_secs(120)).await;

        let second = agg.overview().await.unwrap();
        assert_eq!(second.crypto, first.crypto);
        assert_eq!(second.stocks.len(), 1);
        // stocks were re-fetched after the TTL, not served from the fallback
        assert_eq!(calls.lock().unwrap().iter().filter(|s| *s == "AAPL").count(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn failed_stocks_keep_stale_instruments() {
        let market_ok = Arc::new(AtomicBool::new(true));
        let calls = Arc::new(Mutex::new(Vec::new()));
        let agg = aggregator(
            crypto_source(Arc::new(AtomicBool::new(true))),
            market_source(calls, market_ok.clone()),
        );

        let first = agg.overview().await.unwrap();
        market_ok.store(false, Ordering::SeqCst);
        tokio::time::advance(Duration::from_secs(120)).await;

        let second = agg.overview().await.unwrap();
        assert_eq!(second.stocks, first.stocks);
        assert_eq!(second.indices, first.indices);
        assert_eq!(second.crypto.len(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn total_failure_without_history_is_hard_failure() {
        let agg = aggregator(
            crypto_source(Arc::new(AtomicBool::new(false))),
            market_source(Arc::new(Mutex::new(Vec::new())), Arc::new(AtomicBool::new(false))),
        );

        let err = agg.overview().await.unwrap_err();
        assert!(matches!(err, OverviewError::Unavailable));
        assert!(agg.cache().last_good().is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn total_failure_after_success_serves_previous_overview() {
        let crypto_ok = Arc::new(AtomicBool::new(true));
        let market_ok = Arc::new(AtomicBool::new(true));
        let agg = aggregator(
            crypto_source(crypto_ok.clone()),
            market_source(Arc::new(Mutex::new(Vec::new())), market_ok.clone()),
        );

        let first = agg.overview().await.unwrap();
        crypto_ok.store(false, Ordering::SeqCst);
        market_ok.store(false, Ordering::SeqCst);
        tokio::time::advance(Duration::from_secs(3600)).await;

        let second = agg.overview().await.unwrap();
        assert_eq!(second, first);
    }

    #[tokio::test(start_paused = true)]
    async fn stocks_are_fetched_once_within_ttl() {
        let calls = Arc::new(Mutex::new(Vec::new()));
        let agg = aggregator(
            crypto_source(Arc::new(AtomicBool::new(true))),
            market_source(calls.clone(), Arc::new(AtomicBool::new(true))),
        );

        agg.overview().await.unwrap();
        tokio::time::advance(Duration::from_secs(30)).await;
        agg.overview().await.unwrap();

        let recorded = calls.lock().unwrap().clone();
        assert_eq!(recorded.iter().filter(|s| *s == "AAPL").count(), 1);
        assert_eq!(recorded.iter().filter(|s| *s == "SPY").count(), 1);
    }

    #[tokio::test]
    async fn history_failure_synthesizes_sparkline() {
        let mut crypto = MockCryptoQuoteSource::new();
        crypto
            .expect_fetch_quotes()
            .returning(|_ids| Ok(all_crypto_quotes()));
        crypto
            .expect_fetch_history()
            .returning(|id, _days| Err(SourceError::NoData(id.to_string())));
        let agg = aggregator(
            crypto,
            market_source(Arc::new(Mutex::new(Vec::new())), Arc::new(AtomicBool::new(true))),
        );

        let instruments = agg.fetch_crypto().await.unwrap();
        assert_eq!(instruments.len(), 3);
        for inst in instruments {
            assert_eq!(inst.sparkline.len(), sparkline::SYNTHETIC_POINTS);
            assert!(inst.sparkline.iter().all(|v| (0.0..=1.0).contains(v)));
        }
    }

    #[tokio::test]
    async fn missing_symbols_are_skipped_in_configured_order() {
        let mut crypto = MockCryptoQuoteSource::new();
        crypto.expect_fetch_quotes().returning(|_ids| {
            Ok(HashMap::from([
                ("solana".to_string(), Quote::new(dec!(150), dec!(2))),
                ("bitcoin".to_string(), Quote::new(dec!(60000), dec!(1))),
            ]))
        });
        crypto
            .expect_fetch_history()
            .returning(|_id, _days| Ok(Vec::new()));
        let agg = aggregator(
            crypto,
            market_source(Arc::new(Mutex::new(Vec::new())), Arc::new(AtomicBool::new(true))),
        );

        let symbols: Vec<_> = agg
            .fetch_crypto()
            .await
            .unwrap()
            .into_iter()
            .map(|i| i.symbol)
            .collect();
        assert_eq!(symbols, vec!["BTC", "SOL"]);

        let live = agg.live_crypto().await.unwrap();
        assert_eq!(live.len(), 2);
        assert!(live["BTC"].sparkline.is_empty());
    }

    #[tokio::test]
    async fn rate_limited_symbols_are_skipped_without_failing_the_class() {
        let mut market = MockMarketQuoteSource::new();
        let count = Arc::new(AtomicUsize::new(0));
        let seen = count.clone();
        market.expect_fetch_quote().returning(move |symbol| {
            seen.fetch_add(1, Ordering::SeqCst);
            Err(SourceError::RateLimited {
                id: symbol.to_string(),
                message: "Note".to_string(),
            })
        });
        let agg = aggregator(crypto_source(Arc::new(AtomicBool::new(true))), market);

        let stocks = agg.fetch_market_class(AssetClass::Stock).await.unwrap();
        assert!(stocks.is_empty());
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn daily_history_builds_real_market_sparkline() {
        let mut market = MockMarketQuoteSource::new();
        market
            .expect_fetch_quote()
            .returning(|_symbol| Ok(Quote::new(dec!(500), dec!(0.1))));
        market
            .expect_fetch_daily_closes()
            .returning(|_symbol, count| Ok((0..count).map(|i| i as f64).collect()));

        let agg = OverviewAggregator::new(
            Arc::new(crypto_source(Arc::new(AtomicBool::new(true)))),
            Arc::new(market),
            universe(),
            OverviewSettings {
                daily_history: true,
                ..OverviewSettings::default()
            },
            Arc::new(OverviewCache::new()),
        );

        let indices = agg.fetch_market_class(AssetClass::Index).await.unwrap();
        assert_eq!(indices.len(), 1);
        assert_eq!(indices[0].sparkline.len(), 7);
        assert_eq!(indices[0].sparkline[0], 0.0);
        assert_eq!(indices[0].sparkline[6], 1.0);
    }

    #[test]
    fn resolve_class_ignores_empty_fallback_slice() {
        let last = CompositeOverview::default();
        let resolved = resolve_class(AssetClass::Stock, Ok(Vec::new()), Some(&last));
        assert!(resolved.is_empty());
    }
}
