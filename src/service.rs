//! Market service
//!
//! The entry points callers use: composite overview, live crypto map, the
//! snapshot cycle and recent alerts. Wires sources, stores and the overview
//! cache together from [`AppConfig`].

use anyhow::{Context, Result};
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::info;

use crate::config::AppConfig;
use crate::monitor::{ChangeDetector, CycleReport, SnapshotJob, SnapshotScheduler};
use crate::oracle::sources::{AlphaVantageClient, CoinGeckoClient, CryptoQuoteSource, MarketQuoteSource};
use crate::oracle::{OverviewAggregator, OverviewCache, OverviewError, OverviewSettings, Universe};
use crate::persistence::{AlertStore, CsvPersistence, MemoryStore, SnapshotStore};
use crate::types::{Alert, CompositeOverview, Instrument};

/// Alerts returned when the caller does not ask for a count
pub const DEFAULT_ALERT_LIMIT: usize = 50;

pub struct MarketService {
    aggregator: Arc<OverviewAggregator>,
    job: Arc<SnapshotJob>,
    alerts: Arc<dyn AlertStore>,
}

impl MarketService {
    pub fn new(
        aggregator: Arc<OverviewAggregator>,
        job: Arc<SnapshotJob>,
        alerts: Arc<dyn AlertStore>,
    ) -> Self {
        Self {
            aggregator,
            job,
            alerts,
        }
    }

    /// Build the live service: HTTP clients, the configured store backend and
    /// a fresh overview cache.
    pub fn from_config(config: &AppConfig) -> Result<Self> {
        let timeout = config.http_timeout();

        let crypto: Arc<dyn CryptoQuoteSource> = Arc::new(
            CoinGeckoClient::new(&config.crypto.base_url, timeout, &config.http.user_agent)
                .context("Failed to build CoinGecko client")?,
        );
        let market: Arc<dyn MarketQuoteSource> = Arc::new(
            AlphaVantageClient::new(
                &config.market.base_url,
                &config.market.api_key,
                timeout,
                &config.http.user_agent,
            )
            .context("Failed to build Alpha Vantage client")?,
        );

        let (snapshots, alerts): (Arc<dyn SnapshotStore>, Arc<dyn AlertStore>) =
            match config.persistence.backend.as_str() {
                "memory" => {
                    let store = Arc::new(MemoryStore::new());
                    (store.clone(), store)
                }
                _ => {
                    let store = Arc::new(CsvPersistence::new(&config.persistence.data_dir)?);
                    (store.clone(), store)
                }
            };

        let aggregator = OverviewAggregator::new(
            crypto.clone(),
            market,
            Universe::from_config(config),
            OverviewSettings::from_config(config),
            Arc::new(OverviewCache::default()),
        );

        let job = SnapshotJob::new(
            crypto,
            snapshots,
            alerts.clone(),
            config.crypto.assets.clone(),
            ChangeDetector::new(config.threshold()),
        );

        info!(backend = %config.persistence.backend, "Market service ready");

        Ok(Self::new(Arc::new(aggregator), Arc::new(job), alerts))
    }

    pub async fn overview(&self) -> Result<CompositeOverview, OverviewError> {
        self.aggregator.overview().await
    }

    /// Current crypto quotes keyed by symbol, without sparklines
    pub async fn live_crypto(&self) -> Result<BTreeMap<String, Instrument>, OverviewError> {
        self.aggregator.live_crypto().await
    }

    /// One snapshot cycle. Not safe to call concurrently with itself or with
    /// a running [`SnapshotScheduler`].
    pub async fn run_snapshot_cycle(&self) -> Result<CycleReport> {
        self.job.run_cycle().await
    }

    /// Up to `limit` alerts, newest first
    pub async fn recent_alerts(&self, limit: usize) -> Result<Vec<Alert>> {
        self.alerts.latest_n(limit).await
    }

    pub async fn recent_alerts_default(&self) -> Result<Vec<Alert>> {
        self.recent_alerts(DEFAULT_ALERT_LIMIT).await
    }

    /// Scheduler driving this service's snapshot job
    pub fn scheduler(&self, config: &AppConfig) -> SnapshotScheduler {
        SnapshotScheduler::new(
            self.job.clone(),
            config.snapshot_interval(),
            config.snapshot.run_on_start,
        )
    }
}
