//! Snapshot Job
//!
//! One cycle: fetch the crypto batch, then per tracked asset read the previous
//! snapshot, persist the new one and record an alert when the move clears the
//! detector threshold.
//!
//! Callers must not run two cycles at once. Concurrent cycles can read the same
//! previous snapshot and emit duplicate alerts; [`super::SnapshotScheduler`]
//! runs them strictly one after another.

use anyhow::{Context, Result};
use chrono::Utc;
use std::sync::Arc;
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::detector::ChangeDetector;
use crate::oracle::sources::CryptoQuoteSource;
use crate::persistence::{AlertStore, SnapshotStore};
use crate::types::{Alert, AssetClass, Snapshot, TrackedAsset};

/// What one cycle wrote
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CycleReport {
    pub snapshots: usize,
    pub alerts: usize,
    /// Tracked assets missing from the upstream response
    pub skipped: usize,
}

pub struct SnapshotJob {
    source: Arc<dyn CryptoQuoteSource>,
    snapshots: Arc<dyn SnapshotStore>,
    alerts: Arc<dyn AlertStore>,
    assets: Vec<TrackedAsset>,
    detector: ChangeDetector,
}

impl SnapshotJob {
    pub fn new(
        source: Arc<dyn CryptoQuoteSource>,
        snapshots: Arc<dyn SnapshotStore>,
        alerts: Arc<dyn AlertStore>,
        assets: Vec<TrackedAsset>,
        detector: ChangeDetector,
    ) -> Self {
        Self {
            source,
            snapshots,
            alerts,
            assets,
            detector,
        }
    }

    pub fn assets(&self) -> &[TrackedAsset] {
        &self.assets
    }

    /// Run a single snapshot cycle.
    ///
    /// A failed batch fetch aborts the cycle before anything is written. A
    /// store failure aborts the remaining symbols; rows already written stay.
    pub async fn run_cycle(&self) -> Result<CycleReport> {
        let ids: Vec<String> = self.assets.iter().map(|a| a.id.clone()).collect();

        let quotes = self
            .source
            .fetch_quotes(&ids)
            .await
            .context("Crypto quote fetch failed, cycle skipped")?;

        let mut report = CycleReport::default();

        for asset in &self.assets {
            let Some(quote) = quotes.get(&asset.id) else {
                warn!(symbol = %asset.symbol, id = %asset.id, "No quote in response, skipping");
                report.skipped += 1;
                continue;
            };

            let snapshot = Snapshot::new(&asset.symbol, AssetClass::Crypto, quote.price, Utc::now());

            let previous = self
                .snapshots
                .latest(&asset.symbol)
                .await
                .with_context(|| format!("Failed to read previous snapshot for {}", asset.symbol))?;

            self.snapshots
                .append(&snapshot)
                .await
                .with_context(|| format!("Failed to save snapshot for {}", asset.symbol))?;
            report.snapshots += 1;

            debug!(symbol = %asset.symbol, price = %snapshot.price, "Snapshot saved");

            let Some(old_price) = previous.map(|p| p.price) else {
                continue;
            };
            let Some(change) = self.detector.detect(Some(old_price), snapshot.price) else {
                continue;
            };

            let alert = Alert {
                id: Uuid::new_v4(),
                symbol: asset.symbol.clone(),
                asset_class: AssetClass::Crypto,
                old_price,
                new_price: snapshot.price,
                change_percent: change.change_percent,
                direction: change.direction,
                created_utc: Utc::now(),
            };

            self.alerts
                .append(&alert)
                .await
                .with_context(|| format!("Failed to save alert for {}", asset.symbol))?;
            report.alerts += 1;

            info!(
                symbol = %alert.symbol,
                old = %alert.old_price,
                new = %alert.new_price,
                change = %alert.change_percent,
                direction = %alert.direction,
                "Price move alert"
            );
        }

        Ok(report)
    }
}
