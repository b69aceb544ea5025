//! In-memory store backend

use anyhow::Result;
use async_trait::async_trait;
use tokio::sync::RwLock;

use super::{AlertStore, SnapshotStore};
use crate::types::{Alert, Snapshot};

/// Volatile snapshot + alert store, lost on restart
#[derive(Debug, Default)]
pub struct MemoryStore {
    snapshots: RwLock<Vec<Snapshot>>,
    alerts: RwLock<Vec<Alert>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn snapshot_count(&self) -> usize {
        self.snapshots.read().await.len()
    }

    pub async fn alert_count(&self) -> usize {
        self.alerts.read().await.len()
    }
}

#[async_trait]
impl SnapshotStore for MemoryStore {
    async fn append(&self, snapshot: &Snapshot) -> Result<()> {
        self.snapshots.write().await.push(snapshot.clone());
        Ok(())
    }

    async fn latest(&self, symbol: &str) -> Result<Option<Snapshot>> {
        Ok(self
            .snapshots
            .read()
            .await
            .iter()
            .filter(|s| s.symbol == symbol)
            .max_by_key(|s| s.timestamp_utc)
            .cloned())
    }
}

#[async_trait]
impl AlertStore for MemoryStore {
    async fn append(&self, alert: &Alert) -> Result<()> {
        self.alerts.write().await.push(alert.clone());
        Ok(())
    }

    async fn latest_n(&self, count: usize) -> Result<Vec<Alert>> {
        let mut alerts = self.alerts.read().await.clone();
        alerts.sort_by(|a, b| b.created_utc.cmp(&a.created_utc));
        alerts.truncate(count);
        Ok(alerts)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::AssetClass;
    use chrono::{Duration, Utc};
    use rust_decimal_macros::dec;

    #[tokio::test]
    async fn latest_is_by_timestamp_not_insertion_order() {
        let store = MemoryStore::new();
        let now = Utc::now();
        let newer = Snapshot::new("XRP", AssetClass::Crypto, dec!(0.6), now);
        let older = Snapshot::new("XRP", AssetClass::Crypto, dec!(0.5), now - Duration::minutes(5));

        SnapshotStore::append(&store, &newer).await.unwrap();
        SnapshotStore::append(&store, &older).await.unwrap();

        assert_eq!(store.latest("XRP").await.unwrap().unwrap().price, dec!(0.6));
        assert!(store.latest("LTC").await.unwrap().is_none());
        assert_eq!(store.snapshot_count().await, 2);
    }
}
