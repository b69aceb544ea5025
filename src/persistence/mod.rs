//! Persistence Module
//!
//! Append-only stores for price snapshots and change alerts. The CSV backend
//! keeps one file per record kind and an in-memory index of the latest
//! snapshot per symbol, rebuilt from disk at startup.

mod memory;

pub use memory::MemoryStore;

use anyhow::{Context, Result};
use async_trait::async_trait;
use csv::{ReaderBuilder, WriterBuilder};
use std::collections::HashMap;
use std::fs::{self, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use std::sync::{PoisonError, RwLock};
use tokio::sync::RwLock as AsyncRwLock;
use tracing::{debug, info, warn};

use crate::types::{Alert, Snapshot};

const SNAPSHOT_DIR: &str = "snapshots";
const SNAPSHOT_FILE: &str = "snapshots.csv";
const ALERT_DIR: &str = "alerts";
const ALERT_FILE: &str = "alerts.csv";

/// Point-in-time price history per symbol
#[async_trait]
pub trait SnapshotStore: Send + Sync {
    async fn append(&self, snapshot: &Snapshot) -> Result<()>;

    /// The snapshot with the greatest timestamp for `symbol`
    async fn latest(&self, symbol: &str) -> Result<Option<Snapshot>>;
}

/// Detected change events
#[async_trait]
pub trait AlertStore: Send + Sync {
    async fn append(&self, alert: &Alert) -> Result<()>;

    /// Up to `count` alerts, newest first
    async fn latest_n(&self, count: usize) -> Result<Vec<Alert>>;
}

/// CSV persistence manager
pub struct CsvPersistence {
    data_dir: PathBuf,
    snapshot_writer: AsyncRwLock<csv::Writer<std::fs::File>>,
    alert_writer: AsyncRwLock<csv::Writer<std::fs::File>>,
    latest_by_symbol: RwLock<HashMap<String, Snapshot>>,
}

impl CsvPersistence {
    /// Open (or create) the CSV stores under `data_dir`
    pub fn new(data_dir: &str) -> Result<Self> {
        let data_dir = PathBuf::from(data_dir);

        fs::create_dir_all(&data_dir).context("Failed to create data directory")?;
        fs::create_dir_all(data_dir.join(SNAPSHOT_DIR))?;
        fs::create_dir_all(data_dir.join(ALERT_DIR))?;

        let snapshot_path = data_dir.join(SNAPSHOT_DIR).join(SNAPSHOT_FILE);
        let latest_by_symbol = Self::load_latest_index(&snapshot_path)?;

        let snapshot_writer = Self::create_writer(&data_dir.join(SNAPSHOT_DIR), SNAPSHOT_FILE)?;
        let alert_writer = Self::create_writer(&data_dir.join(ALERT_DIR), ALERT_FILE)?;

        info!(
            data_dir = %data_dir.display(),
            symbols = latest_by_symbol.len(),
            "CSV persistence ready"
        );

        Ok(Self {
            data_dir,
            snapshot_writer: AsyncRwLock::new(snapshot_writer),
            alert_writer: AsyncRwLock::new(alert_writer),
            latest_by_symbol: RwLock::new(latest_by_symbol),
        })
    }

    fn create_writer(dir: &Path, filename: &str) -> Result<csv::Writer<std::fs::File>> {
        let path = dir.join(filename);
        let file_has_data =
            path.exists() && fs::metadata(&path).map(|m| m.len() > 0).unwrap_or(false);

        let mut file = OpenOptions::new()
            .create(true)
            .read(true)
            .append(true)
            .open(&path)
            .context("Failed to open CSV file")?;

        if file_has_data {
            Self::terminate_last_line(&mut file, &path)?;
        }

        let writer = WriterBuilder::new()
            .has_headers(!file_has_data)
            .from_writer(file);

        Ok(writer)
    }

    /// Start the next record on a fresh line when the previous write was cut
    /// short
    fn terminate_last_line(file: &mut std::fs::File, path: &Path) -> Result<()> {
        let mut last = [0u8; 1];
        file.seek(SeekFrom::End(-1))
            .and_then(|_| file.read_exact(&mut last))
            .with_context(|| format!("Failed to read tail of {}", path.display()))?;

        if last[0] != b'\n' {
            warn!(path = %path.display(), "CSV file ends with a partial record");
            file.write_all(b"\n")
                .and_then(|_| file.flush())
                .with_context(|| format!("Failed to terminate {}", path.display()))?;
        }
        Ok(())
    }

    /// Latest snapshot per symbol from an existing snapshot file
    fn load_latest_index(path: &Path) -> Result<HashMap<String, Snapshot>> {
        let mut latest: HashMap<String, Snapshot> = HashMap::new();
        for snapshot in Self::read_all::<Snapshot>(path)? {
            let newer = latest
                .get(&snapshot.symbol)
                .map(|current| snapshot.timestamp_utc >= current.timestamp_utc)
                .unwrap_or(true);
            if newer {
                latest.insert(snapshot.symbol.clone(), snapshot);
            }
        }
        Ok(latest)
    }

    fn read_all<T: serde::de::DeserializeOwned>(path: &Path) -> Result<Vec<T>> {
        if !path.exists() {
            return Ok(Vec::new());
        }

        let file = std::fs::File::open(path)
            .with_context(|| format!("Failed to open {}", path.display()))?;
        let mut reader = ReaderBuilder::new().has_headers(true).from_reader(file);

        let mut records = Vec::new();
        for result in reader.deserialize() {
            match result {
                Ok(record) => records.push(record),
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "Skipping unreadable CSV record");
                }
            }
        }
        Ok(records)
    }
}

#[async_trait]
impl SnapshotStore for CsvPersistence {
    async fn append(&self, snapshot: &Snapshot) -> Result<()> {
        {
            let mut writer = self.snapshot_writer.write().await;
            writer
                .serialize(snapshot)
                .context("Failed to write snapshot record")?;
            writer.flush().context("Failed to flush snapshot writer")?;
        }

        // Index only moves forward once the row is on disk
        let mut latest = self
            .latest_by_symbol
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        let newer = latest
            .get(&snapshot.symbol)
            .map(|current| snapshot.timestamp_utc >= current.timestamp_utc)
            .unwrap_or(true);
        if newer {
            latest.insert(snapshot.symbol.clone(), snapshot.clone());
        }

        debug!(symbol = %snapshot.symbol, price = %snapshot.price, "Snapshot appended");
        Ok(())
    }

    async fn latest(&self, symbol: &str) -> Result<Option<Snapshot>> {
        Ok(self
            .latest_by_symbol
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(symbol)
            .cloned())
    }
}

#[async_trait]
impl AlertStore for CsvPersistence {
    async fn append(&self, alert: &Alert) -> Result<()> {
        let mut writer = self.alert_writer.write().await;
        writer
            .serialize(alert)
            .context("Failed to write alert record")?;
        writer.flush().context("Failed to flush alert writer")?;
        Ok(())
    }

    async fn latest_n(&self, count: usize) -> Result<Vec<Alert>> {
        if count == 0 {
            return Ok(Vec::new());
        }

        // Hold the writer so a concurrent append cannot leave a partial row
        let _writer = self.alert_writer.read().await;
        let path = self.data_dir.join(ALERT_DIR).join(ALERT_FILE);
        let mut alerts = Self::read_all::<Alert>(&path)?;

        alerts.sort_by(|a, b| b.created_utc.cmp(&a.created_utc));
        alerts.truncate(count);
        Ok(alerts)
    }
}
