//! Overview cache
//!
//! Process-wide state owned by the aggregator: one TTL entry per cacheable
//! asset class, a single-flight refresh guard per class, and the last
//! successful composite used as an emergency fallback. Starts empty and is
//! only mutated through the aggregator.

use std::collections::HashMap;
use std::future::Future;
use std::sync::{Arc, Mutex, PoisonError, RwLock};
use std::time::Duration;
use tokio::sync::Mutex as AsyncMutex;
use tokio::time::Instant;
use tracing::{debug, warn};

use crate::oracle::sources::SourceError;
use crate::types::{AssetClass, CompositeOverview, Instrument};

#[derive(Debug, Clone)]
struct ClassEntry {
    instruments: Vec<Instrument>,
    refreshed_at: Instant,
}

/// Injectable cache service for the overview read path
#[derive(Debug, Default)]
pub struct OverviewCache {
    entries: RwLock<HashMap<AssetClass, ClassEntry>>,
    /// In-flight refresh handles, one per class key
    refresh_guards: Mutex<HashMap<AssetClass, Arc<AsyncMutex<()>>>>,
    /// Never expires
    last_good: RwLock<Option<CompositeOverview>>,
}

impl OverviewCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Cached instruments younger than `ttl`
    pub fn fresh(&self, class: AssetClass, ttl: Duration) -> Option<Vec<Instrument>> {
        let entries = self.entries.read().unwrap_or_else(PoisonError::into_inner);
        entries
            .get(&class)
            .filter(|e| !e.instruments.is_empty() && e.refreshed_at.elapsed() < ttl)
            .map(|e| e.instruments.clone())
    }

    /// Cached instruments regardless of age
    pub fn cached(&self, class: AssetClass) -> Option<Vec<Instrument>> {
        let entries = self.entries.read().unwrap_or_else(PoisonError::into_inner);
        entries
            .get(&class)
            .filter(|e| !e.instruments.is_empty())
            .map(|e| e.instruments.clone())
    }

    /// Replace a class entry and restart its freshness clock
    pub fn store(&self, class: AssetClass, instruments: Vec<Instrument>) {
        let mut entries = self.entries.write().unwrap_or_else(PoisonError::into_inner);
        entries.insert(
            class,
            ClassEntry {
                instruments,
                refreshed_at: Instant::now(),
            },
        );
    }

    fn refresh_guard(&self, class: AssetClass) -> Arc<AsyncMutex<()>> {
        let mut guards = self
            .refresh_guards
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        guards
            .entry(class)
            .or_insert_with(|| Arc::new(AsyncMutex::new(())))
            .clone()
    }

    /// Serve a class from cache, refreshing it at most once at a time.
    ///
    /// * fresh entry: returned without calling `refresh`;
    /// * refresh already in flight: the existing entry is returned, or when
    ///   the class has never been cached the caller waits for that refresh;
    /// * refresh fails: the stale entry is returned if there is one.
    ///
    /// Only non-empty refresh results are stored.
    pub async fn get_or_refresh<F, Fut>(
        &self,
        class: AssetClass,
        ttl: Duration,
        refresh: F,
    ) -> Result<Vec<Instrument>, SourceError>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<Vec<Instrument>, SourceError>>,
    {
        if let Some(fresh) = self.fresh(class, ttl) {
            debug!(class = %class, "Serving class from cache");
            return Ok(fresh);
        }

        let guard = self.refresh_guard(class);
        let _permit = match guard.try_lock() {
            Ok(permit) => permit,
            Err(_) => {
                if let Some(stale) = self.cached(class) {
                    debug!(class = %class, "Refresh in flight, serving existing entry");
                    return Ok(stale);
                }
                let _wait = guard.lock().await;
                return Ok(self.cached(class).unwrap_or_default());
            }
        };

        // A refresh may have completed between the freshness check and the permit
        if let Some(fresh) = self.fresh(class, ttl) {
            return Ok(fresh);
        }

        match refresh().await {
            Ok(instruments) => {
                if !instruments.is_empty() {
                    self.store(class, instruments.clone());
                }
                Ok(instruments)
            }
            Err(e) => match self.cached(class) {
                Some(stale) => {
                    warn!(class = %class, error = %e, "Refresh failed, serving stale class cache");
                    Ok(stale)
                }
                None => Err(e),
            },
        }
    }

    /// The last composite that had at least one non-empty class
    pub fn last_good(&self) -> Option<CompositeOverview> {
        self.last_good
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn set_last_good(&self, overview: CompositeOverview) {
        *self
            .last_good
            .write()
            .unwrap_or_else(PoisonError::into_inner) = Some(overview);
    }
}
