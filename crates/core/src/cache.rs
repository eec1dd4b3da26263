// Time-bounded snapshot of the last capabilities fetch

use crate::types::ServiceCapabilities;
use chrono::{DateTime, Utc};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::RwLock;

/// Source of "now" for TTL checks
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

/// Wall clock
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Hand-advanced clock for deterministic TTL tests
#[derive(Debug)]
pub struct ManualClock {
    now: Mutex<DateTime<Utc>>,
}

impl ManualClock {
    pub fn new(start: DateTime<Utc>) -> Self {
        Self {
            now: Mutex::new(start),
        }
    }

    pub fn advance(&self, by: Duration) {
        let mut now = self.now.lock().unwrap_or_else(|e| e.into_inner());
        if let Ok(by) = chrono::Duration::from_std(by) {
            *now += by;
        }
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        *self.now.lock().unwrap_or_else(|e| e.into_inner())
    }
}

/// One successful fetch: raw document plus its parse
#[derive(Debug, Clone)]
pub struct CacheEntry {
    pub fetched_at: DateTime<Utc>,
    pub raw: String,
    pub capabilities: ServiceCapabilities,
}

/// Capabilities cache.
///
/// Each refresh swaps in a whole new `Arc<CacheEntry>`, so readers see either
/// the old snapshot or the new one. Failed refreshes never reach `store`,
/// which leaves any stale entry in place.
pub struct CapabilitiesCache {
    ttl: Duration,
    clock: Arc<dyn Clock>,
    entry: RwLock<Option<Arc<CacheEntry>>>,
}

impl CapabilitiesCache {
    pub fn new(ttl: Duration, clock: Arc<dyn Clock>) -> Self {
        Self {
            ttl,
            clock,
            entry: RwLock::new(None),
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    pub fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    /// Entry younger than the TTL, if any
    pub async fn fresh(&self) -> Option<Arc<CacheEntry>> {
        let entry = self.entry.read().await.clone()?;
        if self.is_fresh(&entry) {
            Some(entry)
        } else {
            None
        }
    }

    /// Latest entry regardless of age
    pub async fn latest(&self) -> Option<Arc<CacheEntry>> {
        self.entry.read().await.clone()
    }

    pub async fn store(&self, raw: String, capabilities: ServiceCapabilities) -> Arc<CacheEntry> {
        let entry = Arc::new(CacheEntry {
            fetched_at: capabilities.cached_at,
            raw,
            capabilities,
        });
        *self.entry.write().await = Some(entry.clone());
        tracing::info!(
            layers = entry.capabilities.layers.len(),
            ttl_secs = self.ttl.as_secs(),
            "Capabilities cache refreshed"
        );
        entry
    }

    pub async fn invalidate(&self) {
        *self.entry.write().await = None;
    }

    fn is_fresh(&self, entry: &CacheEntry) -> bool {
        let age = self.clock.now() - entry.fetched_at;
        match age.to_std() {
            Ok(age) => age < self.ttl,
            // Entry stamped in the future (clock went backwards): keep it
            Err(_) => true,
        }
    }
}
