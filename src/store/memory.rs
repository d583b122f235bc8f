//! In-process key-value store with expiry and request accounting
//!
//! Behaves like a remote store from the cache's point of view: every call
//! counts as an outstanding request while it runs, an artificial latency can
//! be configured, and reads or writes can be made to fail.

use crate::error::{CacheError, Result};
use crate::store::{entry::StoredEntry, KvStore};
use async_trait::async_trait;
use bytes::Bytes;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::time::Duration;
use tokio::sync::RwLock;
use tracing::{debug, info};

/// Default outstanding-request limit
pub const DEFAULT_HIGH_WATER: usize = 1000;

/// Snapshot of store activity
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoreCounters {
    /// `get` calls received
    pub gets: u64,

    /// `set_with_expiry` calls received
    pub sets: u64,

    /// Reads that found a live entry
    pub hits: u64,

    /// Reads that found nothing
    pub misses: u64,

    /// Entries dropped because their expiry passed
    pub expired: u64,
}

impl fmt::Display for StoreCounters {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "StoreCounters {{ gets: {}, sets: {}, hits: {}, misses: {}, expired: {} }}",
            self.gets, self.sets, self.hits, self.misses, self.expired
        )
    }
}

#[derive(Default)]
struct Counters {
    gets: AtomicU64,
    sets: AtomicU64,
    hits: AtomicU64,
    misses: AtomicU64,
    expired: AtomicU64,
}

/// Marks one request outstanding for as long as it lives
struct InFlight<'a>(&'a AtomicUsize);

impl<'a> InFlight<'a> {
    fn enter(counter: &'a AtomicUsize) -> Self {
        counter.fetch_add(1, Ordering::SeqCst);
        Self(counter)
    }
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

/// In-memory [`KvStore`]
pub struct MemoryStore {
    entries: RwLock<HashMap<String, StoredEntry>>,
    high_water: usize,
    latency: Option<Duration>,
    in_flight: AtomicUsize,
    /// Extra outstanding requests reported on top of `in_flight`
    backlog: AtomicUsize,
    fail_reads: AtomicBool,
    fail_writes: AtomicBool,
    counters: Counters,
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for MemoryStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MemoryStore")
            .field("high_water", &self.high_water)
            .field("latency", &self.latency)
            .field("pending", &self.pending())
            .finish_non_exhaustive()
    }
}

impl MemoryStore {
    /// Create a store with no latency and the default high water mark
    pub fn new() -> Self {
        Self::builder().build()
    }

    pub fn builder() -> MemoryStoreBuilder {
        MemoryStoreBuilder::default()
    }

    /// Report `n` extra outstanding requests, as a busy connection would
    pub fn set_backlog(&self, n: usize) {
        self.backlog.store(n, Ordering::SeqCst);
    }

    /// Make every subsequent `get` fail
    pub fn set_fail_reads(&self, fail: bool) {
        self.fail_reads.store(fail, Ordering::SeqCst);
    }

    /// Make every subsequent `set_with_expiry` fail
    pub fn set_fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    /// Write an entry without counting it as a request
    pub async fn seed(&self, key: impl Into<String>, value: impl Into<Bytes>, ttl: Duration) {
        let mut entries = self.entries.write().await;
        entries.insert(key.into(), StoredEntry::new(value.into(), ttl));
    }

    /// Read an entry without counting it as a request
    pub async fn peek(&self, key: &str) -> Option<Bytes> {
        let entries = self.entries.read().await;
        entries
            .get(key)
            .filter(|entry| !entry.is_expired())
            .map(|entry| entry.value.clone())
    }

    /// Remaining lifetime of a live entry
    pub async fn ttl(&self, key: &str) -> Option<Duration> {
        let entries = self.entries.read().await;
        entries.get(key).and_then(|entry| entry.time_until_expiration())
    }

    /// Number of writes a key has seen
    pub async fn version(&self, key: &str) -> Option<u64> {
        let entries = self.entries.read().await;
        entries.get(key).map(|entry| entry.metadata.version)
    }

    pub fn counters(&self) -> StoreCounters {
        StoreCounters {
            gets: self.counters.gets.load(Ordering::SeqCst),
            sets: self.counters.sets.load(Ordering::SeqCst),
            hits: self.counters.hits.load(Ordering::SeqCst),
            misses: self.counters.misses.load(Ordering::SeqCst),
            expired: self.counters.expired.load(Ordering::SeqCst),
        }
    }

    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }

    /// Remove all expired entries, returning how many were dropped
    pub async fn cleanup_expired(&self) -> usize {
        let mut entries = self.entries.write().await;
        let before = entries.len();
        entries.retain(|_, entry| !entry.is_expired());
        let removed = before - entries.len();

        if removed > 0 {
            self.counters
                .expired
                .fetch_add(removed as u64, Ordering::SeqCst);
            debug!("Cleaned up {} expired entries", removed);
        }
        removed
    }

    async fn simulate_latency(&self) {
        if let Some(latency) = self.latency {
            tokio::time::sleep(latency).await;
        }
    }
}

#[async_trait]
impl KvStore for MemoryStore {
    async fn get(&self, key: &str) -> Result<Option<Bytes>> {
        let _in_flight = InFlight::enter(&self.in_flight);
        self.counters.gets.fetch_add(1, Ordering::SeqCst);
        self.simulate_latency().await;

        if self.fail_reads.load(Ordering::SeqCst) {
            return Err(CacheError::Store(format!("read of {} refused", key)));
        }

        let mut entries = self.entries.write().await;
        let lookup = entries
            .get(key)
            .map(|entry| (entry.is_expired(), entry.value.clone()));

        match lookup {
            Some((true, _)) => {
                debug!("Store entry expired: {}", key);
                entries.remove(key);
                self.counters.expired.fetch_add(1, Ordering::SeqCst);
                self.counters.misses.fetch_add(1, Ordering::SeqCst);
                Ok(None)
            }
            Some((false, value)) => {
                self.counters.hits.fetch_add(1, Ordering::SeqCst);
                Ok(Some(value))
            }
            None => {
                self.counters.misses.fetch_add(1, Ordering::SeqCst);
                Ok(None)
            }
        }
    }

    async fn set_with_expiry(&self, key: &str, value: Bytes, ttl_secs: u64) -> Result<()> {
        let _in_flight = InFlight::enter(&self.in_flight);
        self.counters.sets.fetch_add(1, Ordering::SeqCst);
        self.simulate_latency().await;

        if ttl_secs == 0 {
            return Err(CacheError::Store(format!(
                "invalid expire time for {}",
                key
            )));
        }
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(CacheError::Store(format!("write of {} refused", key)));
        }

        let ttl = Duration::from_secs(ttl_secs);
        let mut entries = self.entries.write().await;
        match entries.get_mut(key) {
            Some(existing) => {
                debug!("Overwriting store entry: {}", key);
                existing.overwrite(value, ttl);
            }
            None => {
                debug!("Inserting store entry: {}", key);
                entries.insert(key.to_string(), StoredEntry::new(value, ttl));
            }
        }
        Ok(())
    }

    fn pending(&self) -> usize {
        self.in_flight.load(Ordering::SeqCst) + self.backlog.load(Ordering::SeqCst)
    }

    fn high_water(&self) -> usize {
        self.high_water
    }
}

/// Builder for [`MemoryStore`]
#[derive(Debug, Default)]
pub struct MemoryStoreBuilder {
    high_water: Option<usize>,
    latency: Option<Duration>,
}

impl MemoryStoreBuilder {
    /// Outstanding-request limit reported to the cache
    pub fn high_water(mut self, high_water: usize) -> Self {
        self.high_water = Some(high_water);
        self
    }

    /// Delay applied to every get and set
    pub fn latency(mut self, latency: Duration) -> Self {
        self.latency = Some(latency);
        self
    }

    pub fn build(self) -> MemoryStore {
        let high_water = self.high_water.unwrap_or(DEFAULT_HIGH_WATER);
        info!(
            "Initializing memory store (high water: {}, latency: {:?})",
            high_water, self.latency
        );

        MemoryStore {
            entries: RwLock::new(HashMap::new()),
            high_water,
            latency: self.latency,
            in_flight: AtomicUsize::new(0),
            backlog: AtomicUsize::new(0),
            fail_reads: AtomicBool::new(false),
            fail_writes: AtomicBool::new(false),
            counters: Counters::default(),
        }
    }
}
