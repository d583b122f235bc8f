//! The caching decorator around a [`Fetcher`]
//!
//! [`CachedFetcher`] owns the upstream fetcher and a store handle and
//! implements [`Fetcher`] itself, so callers swap it in without changing how
//! they fetch. Each call is routed to the configured strategy.

use crate::cache::background::BackgroundTasks;
use crate::cache::config::{CacheConfig, Strategy};
use crate::cache::diagnostics::{Diagnostic, DiagnosticSink};
use crate::cache::guard::{Admission, BackpressureGuard};
use crate::cache::types::{cache_key, CacheKey, CacheStats, StatsRecorder};
use crate::cache::{race, readthrough};
use crate::error::{CacheError, Result};
use crate::fetch::{FetchError, FetchOutcome, Fetcher};
use crate::store::KvStore;
use async_trait::async_trait;
use bytes::Bytes;
use std::fmt;
use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::{debug, info};

/// State shared by every call and every background task
pub(crate) struct Shared<F, S> {
    pub(crate) upstream: F,
    pub(crate) store: S,
    pub(crate) config: CacheConfig,
    pub(crate) guard: BackpressureGuard,
    pub(crate) diagnostics: DiagnosticSink,
    pub(crate) stats: StatsRecorder,
    pub(crate) tasks: BackgroundTasks,
}

impl<F, S> Shared<F, S>
where
    F: Fetcher + 'static,
    S: KvStore + 'static,
{
    /// Resolve the key and expiry for a call, before any store access
    pub(crate) fn prepare(&self, url: &str) -> std::result::Result<(CacheKey, u64), FetchError> {
        let ttl = self.config.ttl.resolve(url).map_err(|e| match e {
            CacheError::InvalidUrl { reason, .. } => {
                FetchError::InvalidUrl(format!("{}: {}", url, reason))
            }
            other => FetchError::Other(other.into()),
        })?;
        Ok((cache_key(&self.config.namespace, url), ttl))
    }

    pub(crate) async fn call_upstream(&self, url: &str) -> FetchOutcome {
        self.stats.upstream_call();
        self.upstream.fetch(url).await
    }

    /// Write an encoded outcome, if the store can take it
    pub(crate) async fn write(&self, key: &str, value: Bytes, ttl: u64, admission: Admission) {
        if !self.guard.check(&self.store, admission) {
            return;
        }

        match self.store.set_with_expiry(key, value, ttl).await {
            Ok(()) => {
                self.stats.write();
                debug!("Stored {} (ttl {}s)", key, ttl);
            }
            Err(e) => {
                self.stats.store_error();
                self.diagnostics.emit(Diagnostic::StoreWriteFailed {
                    key: key.to_string(),
                    error: e.to_string(),
                });
            }
        }
    }

    /// Fire-and-forget [`write`](Self::write)
    pub(crate) fn spawn_write(
        self: &Arc<Self>,
        key: CacheKey,
        value: Bytes,
        ttl: u64,
        admission: Admission,
    ) {
        let shared = Arc::clone(self);
        self.tasks.spawn(async move {
            shared.write(&key, value, ttl, admission).await;
        });
    }

    pub(crate) fn read_failed(&self, key: &str, error: CacheError) {
        self.stats.store_error();
        self.diagnostics.emit(Diagnostic::StoreReadFailed {
            key: key.to_string(),
            error: error.to_string(),
        });
    }

    pub(crate) fn decode_failed(&self, key: &str, error: CacheError) {
        self.stats.decode_error();
        self.diagnostics.emit(Diagnostic::DecodeFailed {
            key: key.to_string(),
            error: error.to_string(),
        });
    }
}

/// A [`Fetcher`] that serves and populates a key-value store
///
/// Cloning is cheap and clones share the store, statistics and background
/// tasks.
///
/// ```
/// use fetch_cache::{fetch_fn, CacheConfig, CachedFetcher, Fetched, Fetcher, MemoryStore, Strategy};
/// use std::sync::Arc;
///
/// # tokio_test::block_on(async {
/// let store = Arc::new(MemoryStore::new());
/// let source = fetch_fn(|_url: String| async { Ok(Fetched::new("hello")) });
/// let config = CacheConfig::builder()
///     .ttl_secs(300)
///     .strategy(Strategy::Readthrough)
///     .namespace("docs")
///     .build()
///     .unwrap();
///
/// let cached = CachedFetcher::new(source, store.clone(), config).unwrap();
/// assert_eq!(cached.fetch("https://a.com/x").await.unwrap(), Fetched::new("hello"));
///
/// cached.drain().await;
/// assert_eq!(store.peek("docs-https://a.com/x").await.unwrap(), &b"Shello"[..]);
/// # });
/// ```
pub struct CachedFetcher<F, S> {
    shared: Arc<Shared<F, S>>,
}

impl<F, S> Clone for CachedFetcher<F, S> {
    fn clone(&self) -> Self {
        Self {
            shared: Arc::clone(&self.shared),
        }
    }
}

impl<F, S> fmt::Debug for CachedFetcher<F, S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CachedFetcher")
            .field("config", &self.shared.config)
            .finish_non_exhaustive()
    }
}

impl<F, S> CachedFetcher<F, S>
where
    F: Fetcher + 'static,
    S: KvStore + 'static,
{
    /// Wrap `upstream` with a cache backed by `store`
    ///
    /// Fails with [`CacheError::InvalidConfig`] if the configuration does not
    /// validate.
    pub fn new(upstream: F, store: S, config: CacheConfig) -> Result<Self> {
        config.validate()?;

        info!(
            "Initializing {} cache (namespace: {}, ttl: {:?})",
            config.strategy, config.namespace, config.ttl
        );

        let diagnostics = DiagnosticSink::new();
        Ok(Self {
            shared: Arc::new(Shared {
                upstream,
                store,
                config,
                guard: BackpressureGuard::new(diagnostics.clone()),
                diagnostics,
                stats: StatsRecorder::default(),
                tasks: BackgroundTasks::default(),
            }),
        })
    }

    /// The configuration this decorator was built with
    pub fn config(&self) -> &CacheConfig {
        &self.shared.config
    }

    /// The wrapped fetcher
    pub fn upstream(&self) -> &F {
        &self.shared.upstream
    }

    /// The backing store
    pub fn store(&self) -> &S {
        &self.shared.store
    }

    /// Get cache statistics
    pub fn stats(&self) -> CacheStats {
        self.shared.stats.snapshot()
    }

    /// Receive diagnostics emitted from now on
    pub fn subscribe(&self) -> broadcast::Receiver<Diagnostic> {
        self.shared.diagnostics.subscribe()
    }

    /// Wait for background writes and race branches to finish
    pub async fn drain(&self) {
        self.shared.tasks.drain().await;
    }
}

#[async_trait]
impl<F, S> Fetcher for CachedFetcher<F, S>
where
    F: Fetcher + 'static,
    S: KvStore + 'static,
{
    async fn fetch(&self, url: &str) -> FetchOutcome {
        match self.shared.config.strategy {
            Strategy::Readthrough => readthrough::fetch(&self.shared, url).await,
            Strategy::Race => race::fetch(&self.shared, url).await,
        }
    }
}

/// Build a cached fetcher from a JSON configuration
///
/// Unknown strategies and missing or zero expiries fail here, before any
/// fetch is attempted.
pub fn wrap<F, S>(upstream: F, store: S, config: serde_json::Value) -> Result<CachedFetcher<F, S>>
where
    F: Fetcher + 'static,
    S: KvStore + 'static,
{
    CachedFetcher::new(upstream, store, CacheConfig::from_json(config)?)
}
