//! # fetch-cache
//!
//! A cache-aside decorator for URL fetchers, backed by any key-value store
//! with per-key expiry.
//!
//! ## Features
//!
//! - Drop-in: the cached fetcher implements the same [`Fetcher`] trait it wraps
//! - Two strategies: readthrough and race
//! - Caches binary, text and JSON payloads plus 404/403 outcomes
//! - Per-hostname expiry
//! - Backpressure guard against a saturated store
//! - Store failures degrade to direct upstream access, never to caller errors
//!
//! ## Readthrough
//!
//! ```no_run
//! use fetch_cache::{fetch_fn, CacheConfig, CachedFetcher, FetchError, Fetched, Fetcher, MemoryStore};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let source = fetch_fn(|url: String| async move {
//!         if url.ends_with("/missing") {
//!             Err(FetchError::not_found())
//!         } else {
//!             Ok(Fetched::new("hello"))
//!         }
//!     });
//!
//!     let config = CacheConfig::builder().ttl_secs(300).build()?;
//!     let cached = CachedFetcher::new(source, MemoryStore::new(), config)?;
//!
//!     // Miss: served by upstream, written in the background
//!     let first = cached.fetch("https://a.com/x").await?;
//!     cached.drain().await;
//!
//!     // Hit: served by the store
//!     let second = cached.fetch("https://a.com/x").await?;
//!     assert_eq!(first, second);
//!     Ok(())
//! }
//! ```
//!
//! ## Race
//!
//! ```no_run
//! use fetch_cache::{fetch_fn, CacheConfig, CachedFetcher, Fetched, Fetcher, MemoryStore, Strategy};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let source = fetch_fn(|_url: String| async { Ok(Fetched::new("hello")) });
//!     let config = CacheConfig::builder()
//!         .ttl_secs(300)
//!         .strategy(Strategy::Race)
//!         .build()?;
//!     let cached = CachedFetcher::new(source, MemoryStore::new(), config)?;
//!
//!     let mut diagnostics = cached.subscribe();
//!     tokio::spawn(async move {
//!         while let Ok(event) = diagnostics.recv().await {
//!             eprintln!("cache: {}", event);
//!         }
//!     });
//!
//!     cached.fetch("https://a.com/x").await?;
//!     Ok(())
//! }
//! ```

pub mod cache;
pub mod error;
pub mod fetch;
pub mod store;

// Re-export main types for convenience
pub use cache::{
    wrap, CacheConfig, CacheConfigBuilder, CacheStats, CachedFetcher, Diagnostic, RefreshPolicy,
    Strategy, TtlConfig,
};
pub use error::{CacheError, Result};
pub use fetch::{fetch_fn, FetchError, FetchOutcome, Fetched, Fetcher, FnFetcher, Headers, Payload};
pub use store::{KvStore, MemoryStore};
