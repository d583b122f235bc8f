//! # Cache-Aside Decorator
//!
//! This module puts a key-value store in front of any [`Fetcher`](crate::Fetcher).
//!
//! ## Features
//!
//! - **Readthrough**: store first, upstream on miss, populate in the background
//! - **Race**: store and upstream concurrently, first usable answer wins, store
//!   reconciled with upstream afterwards
//! - **Tagged Encoding**: binary, text, JSON and 404/403 outcomes share one byte format
//! - **Per-Host TTL**: flat expiry or a hostname map with a default
//! - **Backpressure**: a saturated store is bypassed rather than queued on
//! - **Diagnostics**: store and decode failures are logged and broadcast,
//!   never returned to the caller
//!
//! ## Example
//!
//! ```rust
//! use fetch_cache::cache::{CacheConfig, CachedFetcher, Strategy, TtlConfig};
//! use fetch_cache::{fetch_fn, Fetched, Fetcher, MemoryStore};
//!
//! # async fn example() -> anyhow::Result<()> {
//! let config = CacheConfig::builder()
//!     .ttl(TtlConfig::per_host(Some(300)).with_host("tiles.a.com", 3600))
//!     .strategy(Strategy::Race)
//!     .namespace("tiles")
//!     .build()?;
//!
//! let source = fetch_fn(|url: String| async move { Ok(Fetched::new(url)) });
//! let cached = CachedFetcher::new(source, MemoryStore::new(), config)?;
//!
//! let fetched = cached.fetch("https://tiles.a.com/0/0/0.png").await?;
//! println!("{:?}", fetched.payload);
//! # Ok(())
//! # }
//! ```

mod background;
pub mod codec;
pub mod config;
pub mod decorator;
pub mod diagnostics;
pub mod guard;
mod race;
mod readthrough;
pub mod ttl;
pub mod types;

pub use codec::{decode, encode};
pub use config::{CacheConfig, CacheConfigBuilder, RefreshPolicy, Strategy};
pub use decorator::{wrap, CachedFetcher};
pub use diagnostics::{Diagnostic, DiagnosticSink};
pub use guard::{Admission, BackpressureGuard};
pub use ttl::{TtlConfig, FALLBACK_TTL_SECS};
pub use types::{cache_key, CacheKey, CacheStats};
