//! Key-value store capability
//!
//! The cache only needs four things from a store: read a key, write a key
//! with an expiry, and report how many requests are outstanding against how
//! many it is willing to queue. Any remote store client (Redis, Memcached)
//! can sit behind [`KvStore`]; [`MemoryStore`] is the in-process version.

pub mod entry;
pub mod memory;

pub use entry::{EntryMetadata, StoredEntry};
pub use memory::{MemoryStore, MemoryStoreBuilder, StoreCounters};

use crate::error::Result;
use async_trait::async_trait;
use bytes::Bytes;
use std::sync::Arc;

/// Byte-oriented store with per-key expiry
#[async_trait]
pub trait KvStore: Send + Sync {
    /// Read a key; `Ok(None)` when absent or expired
    async fn get(&self, key: &str) -> Result<Option<Bytes>>;

    /// Write a key that the store drops after `ttl_secs`
    async fn set_with_expiry(&self, key: &str, value: Bytes, ttl_secs: u64) -> Result<()>;

    /// Requests issued but not yet answered
    fn pending(&self) -> usize;

    /// Depth at which callers should stop issuing requests
    fn high_water(&self) -> usize;
}

#[async_trait]
impl<T: KvStore + ?Sized> KvStore for Arc<T> {
    async fn get(&self, key: &str) -> Result<Option<Bytes>> {
        (**self).get(key).await
    }

    async fn set_with_expiry(&self, key: &str, value: Bytes, ttl_secs: u64) -> Result<()> {
        (**self).set_with_expiry(key, value, ttl_secs).await
    }

    fn pending(&self) -> usize {
        (**self).pending()
    }

    fn high_water(&self) -> usize {
        (**self).high_water()
    }
}
