//! Readthrough: store first, upstream on miss, populate afterwards
//!
//! The store lookup always finishes before upstream is called. The caller
//! gets upstream's answer as soon as it arrives; the populating write runs
//! in the background. If the lookup itself failed the write is skipped, so
//! a store that just errored is not handed more work.

use crate::cache::codec;
use crate::cache::decorator::Shared;
use crate::cache::guard::Admission;
use crate::fetch::{FetchOutcome, Fetcher};
use crate::store::KvStore;
use std::sync::Arc;
use tracing::debug;

pub(crate) async fn fetch<F, S>(shared: &Arc<Shared<F, S>>, url: &str) -> FetchOutcome
where
    F: Fetcher + 'static,
    S: KvStore + 'static,
{
    let (key, ttl) = shared.prepare(url)?;

    let mut admission = Admission::Report;
    let populate = if shared.guard.admit(&shared.store) {
        match shared.store.get(&key).await {
            Ok(Some(entry)) => match codec::decode(&entry) {
                Ok(outcome) => {
                    debug!("Cache hit: {}", key);
                    shared.stats.hit();
                    return outcome;
                }
                Err(e) => {
                    shared.decode_failed(&key, e);
                    shared.stats.miss();
                    true
                }
            },
            Ok(None) => {
                debug!("Cache miss: {}", key);
                shared.stats.miss();
                true
            }
            Err(e) => {
                shared.read_failed(&key, e);
                shared.stats.miss();
                false
            }
        }
    } else {
        shared.stats.bypass();
        admission = Admission::Quiet;
        true
    };

    let outcome = shared.call_upstream(url).await;

    if populate {
        match codec::encode(&outcome) {
            Some(encoded) => shared.spawn_write(key, encoded, ttl, admission),
            None => debug!("Not caching opaque failure for {}", key),
        }
    }

    outcome
}
