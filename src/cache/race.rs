//! Race: store and upstream concurrently, first usable answer wins
//!
//! Upstream is the source of truth. Its completion always tries to answer
//! the caller. The store branch answers only if its entry decodes and
//! nothing has answered yet. Whichever loses keeps running, and once both
//! encodings are known the store is brought in line with upstream.

use crate::cache::codec;
use crate::cache::config::RefreshPolicy;
use crate::cache::decorator::Shared;
use crate::cache::guard::Admission;
use crate::cache::types::CacheKey;
use crate::fetch::{FetchError, FetchOutcome, Fetcher};
use crate::store::KvStore;
use bytes::Bytes;
use std::sync::{Arc, Mutex};
use tokio::sync::oneshot;
use tracing::debug;

/// Single-use answer slot shared by both branches
struct Delivery(Mutex<Option<oneshot::Sender<FetchOutcome>>>);

impl Delivery {
    fn new(tx: oneshot::Sender<FetchOutcome>) -> Arc<Self> {
        Arc::new(Self(Mutex::new(Some(tx))))
    }

    fn is_open(&self) -> bool {
        self.0
            .lock()
            .map(|slot| slot.is_some())
            .unwrap_or_else(|poisoned| poisoned.into_inner().is_some())
    }

    /// Hand `outcome` to the caller unless someone already did
    fn deliver(&self, outcome: FetchOutcome) -> bool {
        let sender = match self.0.lock() {
            Ok(mut slot) => slot.take(),
            Err(poisoned) => poisoned.into_inner().take(),
        };

        match sender {
            Some(tx) => tx.send(outcome).is_ok(),
            None => false,
        }
    }
}

pub(crate) async fn fetch<F, S>(shared: &Arc<Shared<F, S>>, url: &str) -> FetchOutcome
where
    F: Fetcher + 'static,
    S: KvStore + 'static,
{
    let (key, ttl) = shared.prepare(url)?;

    if !shared.guard.admit(&shared.store) {
        shared.stats.bypass();
        return shared.call_upstream(url).await;
    }

    let (answer_tx, answer_rx) = oneshot::channel();
    let delivery = Delivery::new(answer_tx);
    let (cached_tx, cached_rx) = oneshot::channel::<Option<Bytes>>();
    let (current_tx, current_rx) = oneshot::channel::<Option<Bytes>>();

    {
        let branch = Arc::clone(shared);
        let delivery = Arc::clone(&delivery);
        let key = key.clone();
        shared.tasks.spawn(async move {
            let cached = lookup(&branch, &key, &delivery).await;
            let _ = cached_tx.send(cached);
        });
    }

    {
        let branch = Arc::clone(shared);
        let delivery = Arc::clone(&delivery);
        let url = url.to_string();
        shared.tasks.spawn(async move {
            let outcome = branch.call_upstream(&url).await;
            let current = codec::encode(&outcome);
            if delivery.deliver(outcome) {
                branch.stats.miss();
            }
            let _ = current_tx.send(current);
        });
    }

    {
        let branch = Arc::clone(shared);
        shared.tasks.spawn(async move {
            // A branch that panicked leaves nothing to reconcile
            if let (Ok(cached), Ok(current)) = (cached_rx.await, current_rx.await) {
                reconcile(&branch, key, ttl, cached, current).await;
            }
        });
    }

    answer_rx.await.unwrap_or_else(|_| {
        Err(FetchError::Other(anyhow::anyhow!(
            "fetch of {} ended without an answer",
            url
        )))
    })
}

/// Store branch: returns the raw entry, answering the caller if it can
async fn lookup<F, S>(shared: &Shared<F, S>, key: &str, delivery: &Delivery) -> Option<Bytes>
where
    F: Fetcher + 'static,
    S: KvStore + 'static,
{
    let entry = match shared.store.get(key).await {
        Ok(entry) => entry,
        Err(e) => {
            shared.read_failed(key, e);
            return None;
        }
    };

    if let Some(raw) = &entry {
        // Upstream may already have answered; skip the decode then
        if delivery.is_open() {
            match codec::decode(raw) {
                Ok(outcome) => {
                    if delivery.deliver(outcome) {
                        debug!("Cache won race: {}", key);
                        shared.stats.hit();
                    }
                }
                Err(e) => shared.decode_failed(key, e),
            }
        }
    }

    entry
}

async fn reconcile<F, S>(
    shared: &Shared<F, S>,
    key: CacheKey,
    ttl: u64,
    cached: Option<Bytes>,
    current: Option<Bytes>,
) where
    F: Fetcher + 'static,
    S: KvStore + 'static,
{
    let Some(current) = current else {
        debug!("Upstream outcome for {} is not cacheable", key);
        return;
    };

    if cached.as_ref() == Some(&current)
        && shared.config.refresh_policy == RefreshPolicy::SkipIdentical
    {
        debug!("Store already current: {}", key);
        shared.stats.skipped_write();
        return;
    }

    shared.write(&key, current, ttl, Admission::Report).await;
}
