//! Shared upstream double for the integration tests

#![allow(dead_code)]

use async_trait::async_trait;
use fetch_cache::{CacheConfig, FetchOutcome, Fetcher, Strategy};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

type Responder = Box<dyn Fn(&str) -> FetchOutcome + Send + Sync>;

/// Upstream that counts calls and answers after a fixed delay
pub struct Upstream {
    calls: AtomicUsize,
    delay: Duration,
    respond: Responder,
}

impl Upstream {
    pub fn new<R>(respond: R) -> Self
    where
        R: Fn(&str) -> FetchOutcome + Send + Sync + 'static,
    {
        Self {
            calls: AtomicUsize::new(0),
            delay: Duration::ZERO,
            respond: Box::new(respond),
        }
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Fetcher for Upstream {
    async fn fetch(&self, url: &str) -> FetchOutcome {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        (self.respond)(url)
    }
}

pub fn config(strategy: Strategy, namespace: &str) -> CacheConfig {
    CacheConfig::builder()
        .ttl_secs(300)
        .strategy(strategy)
        .namespace(namespace)
        .build()
        .expect("valid test configuration")
}
