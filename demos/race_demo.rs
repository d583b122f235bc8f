//! Cache Strategy Demo
//!
//! Runs the same slow upstream behind both strategies and prints what each
//! caller sees and what ends up in the store.
//!
//! Usage:
//!   cargo run --example race_demo
//!
//! Environment variables:
//!   RUST_LOG - log filter (default: info,fetch_cache=debug)

use fetch_cache::{
    fetch_fn, CacheConfig, CachedFetcher, FetchError, Fetched, Fetcher, MemoryStore, Strategy,
    TtlConfig,
};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::info;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info,fetch_cache=debug")),
        )
        .init();

    info!("=== Fetch Cache Demo ===");

    for strategy in [Strategy::Readthrough, Strategy::Race] {
        run(strategy).await?;
    }

    Ok(())
}

async fn run(strategy: Strategy) -> anyhow::Result<()> {
    info!("\n--- {} ---", strategy);

    // Each call returns a new revision so a refreshed entry is visible
    let revision = Arc::new(AtomicUsize::new(0));
    let source = fetch_fn(move |url: String| {
        let revision = Arc::clone(&revision);
        async move {
            tokio::time::sleep(Duration::from_millis(200)).await;
            if url.ends_with("/missing") {
                return Err(FetchError::not_found());
            }
            let n = revision.fetch_add(1, Ordering::SeqCst) + 1;
            Ok(Fetched::new(format!("{} (revision {})", url, n)))
        }
    });

    let store = Arc::new(MemoryStore::new());
    let config = CacheConfig::builder()
        .ttl(TtlConfig::per_host(Some(300)).with_host("tiles.example.com", 3600))
        .strategy(strategy)
        .namespace("demo")
        .build()?;
    let cached = CachedFetcher::new(source, store.clone(), config)?;

    let mut diagnostics = cached.subscribe();
    tokio::spawn(async move {
        while let Ok(event) = diagnostics.recv().await {
            info!("diagnostic: {}", event);
        }
    });

    for url in [
        "https://tiles.example.com/0/0/0.png",
        "https://tiles.example.com/0/0/0.png",
        "https://api.example.com/missing",
        "https://api.example.com/missing",
    ] {
        let started = Instant::now();
        let outcome = cached.fetch(url).await;
        let elapsed = started.elapsed();

        match outcome {
            Ok(fetched) => info!("✓ {} -> {:?} in {:?}", url, fetched.payload, elapsed),
            Err(e) => info!("✗ {} -> {} (cached: {}) in {:?}", url, e, e.is_cached(), elapsed),
        }

        cached.drain().await;
    }

    info!("Cache stats: {}", cached.stats());
    info!("Store counters: {}", store.counters());
    info!(
        "Stored: {:?}",
        store.peek("demo-https://tiles.example.com/0/0/0.png").await
    );

    Ok(())
}
