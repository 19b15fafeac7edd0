//! Flight Cache demo
//!
//! Fires a burst of concurrent requests for the same slow computation at one
//! cache, then prints the resulting statistics as JSON.

use std::env;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use futures::future::join_all;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use flight_cache::models::StatsReport;
use flight_cache::{AsyncLruCache, CacheConfig};

/// Number of concurrent callers, from `DEMO_CALLERS` (default: 16).
fn demo_callers() -> anyhow::Result<usize> {
    match env::var("DEMO_CALLERS") {
        Ok(raw) => raw
            .trim()
            .parse()
            .with_context(|| format!("DEMO_CALLERS is not a count: {:?}", raw)),
        Err(_) => Ok(16),
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Defaults to "info" level, can be overridden with RUST_LOG env var
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "flight_cache=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = CacheConfig::from_env().context("loading cache configuration")?;
    let callers = demo_callers()?;
    info!(
        "Configuration loaded: max_size={}, ttl={:?}, callers={}",
        config.max_size, config.ttl, callers
    );

    let cache: AsyncLruCache<String, String> = AsyncLruCache::new(config)?;
    let computations = Arc::new(AtomicUsize::new(0));

    let requests = (0..callers).map(|_| {
        let cache = cache.clone();
        let computations = Arc::clone(&computations);
        async move {
            cache
                .get_or_compute("report".to_string(), move || async move {
                    computations.fetch_add(1, Ordering::SeqCst);
                    tokio::time::sleep(Duration::from_millis(200)).await;
                    Ok::<_, anyhow::Error>("expensive result".to_string())
                })
                .await
        }
    });

    for result in join_all(requests).await {
        result?;
    }

    // One more round now that the value is cached.
    cache
        .get_or_compute("report".to_string(), || async {
            Ok::<_, anyhow::Error>(String::new())
        })
        .await?;

    info!(
        "{} callers served by {} computation(s)",
        callers,
        computations.load(Ordering::SeqCst)
    );

    let report = StatsReport::new("demo", &cache.stats());
    println!("{}", serde_json::to_string_pretty(&report)?);

    Ok(())
}
