//! Prio Cache - diagnostic driver
//!
//! Runs a short scripted workload against a cache built from the
//! environment and reports its contents and statistics.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use tokio::signal;
use tokio::sync::RwLock;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use prio_cache::{
    spawn_maintenance_task, Cache, CacheConfig, CacheItem, ItemOptions, LocalStore,
    NamespacedStorage, Priority, SharedCache, Storage,
};

/// Main entry point for the diagnostic driver.
///
/// # Startup Sequence
/// 1. Initialize tracing subscriber for logging
/// 2. Load configuration from environment variables
/// 3. Build the cache, persisted if `CACHE_PERSIST_PATH` is set
/// 4. Start the maintenance task and run the workload
/// 5. Print the dump and statistics, then save the persisted store
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Defaults to "info" level, can be overridden with RUST_LOG env var
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "prio_cache=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = CacheConfig::from_env();
    info!(
        "Configuration loaded: max_size={:?}, default_priority={}, maintenance_interval={}ms, namespace={}",
        config.max_size, config.default_priority, config.maintenance_interval_ms, config.namespace
    );

    match &config.persist_path {
        Some(path) => {
            let store = LocalStore::open(path)
                .with_context(|| format!("failed to open persisted store {}", path.display()))?;
            let storage: NamespacedStorage<CacheItem<String>> =
                NamespacedStorage::new(store.clone(), &config.namespace);
            run(Cache::with_storage(&config, storage), &config).await?;

            store.save().context("failed to save persisted store")?;
            info!("Persisted store saved to {}", path.display());
        }
        None => run(Cache::new(&config), &config).await?,
    }

    Ok(())
}

/// Drives the workload with the maintenance task running, then reports.
async fn run<S>(cache: Cache<String, S>, config: &CacheConfig) -> anyhow::Result<()>
where
    S: Storage<CacheItem<String>> + Send + Sync + 'static,
{
    let cache: SharedCache<String, S> = Arc::new(RwLock::new(cache));
    let handle = spawn_maintenance_task(cache.clone(), config.maintenance_interval_ms);
    let evicted = Arc::new(AtomicUsize::new(0));

    tokio::select! {
        _ = workload(cache.clone(), config, evicted.clone()) => {
            info!("Workload complete");
        }
        _ = signal::ctrl_c() => {
            warn!("Received Ctrl+C, stopping workload");
        }
    }

    handle.abort();

    // Drain whatever the maintenance task did not get to
    let callbacks = cache.write().await.take_pending();
    for task in callbacks {
        task.invoke();
    }

    let guard = cache.read().await;
    info!("{}", guard.dump());
    info!(
        "Eviction callbacks observed: {}",
        evicted.load(Ordering::SeqCst)
    );
    println!("{}", serde_json::to_string_pretty(&guard.stats())?);
    Ok(())
}

/// Inserts twice the configured bound (or 20 items when unbounded), cycling
/// priorities and re-reading every third key.
async fn workload<S>(cache: SharedCache<String, S>, config: &CacheConfig, evicted: Arc<AtomicUsize>)
where
    S: Storage<CacheItem<String>> + Send + Sync + 'static,
{
    let total = config.max_size.map(|max| max * 2).unwrap_or(20);
    let pause = Duration::from_millis((config.maintenance_interval_ms / 4).max(1));
    let priorities = [Priority::LOW, Priority::NORMAL, Priority::HIGH];

    for i in 0..total {
        let counter = evicted.clone();
        let options = ItemOptions::new()
            .priority(priorities[i % priorities.len()])
            .on_evict(move |_, _| {
                counter.fetch_add(1, Ordering::SeqCst);
            });

        {
            let mut guard = cache.write().await;
            if let Err(e) = guard.set_item(format!("item-{}", i), format!("value-{}", i), Some(options)) {
                warn!("Set failed: {}", e);
            }
            if i % 3 == 0 {
                let _ = guard.get_item(&format!("item-{}", i / 2));
            }
        }

        tokio::time::sleep(pause).await;
    }
}
