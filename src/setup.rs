use std::sync::Arc;

use color_eyre::eyre::Context;

use crate::cache::{CacheAside, CachePolicy, MemoryCache, RedisCache, StatusCache};
use crate::config::Config;
use crate::crl::CrlFetcher;
use crate::ingest::Ingestor;
use crate::lease::{LeaseManager, MemoryLeaseManager, RedisLeaseManager};
use crate::registry::SourceRegistry;
use crate::server::AppState;
use crate::stats::Counters;
use crate::status::StatusService;
use crate::store::{MemoryStore, PostgresStore, RevocationStore};

/// Builds the shared clients once and wires them into the services.
pub async fn setup(config: &Config) -> color_eyre::Result<AppState> {
    let store: Arc<dyn RevocationStore> = if let Some(database) = &config.database {
        tracing::info!("Database URL provided, using PostgreSQL for revocation storage.");
        let pool = database
            .pool()
            .await
            .wrap_err("Failed to connect to PostgreSQL")?;
        let store = PostgresStore::new(pool)
            .await
            .wrap_err("Failed to prepare database schema")?;
        Arc::new(store)
    } else {
        tracing::warn!("No database URL, using in-memory revocation storage.");
        Arc::new(MemoryStore::new())
    };

    let redis_conn = match &config.redis {
        Some(redis_config) => match redis_config.start().await {
            Ok(conn) => {
                tracing::info!("Redis URI provided, using Redis for status cache and leases.");
                Some(conn)
            }
            Err(e) => {
                tracing::warn!("Failed to start Redis, falling back to in-process cache: {e}");
                None
            }
        },
        None => {
            tracing::info!("No Redis URI, using in-process status cache and leases.");
            None
        }
    };

    let policy = CachePolicy::from(&config.cache);
    let cache = if !config.cache.enabled {
        tracing::info!("Status cache disabled.");
        CacheAside::disabled(policy)
    } else {
        let backend: Arc<dyn StatusCache> = match &redis_conn {
            Some(conn) => Arc::new(RedisCache::new(conn.clone())),
            None => Arc::new(MemoryCache::new(config.cache.memory_capacity)),
        };
        CacheAside::new(backend, policy)
    };

    let counters = Arc::new(match &redis_conn {
        Some(conn) => Counters::with_redis(conn.clone(), policy.operation_timeout),
        None => Counters::new(),
    });

    let leases: Arc<dyn LeaseManager> = match redis_conn {
        Some(conn) => Arc::new(RedisLeaseManager::new(conn)),
        None => Arc::new(MemoryLeaseManager::new()),
    };

    let fetcher = CrlFetcher::new(config.crl.request_timeout(), &config.crl.user_agent)
        .wrap_err("Failed to build HTTP client")?;

    let ingestor = Ingestor::new(
        SourceRegistry::File(config.crl.registry_path.clone()),
        fetcher,
        Arc::clone(&store),
        cache.clone(),
        leases,
        Arc::clone(&counters),
        &config.crl,
    );
    let status = StatusService::new(store, cache, counters);

    Ok(AppState {
        status: Arc::new(status),
        ingestor: Arc::new(ingestor),
    })
}
