//! Request, cache and ingestion counters.
//!
//! Counters always count in process. With Redis configured every increment
//! is mirrored to the shared `stats:*` keys, so the totals reported by the
//! stats endpoint cover every instance and survive restarts.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use redis::aio::ConnectionManager;
use tokio::runtime::Handle;
use tokio::time::timeout;
use tracing::warn;

const REQUESTS_TOTAL: &str = "stats:requests_total";
const CACHE_HITS: &str = "stats:cache_hits";
const CACHE_MISSES: &str = "stats:cache_misses";
const INGESTION_RUNS: &str = "stats:crls_processed";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CounterSnapshot {
    pub requests_total: u64,
    pub cache_hits: u64,
    pub cache_misses: u64,
    pub ingestion_runs: u64,
}

struct Shared {
    conn: ConnectionManager,
    timeout: Duration,
}

#[derive(Default)]
pub struct Counters {
    requests_total: AtomicU64,
    cache_hits: AtomicU64,
    cache_misses: AtomicU64,
    ingestion_runs: AtomicU64,
    shared: Option<Shared>,
}

impl Counters {
    pub fn new() -> Self {
        Self::default()
    }

    /// Counters mirrored to Redis; each Redis call is bounded by `timeout`.
    pub fn with_redis(conn: ConnectionManager, timeout: Duration) -> Self {
        Self {
            shared: Some(Shared { conn, timeout }),
            ..Self::default()
        }
    }

    pub fn record_request(&self) {
        self.requests_total.fetch_add(1, Ordering::Relaxed);
        self.mirror(REQUESTS_TOTAL);
    }

    pub fn record_cache_hit(&self) {
        self.cache_hits.fetch_add(1, Ordering::Relaxed);
        self.mirror(CACHE_HITS);
    }

    pub fn record_cache_miss(&self) {
        self.cache_misses.fetch_add(1, Ordering::Relaxed);
        self.mirror(CACHE_MISSES);
    }

    pub fn record_ingestion_run(&self) {
        self.ingestion_runs.fetch_add(1, Ordering::Relaxed);
        self.mirror(INGESTION_RUNS);
    }

    /// Counts of this process only.
    pub fn snapshot(&self) -> CounterSnapshot {
        CounterSnapshot {
            requests_total: self.requests_total.load(Ordering::Relaxed),
            cache_hits: self.cache_hits.load(Ordering::Relaxed),
            cache_misses: self.cache_misses.load(Ordering::Relaxed),
            ingestion_runs: self.ingestion_runs.load(Ordering::Relaxed),
        }
    }

    /// Shared totals when Redis is configured and answers, else the process
    /// counts.
    pub async fn totals(&self) -> CounterSnapshot {
        let Some(shared) = &self.shared else {
            return self.snapshot();
        };

        let mut conn = shared.conn.clone();
        let mut mget = redis::cmd("MGET");
        mget.arg(REQUESTS_TOTAL)
            .arg(CACHE_HITS)
            .arg(CACHE_MISSES)
            .arg(INGESTION_RUNS);

        match timeout(shared.timeout, mget.query_async::<Vec<Option<u64>>>(&mut conn)).await {
            Ok(Ok(values)) => snapshot_from(&values),
            Ok(Err(e)) => {
                warn!(error = %e, "Failed to read shared stats, reporting local counters");
                self.snapshot()
            }
            Err(_) => {
                warn!("Shared stats read timed out, reporting local counters");
                self.snapshot()
            }
        }
    }

    fn mirror(&self, key: &'static str) {
        let Some(shared) = &self.shared else {
            return;
        };
        let Ok(handle) = Handle::try_current() else {
            return;
        };

        let mut conn = shared.conn.clone();
        let limit = shared.timeout;
        handle.spawn(async move {
            let mut incr = redis::cmd("INCR");
            incr.arg(key);
            match timeout(limit, incr.query_async::<i64>(&mut conn)).await {
                Ok(Ok(_)) => {}
                Ok(Err(e)) => warn!(key, error = %e, "Failed to increment shared stat"),
                Err(_) => warn!(key, "Shared stat increment timed out"),
            }
        });
    }
}

fn snapshot_from(values: &[Option<u64>]) -> CounterSnapshot {
    let at = |i: usize| values.get(i).copied().flatten().unwrap_or(0);
    CounterSnapshot {
        requests_total: at(0),
        cache_hits: at(1),
        cache_misses: at(2),
        ingestion_runs: at(3),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_local_counters_without_redis() {
        let counters = Counters::new();
        counters.record_request();
        counters.record_request();
        counters.record_cache_hit();
        counters.record_ingestion_run();

        let expected = CounterSnapshot {
            requests_total: 2,
            cache_hits: 1,
            cache_misses: 0,
            ingestion_runs: 1,
        };
        assert_eq!(counters.snapshot(), expected);
        assert_eq!(counters.totals().await, expected);
    }

    #[test]
    fn test_missing_shared_keys_read_as_zero() {
        let snapshot = snapshot_from(&[Some(7), None, Some(2)]);
        assert_eq!(
            snapshot,
            CounterSnapshot {
                requests_total: 7,
                cache_hits: 0,
                cache_misses: 2,
                ingestion_runs: 0,
            }
        );
    }

    // REDIS_URL=redis://... cargo test -- --ignored
    #[tokio::test]
    #[ignore = "needs Redis at REDIS_URL"]
    async fn live_counters_are_shared_between_instances() {
        let url = std::env::var("REDIS_URL").expect("REDIS_URL must be set");
        let conn = redis::Client::open(url)
            .unwrap()
            .get_connection_manager()
            .await
            .unwrap();
        let limit = Duration::from_secs(1);

        let first = Counters::with_redis(conn.clone(), limit);
        let second = Counters::with_redis(conn, limit);
        let before = second.totals().await;

        first.record_request();
        first.record_cache_miss();

        let mut after = before;
        for _ in 0..50 {
            after = second.totals().await;
            if after.cache_misses > before.cache_misses
                && after.requests_total > before.requests_total
            {
                break;
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
        assert!(after.requests_total > before.requests_total);
        assert!(after.cache_misses > before.cache_misses);
        assert_eq!(second.snapshot(), CounterSnapshot::default());
    }
}
