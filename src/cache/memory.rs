use std::num::NonZeroUsize;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use lru::LruCache;
use tokio::sync::RwLock;
use tokio::time::Instant;

use crate::models::CertificateStatus;

use super::{Result, StatusCache};

const MIN_CAPACITY: NonZeroUsize = NonZeroUsize::MIN;

#[derive(Debug, Clone)]
struct Entry {
    status: CertificateStatus,
    expires_at: Instant,
}

/// Bounded in-process status cache.
///
/// Least recently used entries are evicted once `capacity` is reached and
/// expired entries are dropped on read.
#[derive(Debug, Clone)]
pub struct MemoryCache {
    entries: Arc<RwLock<LruCache<String, Entry>>>,
}

impl MemoryCache {
    pub fn new(capacity: usize) -> Self {
        let capacity = NonZeroUsize::new(capacity).unwrap_or(MIN_CAPACITY);
        Self {
            entries: Arc::new(RwLock::new(LruCache::new(capacity))),
        }
    }

    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }
}

#[async_trait]
impl StatusCache for MemoryCache {
    async fn get(&self, serial: &str) -> Result<Option<CertificateStatus>> {
        let mut entries = self.entries.write().await;
        match entries.get(serial) {
            Some(entry) if entry.expires_at > Instant::now() => Ok(Some(entry.status.clone())),
            Some(_) => {
                entries.pop(serial);
                Ok(None)
            }
            None => Ok(None),
        }
    }

    async fn put(&self, status: &CertificateStatus, ttl: Duration) -> Result<()> {
        let entry = Entry {
            status: status.clone(),
            expires_at: Instant::now() + ttl,
        };
        self.entries.write().await.put(status.serial.clone(), entry);
        Ok(())
    }

    async fn put_if_absent(&self, status: &CertificateStatus, ttl: Duration) -> Result<bool> {
        let mut entries = self.entries.write().await;
        let now = Instant::now();
        if entries
            .peek(&status.serial)
            .is_some_and(|entry| entry.expires_at > now)
        {
            return Ok(false);
        }
        entries.put(
            status.serial.clone(),
            Entry {
                status: status.clone(),
                expires_at: now + ttl,
            },
        );
        Ok(true)
    }
}
