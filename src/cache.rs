//! Best-effort status cache placed in front of the durable store.
//!
//! The cache is a disposable view: it can be wiped at any time and every
//! operation on it is allowed to fail. [`CacheAside`] wraps a backend with a
//! short operation timeout and turns every failure into a logged miss.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;
use tokio::time::timeout;
use tracing::warn;

use crate::config::CacheConfig;
use crate::models::CertificateStatus;

mod memory;
mod redis;

pub use memory::MemoryCache;
pub use redis::RedisCache;

#[derive(Error, Debug)]
pub enum CacheError {
    #[error("Redis error: {0}")]
    Redis(#[from] ::redis::RedisError),

    #[error("Cached value is not valid JSON: {0}")]
    Serde(#[from] serde_json::Error),

    #[error("Cache operation timed out after {0:?}")]
    Timeout(Duration),

    #[error("Cache unavailable: {0}")]
    Unavailable(String),
}

type Result<T> = std::result::Result<T, CacheError>;

/// Key/value cache of certificate statuses keyed by canonical serial.
#[async_trait]
pub trait StatusCache: Send + Sync + 'static {
    async fn get(&self, serial: &str) -> Result<Option<CertificateStatus>>;

    /// Stores `status`, overwriting any existing entry.
    async fn put(&self, status: &CertificateStatus, ttl: Duration) -> Result<()>;

    /// Stores `status` only when no entry exists for the serial.
    ///
    /// Returns whether the entry was written.
    async fn put_if_absent(&self, status: &CertificateStatus, ttl: Duration) -> Result<bool>;

    /// Stores many statuses with the same expiry, overwriting existing entries.
    async fn put_many(&self, statuses: &[CertificateStatus], ttl: Duration) -> Result<()> {
        for status in statuses {
            self.put(status, ttl).await?;
        }
        Ok(())
    }
}

/// Expiry policy of cached statuses.
#[derive(Debug, Clone, Copy)]
pub struct CachePolicy {
    pub revoked_ttl: Duration,
    pub not_revoked_ttl: Duration,
    pub operation_timeout: Duration,
}

impl CachePolicy {
    /// Revocation is a stable fact, a missing entry may be listed by the
    /// next CRL, so the two outcomes expire at different rates.
    pub fn ttl_for(&self, status: &CertificateStatus) -> Duration {
        if status.is_revoked {
            self.revoked_ttl
        } else {
            self.not_revoked_ttl
        }
    }
}

impl From<&CacheConfig> for CachePolicy {
    fn from(config: &CacheConfig) -> Self {
        Self {
            revoked_ttl: Duration::from_secs(config.revoked_ttl_secs),
            not_revoked_ttl: Duration::from_secs(config.not_revoked_ttl_secs),
            operation_timeout: Duration::from_millis(config.operation_timeout_ms),
        }
    }
}

/// Cache-aside wrapper that never fails.
///
/// Errors and timeouts from the backend are logged and reported as a miss or
/// a skipped write. Without a backend every lookup misses.
#[derive(Clone)]
pub struct CacheAside {
    backend: Option<Arc<dyn StatusCache>>,
    policy: CachePolicy,
}

impl CacheAside {
    pub fn new(backend: Arc<dyn StatusCache>, policy: CachePolicy) -> Self {
        Self {
            backend: Some(backend),
            policy,
        }
    }

    pub fn disabled(policy: CachePolicy) -> Self {
        Self {
            backend: None,
            policy,
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.backend.is_some()
    }

    pub fn policy(&self) -> &CachePolicy {
        &self.policy
    }

    pub async fn get(&self, serial: &str) -> Option<CertificateStatus> {
        let backend = self.backend.as_ref()?;
        match self.bounded(backend.get(serial)).await {
            Ok(status) => status,
            Err(e) => {
                warn!(serial, error = %e, "Cache read failed, treating as miss");
                None
            }
        }
    }

    /// Writes a query result back without clobbering a fresher entry pushed
    /// by ingestion in the meantime.
    pub async fn store_lookup(&self, status: &CertificateStatus) {
        let Some(backend) = self.backend.as_ref() else {
            return;
        };
        let ttl = self.policy.ttl_for(status);
        if let Err(e) = self.bounded(backend.put_if_absent(status, ttl)).await {
            warn!(serial = %status.serial, error = %e, "Cache write-back failed");
        }
    }

    /// Pushes freshly persisted revocations with the revoked expiry.
    pub async fn store_revoked(&self, statuses: &[CertificateStatus]) {
        let Some(backend) = self.backend.as_ref() else {
            return;
        };
        if statuses.is_empty() {
            return;
        }
        if let Err(e) = self
            .bounded(backend.put_many(statuses, self.policy.revoked_ttl))
            .await
        {
            warn!(count = statuses.len(), error = %e, "Cache population failed");
        }
    }

    async fn bounded<T>(
        &self,
        operation: impl Future<Output = Result<T>>,
    ) -> Result<T> {
        match timeout(self.policy.operation_timeout, operation).await {
            Ok(result) => result,
            Err(_) => Err(CacheError::Timeout(self.policy.operation_timeout)),
        }
    }
}
