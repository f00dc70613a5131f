//! Per-source processing leases.
//!
//! A lease marks a CRL source as "being ingested". It is granted to at most
//! one holder at a time and expires on its own after its TTL, so a holder
//! that crashed before releasing never blocks later runs for longer than that.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;
use tokio::runtime::Handle;
use tokio::time::timeout;
use tracing::warn;
use uuid::Uuid;

mod memory;
mod redis;

pub use memory::MemoryLeaseManager;
pub use redis::RedisLeaseManager;

#[derive(Error, Debug)]
pub enum LeaseError {
    #[error("Redis error: {0}")]
    Redis(#[from] ::redis::RedisError),

    #[error("Lease backend did not answer within {0:?}")]
    Timeout(Duration),
}

/// A granted lease. Only the holder of the token can release it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Lease {
    pub key: String,
    pub token: String,
}

impl Lease {
    fn new(key: &str) -> Self {
        Self {
            key: key.to_string(),
            token: Uuid::new_v4().to_string(),
        }
    }
}

#[async_trait]
pub trait LeaseManager: Send + Sync + 'static {
    /// Tries to take the lease on `key`.
    ///
    /// Returns `None` when another holder owns an unexpired lease.
    async fn acquire(&self, key: &str, ttl: Duration) -> Result<Option<Lease>, LeaseError>;

    /// Releases `lease` if it is still held by the same token.
    async fn release(&self, lease: &Lease) -> Result<(), LeaseError>;
}

/// Acquires `key` with every backend call bounded by `limit`.
///
/// The returned guard gives the lease back when dropped, so a holder that
/// panics or is cancelled frees the source right away instead of after `ttl`.
pub async fn acquire_guarded(
    manager: &Arc<dyn LeaseManager>,
    key: &str,
    ttl: Duration,
    limit: Duration,
) -> Result<Option<LeaseGuard>, LeaseError> {
    let lease = timeout(limit, manager.acquire(key, ttl))
        .await
        .unwrap_or_else(|_| Err(LeaseError::Timeout(limit)))?;

    Ok(lease.map(|lease| LeaseGuard {
        manager: Arc::clone(manager),
        lease: Some(lease),
        limit,
    }))
}

async fn release_within(
    manager: &dyn LeaseManager,
    lease: &Lease,
    limit: Duration,
) -> Result<(), LeaseError> {
    timeout(limit, manager.release(lease))
        .await
        .unwrap_or_else(|_| Err(LeaseError::Timeout(limit)))
}

/// A held lease that is released on drop if not released explicitly.
pub struct LeaseGuard {
    manager: Arc<dyn LeaseManager>,
    lease: Option<Lease>,
    limit: Duration,
}

impl LeaseGuard {
    pub async fn release(mut self) -> Result<(), LeaseError> {
        match self.lease.take() {
            Some(lease) => release_within(self.manager.as_ref(), &lease, self.limit).await,
            None => Ok(()),
        }
    }
}

impl Drop for LeaseGuard {
    fn drop(&mut self) {
        let Some(lease) = self.lease.take() else {
            return;
        };
        let Ok(handle) = Handle::try_current() else {
            warn!(key = %lease.key, "No runtime to release lease, it will expire on its own");
            return;
        };

        let manager = Arc::clone(&self.manager);
        let limit = self.limit;
        handle.spawn(async move {
            if let Err(e) = release_within(manager.as_ref(), &lease, limit).await {
                warn!(key = %lease.key, error = %e, "Failed to release abandoned lease");
            }
        });
    }
}
