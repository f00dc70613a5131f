use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use tokio::time::Instant;

use super::{Lease, LeaseError, LeaseManager};

#[derive(Debug)]
struct Held {
    token: String,
    expires_at: Instant,
}

/// In-process lease manager.
///
/// Leases only exclude holders within the same process.
#[derive(Debug, Default, Clone)]
pub struct MemoryLeaseManager {
    leases: Arc<DashMap<String, Held>>,
}

impl MemoryLeaseManager {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_held(&self, key: &str) -> bool {
        self.leases
            .get(key)
            .is_some_and(|held| held.expires_at > Instant::now())
    }
}

#[async_trait]
impl LeaseManager for MemoryLeaseManager {
    async fn acquire(&self, key: &str, ttl: Duration) -> Result<Option<Lease>, LeaseError> {
        let lease = Lease::new(key);
        let now = Instant::now();
        let held = Held {
            token: lease.token.clone(),
            expires_at: now + ttl,
        };

        match self.leases.entry(key.to_string()) {
            Entry::Occupied(mut occupied) => {
                if occupied.get().expires_at > now {
                    return Ok(None);
                }
                occupied.insert(held);
            }
            Entry::Vacant(vacant) => {
                vacant.insert(held);
            }
        }
        Ok(Some(lease))
    }

    async fn release(&self, lease: &Lease) -> Result<(), LeaseError> {
        self.leases
            .remove_if(&lease.key, |_, held| held.token == lease.token);
        Ok(())
    }
}
