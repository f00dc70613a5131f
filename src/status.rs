//! Revocation status queries
//!
//! Lookups go to the cache first and fall back to the durable store. Results
//! read from the store are written back to the cache with an expiry that
//! depends on whether the serial is revoked.

use std::collections::BTreeMap;
use std::sync::Arc;

use serde_json::{Value, json};
use thiserror::Error;
use tracing::debug;

use crate::cache::CacheAside;
use crate::crl::{SerialError, normalize_serial};
use crate::models::{CertificateStatus, RevokedCertificateRecord};
use crate::stats::Counters;
use crate::store::{RevocationStore, StoreError};

#[derive(Error, Debug)]
pub enum StatusError {
    #[error("Invalid serial number: {0}")]
    InvalidSerial(#[from] SerialError),

    #[error("Store lookup failed: {0}")]
    Store(#[from] StoreError),
}

pub struct StatusService {
    store: Arc<dyn RevocationStore>,
    cache: CacheAside,
    counters: Arc<Counters>,
}

impl StatusService {
    pub fn new(store: Arc<dyn RevocationStore>, cache: CacheAside, counters: Arc<Counters>) -> Self {
        Self {
            store,
            cache,
            counters,
        }
    }

    /// Reports whether `serial` is revoked.
    ///
    /// A serial missing from the store is not revoked. Cache failures only
    /// cost a store read, a store failure is returned as an error.
    pub async fn check_status(&self, serial: &str) -> Result<CertificateStatus, StatusError> {
        let serial = normalize_serial(serial)?;
        self.counters.record_request();

        if let Some(status) = self.cache.get(&serial).await {
            self.counters.record_cache_hit();
            debug!(%serial, "Status served from cache");
            return Ok(status);
        }
        if self.cache.is_enabled() {
            self.counters.record_cache_miss();
        }

        let status = match self.store.find_revoked(&serial).await? {
            Some(record) => record.to_status(),
            None => CertificateStatus::not_revoked(serial),
        };

        self.cache.store_lookup(&status).await;
        Ok(status)
    }

    /// Full stored record of a revoked serial, read from the store directly.
    pub async fn details(
        &self,
        serial: &str,
    ) -> Result<Option<RevokedCertificateRecord>, StatusError> {
        let serial = normalize_serial(serial)?;
        Ok(self.store.find_revoked(&serial).await?)
    }

    /// Flat key/value snapshot of store aggregates and process counters.
    pub async fn stats(&self) -> Result<BTreeMap<&'static str, Value>, StatusError> {
        let store = self.store.stats().await?;
        let counters = self.counters.totals().await;

        Ok(BTreeMap::from([
            ("total_revoked_certificates", json!(store.total_revoked)),
            ("total_crls_processed", json!(store.total_sources)),
            ("last_update", json!(store.last_update)),
            ("cache_enabled", json!(self.cache.is_enabled())),
            ("cache_hits", json!(counters.cache_hits)),
            ("cache_misses", json!(counters.cache_misses)),
            ("requests_total", json!(counters.requests_total)),
            ("ingestion_runs", json!(counters.ingestion_runs)),
        ]))
    }

    pub async fn health(&self) -> Result<(), StatusError> {
        Ok(self.store.health_check().await?)
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use chrono::{DateTime, Utc};

    use super::*;
    use crate::cache::{CachePolicy, MemoryCache};
    use crate::models::ReasonCode;
    use crate::store::MemoryStore;

    fn policy() -> CachePolicy {
        CachePolicy {
            revoked_ttl: Duration::from_secs(3600),
            not_revoked_ttl: Duration::from_secs(60),
            operation_timeout: Duration::from_millis(200),
        }
    }

    async fn service_with(store: MemoryStore) -> StatusService {
        let cache = CacheAside::new(Arc::new(MemoryCache::new(64)), policy());
        StatusService::new(Arc::new(store), cache, Arc::new(Counters::new()))
    }

    #[tokio::test]
    async fn test_unknown_serial_is_not_revoked() {
        let service = service_with(MemoryStore::new()).await;

        let status = service.check_status("123").await.unwrap();

        assert_eq!(status, CertificateStatus::not_revoked("123"));
    }

    #[tokio::test]
    async fn test_second_lookup_hits_cache() {
        let store = MemoryStore::new();
        store
            .upsert_revoked(&[RevokedCertificateRecord {
                serial: "4660".into(),
                revoked_at: DateTime::from_timestamp(1_700_000_000, 0).unwrap(),
                reason: ReasonCode::KeyCompromise,
                reason_text: None,
                authority: "Test CA".into(),
                updated_at: Utc::now(),
            }])
            .await
            .unwrap();
        let service = service_with(store).await;

        let first = service.check_status("0x1234").await.unwrap();
        let second = service.check_status("4660").await.unwrap();

        assert!(first.is_revoked);
        assert_eq!(first, second);
        assert_eq!(first.reason.as_deref(), Some("Key compromise"));

        let stats = service.stats().await.unwrap();
        assert_eq!(stats["cache_hits"], json!(1));
        assert_eq!(stats["cache_misses"], json!(1));
        assert_eq!(stats["requests_total"], json!(2));
        assert_eq!(stats["total_revoked_certificates"], json!(1));
    }

    #[tokio::test]
    async fn test_invalid_serial_is_rejected() {
        let service = service_with(MemoryStore::new()).await;
        assert!(matches!(
            service.check_status("not-a-serial!").await,
            Err(StatusError::InvalidSerial(_))
        ));
        assert!(matches!(
            service.details("").await,
            Err(StatusError::InvalidSerial(_))
        ));
    }
}
