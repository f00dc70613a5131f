use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::models::{RevokedCertificateRecord, SourceDescriptor, StoreStats};

use super::{Result, RevocationStore};

#[derive(Debug, Default)]
struct Tables {
    revoked: HashMap<String, RevokedCertificateRecord>,
    sources: HashMap<String, SourceDescriptor>,
}

/// An in-memory revocation store.
///
/// Useful for testing and development. A batch is applied under a single
/// write lock, which gives it the same all-or-nothing visibility as a
/// database transaction.
#[derive(Debug, Default, Clone)]
pub struct MemoryStore {
    tables: Arc<RwLock<Tables>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of every stored record, sorted by serial.
    pub async fn records(&self) -> Vec<RevokedCertificateRecord> {
        let tables = self.tables.read().await;
        let mut records: Vec<_> = tables.revoked.values().cloned().collect();
        records.sort_by(|a, b| a.serial.cmp(&b.serial));
        records
    }
}

#[async_trait]
impl RevocationStore for MemoryStore {
    async fn upsert_revoked(&self, records: &[RevokedCertificateRecord]) -> Result<()> {
        let mut tables = self.tables.write().await;
        for record in records {
            let mut next = record.clone();
            if let Some(existing) = tables.revoked.get(&record.serial) {
                next.updated_at = next.updated_at.max(existing.updated_at);
            }
            tables.revoked.insert(next.serial.clone(), next);
        }
        Ok(())
    }

    async fn upsert_source(&self, source: &SourceDescriptor) -> Result<()> {
        self.tables
            .write()
            .await
            .sources
            .insert(source.url.clone(), source.clone());
        Ok(())
    }

    async fn find_revoked(&self, serial: &str) -> Result<Option<RevokedCertificateRecord>> {
        Ok(self.tables.read().await.revoked.get(serial).cloned())
    }

    async fn find_source(&self, url: &str) -> Result<Option<SourceDescriptor>> {
        Ok(self.tables.read().await.sources.get(url).cloned())
    }

    async fn stats(&self) -> Result<StoreStats> {
        let tables = self.tables.read().await;
        Ok(StoreStats {
            total_revoked: tables.revoked.len() as i64,
            total_sources: tables.sources.len() as i64,
            last_update: tables.sources.values().map(|s| s.last_processed).max(),
        })
    }

    async fn health_check(&self) -> Result<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use chrono::{DateTime, Duration, Utc};

    use super::*;
    use crate::models::ReasonCode;

    fn record(serial: &str, reason: ReasonCode, updated_at: DateTime<Utc>) -> RevokedCertificateRecord {
        RevokedCertificateRecord {
            serial: serial.to_string(),
            revoked_at: DateTime::from_timestamp(1_700_000_000, 0).unwrap(),
            reason,
            reason_text: None,
            authority: "Test CA".to_string(),
            updated_at,
        }
    }

    #[tokio::test]
    async fn test_upsert_replaces_record() {
        let store = MemoryStore::new();
        let now = Utc::now();

        store
            .upsert_revoked(&[record("1", ReasonCode::KeyCompromise, now)])
            .await
            .unwrap();
        store
            .upsert_revoked(&[record("1", ReasonCode::Superseded, now + Duration::seconds(5))])
            .await
            .unwrap();

        let found = store.find_revoked("1").await.unwrap().unwrap();
        assert_eq!(found.reason, ReasonCode::Superseded);
        assert_eq!(found.updated_at, now + Duration::seconds(5));
        assert_eq!(store.records().await.len(), 1);
    }

    #[tokio::test]
    async fn test_updated_at_never_moves_backward() {
        let store = MemoryStore::new();
        let now = Utc::now();

        store
            .upsert_revoked(&[record("7", ReasonCode::KeyCompromise, now)])
            .await
            .unwrap();
        store
            .upsert_revoked(&[record("7", ReasonCode::CaCompromise, now - Duration::hours(1))])
            .await
            .unwrap();

        let found = store.find_revoked("7").await.unwrap().unwrap();
        assert_eq!(found.reason, ReasonCode::CaCompromise);
        assert_eq!(found.updated_at, now);
    }

    #[tokio::test]
    async fn test_stats_and_sources() {
        let store = MemoryStore::new();
        let now = Utc::now();

        assert_eq!(store.stats().await.unwrap(), StoreStats::default());

        store
            .upsert_revoked(&[
                record("1", ReasonCode::Unspecified, now),
                record("2", ReasonCode::Unspecified, now),
            ])
            .await
            .unwrap();
        let source = SourceDescriptor {
            url: "http://crl.example/ca.crl".into(),
            issuer: "Example CA".into(),
            next_update: None,
            last_processed: now,
            cert_count: 2,
        };
        store.upsert_source(&source).await.unwrap();

        let stats = store.stats().await.unwrap();
        assert_eq!(stats.total_revoked, 2);
        assert_eq!(stats.total_sources, 1);
        assert_eq!(stats.last_update, Some(now));
        assert_eq!(
            store.find_source(&source.url).await.unwrap(),
            Some(source)
        );
        assert_eq!(store.find_revoked("3").await.unwrap(), None);
    }
}
