use std::ops::Range;
use std::sync::Arc;

use tracing::{debug, error};

use crate::models::{RevokedCertificateRecord, SourceDescriptor};
use crate::store::{RevocationStore, StoreError};

/// Outcome of writing one source's records.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BatchReport {
    pub persisted: usize,
    pub failed_batches: usize,
    /// Index ranges of the input that were committed, in input order
    pub committed: Vec<Range<usize>>,
}

impl BatchReport {
    pub fn batches(&self) -> usize {
        self.committed.len() + self.failed_batches
    }
}

/// Persists records in fixed-size batches, each one an atomic upsert.
#[derive(Clone)]
pub struct BatchWriter {
    store: Arc<dyn RevocationStore>,
    batch_size: usize,
}

impl BatchWriter {
    pub fn new(store: Arc<dyn RevocationStore>, batch_size: usize) -> Self {
        Self {
            store,
            batch_size: batch_size.max(1),
        }
    }

    pub fn batch_size(&self) -> usize {
        self.batch_size
    }

    /// Writes every batch in order.
    ///
    /// A failed batch is logged and skipped. Batches committed before it stay
    /// committed and the following batches are still attempted.
    pub async fn write_records(
        &self,
        source: &str,
        records: &[RevokedCertificateRecord],
    ) -> BatchReport {
        let mut report = BatchReport::default();

        for (index, chunk) in records.chunks(self.batch_size).enumerate() {
            let start = index * self.batch_size;
            match self.store.upsert_revoked(chunk).await {
                Ok(()) => {
                    debug!(source, batch = index, size = chunk.len(), "Committed batch");
                    report.persisted += chunk.len();
                    report.committed.push(start..start + chunk.len());
                }
                Err(e) => {
                    error!(source, batch = index, size = chunk.len(), error = %e, "Failed to persist batch");
                    report.failed_batches += 1;
                }
            }
        }

        report
    }

    pub async fn write_source(&self, descriptor: &SourceDescriptor) -> Result<(), StoreError> {
        self.store.upsert_source(descriptor).await
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use async_trait::async_trait;
    use chrono::{DateTime, Utc};

    use super::*;
    use crate::models::{ReasonCode, StoreStats};
    use crate::store::MemoryStore;

    /// Fails the n-th call to `upsert_revoked`, counting from zero.
    struct FailingBatch {
        inner: MemoryStore,
        fail_on: usize,
        calls: AtomicUsize,
    }

    #[async_trait]
    impl RevocationStore for FailingBatch {
        async fn upsert_revoked(
            &self,
            records: &[RevokedCertificateRecord],
        ) -> Result<(), StoreError> {
            if self.calls.fetch_add(1, Ordering::SeqCst) == self.fail_on {
                return Err(StoreError::msg("connection reset"));
            }
            self.inner.upsert_revoked(records).await
        }

        async fn upsert_source(&self, source: &SourceDescriptor) -> Result<(), StoreError> {
            self.inner.upsert_source(source).await
        }

        async fn find_revoked(
            &self,
            serial: &str,
        ) -> Result<Option<RevokedCertificateRecord>, StoreError> {
            self.inner.find_revoked(serial).await
        }

        async fn find_source(&self, url: &str) -> Result<Option<SourceDescriptor>, StoreError> {
            self.inner.find_source(url).await
        }

        async fn stats(&self) -> Result<StoreStats, StoreError> {
            self.inner.stats().await
        }

        async fn health_check(&self) -> Result<(), StoreError> {
            Ok(())
        }
    }

    fn records(count: usize) -> Vec<RevokedCertificateRecord> {
        (0..count)
            .map(|i| RevokedCertificateRecord {
                serial: (1000 + i).to_string(),
                revoked_at: DateTime::from_timestamp(1_700_000_000, 0).unwrap(),
                reason: ReasonCode::Unspecified,
                reason_text: None,
                authority: "Batch CA".to_string(),
                updated_at: Utc::now(),
            })
            .collect()
    }

    #[tokio::test]
    async fn test_records_are_split_into_batches() {
        let store = MemoryStore::new();
        let writer = BatchWriter::new(Arc::new(store.clone()), 500);

        let report = writer.write_records("src", &records(1203)).await;

        assert_eq!(report.persisted, 1203);
        assert_eq!(report.failed_batches, 0);
        assert_eq!(report.committed, vec![0..500, 500..1000, 1000..1203]);
        assert_eq!(store.records().await.len(), 1203);
    }

    #[tokio::test]
    async fn test_failed_batch_keeps_the_others() {
        let inner = MemoryStore::new();
        let store = FailingBatch {
            inner: inner.clone(),
            fail_on: 1,
            calls: AtomicUsize::new(0),
        };
        let writer = BatchWriter::new(Arc::new(store), 500);

        let report = writer.write_records("src", &records(1203)).await;

        assert_eq!(report.persisted, 703);
        assert_eq!(report.failed_batches, 1);
        assert_eq!(report.batches(), 3);
        assert_eq!(report.committed, vec![0..500, 1000..1203]);
        assert_eq!(inner.records().await.len(), 703);
        assert!(inner.find_revoked("1500").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_empty_input_writes_nothing() {
        let writer = BatchWriter::new(Arc::new(MemoryStore::new()), 0);
        assert_eq!(writer.batch_size(), 1);
        assert_eq!(writer.write_records("src", &[]).await, BatchReport::default());
    }
}
