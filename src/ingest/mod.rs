//! CRL ingestion pipeline
//!
//! Every source goes through fetch, parse and persist in order while holding
//! a processing lease for its locator. Sources are independent of each other:
//! they run concurrently up to a fixed bound and a failing source never
//! affects the others.

mod pool;
mod writer;

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use thiserror::Error;
use tokio::task::{JoinError, JoinHandle};
use tracing::{debug, error, info, warn};

use crate::cache::CacheAside;
use crate::config::CrlConfig;
use crate::crl::{CrlFetcher, FetchError, ParseError, parse_crl};
use crate::lease::{LeaseManager, acquire_guarded};
use crate::models::{RevokedCertificateRecord, SourceDescriptor};
use crate::registry::{RegistryError, SourceRegistry};
use crate::stats::Counters;
use crate::store::RevocationStore;

pub use pool::WorkerPool;
pub use writer::{BatchReport, BatchWriter};

#[derive(Error, Debug)]
pub enum IngestError {
    #[error("Failed to load CRL sources: {0}")]
    Registry(#[from] RegistryError),

    #[error("Failed to fetch CRL: {0}")]
    Fetch(#[from] FetchError),

    #[error("Failed to parse CRL: {0}")]
    Parse(#[from] ParseError),

    #[error("CRL decoding task failed: {0}")]
    Decode(#[from] JoinError),
}

/// Result of one `ingest_one` call that did not fail.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IngestOutcome {
    /// Another run holds the lease for this source
    Skipped,
    Completed(IngestSummary),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IngestSummary {
    pub issuer: String,
    pub entries: usize,
    pub persisted: usize,
    pub failed_batches: usize,
    /// Whether the source descriptor was saved
    pub source_recorded: bool,
}

/// Coordinates ingestion of every registered CRL source.
pub struct Ingestor {
    registry: SourceRegistry,
    fetcher: CrlFetcher,
    writer: BatchWriter,
    cache: CacheAside,
    leases: Arc<dyn LeaseManager>,
    pool: WorkerPool,
    lease_ttl: Duration,
    lease_timeout: Duration,
    counters: Arc<Counters>,
}

impl Ingestor {
    pub fn new(
        registry: SourceRegistry,
        fetcher: CrlFetcher,
        store: Arc<dyn RevocationStore>,
        cache: CacheAside,
        leases: Arc<dyn LeaseManager>,
        counters: Arc<Counters>,
        config: &CrlConfig,
    ) -> Self {
        Self {
            registry,
            fetcher,
            writer: BatchWriter::new(store, config.batch_size),
            cache,
            leases,
            pool: WorkerPool::new(config.max_concurrent_sources),
            lease_ttl: config.lease_ttl(),
            lease_timeout: config.lease_timeout(),
            counters,
        }
    }

    /// Ingests every registered source and waits for all of them.
    ///
    /// Per-source failures are logged and do not fail the run. Only a
    /// registry that cannot be loaded is reported as an error.
    pub async fn ingest_all(self: &Arc<Self>) -> Result<(), IngestError> {
        let sources = self.registry.load().await?;
        info!(
            count = sources.len(),
            concurrency = self.pool.capacity(),
            "Starting CRL ingestion"
        );

        let jobs = sources.into_iter().map(|source| {
            let ingestor = Arc::clone(self);
            async move {
                match ingestor.ingest_one(&source).await {
                    Ok(IngestOutcome::Completed(summary)) => info!(
                        source = %source,
                        issuer = %summary.issuer,
                        entries = summary.entries,
                        persisted = summary.persisted,
                        failed_batches = summary.failed_batches,
                        "Processed CRL"
                    ),
                    Ok(IngestOutcome::Skipped) => {}
                    Err(e) => error!(source = %source, error = %e, "Error processing CRL"),
                }
            }
        });
        self.pool.run_all(jobs).await;

        self.counters.record_ingestion_run();
        info!("Finished processing all CRLs");
        Ok(())
    }

    /// Ingests a single source under its processing lease.
    ///
    /// Returns [`IngestOutcome::Skipped`] without touching the store when the
    /// lease is held elsewhere. The lease is released whatever the outcome,
    /// including a panic or cancellation of this call. A lease backend that
    /// fails or does not answer in time does not stop the source from being
    /// processed.
    pub async fn ingest_one(&self, source: &str) -> Result<IngestOutcome, IngestError> {
        let guard =
            match acquire_guarded(&self.leases, source, self.lease_ttl, self.lease_timeout).await {
                Ok(Some(guard)) => Some(guard),
                Ok(None) => {
                    info!(source, "CRL is already being processed, skipping");
                    return Ok(IngestOutcome::Skipped);
                }
                Err(e) => {
                    warn!(source, error = %e, "Lease backend unavailable, processing without lease");
                    None
                }
            };

        let result = self.process(source).await;

        if let Some(guard) = guard {
            if let Err(e) = guard.release().await {
                warn!(source, error = %e, "Failed to release processing lease");
            }
        }

        result.map(IngestOutcome::Completed)
    }

    /// Starts a full ingestion in the background and returns immediately.
    pub fn trigger_refresh(self: &Arc<Self>) -> JoinHandle<()> {
        let ingestor = Arc::clone(self);
        tokio::spawn(async move {
            if let Err(e) = ingestor.ingest_all().await {
                error!(error = %e, "Manual CRL refresh failed");
            }
        })
    }

    async fn process(&self, source: &str) -> Result<IngestSummary, IngestError> {
        info!(source, "Processing CRL");

        let bytes = self.fetcher.fetch(source).await?;
        let crl = tokio::task::spawn_blocking(move || parse_crl(&bytes)).await??;

        let now = Utc::now();
        let records: Vec<RevokedCertificateRecord> = crl
            .entries
            .into_iter()
            .map(|entry| RevokedCertificateRecord {
                serial: entry.serial,
                revoked_at: entry.revoked_at,
                reason: entry.reason,
                reason_text: entry.reason_text,
                authority: crl.issuer.clone(),
                updated_at: now,
            })
            .collect();

        let report = self.writer.write_records(source, &records).await;

        for range in &report.committed {
            let statuses: Vec<_> = records[range.clone()]
                .iter()
                .map(RevokedCertificateRecord::to_status)
                .collect();
            self.cache.store_revoked(&statuses).await;
        }

        let descriptor = SourceDescriptor {
            url: source.to_string(),
            issuer: crl.issuer.clone(),
            next_update: crl.next_update,
            last_processed: now,
            cert_count: records.len() as i64,
        };
        let source_recorded = match self.writer.write_source(&descriptor).await {
            Ok(()) => true,
            Err(e) => {
                error!(source, error = %e, "Failed to persist CRL info");
                false
            }
        };

        if report.failed_batches > 0 {
            warn!(
                source,
                failed_batches = report.failed_batches,
                batches = report.batches(),
                "CRL partially persisted, the next run will retry"
            );
        }
        debug!(source, persisted = report.persisted, "CRL persisted");

        Ok(IngestSummary {
            issuer: crl.issuer,
            entries: records.len(),
            persisted: report.persisted,
            failed_batches: report.failed_batches,
            source_recorded,
        })
    }
}
