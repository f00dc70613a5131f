use async_trait::async_trait;
use color_eyre::Report;
use std::error::Error as StdError;
use std::fmt;

use crate::models::{RevokedCertificateRecord, SourceDescriptor, StoreStats};

mod memory;
mod postgres;

pub use memory::MemoryStore;
pub use postgres::PostgresStore;

type Result<T> = std::result::Result<T, StoreError>;

/// Error type for durable store operations.
#[derive(Debug)]
pub struct StoreError {
    error: Report,
}

impl StoreError {
    pub fn new<T>(error: T) -> Self
    where
        T: StdError + Send + Sync + 'static,
    {
        Self {
            error: Report::new(error),
        }
    }

    pub fn msg<T>(message: T) -> Self
    where
        T: fmt::Debug + fmt::Display + Send + Sync + 'static,
    {
        Self {
            error: Report::msg(message),
        }
    }
}

impl StdError for StoreError {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        self.error.source()
    }
}

impl fmt::Display for StoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.error.fmt(f)
    }
}

impl From<sqlx::Error> for StoreError {
    fn from(error: sqlx::Error) -> Self {
        Self {
            error: Report::new(error),
        }
    }
}

/// Durable store of revoked certificates and CRL source metadata.
///
/// The store is the single source of truth: every other view of revocation
/// data can be rebuilt from it.
#[async_trait]
pub trait RevocationStore: Send + Sync + 'static {
    /// Upserts a batch of records keyed by serial as one atomic unit.
    ///
    /// An existing record is replaced as a whole, except that its
    /// `updated_at` never moves backward.
    async fn upsert_revoked(&self, records: &[RevokedCertificateRecord]) -> Result<()>;

    /// Upserts the metadata of a source keyed by its locator.
    async fn upsert_source(&self, source: &SourceDescriptor) -> Result<()>;

    /// Looks up a revoked certificate by its canonical serial.
    async fn find_revoked(&self, serial: &str) -> Result<Option<RevokedCertificateRecord>>;

    /// Looks up the metadata of a source by its locator.
    async fn find_source(&self, url: &str) -> Result<Option<SourceDescriptor>>;

    /// Aggregate counts over both tables.
    async fn stats(&self) -> Result<StoreStats>;

    /// Checks that the backend is reachable.
    async fn health_check(&self) -> Result<()>;
}
