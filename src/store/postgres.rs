use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{FromRow, PgPool};
use tracing::debug;

use crate::models::{ReasonCode, RevokedCertificateRecord, SourceDescriptor, StoreStats};

use super::{Result, RevocationStore, StoreError};

const SCHEMA: &str = include_str!("schema.sql");

fn schema_statements(schema: &str) -> Vec<&str> {
    schema
        .split(';')
        .map(str::trim)
        .filter(|statement| {
            statement.lines().any(|line| {
                let line = line.trim();
                !line.is_empty() && !line.starts_with("--")
            })
        })
        .collect()
}

#[derive(FromRow)]
struct RevokedRow {
    serial_number: String,
    revocation_date: DateTime<Utc>,
    reason: i16,
    reason_text: Option<String>,
    certificate_authority: String,
    updated_at: DateTime<Utc>,
}

impl From<RevokedRow> for RevokedCertificateRecord {
    fn from(row: RevokedRow) -> Self {
        Self {
            serial: row.serial_number,
            revoked_at: row.revocation_date,
            reason: u8::try_from(row.reason)
                .map(ReasonCode::from_code)
                .unwrap_or(ReasonCode::Unspecified),
            reason_text: row.reason_text,
            authority: row.certificate_authority,
            updated_at: row.updated_at,
        }
    }
}

#[derive(FromRow)]
struct SourceRow {
    url: String,
    issuer: String,
    next_update: Option<DateTime<Utc>>,
    last_processed: DateTime<Utc>,
    cert_count: i64,
}

impl From<SourceRow> for SourceDescriptor {
    fn from(row: SourceRow) -> Self {
        Self {
            url: row.url,
            issuer: row.issuer,
            next_update: row.next_update,
            last_processed: row.last_processed,
            cert_count: row.cert_count,
        }
    }
}

/// PostgreSQL backed revocation store.
#[derive(Clone)]
pub struct PostgresStore {
    pool: PgPool,
}

impl PostgresStore {
    /// Wraps an existing pool and creates the schema if it is missing.
    pub async fn new(pool: PgPool) -> Result<Self> {
        let store = Self { pool };
        store.migrate().await?;
        Ok(store)
    }

    async fn migrate(&self) -> Result<()> {
        // One statement per query, Postgres rejects multi-statement prepares.
        for statement in schema_statements(SCHEMA) {
            sqlx::query(statement).execute(&self.pool).await?;
        }
        debug!("Revocation schema is up to date");
        Ok(())
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

#[async_trait]
impl RevocationStore for PostgresStore {
    async fn upsert_revoked(&self, records: &[RevokedCertificateRecord]) -> Result<()> {
        if records.is_empty() {
            return Ok(());
        }

        let mut tx = self.pool.begin().await?;

        for record in records {
            sqlx::query(
                r#"
                INSERT INTO revoked_certificates
                    (serial_number, revocation_date, reason, reason_text,
                     certificate_authority, created_at, updated_at)
                VALUES ($1, $2, $3, $4, $5, $6, $6)
                ON CONFLICT (serial_number) DO UPDATE SET
                    revocation_date = EXCLUDED.revocation_date,
                    reason = EXCLUDED.reason,
                    reason_text = EXCLUDED.reason_text,
                    certificate_authority = EXCLUDED.certificate_authority,
                    updated_at = GREATEST(revoked_certificates.updated_at, EXCLUDED.updated_at)
                "#,
            )
            .bind(&record.serial)
            .bind(record.revoked_at)
            .bind(i16::from(record.reason.code()))
            .bind(&record.reason_text)
            .bind(&record.authority)
            .bind(record.updated_at)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(())
    }

    async fn upsert_source(&self, source: &SourceDescriptor) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO crl_info (url, issuer, next_update, last_processed, cert_count)
            VALUES ($1, $2, $3, $4, $5)
            ON CONFLICT (url) DO UPDATE SET
                issuer = EXCLUDED.issuer,
                next_update = EXCLUDED.next_update,
                last_processed = EXCLUDED.last_processed,
                cert_count = EXCLUDED.cert_count
            "#,
        )
        .bind(&source.url)
        .bind(&source.issuer)
        .bind(source.next_update)
        .bind(source.last_processed)
        .bind(source.cert_count)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn find_revoked(&self, serial: &str) -> Result<Option<RevokedCertificateRecord>> {
        let row = sqlx::query_as::<_, RevokedRow>(
            r#"
            SELECT serial_number, revocation_date, reason, reason_text,
                   certificate_authority, updated_at
            FROM revoked_certificates
            WHERE serial_number = $1
            "#,
        )
        .bind(serial)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(Into::into))
    }

    async fn find_source(&self, url: &str) -> Result<Option<SourceDescriptor>> {
        let row = sqlx::query_as::<_, SourceRow>(
            "SELECT url, issuer, next_update, last_processed, cert_count FROM crl_info WHERE url = $1",
        )
        .bind(url)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(Into::into))
    }

    async fn stats(&self) -> Result<StoreStats> {
        let total_revoked: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM revoked_certificates")
            .fetch_one(&self.pool)
            .await?;
        let (total_sources, last_update): (i64, Option<DateTime<Utc>>) =
            sqlx::query_as("SELECT COUNT(*), MAX(last_processed) FROM crl_info")
                .fetch_one(&self.pool)
                .await?;

        Ok(StoreStats {
            total_revoked,
            total_sources,
            last_update,
        })
    }

    async fn health_check(&self) -> Result<()> {
        sqlx::query("SELECT 1")
            .execute(&self.pool)
            .await
            .map_err(|e| StoreError::msg(format!("Database is unreachable: {e}")))?;
        Ok(())
    }
}
