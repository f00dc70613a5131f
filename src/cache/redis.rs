use std::time::Duration;

use async_trait::async_trait;
use redis::{AsyncCommands, aio::ConnectionManager};

use crate::models::CertificateStatus;

use super::{Result, StatusCache};

const KEY_PREFIX: &str = "cert:";

fn key(serial: &str) -> String {
    format!("{KEY_PREFIX}{serial}")
}

/// Redis rejects a zero expiry.
fn expiry_secs(ttl: Duration) -> u64 {
    ttl.as_secs().max(1)
}

/// A Redis status cache storing JSON values under `cert:{serial}`.
#[derive(Clone)]
pub struct RedisCache {
    conn: ConnectionManager,
}

impl RedisCache {
    /// Creates a new Redis cache from a connection manager.
    pub fn new(conn: ConnectionManager) -> Self {
        Self { conn }
    }
}

#[async_trait]
impl StatusCache for RedisCache {
    async fn get(&self, serial: &str) -> Result<Option<CertificateStatus>> {
        let mut conn = self.conn.clone();
        let value: Option<String> = conn.get(key(serial)).await?;
        match value {
            Some(json) => Ok(Some(serde_json::from_str(&json)?)),
            None => Ok(None),
        }
    }

    async fn put(&self, status: &CertificateStatus, ttl: Duration) -> Result<()> {
        let mut conn = self.conn.clone();
        let value = serde_json::to_string(status)?;
        let _: () = conn
            .set_ex(key(&status.serial), value, expiry_secs(ttl))
            .await?;
        Ok(())
    }

    async fn put_if_absent(&self, status: &CertificateStatus, ttl: Duration) -> Result<bool> {
        let mut conn = self.conn.clone();
        let value = serde_json::to_string(status)?;
        let reply: Option<String> = redis::cmd("SET")
            .arg(key(&status.serial))
            .arg(value)
            .arg("NX")
            .arg("EX")
            .arg(expiry_secs(ttl))
            .query_async(&mut conn)
            .await?;
        Ok(reply.is_some())
    }

    async fn put_many(&self, statuses: &[CertificateStatus], ttl: Duration) -> Result<()> {
        let mut conn = self.conn.clone();
        let mut pipe = redis::pipe();
        for status in statuses {
            pipe.set_ex(
                key(&status.serial),
                serde_json::to_string(status)?,
                expiry_secs(ttl),
            )
            .ignore();
        }
        let _: () = pipe.query_async(&mut conn).await?;
        Ok(())
    }
}
