use std::time::Duration;

use async_trait::async_trait;
use redis::{Script, aio::ConnectionManager};

use super::{Lease, LeaseError, LeaseManager};

const KEY_PREFIX: &str = "crl_processing:";

/// Deletes the key only if it still holds the caller's token.
const RELEASE_SCRIPT: &str = r#"
if redis.call("GET", KEYS[1]) == ARGV[1] then
    return redis.call("DEL", KEYS[1])
else
    return 0
end
"#;

fn key(name: &str) -> String {
    format!("{KEY_PREFIX}{name}")
}

/// Lease manager backed by Redis `SET NX PX`, shared by every instance using
/// the same Redis.
#[derive(Clone)]
pub struct RedisLeaseManager {
    conn: ConnectionManager,
    release: Script,
}

impl RedisLeaseManager {
    pub fn new(conn: ConnectionManager) -> Self {
        Self {
            conn,
            release: Script::new(RELEASE_SCRIPT),
        }
    }
}

#[async_trait]
impl LeaseManager for RedisLeaseManager {
    async fn acquire(&self, name: &str, ttl: Duration) -> Result<Option<Lease>, LeaseError> {
        let mut conn = self.conn.clone();
        let lease = Lease::new(name);
        let millis = u64::try_from(ttl.as_millis()).unwrap_or(u64::MAX).max(1);

        let reply: Option<String> = redis::cmd("SET")
            .arg(key(name))
            .arg(&lease.token)
            .arg("NX")
            .arg("PX")
            .arg(millis)
            .query_async(&mut conn)
            .await?;

        Ok(reply.map(|_| lease))
    }

    async fn release(&self, lease: &Lease) -> Result<(), LeaseError> {
        let mut conn = self.conn.clone();
        let _: i64 = self
            .release
            .key(key(&lease.key))
            .arg(&lease.token)
            .invoke_async(&mut conn)
            .await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keys_are_prefixed() {
        assert_eq!(
            key("http://crl.example/ca.crl"),
            "crl_processing:http://crl.example/ca.crl"
        );
    }
}
