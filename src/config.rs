use std::{collections::HashMap, path::PathBuf, time::Duration};

use config::{Config as ConfigLib, ConfigError, Environment, File};
use redis::{
    Client as RedisClient, RedisResult,
    aio::{ConnectionManager, ConnectionManagerConfig},
};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use sqlx::postgres::{PgPool, PgPoolOptions};

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub server: ServerConfig,
    #[serde(default)]
    pub database: Option<DatabaseConfig>,
    #[serde(default)]
    pub redis: Option<RedisConfig>,
    pub crl: CrlConfig,
    pub cache: CacheConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    pub url: SecretString,
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
}

fn default_max_connections() -> u32 {
    25
}

impl DatabaseConfig {
    /// Opens a bounded PostgreSQL connection pool.
    ///
    /// The pool is shared by the ingestion pipeline and the query path, so
    /// `max_connections` should stay above `crl.max_concurrent_sources`.
    pub async fn pool(&self) -> Result<PgPool, sqlx::Error> {
        PgPoolOptions::new()
            .max_connections(self.max_connections)
            .acquire_timeout(Duration::from_secs(10))
            .idle_timeout(Duration::from_secs(120))
            .max_lifetime(Duration::from_secs(300))
            .connect(self.url.expose_secret())
            .await
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct RedisConfig {
    pub uri: SecretString,
}

impl RedisConfig {
    /// Establishes a new Redis connection based on the provided URI.
    ///
    /// - To enable TLS, the URI must use the `rediss://` scheme.
    /// - To enable insecure TLS, the URI must use the `rediss://` scheme and end with `/#insecure`.
    ///
    /// # Errors
    /// Returns an error if the connection cannot be established.
    pub async fn start(&self) -> RedisResult<ConnectionManager> {
        let client = RedisClient::open(self.uri.expose_secret())?;
        let config = ConnectionManagerConfig::new()
            .set_connection_timeout(Duration::from_secs(5))
            .set_response_timeout(Duration::from_secs(5));
        client.get_connection_manager_with_config(config).await
    }
}

/// Settings of the CRL ingestion pipeline.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CrlConfig {
    /// JSON file holding the list of CRL locators
    pub registry_path: PathBuf,
    pub refresh_interval_secs: u64,
    pub request_timeout_secs: u64,
    /// Maximum number of sources ingested at the same time
    pub max_concurrent_sources: usize,
    pub batch_size: usize,
    /// Upper bound on how long a crashed run can keep a source locked
    pub lease_ttl_secs: u64,
    /// Bound on every call to the lease backend
    pub lease_timeout_ms: u64,
    pub user_agent: String,
}

impl CrlConfig {
    pub fn refresh_interval(&self) -> Duration {
        Duration::from_secs(self.refresh_interval_secs)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn lease_ttl(&self) -> Duration {
        Duration::from_secs(self.lease_ttl_secs)
    }

    pub fn lease_timeout(&self) -> Duration {
        Duration::from_millis(self.lease_timeout_ms)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    pub enabled: bool,
    pub revoked_ttl_secs: u64,
    pub not_revoked_ttl_secs: u64,
    pub operation_timeout_ms: u64,
    /// Entry bound of the in-process cache used when no Redis is configured
    pub memory_capacity: usize,
}

impl Config {
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_with_sources(None)
    }

    pub fn load_with_sources(
        env_vars: Option<HashMap<String, String>>,
    ) -> Result<Self, ConfigError> {
        let mut builder = ConfigLib::builder()
            .set_default("server.host", "localhost")?
            .set_default("server.port", 8080)?
            .set_default("crl.registry_path", "crl_urls.json")?
            .set_default("crl.refresh_interval_secs", 600)?
            .set_default("crl.request_timeout_secs", 30)?
            .set_default("crl.max_concurrent_sources", 5)?
            .set_default("crl.batch_size", 500)?
            .set_default("crl.lease_ttl_secs", 1800)?
            .set_default("crl.lease_timeout_ms", 2000)?
            .set_default(
                "crl.user_agent",
                concat!("crl-server/", env!("CARGO_PKG_VERSION")),
            )?
            .set_default("cache.enabled", true)?
            .set_default("cache.revoked_ttl_secs", 7 * 24 * 3600)?
            .set_default("cache.not_revoked_ttl_secs", 24 * 3600)?
            .set_default("cache.operation_timeout_ms", 500)?
            .set_default("cache.memory_capacity", 100_000)?
            .add_source(File::with_name("config/settings").required(false));

        // If env_vars is provided, we use it instead of system environment
        // This is to avoid systems variables pollution across tests
        if let Some(vars) = env_vars {
            for (key, value) in vars {
                builder = builder.set_override(&key, value)?;
            }
        } else {
            // Should be in the format APP_SERVER__HOST or APP_CRL__BATCH_SIZE
            builder = builder.add_source(
                Environment::with_prefix("APP")
                    .prefix_separator("_")
                    .separator("__"),
            );
        }

        let config: Self = builder.build()?.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    /// Rejects settings the pipeline cannot run with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let crl = &self.crl;
        let positive = [
            ("crl.refresh_interval_secs", crl.refresh_interval_secs),
            ("crl.request_timeout_secs", crl.request_timeout_secs),
            ("crl.lease_ttl_secs", crl.lease_ttl_secs),
            ("crl.lease_timeout_ms", crl.lease_timeout_ms),
            ("crl.batch_size", crl.batch_size as u64),
            ("crl.max_concurrent_sources", crl.max_concurrent_sources as u64),
            ("cache.operation_timeout_ms", self.cache.operation_timeout_ms),
        ];
        if let Some((key, _)) = positive.iter().find(|(_, value)| *value == 0) {
            return Err(ConfigError::Message(format!("{key} must be greater than zero")));
        }

        // A lease shorter than one fetch could expire while its holder still works.
        if crl.lease_ttl_secs <= crl.request_timeout_secs {
            return Err(ConfigError::Message(format!(
                "crl.lease_ttl_secs ({}) must exceed crl.request_timeout_secs ({})",
                crl.lease_ttl_secs, crl.request_timeout_secs
            )));
        }

        if let Some(database) = &self.database {
            if crl.max_concurrent_sources as u64 >= u64::from(database.max_connections) {
                return Err(ConfigError::Message(format!(
                    "crl.max_concurrent_sources ({}) must stay below database.max_connections ({})",
                    crl.max_concurrent_sources, database.max_connections
                )));
            }
        }

        Ok(())
    }
}
