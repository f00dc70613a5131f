#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use crl_server::cache::{CacheAside, CachePolicy, MemoryCache, StatusCache};
use crl_server::config::{Config, CrlConfig};
use crl_server::crl::CrlFetcher;
use crl_server::ingest::Ingestor;
use crl_server::lease::{LeaseManager, MemoryLeaseManager};
use crl_server::registry::SourceRegistry;
use crl_server::server::{AppState, Server};
use crl_server::stats::Counters;
use crl_server::status::StatusService;
use crl_server::store::RevocationStore;
use crl_server::telemetry;
use rcgen::{
    BasicConstraints, CertificateParams, CertificateRevocationListParams, DistinguishedName,
    DnType, IsCa, KeyIdMethod, KeyPair, KeyUsagePurpose, RevocationReason, RevokedCertParams,
    SerialNumber, date_time_ymd,
};
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// A revoked entry to put into a generated CRL.
pub struct Revoked {
    pub serial: Vec<u8>,
    pub reason: Option<RevocationReason>,
}

impl Revoked {
    pub fn new(serial: &[u8], reason: Option<RevocationReason>) -> Self {
        Self {
            serial: serial.to_vec(),
            reason,
        }
    }
}

/// Builds a signed DER CRL issued by `issuer_cn`.
pub fn build_crl(issuer_cn: &str, revoked: &[Revoked]) -> Vec<u8> {
    let key = KeyPair::generate().unwrap();
    let mut params = CertificateParams::new(Vec::<String>::new()).unwrap();
    params.distinguished_name = DistinguishedName::new();
    params.distinguished_name.push(DnType::CommonName, issuer_cn);
    params.is_ca = IsCa::Ca(BasicConstraints::Unconstrained);
    params.key_usages = vec![KeyUsagePurpose::KeyCertSign, KeyUsagePurpose::CrlSign];
    let ca = params.self_signed(&key).unwrap();

    let revoked_certs = revoked
        .iter()
        .map(|entry| RevokedCertParams {
            serial_number: SerialNumber::from_slice(&entry.serial),
            revocation_time: date_time_ymd(2024, 3, 1),
            reason_code: entry.reason,
            invalidity_date: None,
        })
        .collect();

    let crl = CertificateRevocationListParams {
        this_update: date_time_ymd(2024, 3, 1),
        next_update: date_time_ymd(2030, 3, 1),
        crl_number: SerialNumber::from_slice(&[1]),
        issuing_distribution_point: None,
        revoked_certs,
        key_identifier_method: KeyIdMethod::Sha256,
    }
    .signed_by(&ca, &key)
    .unwrap();

    crl.der().to_vec()
}

/// A CRL listing `count` serials starting at 0x010000, so none has a
/// leading zero byte.
pub fn build_large_crl(issuer_cn: &str, count: u32) -> Vec<u8> {
    let revoked: Vec<Revoked> = (0..count)
        .map(|i| Revoked::new(&(0x0001_0000 + i).to_be_bytes()[1..], None))
        .collect();
    build_crl(issuer_cn, &revoked)
}

/// Serves `body` at `route` on a fresh mock server.
pub async fn serve_crl(route: &str, body: Vec<u8>) -> MockServer {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(route))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(body))
        .mount(&server)
        .await;
    server
}

pub fn crl_config() -> CrlConfig {
    let mut config = Config::load_with_sources(Some(Default::default()))
        .unwrap()
        .crl;
    config.request_timeout_secs = 5;
    config
}

pub fn cache_policy() -> CachePolicy {
    CachePolicy {
        revoked_ttl: Duration::from_secs(3600),
        not_revoked_ttl: Duration::from_secs(60),
        operation_timeout: Duration::from_millis(200),
    }
}

/// Shared collaborators of an ingestor and a status service.
pub struct Harness {
    pub store: Arc<dyn RevocationStore>,
    pub cache: CacheAside,
    pub leases: Arc<dyn LeaseManager>,
    pub counters: Arc<Counters>,
}

impl Harness {
    pub fn new(store: Arc<dyn RevocationStore>) -> Self {
        Self::with_cache(store, Arc::new(MemoryCache::new(10_000)))
    }

    pub fn with_cache(store: Arc<dyn RevocationStore>, cache: Arc<dyn StatusCache>) -> Self {
        telemetry::init_tracing();
        Self {
            store,
            cache: CacheAside::new(cache, cache_policy()),
            leases: Arc::new(MemoryLeaseManager::new()),
            counters: Arc::new(Counters::new()),
        }
    }

    pub fn ingestor(&self, sources: Vec<String>, config: &CrlConfig) -> Arc<Ingestor> {
        let fetcher = CrlFetcher::new(config.request_timeout(), &config.user_agent).unwrap();
        Arc::new(Ingestor::new(
            SourceRegistry::Static(sources),
            fetcher,
            Arc::clone(&self.store),
            self.cache.clone(),
            Arc::clone(&self.leases),
            Arc::clone(&self.counters),
            config,
        ))
    }

    pub fn status(&self) -> StatusService {
        StatusService::new(
            Arc::clone(&self.store),
            self.cache.clone(),
            Arc::clone(&self.counters),
        )
    }

    pub fn state(&self, sources: Vec<String>) -> AppState {
        AppState {
            status: Arc::new(self.status()),
            ingestor: self.ingestor(sources, &crl_config()),
        }
    }
}

// Helper function to spawn a test server on a random port
pub async fn spawn_server(state: AppState) -> String {
    let config = {
        let mut config = Config::load_with_sources(Some(Default::default())).unwrap();
        config.server.host = "localhost".to_string();
        // Use a random OS port
        config.server.port = 0;
        config
    };

    let server = Server::new(state, &config.server).await.unwrap();
    let port = server.port().unwrap();
    tokio::spawn(async move {
        server.run().await.expect("failed to run server");
    });

    format!("http://{}:{}", config.server.host, port)
}
