mod common;

use std::sync::Arc;
use std::time::Duration;

use crl_server::scheduler::CrlScheduler;
use crl_server::store::{MemoryStore, RevocationStore};
use tokio::sync::watch;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use common::{Harness, Revoked, build_crl, crl_config};

#[tokio::test]
async fn test_scheduler_runs_immediately_and_stops_on_shutdown() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/scheduled.crl"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_bytes(build_crl("Scheduled CA", &[Revoked::new(&[0x07], None)])),
        )
        .mount(&server)
        .await;

    let store = MemoryStore::new();
    let harness = Harness::new(Arc::new(store.clone()));
    let ingestor = harness.ingestor(
        vec![format!("{}/scheduled.crl", server.uri())],
        &crl_config(),
    );

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let handle = CrlScheduler::new(ingestor, Duration::from_secs(3600)).start(shutdown_rx);

    let mut ingested = false;
    for _ in 0..50 {
        if store.find_revoked("7").await.unwrap().is_some() {
            ingested = true;
            break;
        }
        tokio::time::sleep(Duration::from_millis(100)).await;
    }
    assert!(ingested, "first scheduled run never happened");

    shutdown_tx.send(true).unwrap();
    tokio::time::timeout(Duration::from_secs(5), handle)
        .await
        .expect("scheduler did not stop")
        .unwrap();

    assert_eq!(harness.counters.snapshot().ingestion_runs, 1);
}

#[tokio::test]
async fn test_scheduler_repeats_on_interval() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/tick.crl"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_bytes(build_crl("Tick CA", &[Revoked::new(&[0x08], None)])),
        )
        .mount(&server)
        .await;

    let harness = Harness::new(Arc::new(MemoryStore::new()));
    let ingestor = harness.ingestor(vec![format!("{}/tick.crl", server.uri())], &crl_config());

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let handle = CrlScheduler::new(ingestor, Duration::from_millis(100)).start(shutdown_rx);

    let mut runs = 0;
    for _ in 0..50 {
        runs = harness.counters.snapshot().ingestion_runs;
        if runs >= 3 {
            break;
        }
        tokio::time::sleep(Duration::from_millis(100)).await;
    }
    assert!(runs >= 3, "only {runs} scheduled runs");

    // Dropping the sender also stops the loop.
    drop(shutdown_tx);
    tokio::time::timeout(Duration::from_secs(5), handle)
        .await
        .expect("scheduler did not stop")
        .unwrap();
}
