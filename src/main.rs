use crl_server::{config::Config, scheduler::CrlScheduler, server::Server, setup::setup, telemetry};
use tokio::sync::watch;

#[tokio::main]
async fn main() -> color_eyre::Result<()> {
    color_eyre::install()?;
    dotenvy::dotenv().ok();
    telemetry::init_tracing();

    // Load configuration
    let config = Config::load()?;
    tracing::info!(
        host = %config.server.host,
        port = config.server.port,
        registry = %config.crl.registry_path.display(),
        "Loaded configuration"
    );

    let state = setup(&config).await?;

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let scheduler = CrlScheduler::new(state.ingestor.clone(), config.crl.refresh_interval())
        .start(shutdown_rx);

    let server = Server::new(state, &config.server).await?;
    server
        .run_until(shutdown_signal())
        .await?;

    shutdown_tx.send(true).ok();
    if let Err(e) = scheduler.await {
        tracing::error!("CRL scheduler task failed: {e}");
    }
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("Failed to listen for Ctrl-C: {e}");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{SignalKind, signal};
        match signal(SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to listen for SIGTERM: {e}");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }
    tracing::info!("Shutdown signal received");
}
