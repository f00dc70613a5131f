pub mod errors;
pub mod handlers;

use std::sync::Arc;

use axum::{
    Router,
    http::Method,
    routing::{get, post},
};
use color_eyre::eyre::{Context, Result};
use tokio::net::TcpListener;
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

use crate::config::ServerConfig;
use crate::ingest::Ingestor;
use crate::status::StatusService;
use handlers::certificates::{certificate_details, check_certificate, valid_certificate};
use handlers::health::health_check;
use handlers::index::index;
use handlers::refresh::refresh_handler;
use handlers::stats::stats_handler;

#[derive(Clone)]
pub struct AppState {
    pub status: Arc<StatusService>,
    pub ingestor: Arc<Ingestor>,
}

/// Builds the HTTP routes of the service.
pub fn router(state: AppState) -> Router {
    let trace_layer =
        TraceLayer::new_for_http().make_span_with(|request: &'_ axum::extract::Request<_>| {
            let uri = request.uri().to_string();
            tracing::info_span!("request", method = %request.method(), uri)
        });

    let cors_layer = CorsLayer::new()
        .allow_origin(Any)
        .allow_headers(Any)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS]);

    let api = Router::new()
        .route("/health", get(health_check))
        .route("/stats", get(stats_handler))
        .route("/certificates/check/{serial}", get(check_certificate))
        .route("/certificates/valid/{serial}", get(valid_certificate))
        .route("/certificates/details/{serial}", get(certificate_details))
        .route("/admin/refresh", post(refresh_handler));

    Router::new()
        .route("/", get(index))
        .nest("/api/v1", api)
        .layer(cors_layer)
        .layer(trace_layer)
        .with_state(state)
}

pub struct Server {
    router: Router,
    listener: TcpListener,
}

impl Server {
    /// Binds the listener. Port `0` picks a free port, see [`Server::port`].
    pub async fn new(state: AppState, config: &ServerConfig) -> Result<Self> {
        let addr = format!("{}:{}", config.host, config.port);
        let listener = TcpListener::bind(&addr)
            .await
            .with_context(|| format!("Binding TCP listener on {addr}"))?;

        Ok(Self {
            router: router(state),
            listener,
        })
    }

    pub fn port(&self) -> Result<u16> {
        Ok(self
            .listener
            .local_addr()
            .context("Getting local address")?
            .port())
    }

    pub async fn run(self) -> Result<()> {
        self.run_until(std::future::pending()).await
    }

    /// Serves requests until `shutdown` completes, then drains open
    /// connections.
    pub async fn run_until<F>(self, shutdown: F) -> Result<()>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let addr = self.listener.local_addr().context("Getting local address")?;
        tracing::info!("Server listening on http://{}", addr);

        axum::serve(self.listener, self.router)
            .with_graceful_shutdown(shutdown)
            .await
            .context("Running HTTP server")
    }
}
