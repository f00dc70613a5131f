pub mod cache;
pub mod config;
pub mod crl;
pub mod ingest;
pub mod lease;
pub mod models;
pub mod registry;
pub mod scheduler;
pub mod server;
pub mod setup;
pub mod stats;
pub mod status;
pub mod store;
pub mod telemetry;
