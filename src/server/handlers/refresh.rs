use axum::{Json, extract::State, http::StatusCode};
use serde_json::{Value, json};

use crate::server::AppState;

/// Starts a full CRL ingestion in the background.
///
/// Sources already being processed by a running ingestion are skipped by
/// their lease, so this is safe to call at any time.
pub async fn refresh_handler(State(state): State<AppState>) -> (StatusCode, Json<Value>) {
    state.ingestor.trigger_refresh();
    tracing::info!("Manual CRL refresh requested");

    (
        StatusCode::ACCEPTED,
        Json(json!({
            "status": "processing",
            "message": "CRL refresh started in the background",
        })),
    )
}
