use std::collections::BTreeMap;

use axum::{Json, extract::State};
use serde_json::Value;

use crate::server::{AppState, errors::AppError};

pub async fn stats_handler(
    State(state): State<AppState>,
) -> Result<Json<BTreeMap<&'static str, Value>>, AppError> {
    Ok(Json(state.status.stats().await?))
}
