use axum::{
    Json,
    extract::{Path, State},
};
use chrono::{DateTime, SecondsFormat, Utc};
use serde::Serialize;
use tracing::instrument;

use crate::models::CertificateStatus;
use crate::server::{AppState, errors::AppError};

/// Stored details of a revoked certificate.
#[derive(Debug, Serialize)]
pub struct CertificateDetails {
    pub serial: String,
    pub is_revoked: bool,
    pub revocation_date: DateTime<Utc>,
    pub reason_code: u8,
    pub reason: String,
    pub certificate_authority: String,
    pub updated_at: DateTime<Utc>,
}

#[instrument(skip(state))]
pub async fn check_certificate(
    State(state): State<AppState>,
    Path(serial): Path<String>,
) -> Result<Json<CertificateStatus>, AppError> {
    let status = state.status.check_status(&serial).await?;
    Ok(Json(status))
}

/// Revocation time as RFC 3339 text, or an empty body when not revoked.
#[instrument(skip(state))]
pub async fn valid_certificate(
    State(state): State<AppState>,
    Path(serial): Path<String>,
) -> Result<String, AppError> {
    let status = state.status.check_status(&serial).await?;
    Ok(status
        .revocation_date
        .map(|date| date.to_rfc3339_opts(SecondsFormat::Secs, true))
        .unwrap_or_default())
}

#[instrument(skip(state))]
pub async fn certificate_details(
    State(state): State<AppState>,
    Path(serial): Path<String>,
) -> Result<Json<CertificateDetails>, AppError> {
    let record = state.status.details(&serial).await?.ok_or_else(|| {
        AppError::NotFound(format!(
            "Certificate {} is not in any revocation list",
            serial.trim()
        ))
    })?;

    Ok(Json(CertificateDetails {
        is_revoked: true,
        revocation_date: record.revoked_at,
        reason_code: record.reason.code(),
        reason: record.reason_text().to_string(),
        certificate_authority: record.authority,
        updated_at: record.updated_at,
        serial: record.serial,
    }))
}
