//! Records persisted by the ingestion pipeline and the status projection
//! served to callers.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// CRL entry reason codes (RFC 5280 §5.3.1). Value 7 is unassigned.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ReasonCode {
    Unspecified,
    KeyCompromise,
    CaCompromise,
    AffiliationChanged,
    Superseded,
    CessationOfOperation,
    CertificateHold,
    RemoveFromCrl,
    PrivilegeWithdrawn,
    AaCompromise,
}

impl ReasonCode {
    /// Maps a raw CRLReason value. Unknown values fall back to `Unspecified`.
    pub fn from_code(code: u8) -> Self {
        match code {
            1 => Self::KeyCompromise,
            2 => Self::CaCompromise,
            3 => Self::AffiliationChanged,
            4 => Self::Superseded,
            5 => Self::CessationOfOperation,
            6 => Self::CertificateHold,
            8 => Self::RemoveFromCrl,
            9 => Self::PrivilegeWithdrawn,
            10 => Self::AaCompromise,
            _ => Self::Unspecified,
        }
    }

    pub fn code(self) -> u8 {
        match self {
            Self::Unspecified => 0,
            Self::KeyCompromise => 1,
            Self::CaCompromise => 2,
            Self::AffiliationChanged => 3,
            Self::Superseded => 4,
            Self::CessationOfOperation => 5,
            Self::CertificateHold => 6,
            Self::RemoveFromCrl => 8,
            Self::PrivilegeWithdrawn => 9,
            Self::AaCompromise => 10,
        }
    }

    /// Human readable text of the reason.
    pub fn text(self) -> &'static str {
        match self {
            Self::Unspecified => "Unspecified",
            Self::KeyCompromise => "Key compromise",
            Self::CaCompromise => "CA compromise",
            Self::AffiliationChanged => "Affiliation changed",
            Self::Superseded => "Superseded",
            Self::CessationOfOperation => "Cessation of operation",
            Self::CertificateHold => "Certificate hold",
            Self::RemoveFromCrl => "Removed from CRL",
            Self::PrivilegeWithdrawn => "Privilege withdrawn",
            Self::AaCompromise => "AA compromise",
        }
    }
}

/// Metadata of a CRL source, keyed by its locator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceDescriptor {
    pub url: String,
    pub issuer: String,
    pub next_update: Option<DateTime<Utc>>,
    pub last_processed: DateTime<Utc>,
    /// Number of entries found in the last processed list
    pub cert_count: i64,
}

/// A revoked certificate as stored in the durable store, unique by serial.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RevokedCertificateRecord {
    /// Canonical decimal serial
    pub serial: String,
    pub revoked_at: DateTime<Utc>,
    pub reason: ReasonCode,
    /// Explicit reason supplied by the source, replaces the table text
    pub reason_text: Option<String>,
    pub authority: String,
    pub updated_at: DateTime<Utc>,
}

impl RevokedCertificateRecord {
    /// Reason shown to callers: the explicit override when present and
    /// non-empty, the fixed text of the reason code otherwise.
    pub fn reason_text(&self) -> &str {
        match self.reason_text.as_deref() {
            Some(text) if !text.is_empty() => text,
            _ => self.reason.text(),
        }
    }

    pub fn to_status(&self) -> CertificateStatus {
        CertificateStatus::revoked(
            self.serial.clone(),
            self.revoked_at,
            self.reason_text().to_string(),
            self.authority.clone(),
        )
    }
}

/// Revocation status of a serial.
///
/// The optional fields are only present when `is_revoked` is true and are
/// omitted from the serialized form otherwise.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CertificateStatus {
    pub serial: String,
    pub is_revoked: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub revocation_date: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub certificate_authority: Option<String>,
}

impl CertificateStatus {
    pub fn not_revoked(serial: impl Into<String>) -> Self {
        Self {
            serial: serial.into(),
            is_revoked: false,
            revocation_date: None,
            reason: None,
            certificate_authority: None,
        }
    }

    pub fn revoked(
        serial: impl Into<String>,
        revocation_date: DateTime<Utc>,
        reason: String,
        certificate_authority: String,
    ) -> Self {
        Self {
            serial: serial.into(),
            is_revoked: true,
            revocation_date: Some(revocation_date),
            reason: Some(reason),
            certificate_authority: Some(certificate_authority),
        }
    }
}

/// Aggregates read from the durable store.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StoreStats {
    pub total_revoked: i64,
    pub total_sources: i64,
    pub last_update: Option<DateTime<Utc>>,
}
