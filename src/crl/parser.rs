use std::borrow::Cow;

use chrono::{DateTime, Utc};
use tracing::debug;
use x509_parser::pem::parse_x509_pem;
use x509_parser::prelude::{
    ASN1Time, CertificateRevocationList, FromDer, ParsedExtension, X509Error, X509Name,
};

use crate::models::ReasonCode;

use super::errors::ParseError;
use super::serial::serial_from_biguint;

const PEM_LABEL: &str = "X509 CRL";

/// One revoked certificate listed in a CRL.
#[derive(Debug, Clone, PartialEq)]
pub struct RevokedEntry {
    pub serial: String,
    pub revoked_at: DateTime<Utc>,
    pub reason: ReasonCode,
    /// Free text reason supplied by the source. X.509 CRLs have no such
    /// field, so entries decoded from DER never carry one.
    pub reason_text: Option<String>,
}

/// Decoded content of a CRL.
#[derive(Debug, Clone)]
pub struct ParsedCrl {
    pub issuer: String,
    pub next_update: Option<DateTime<Utc>>,
    pub entries: Vec<RevokedEntry>,
}

/// Decode a DER or PEM encoded CRL.
///
/// Decoding is all or nothing: an error in any entry rejects the whole list.
/// The signature is not verified.
pub fn parse_crl(data: &[u8]) -> Result<ParsedCrl, ParseError> {
    if data.iter().all(u8::is_ascii_whitespace) {
        return Err(ParseError::Empty);
    }

    let der = decode_pem(data)?;
    let (rest, crl) = CertificateRevocationList::from_der(&der)
        .map_err(|e| ParseError::Der(X509Error::from(e)))?;

    if !rest.is_empty() {
        return Err(ParseError::TrailingData(rest.len()));
    }

    let issuer = issuer_display_name(crl.issuer());
    let next_update = crl.next_update().map(to_utc).transpose()?;

    let entries = crl
        .iter_revoked_certificates()
        .map(|revoked| {
            let reason = revoked
                .extensions()
                .iter()
                .find_map(|ext| match ext.parsed_extension() {
                    ParsedExtension::ReasonCode(code) => Some(ReasonCode::from_code(code.0)),
                    _ => None,
                })
                .unwrap_or(ReasonCode::Unspecified);

            Ok(RevokedEntry {
                serial: serial_from_biguint(&revoked.user_certificate),
                revoked_at: to_utc(revoked.revocation_date)?,
                reason,
                reason_text: None,
            })
        })
        .collect::<Result<Vec<_>, ParseError>>()?;

    debug!(%issuer, entries = entries.len(), "Decoded CRL");

    Ok(ParsedCrl {
        issuer,
        next_update,
        entries,
    })
}

fn decode_pem(data: &[u8]) -> Result<Cow<'_, [u8]>, ParseError> {
    let start = data
        .iter()
        .position(|b| !b.is_ascii_whitespace())
        .unwrap_or(0);
    if !data[start..].starts_with(b"-----BEGIN") {
        return Ok(Cow::Borrowed(data));
    }

    let (_, pem) = parse_x509_pem(&data[start..]).map_err(|e| ParseError::Pem(e.to_string()))?;
    if pem.label != PEM_LABEL {
        return Err(ParseError::Pem(format!(
            "unexpected PEM label {}",
            pem.label
        )));
    }
    Ok(Cow::Owned(pem.contents))
}

/// Short display name of the CRL issuer.
///
/// Prefers the common name, then the organization, then the organizational
/// unit, and falls back to the full distinguished name.
fn issuer_display_name(name: &X509Name) -> String {
    name.iter_common_name()
        .chain(name.iter_organization())
        .chain(name.iter_organizational_unit())
        .find_map(|attr| attr.as_str().ok().filter(|s| !s.is_empty()))
        .map(str::to_string)
        .unwrap_or_else(|| name.to_string())
}

fn to_utc(time: ASN1Time) -> Result<DateTime<Utc>, ParseError> {
    DateTime::from_timestamp(time.timestamp(), 0).ok_or(ParseError::InvalidTime)
}
