//! Certificate Revocation List (CRL) retrieval and decoding
//!
//! # Features
//! - Fetching CRLs over HTTP with a shared, pooled client
//! - Decoding DER and PEM CRLs into revoked serial entries
//! - Canonical serial number normalization shared with the query path

mod errors;
mod fetcher;
mod parser;
pub mod serial;

// Re-export public types
pub use errors::{FetchError, ParseError};
pub use fetcher::CrlFetcher;
pub use parser::{ParsedCrl, RevokedEntry, parse_crl};
pub use serial::{SerialError, normalize_serial};
