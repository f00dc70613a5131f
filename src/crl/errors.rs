use reqwest::StatusCode;
use thiserror::Error;
use x509_parser::prelude::X509Error;

/// Errors raised while retrieving a CRL.
#[derive(Error, Debug)]
pub enum FetchError {
    #[error("Invalid CRL URL {url}: {source}")]
    InvalidUrl {
        url: String,
        #[source]
        source: url::ParseError,
    },

    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Timeout while fetching CRL from {0}")]
    Timeout(String),

    #[error("HTTP error {status} when fetching CRL from {url}")]
    Status { url: String, status: StatusCode },
}

/// Errors raised while decoding a CRL. Any of these discards the whole list.
#[derive(Error, Debug)]
pub enum ParseError {
    #[error("CRL parsing failed: {0}")]
    Der(#[from] X509Error),

    #[error("Invalid PEM encoded CRL: {0}")]
    Pem(String),

    #[error("CRL is empty")]
    Empty,

    #[error("{0} trailing bytes after CRL")]
    TrailingData(usize),

    #[error("Time value out of range in CRL")]
    InvalidTime,
}
