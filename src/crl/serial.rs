//! Canonical textual form of certificate serial numbers.
//!
//! Serials are stored and looked up as unsigned decimal digits without leading
//! zeros, so the same serial compares equal whether it came from a DER
//! integer, a decimal query or a hex dump such as `0A:1B:FF`.

use thiserror::Error;
use x509_parser::num_bigint::BigUint;

#[derive(Error, Debug, PartialEq, Eq)]
pub enum SerialError {
    #[error("Serial number is empty")]
    Empty,

    #[error("Serial number contains invalid characters: {0}")]
    Invalid(String),
}

/// Canonical form of a serial given as raw big-endian bytes.
pub fn serial_from_bytes(bytes: &[u8]) -> String {
    BigUint::from_bytes_be(bytes).to_str_radix(10)
}

/// Canonical form of an already decoded serial.
pub fn serial_from_biguint(value: &BigUint) -> String {
    value.to_str_radix(10)
}

/// Normalizes user supplied serial text.
///
/// Input made only of decimal digits is read as decimal. Input with a `0x`
/// prefix, `:`/`-`/space separators or hex letters is read as hexadecimal.
pub fn normalize_serial(input: &str) -> Result<String, SerialError> {
    let trimmed = input.trim();
    if trimmed.is_empty() {
        return Err(SerialError::Empty);
    }

    let (prefixed, body) = match trimmed
        .strip_prefix("0x")
        .or_else(|| trimmed.strip_prefix("0X"))
    {
        Some(rest) => (true, rest),
        None => (false, trimmed),
    };

    let separated = body.contains([':', '-', ' ']);
    let digits: String = body
        .chars()
        .filter(|c| !matches!(c, ':' | '-' | ' '))
        .collect();

    if digits.is_empty() {
        return Err(SerialError::Empty);
    }

    if !prefixed && !separated && digits.chars().all(|c| c.is_ascii_digit()) {
        return BigUint::parse_bytes(digits.as_bytes(), 10)
            .map(|value| serial_from_biguint(&value))
            .ok_or_else(|| SerialError::Invalid(input.to_string()));
    }

    if !digits.chars().all(|c| c.is_ascii_hexdigit()) {
        return Err(SerialError::Invalid(input.to_string()));
    }

    let padded = if digits.len() % 2 == 1 {
        format!("0{digits}")
    } else {
        digits
    };
    let bytes = hex::decode(&padded).map_err(|_| SerialError::Invalid(input.to_string()))?;
    Ok(serial_from_bytes(&bytes))
}
