//! EVM address helpers.

use crate::error::VerifyError;

/// Returns `true` if `addr` is `0x` followed by exactly 40 hex characters.
///
/// Checksum casing is accepted but not validated.
pub fn is_valid_address(addr: &str) -> bool {
    match addr.strip_prefix("0x") {
        Some(body) => body.len() == 40 && hex::decode(body).is_ok(),
        None => false,
    }
}

/// Validate and lower-case an address; the lower-cased form is the cache key.
pub fn normalize_address(addr: &str) -> Result<String, VerifyError> {
    let trimmed = addr.trim();
    if !is_valid_address(trimmed) {
        return Err(VerifyError::InvalidAddress(addr.to_string()));
    }
    Ok(trimmed.to_ascii_lowercase())
}
