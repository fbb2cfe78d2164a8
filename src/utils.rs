//! Utility functions for identifier generation

use super::error::ValidationError;
use bech32::Bech32m;
use uuid7::uuid7;

// construct a unique record id then encode using bech32m, the prefix becomes the hrp
pub fn new_uuid_to_bech32(hrp: &str) -> Result<String, ValidationError> {
    let parsed = bech32::Hrp::parse(hrp)
        .map_err(|e| ValidationError::InvalidIdentifier(format!("prefix `{hrp}`: {e}")))?;
    let encode = bech32::encode::<Bech32m>(parsed, uuid7().as_bytes())
        .map_err(|e| ValidationError::InvalidIdentifier(e.to_string()))?;
    Ok(encode)
}

/// Trimmed character count, used by every minimum-length rule.
pub fn text_len(value: &str) -> usize {
    value.trim().chars().count()
}
