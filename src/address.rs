//! Text form of contract addresses.
//!
//! Chain tooling prints an address as the hex of its 20 bytes in reverse
//! order, so the same form is used for config keys, logs and snapshot names.

use alloy::primitives::{hex, Address};

use crate::codec::ADDRESS_LEN;
use crate::error::AddressError;

/// Parse a reversed-hex address, with or without a `0x` prefix.
pub fn parse_address(text: &str) -> Result<Address, AddressError> {
    let text = text.trim();
    let digits = text
        .strip_prefix("0x")
        .or_else(|| text.strip_prefix("0X"))
        .unwrap_or(text);

    let mut bytes = hex::decode(digits)?;
    if bytes.len() != ADDRESS_LEN {
        return Err(AddressError::Length(bytes.len()));
    }
    bytes.reverse();

    Ok(Address::from_slice(&bytes))
}

/// Render an address the way [`parse_address`] reads it, lower-case and
/// without prefix.
pub fn format_address(address: &Address) -> String {
    let mut bytes = address.0 .0;
    bytes.reverse();
    hex::encode(bytes)
}
