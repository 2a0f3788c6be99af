//! Field element helpers: short-string encoding, entrypoint selectors, parsing

use crate::error::{PublisherError, PublisherResult};

use serde::{Deserialize, Deserializer};
use starknet::core::utils::{cairo_short_string_to_felt, get_selector_from_name};

pub use starknet::core::types::Felt;

/// Encode a short ASCII string (at most 31 bytes) as a felt
pub fn str_to_felt(text: &str) -> PublisherResult<Felt> {
    cairo_short_string_to_felt(text)
        .map_err(|e| PublisherError::Encoding(format!("short string {:?}: {}", text, e)))
}

/// Selector of an entrypoint: starknet keccak of its name
pub fn selector_from_name(name: &str) -> PublisherResult<Felt> {
    get_selector_from_name(name)
        .map_err(|e| PublisherError::Encoding(format!("entrypoint {:?}: {}", name, e)))
}

pub fn felt_to_u64(felt: Felt) -> PublisherResult<u64> {
    let bytes = felt.to_bytes_be();
    let (high, low) = bytes.split_at(24);
    if high.iter().any(|b| *b != 0) {
        return Err(PublisherError::Encoding(format!(
            "{:#x} does not fit in u64",
            felt
        )));
    }

    let mut word = [0u8; 8];
    word.copy_from_slice(low);
    Ok(u64::from_be_bytes(word))
}

pub fn felt_to_u128(felt: Felt) -> PublisherResult<u128> {
    let bytes = felt.to_bytes_be();
    let (high, low) = bytes.split_at(16);
    if high.iter().any(|b| *b != 0) {
        return Err(PublisherError::Encoding(format!(
            "{:#x} does not fit in u128",
            felt
        )));
    }

    let mut word = [0u8; 16];
    word.copy_from_slice(low);
    Ok(u128::from_be_bytes(word))
}

/// Parse a `0x`-prefixed hex or a decimal felt
pub fn parse_felt(text: &str) -> PublisherResult<Felt> {
    let text = text.trim();
    let parsed = if text.starts_with("0x") || text.starts_with("0X") {
        Felt::from_hex(&format!("0x{}", &text[2..]))
    } else {
        Felt::from_dec_str(text)
    };
    parsed.map_err(|e| PublisherError::Encoding(format!("invalid felt {:?}: {}", text, e)))
}

/// Format a felt the way the JSON-RPC API expects it
pub fn felt_to_hex(felt: Felt) -> String {
    format!("{:#x}", felt)
}

/// Serde helper for felts written as strings in config files
pub fn deserialize_felt<'de, D>(deserializer: D) -> Result<Felt, D::Error>
where
    D: Deserializer<'de>,
{
    let text = String::deserialize(deserializer)?;
    parse_felt(&text).map_err(serde::de::Error::custom)
}
