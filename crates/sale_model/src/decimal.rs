//! Serde adapter for `U256` amounts in human-edited config files
//!
//! Accepts a plain integer (when it fits 64 bits) or a decimal string, and
//! always writes a decimal string. Use with `#[serde(with = "sale_model::decimal")]`.

use alloy_primitives::U256;
use serde::{de, Deserialize, Deserializer, Serializer};

#[derive(Deserialize)]
#[serde(untagged)]
enum Repr {
    Int(u64),
    Text(String),
}

pub fn serialize<S: Serializer>(value: &U256, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_str(&value.to_string())
}

pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<U256, D::Error> {
    match Repr::deserialize(deserializer)? {
        Repr::Int(n) => Ok(U256::from(n)),
        Repr::Text(s) => parse(&s).map_err(de::Error::custom),
    }
}

/// Parse a decimal amount, allowing `_` digit separators
pub fn parse(text: &str) -> Result<U256, String> {
    let digits: String = text.trim().chars().filter(|c| *c != '_').collect();
    if digits.is_empty() || !digits.chars().all(|c| c.is_ascii_digit()) {
        return Err(format!("invalid decimal amount: {text:?}"));
    }
    U256::from_str_radix(&digits, 10).map_err(|e| format!("invalid decimal amount {text:?}: {e}"))
}
