//! Serde helpers that encode fixed-size byte arrays as hex strings.

use crate::COMMITMENT_LEN;
use commonware_utils::{from_hex, hex};
use serde::{Deserialize, Deserializer, Serializer};

pub fn serialize<S>(bytes: &[u8; COMMITMENT_LEN], serializer: S) -> Result<S::Ok, S::Error>
where
    S: Serializer,
{
    serializer.serialize_str(&hex(bytes))
}

pub fn deserialize<'de, D>(deserializer: D) -> Result<[u8; COMMITMENT_LEN], D::Error>
where
    D: Deserializer<'de>,
{
    let s = String::deserialize(deserializer)?;
    let bytes = from_hex(&s).ok_or_else(|| serde::de::Error::custom("invalid hex string"))?;
    bytes.try_into().map_err(|bytes: Vec<u8>| {
        serde::de::Error::custom(format!(
            "invalid length: {} (expected {COMMITMENT_LEN})",
            bytes.len()
        ))
    })
}
