//! Decimal-string serde for wide signed integers.
//!
//! Feedback values are `int128` and summaries are widened to `int256`; JSON
//! numbers cannot carry either without loss, so both serialize as decimal
//! strings. Deserialization accepts:
//! - Decimal strings: "-331157"
//! - Hex strings with 0x prefix: "0x50d95"
//! - Integers: 331157

use ethers::types::I256;
use serde::de::{self, Visitor};
use serde::{Deserializer, Serializer};
use std::fmt;

fn parse_i128(value: &str) -> Result<i128, String> {
    let cleaned = value.trim().trim_matches('"');
    if let Some(hex) = cleaned
        .strip_prefix("0x")
        .or_else(|| cleaned.strip_prefix("0X"))
    {
        return i128::from_str_radix(hex, 16)
            .map_err(|e| format!("Failed to parse hex: {} for value {}", e, cleaned));
    }
    cleaned
        .parse::<i128>()
        .map_err(|e| format!("Failed to parse decimal: {} for value {}", e, cleaned))
}

struct I128Visitor;

impl<'de> Visitor<'de> for I128Visitor {
    type Value = i128;

    fn expecting(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
        formatter.write_str("a string or integer representing an int128 value")
    }

    fn visit_str<E>(self, value: &str) -> Result<Self::Value, E>
    where
        E: de::Error,
    {
        parse_i128(value).map_err(de::Error::custom)
    }

    fn visit_i64<E>(self, value: i64) -> Result<Self::Value, E>
    where
        E: de::Error,
    {
        Ok(value as i128)
    }

    fn visit_u64<E>(self, value: u64) -> Result<Self::Value, E>
    where
        E: de::Error,
    {
        Ok(value as i128)
    }
}

pub mod i128_string {
    use super::*;

    pub fn serialize<S>(value: &i128, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&value.to_string())
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<i128, D::Error>
    where
        D: Deserializer<'de>,
    {
        deserializer.deserialize_any(I128Visitor)
    }
}

pub mod i128_vec_string {
    use super::*;
    use serde::Deserialize;
    use serde::ser::SerializeSeq;

    pub fn serialize<S>(values: &[i128], serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let mut seq = serializer.serialize_seq(Some(values.len()))?;
        for value in values {
            seq.serialize_element(&value.to_string())?;
        }
        seq.end()
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Vec<i128>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = Vec::<String>::deserialize(deserializer)?;
        raw.iter()
            .map(|s| parse_i128(s).map_err(de::Error::custom))
            .collect()
    }
}

pub mod i256_string {
    use super::*;

    pub fn serialize<S>(value: &I256, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.collect_str(value)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<I256, D::Error>
    where
        D: Deserializer<'de>,
    {
        struct I256Visitor;

        impl<'de> Visitor<'de> for I256Visitor {
            type Value = I256;

            fn expecting(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
                formatter.write_str("a string or integer representing an int256 value")
            }

            fn visit_str<E>(self, value: &str) -> Result<Self::Value, E>
            where
                E: de::Error,
            {
                let cleaned = value.trim().trim_matches('"');
                if let Some(hex) = cleaned
                    .strip_prefix("0x")
                    .or_else(|| cleaned.strip_prefix("0X"))
                {
                    return I256::from_hex_str(hex).map_err(|e| {
                        de::Error::custom(format!(
                            "Failed to parse hex: {} for value {}",
                            e, cleaned
                        ))
                    });
                }
                I256::from_dec_str(cleaned).map_err(|e| {
                    de::Error::custom(format!(
                        "Failed to parse as decimal: {} for value {}",
                        e, cleaned
                    ))
                })
            }

            fn visit_i64<E>(self, value: i64) -> Result<Self::Value, E>
            where
                E: de::Error,
            {
                Ok(I256::from(value as i128))
            }

            fn visit_u64<E>(self, value: u64) -> Result<Self::Value, E>
            where
                E: de::Error,
            {
                Ok(I256::from(value as i128))
            }
        }

        deserializer.deserialize_any(I256Visitor)
    }
}
