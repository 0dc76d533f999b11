//! Serde helpers for hex quantities padded to a whole number of bytes, as used by fixture
//! headers (`0x00`, `0x020000`).

use alloy_primitives::{ruint::UintTryFrom, U256};
use serde::{de::Error, Deserialize, Deserializer, Serializer};

/// Formats a value as a `0x` prefixed hex string with an even number of digits.
pub fn to_hex<T>(value: T) -> String
where
    U256: UintTryFrom<T>,
{
    let digits = format!("{:x}", U256::from(value));
    if digits.len() % 2 == 1 {
        format!("0x0{digits}")
    } else {
        format!("0x{digits}")
    }
}

/// Serializes a number as a zero padded hex string.
pub fn serialize<T, S>(value: &T, serializer: S) -> Result<S::Ok, S::Error>
where
    T: Copy,
    U256: UintTryFrom<T>,
    S: Serializer,
{
    serializer.serialize_str(&to_hex(*value))
}

/// Deserializes a number from a hex string, a decimal string or a JSON number.
pub fn deserialize<'de, T, D>(deserializer: D) -> Result<T, D::Error>
where
    T: TryFrom<U256>,
    D: Deserializer<'de>,
{
    let value = U256::deserialize(deserializer)?;
    T::try_from(value).map_err(|_| D::Error::custom(format!("value {value} out of range")))
}

/// Zero padded hex helpers for optional numbers.
pub mod opt {
    use super::*;
    use serde::Serialize;

    /// Serializes an optional number as a zero padded hex string.
    pub fn serialize<T, S>(value: &Option<T>, serializer: S) -> Result<S::Ok, S::Error>
    where
        T: Copy,
        U256: UintTryFrom<T>,
        S: Serializer,
    {
        (*value).map(to_hex).serialize(serializer)
    }

    /// Deserializes an optional number.
    pub fn deserialize<'de, T, D>(deserializer: D) -> Result<Option<T>, D::Error>
    where
        T: TryFrom<U256>,
        D: Deserializer<'de>,
    {
        Option::<U256>::deserialize(deserializer)?
            .map(|value| {
                T::try_from(value)
                    .map_err(|_| D::Error::custom(format!("value {value} out of range")))
            })
            .transpose()
    }
}
