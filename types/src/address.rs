//! Chain address type.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

use crate::error::ParseError;

/// A 20-byte account address on the game chain.
///
/// Accepts both the `ronin:` display prefix and the raw `0x` prefix when
/// parsing. Stored normalized as lowercase `0x` hex so two spellings of the
/// same account compare equal (sequence numbers are keyed by address).
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Address(String);

impl Address {
    /// The display prefix used by explorers and the game client.
    pub const RONIN_PREFIX: &'static str = "ronin:";
    /// The raw hex prefix used on the wire.
    pub const HEX_PREFIX: &'static str = "0x";

    /// Parse an address in either `ronin:` or `0x` form.
    pub fn parse(raw: &str) -> Result<Self, ParseError> {
        let trimmed = raw.trim();
        let digits = trimmed
            .strip_prefix(Self::RONIN_PREFIX)
            .or_else(|| trimmed.strip_prefix(Self::HEX_PREFIX))
            .or_else(|| trimmed.strip_prefix("0X"))
            .ok_or_else(|| ParseError::InvalidAddress(raw.to_string()))?;

        if digits.len() != 40 || hex::decode(digits).is_err() {
            return Err(ParseError::InvalidAddress(raw.to_string()));
        }

        Ok(Self(format!("{}{}", Self::HEX_PREFIX, digits.to_ascii_lowercase())))
    }

    /// The normalized `0x`-prefixed lowercase form.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The `ronin:`-prefixed form shown to users.
    pub fn to_ronin(&self) -> String {
        self.0.replacen(Self::HEX_PREFIX, Self::RONIN_PREFIX, 1)
    }

    /// The 20 raw address bytes.
    pub fn to_bytes(&self) -> [u8; 20] {
        let mut out = [0u8; 20];
        // Validated in `parse`, so decoding cannot fail here.
        if let Ok(bytes) = hex::decode(&self.0[2..]) {
            out.copy_from_slice(&bytes);
        }
        out
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_ronin())
    }
}

impl FromStr for Address {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl Serialize for Address {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.0)
    }
}

impl<'de> Deserialize<'de> for Address {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Self::parse(&raw).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const HEX: &str = "a0caa7803205026ec08818664c4211aff7565f56";

    #[test]
    fn ronin_and_hex_forms_are_equal() {
        let a = Address::parse(&format!("ronin:{HEX}")).unwrap();
        let b = Address::parse(&format!("0x{}", HEX.to_uppercase())).unwrap();
        assert_eq!(a, b);
        assert_eq!(a.as_str(), format!("0x{HEX}"));
    }

    #[test]
    fn displays_with_ronin_prefix() {
        let a = Address::parse(&format!("0x{HEX}")).unwrap();
        assert_eq!(a.to_string(), format!("ronin:{HEX}"));
    }

    #[test]
    fn rejects_missing_prefix() {
        assert!(Address::parse(HEX).is_err());
    }

    #[test]
    fn rejects_wrong_length() {
        assert!(Address::parse("ronin:abcd").is_err());
        assert!(Address::parse(&format!("0x{HEX}00")).is_err());
    }

    #[test]
    fn rejects_non_hex() {
        let bad = format!("0x{}zz", &HEX[..38]);
        assert!(matches!(Address::parse(&bad), Err(ParseError::InvalidAddress(_))));
    }

    #[test]
    fn bytes_match_hex() {
        let a = Address::parse(&format!("0x{HEX}")).unwrap();
        assert_eq!(hex::encode(a.to_bytes()), HEX);
    }

    #[test]
    fn deserializes_from_json_string() {
        let a: Address = serde_json::from_str(&format!("\"ronin:{HEX}\"")).unwrap();
        assert_eq!(a.as_str(), format!("0x{HEX}"));
        assert!(serde_json::from_str::<Address>("\"nope\"").is_err());
    }
}
