//! Identifiers shared on the wire.
//!
//! Panes and sessions are identified by a 16-byte random value, rendered as
//! a 32-character lowercase hex string wherever it crosses the socket.

use std::fmt;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A 16-byte random identifier rendered as 32 lowercase hex characters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct HexId(Uuid);

impl HexId {
    /// Generate a fresh random identifier.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Render as the 32-char lowercase hex form used on the wire.
    pub fn as_hex32(&self) -> String {
        self.0.simple().to_string()
    }

    /// Parse a full 32-char hex identifier.
    pub fn parse(s: &str) -> Option<Self> {
        if s.len() != 32 || !s.bytes().all(|b| b.is_ascii_hexdigit()) {
            return None;
        }
        Uuid::parse_str(s).ok().map(Self)
    }

    /// Whether `self`'s hex rendering starts with the given prefix
    /// (case-insensitive is not needed: both sides are always lowercase).
    pub fn has_prefix(&self, prefix: &str) -> bool {
        self.as_hex32().starts_with(prefix)
    }
}

impl Default for HexId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for HexId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.as_hex32())
    }
}

impl TryFrom<String> for HexId {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value).ok_or_else(|| format!("invalid hex32 id: {value}"))
    }
}

impl From<HexId> for String {
    fn from(id: HexId) -> Self {
        id.as_hex32()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn renders_32_lowercase_hex_chars() {
        let id = HexId::new();
        let rendered = id.as_hex32();
        assert_eq!(rendered.len(), 32);
        assert!(rendered.bytes().all(|b| b.is_ascii_hexdigit() && !b.is_ascii_uppercase()));
    }

    #[test]
    fn roundtrips_through_parse() {
        let id = HexId::new();
        let rendered = id.as_hex32();
        let parsed = HexId::parse(&rendered).unwrap();
        assert_eq!(id, parsed);
    }

    #[test]
    fn rejects_wrong_length() {
        assert!(HexId::parse("abcd").is_none());
    }

    #[test]
    fn rejects_non_hex() {
        let bad = "zz".repeat(16);
        assert!(HexId::parse(&bad).is_none());
    }

    #[test]
    fn prefix_match() {
        let id = HexId::new();
        let rendered = id.as_hex32();
        assert!(id.has_prefix(&rendered[..4]));
    }

    #[test]
    fn serde_roundtrip() {
        let id = HexId::new();
        let json = serde_json::to_string(&id).unwrap();
        let back: HexId = serde_json::from_str(&json).unwrap();
        assert_eq!(id, back);
    }
}
