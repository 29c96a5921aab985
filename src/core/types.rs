//! Core domain types shared across the tracker

use serde::{Deserialize, Serialize};
use std::fmt;

/// A base58-encoded 32-byte on-chain address. Equality is byte-equality,
/// but we carry the canonical string form around since every upstream
/// payload and every outbound message deals in strings, not raw bytes.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Mint(String);

impl Mint {
    /// Parses and canonicalizes a base58 address. Rejects anything that
    /// doesn't decode to exactly 32 bytes.
    pub fn parse(s: &str) -> Result<Self, crate::core::error::DecodeError> {
        let bytes = bs58::decode(s)
            .into_vec()
            .map_err(|e| crate::core::error::DecodeError::InvalidEncoding(e.to_string()))?;
        if bytes.len() != 32 {
            return Err(crate::core::error::DecodeError::InvalidEncoding(format!(
                "expected 32 bytes, got {}",
                bytes.len()
            )));
        }
        Ok(Self(s.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// `"xxxx…yyyy"` placeholder used by the metadata resolver before a
    /// symbol lookup resolves.
    pub fn short(&self) -> String {
        if self.0.len() <= 8 {
            return self.0.clone();
        }
        format!("{}…{}", &self.0[..4], &self.0[self.0.len() - 4..])
    }
}

impl fmt::Display for Mint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<String> for Mint {
    /// Infallible conversion for call sites that already trust the input
    /// (e.g. values round-tripped from our own durable store).
    fn from(s: String) -> Self {
        Self(s)
    }
}

/// A transaction signature — the dedup key across both live feeds.
pub type Signature = String;

/// Unix epoch seconds. Kept as a plain alias (rather than `chrono::DateTime`)
/// at API boundaries that cross task edges cheaply via `Copy`.
pub type Timestamp = i64;

pub fn now() -> Timestamp {
    chrono::Utc::now().timestamp()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_non_32_byte_addresses() {
        assert!(Mint::parse("abc").is_err());
    }

    #[test]
    fn accepts_valid_pubkey_length() {
        let addr = "So11111111111111111111111111111111111111112";
        assert!(Mint::parse(addr).is_ok());
    }

    #[test]
    fn short_form_is_xxxx_yyyy() {
        let mint = Mint::from("So11111111111111111111111111111111111111112".to_string());
        assert_eq!(mint.short(), "So11…1112");
    }
}
