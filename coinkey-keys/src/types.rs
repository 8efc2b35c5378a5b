//! Small value types shared by the key modules.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::KeyError;

/// Size of a chain code.
pub const CHAIN_CODE_SIZE: usize = 32;

/// Child indexes at or above this value are hardened.
pub const HARDENED_BIT: u32 = 0x8000_0000;

/// Opaque 32 bytes of derivation entropy carried next to a key.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct ChainCode(#[serde(with = "hex_bytes_32")] pub [u8; CHAIN_CODE_SIZE]);

impl ChainCode {
    /// Create from bytes.
    pub fn new(bytes: [u8; CHAIN_CODE_SIZE]) -> Self {
        Self(bytes)
    }

    /// Create from a slice of exactly 32 bytes.
    pub fn from_slice(bytes: &[u8]) -> Result<Self, KeyError> {
        let arr: [u8; CHAIN_CODE_SIZE] =
            bytes.try_into().map_err(|_| KeyError::InvalidLength {
                expected: CHAIN_CODE_SIZE,
                actual: bytes.len(),
            })?;
        Ok(Self(arr))
    }

    /// Get the raw bytes.
    pub fn as_bytes(&self) -> &[u8; CHAIN_CODE_SIZE] {
        &self.0
    }

    /// Convert to hex string.
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }
}

impl fmt::Debug for ChainCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ChainCode({})", self.to_hex())
    }
}

/// Whether a child index selects hardened derivation.
pub fn is_hardened(index: u32) -> bool {
    index & HARDENED_BIT != 0
}

/// Serde module for 32-byte arrays as hex strings.
mod hex_bytes_32 {
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S>(bytes: &[u8; 32], serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&hex::encode(bytes))
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<[u8; 32], D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        let bytes = hex::decode(&s).map_err(serde::de::Error::custom)?;
        bytes
            .try_into()
            .map_err(|_| serde::de::Error::custom("Expected 32 bytes"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hardened_bit() {
        assert!(!is_hardened(0));
        assert!(!is_hardened(0x7fff_ffff));
        assert!(is_hardened(HARDENED_BIT));
        assert!(is_hardened(u32::MAX));
    }

    #[test]
    fn test_chain_code_from_slice() {
        assert!(ChainCode::from_slice(&[0u8; 31]).is_err());
        let code = ChainCode::from_slice(&[9u8; 32]).unwrap();
        assert_eq!(code.as_bytes(), &[9u8; 32]);
    }

    #[test]
    fn test_chain_code_serde() {
        let code = ChainCode::new([0xab; 32]);
        let json = serde_json::to_string(&code).unwrap();
        assert_eq!(json, format!("\"{}\"", "ab".repeat(32)));

        let back: ChainCode = serde_json::from_str(&json).unwrap();
        assert_eq!(back, code);
    }
}
