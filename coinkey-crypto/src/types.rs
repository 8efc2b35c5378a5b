//! Core key and signature types for secp256k1.

use std::fmt;

use k256::ecdsa::VerifyingKey;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::CryptoError;
use crate::hash::hash160;

/// Size of a compressed SEC1 point encoding.
pub const COMPRESSED_PUBLIC_KEY_SIZE: usize = 33;

/// Size of an uncompressed SEC1 point encoding.
pub const PUBLIC_KEY_SIZE: usize = 65;

/// Upper bound of a DER-encoded secp256k1 signature.
pub const MAX_DER_SIGNATURE_SIZE: usize = 72;

/// Size of a compact, recoverable signature.
pub const COMPACT_SIGNATURE_SIZE: usize = 65;

/// A secp256k1 public key together with its preferred encoding.
///
/// Two keys are equal when they encode to the same bytes, so the same point
/// in compressed and uncompressed form compares unequal.
#[derive(Clone, PartialEq, Eq)]
pub struct PublicKey {
    key: VerifyingKey,
    compressed: bool,
}

impl PublicKey {
    /// Wrap an engine verifying key.
    pub fn new(key: VerifyingKey, compressed: bool) -> Self {
        Self { key, compressed }
    }

    /// Parse a 33-byte compressed or 65-byte uncompressed encoding.
    pub fn from_slice(bytes: &[u8]) -> Result<Self, CryptoError> {
        let compressed = match bytes.len() {
            COMPRESSED_PUBLIC_KEY_SIZE => true,
            PUBLIC_KEY_SIZE => false,
            actual => {
                return Err(CryptoError::InvalidLength {
                    expected: COMPRESSED_PUBLIC_KEY_SIZE,
                    actual,
                })
            }
        };
        // Only the plain SEC1 tags; the engine also takes compact points.
        let tag_ok = match bytes[0] {
            0x02 | 0x03 => compressed,
            0x04 => !compressed,
            _ => false,
        };
        if !tag_ok {
            return Err(CryptoError::InvalidPublicKey(format!(
                "unexpected encoding tag {:#04x}",
                bytes[0]
            )));
        }
        let key = VerifyingKey::from_sec1_bytes(bytes)
            .map_err(|e| CryptoError::InvalidPublicKey(e.to_string()))?;
        Ok(Self { key, compressed })
    }

    /// Create from a hex string.
    pub fn from_hex(hex_str: &str) -> Result<Self, CryptoError> {
        let bytes =
            hex::decode(hex_str).map_err(|e| CryptoError::InvalidPublicKey(e.to_string()))?;
        Self::from_slice(&bytes)
    }

    /// Serialized point in the preferred encoding (33 or 65 bytes).
    pub fn to_bytes(&self) -> Vec<u8> {
        self.key
            .to_encoded_point(self.compressed)
            .as_bytes()
            .to_vec()
    }

    /// Serialized point in compressed form regardless of preference.
    pub fn to_compressed_bytes(&self) -> [u8; COMPRESSED_PUBLIC_KEY_SIZE] {
        let point = self.key.to_encoded_point(true);
        let mut out = [0u8; COMPRESSED_PUBLIC_KEY_SIZE];
        out.copy_from_slice(point.as_bytes());
        out
    }

    /// Convert to hex string.
    pub fn to_hex(&self) -> String {
        hex::encode(self.to_bytes())
    }

    /// Whether the preferred encoding is compressed.
    pub fn is_compressed(&self) -> bool {
        self.compressed
    }

    /// Same point, other encoding preference.
    pub fn with_compression(self, compressed: bool) -> Self {
        Self { compressed, ..self }
    }

    /// HASH160 of the serialized key.
    pub fn hash160(&self) -> [u8; 20] {
        hash160(&self.to_bytes())
    }

    /// The underlying engine key.
    pub fn verifying_key(&self) -> &VerifyingKey {
        &self.key
    }
}

impl fmt::Debug for PublicKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PublicKey({})", self.to_hex())
    }
}

impl TryFrom<&[u8]> for PublicKey {
    type Error = CryptoError;

    fn try_from(bytes: &[u8]) -> Result<Self, Self::Error> {
        Self::from_slice(bytes)
    }
}

impl Serialize for PublicKey {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&self.to_hex())
    }
}

impl<'de> Deserialize<'de> for PublicKey {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        Self::from_hex(&s).map_err(serde::de::Error::custom)
    }
}

/// A DER-encoded ECDSA signature.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DerSignature(#[serde(with = "hex_vec")] pub Vec<u8>);

impl DerSignature {
    /// Wrap raw DER bytes without checking them.
    pub fn new(bytes: Vec<u8>) -> Self {
        Self(bytes)
    }

    /// Create from a hex string.
    pub fn from_hex(hex_str: &str) -> Result<Self, CryptoError> {
        let bytes =
            hex::decode(hex_str).map_err(|e| CryptoError::InvalidSignature(e.to_string()))?;
        if bytes.len() > MAX_DER_SIGNATURE_SIZE {
            return Err(CryptoError::InvalidSignature(format!(
                "Expected at most {} bytes, got {}",
                MAX_DER_SIGNATURE_SIZE,
                bytes.len()
            )));
        }
        Ok(Self(bytes))
    }

    /// Convert to hex string.
    pub fn to_hex(&self) -> String {
        hex::encode(&self.0)
    }

    /// Get the raw bytes.
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }
}

impl AsRef<[u8]> for DerSignature {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

/// A 65-byte recoverable signature: header, then `r` and `s` big-endian.
///
/// The header is `27 + recovery_id`, plus 4 when the signer's public key is
/// to be serialized compressed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompactSignature(#[serde(with = "hex_bytes_65")] pub [u8; COMPACT_SIGNATURE_SIZE]);

impl CompactSignature {
    /// Create from a hex string.
    pub fn from_hex(hex_str: &str) -> Result<Self, CryptoError> {
        let bytes =
            hex::decode(hex_str).map_err(|e| CryptoError::InvalidSignature(e.to_string()))?;
        Self::try_from(bytes.as_slice())
    }

    /// Convert to hex string.
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    /// Get the raw bytes.
    pub fn as_bytes(&self) -> &[u8; COMPACT_SIGNATURE_SIZE] {
        &self.0
    }
}

impl TryFrom<&[u8]> for CompactSignature {
    type Error = CryptoError;

    fn try_from(bytes: &[u8]) -> Result<Self, Self::Error> {
        if bytes.len() != COMPACT_SIGNATURE_SIZE {
            return Err(CryptoError::InvalidLength {
                expected: COMPACT_SIGNATURE_SIZE,
                actual: bytes.len(),
            });
        }
        let mut arr = [0u8; COMPACT_SIGNATURE_SIZE];
        arr.copy_from_slice(bytes);
        Ok(Self(arr))
    }
}

/// Serde module for byte vectors as hex strings.
mod hex_vec {
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&hex::encode(bytes))
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Vec<u8>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        hex::decode(&s).map_err(serde::de::Error::custom)
    }
}

/// Serde module for 65-byte arrays as hex strings.
mod hex_bytes_65 {
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S>(bytes: &[u8; 65], serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&hex::encode(bytes))
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<[u8; 65], D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        let bytes = hex::decode(&s).map_err(serde::de::Error::custom)?;
        if bytes.len() != 65 {
            return Err(serde::de::Error::custom(format!(
                "Expected 65 bytes, got {}",
                bytes.len()
            )));
        }
        let mut arr = [0u8; 65];
        arr.copy_from_slice(&bytes);
        Ok(arr)
    }
}
