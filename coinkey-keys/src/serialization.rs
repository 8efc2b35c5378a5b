//! Extended key serialization: stream framing, Base58Check and serde.

use std::fmt;
use std::io::{Read, Write};
use std::str::FromStr;

use coinkey_crypto::double_sha256;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use zeroize::Zeroizing;

use crate::extended::{ExtendedKey, ExtendedPublicKey, EXTENDED_KEY_SIZE};
use crate::KeyError;

/// Base58Check version prefix of a mainnet private extended key (`xprv`).
pub const PRIVATE_VERSION: u32 = 0x0488_ADE4;

/// Base58Check version prefix of a mainnet public extended key (`xpub`).
pub const PUBLIC_VERSION: u32 = 0x0488_B21E;

const CHECKSUM_SIZE: usize = 4;
const BASE58_PAYLOAD_SIZE: usize = 4 + EXTENDED_KEY_SIZE;

/// Write a variable-length size prefix.
///
/// # Format
/// ```text
/// < 0xfd        [n:1]
/// <= 0xffff     [0xfd][n:2 LE]
/// <= 0xffffffff [0xfe][n:4 LE]
/// otherwise     [0xff][n:8 LE]
/// ```
pub fn write_compact_size<W: Write>(writer: &mut W, size: u64) -> Result<(), KeyError> {
    match size {
        0..=0xfc => writer.write_all(&[size as u8])?,
        0xfd..=0xffff => {
            writer.write_all(&[0xfd])?;
            writer.write_all(&(size as u16).to_le_bytes())?;
        }
        0x1_0000..=0xffff_ffff => {
            writer.write_all(&[0xfe])?;
            writer.write_all(&(size as u32).to_le_bytes())?;
        }
        _ => {
            writer.write_all(&[0xff])?;
            writer.write_all(&size.to_le_bytes())?;
        }
    }
    Ok(())
}

/// Read a variable-length size prefix written by [`write_compact_size`].
pub fn read_compact_size<R: Read>(reader: &mut R) -> Result<u64, KeyError> {
    let mut marker = [0u8; 1];
    reader.read_exact(&mut marker)?;
    let size = match marker[0] {
        0xfd => {
            let mut buf = [0u8; 2];
            reader.read_exact(&mut buf)?;
            u64::from(u16::from_le_bytes(buf))
        }
        0xfe => {
            let mut buf = [0u8; 4];
            reader.read_exact(&mut buf)?;
            u64::from(u32::from_le_bytes(buf))
        }
        0xff => {
            let mut buf = [0u8; 8];
            reader.read_exact(&mut buf)?;
            u64::from_le_bytes(buf)
        }
        small => u64::from(small),
    };
    Ok(size)
}

fn read_record<R: Read>(reader: &mut R) -> Result<Zeroizing<[u8; EXTENDED_KEY_SIZE]>, KeyError> {
    let size = read_compact_size(reader)?;
    if size != EXTENDED_KEY_SIZE as u64 {
        return Err(KeyError::InvalidEncoding(format!(
            "framed size is {}, expected {}",
            size, EXTENDED_KEY_SIZE
        )));
    }
    let mut record = Zeroizing::new([0u8; EXTENDED_KEY_SIZE]);
    reader.read_exact(record.as_mut_slice())?;
    Ok(record)
}

fn compute_checksum(data: &[u8]) -> [u8; CHECKSUM_SIZE] {
    let hash = double_sha256(data);
    let mut checksum = [0u8; CHECKSUM_SIZE];
    checksum.copy_from_slice(&hash[..CHECKSUM_SIZE]);
    checksum
}

/// Encode `version || payload || checksum` as Base58.
fn to_base58check(version: u32, payload: &[u8; EXTENDED_KEY_SIZE]) -> String {
    let mut bytes = Zeroizing::new(Vec::with_capacity(BASE58_PAYLOAD_SIZE + CHECKSUM_SIZE));
    bytes.extend_from_slice(&version.to_be_bytes());
    bytes.extend_from_slice(payload);
    let checksum = compute_checksum(&bytes);
    bytes.extend_from_slice(&checksum);
    bs58::encode(bytes.as_slice()).into_string()
}

/// Decode a Base58Check string, checking the checksum and version.
fn from_base58check(
    s: &str,
    expected_version: u32,
) -> Result<Zeroizing<[u8; EXTENDED_KEY_SIZE]>, KeyError> {
    let bytes = Zeroizing::new(
        bs58::decode(s)
            .into_vec()
            .map_err(|e| KeyError::InvalidBase58(e.to_string()))?,
    );
    if bytes.len() != BASE58_PAYLOAD_SIZE + CHECKSUM_SIZE {
        return Err(KeyError::InvalidLength {
            expected: BASE58_PAYLOAD_SIZE + CHECKSUM_SIZE,
            actual: bytes.len(),
        });
    }

    let (payload, checksum) = bytes.split_at(BASE58_PAYLOAD_SIZE);
    if checksum != compute_checksum(payload) {
        return Err(KeyError::InvalidChecksum);
    }

    let mut version = [0u8; 4];
    version.copy_from_slice(&payload[..4]);
    let version = u32::from_be_bytes(version);
    if version != expected_version {
        return Err(KeyError::InvalidVersion(version));
    }

    let mut record = Zeroizing::new([0u8; EXTENDED_KEY_SIZE]);
    record.copy_from_slice(&payload[4..]);
    Ok(record)
}

impl ExtendedKey {
    /// Write the encoding with its size prefix.
    pub fn write_to<W: Write>(&self, writer: &mut W) -> Result<(), KeyError> {
        let encoded = self.encode()?;
        write_compact_size(writer, EXTENDED_KEY_SIZE as u64)?;
        writer.write_all(encoded.as_slice())?;
        Ok(())
    }

    /// Read a size-prefixed encoding. Any size other than 74 is rejected.
    pub fn read_from<R: Read>(reader: &mut R) -> Result<Self, KeyError> {
        let record = read_record(reader)?;
        Self::decode(record.as_slice())
    }

    /// The `xprv` string form.
    ///
    /// # Security Warning
    /// The string contains the private key.
    pub fn to_base58(&self) -> Result<Zeroizing<String>, KeyError> {
        let encoded = self.encode()?;
        Ok(Zeroizing::new(to_base58check(PRIVATE_VERSION, &encoded)))
    }

    /// Parse the `xprv` string form.
    pub fn from_base58(s: &str) -> Result<Self, KeyError> {
        let record = from_base58check(s, PRIVATE_VERSION)?;
        Self::decode(record.as_slice())
    }
}

impl ExtendedPublicKey {
    /// Write the encoding with its size prefix.
    pub fn write_to<W: Write>(&self, writer: &mut W) -> Result<(), KeyError> {
        write_compact_size(writer, EXTENDED_KEY_SIZE as u64)?;
        writer.write_all(&self.encode())?;
        Ok(())
    }

    /// Read a size-prefixed encoding. Any size other than 74 is rejected.
    pub fn read_from<R: Read>(reader: &mut R) -> Result<Self, KeyError> {
        let record = read_record(reader)?;
        Self::decode(record.as_slice())
    }

    /// The `xpub` string form.
    pub fn to_base58(&self) -> String {
        to_base58check(PUBLIC_VERSION, &self.encode())
    }

    /// Parse the `xpub` string form.
    pub fn from_base58(s: &str) -> Result<Self, KeyError> {
        let record = from_base58check(s, PUBLIC_VERSION)?;
        Self::decode(record.as_slice())
    }
}

impl fmt::Display for ExtendedPublicKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_base58())
    }
}

impl FromStr for ExtendedPublicKey {
    type Err = KeyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_base58(s)
    }
}

impl Serialize for ExtendedPublicKey {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&hex::encode(self.encode()))
    }
}

impl<'de> Deserialize<'de> for ExtendedPublicKey {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        let bytes = hex::decode(&s).map_err(serde::de::Error::custom)?;
        Self::decode(&bytes).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn master() -> ExtendedKey {
        ExtendedKey::from_seed(&[0u8; 16]).unwrap()
    }

    #[test]
    fn test_compact_size_widths() {
        for (size, len) in [(0u64, 1), (0xfc, 1), (0xfd, 3), (0xffff, 3), (0x1_0000, 5), (u64::MAX, 9)] {
            let mut buf = Vec::new();
            write_compact_size(&mut buf, size).unwrap();
            assert_eq!(buf.len(), len);
            assert_eq!(read_compact_size(&mut buf.as_slice()).unwrap(), size);
        }
    }

    #[test]
    fn test_framed_record() {
        let key = master();
        let mut buf = Vec::new();
        key.write_to(&mut buf).unwrap();

        assert_eq!(buf.len(), 75);
        assert_eq!(buf[0], 74);
        assert_eq!(ExtendedKey::read_from(&mut buf.as_slice()).unwrap(), key);
    }

    #[test]
    fn test_framed_record_wrong_size() {
        let public = master().neuter().unwrap();
        let mut buf = Vec::new();
        public.write_to(&mut buf).unwrap();
        buf[0] = 73;

        assert!(matches!(
            ExtendedPublicKey::read_from(&mut buf.as_slice()),
            Err(KeyError::InvalidEncoding(_))
        ));
    }

    #[test]
    fn test_framed_record_truncated() {
        let mut buf = Vec::new();
        master().write_to(&mut buf).unwrap();
        buf.truncate(40);

        assert!(matches!(
            ExtendedKey::read_from(&mut buf.as_slice()),
            Err(KeyError::Io(_))
        ));
    }

    #[test]
    fn test_base58_checksum_and_version() {
        let key = master();
        let xprv = key.to_base58().unwrap();
        assert!(xprv.starts_with("xprv"));
        assert_eq!(ExtendedKey::from_base58(&xprv).unwrap(), key);

        let xpub = key.neuter().unwrap().to_base58();
        assert!(xpub.starts_with("xpub"));
        assert!(matches!(
            ExtendedKey::from_base58(&xpub),
            Err(KeyError::InvalidVersion(PUBLIC_VERSION))
        ));

        let mut corrupted = xpub.clone().into_bytes();
        let last = corrupted.len() - 1;
        corrupted[last] = if corrupted[last] == b'1' { b'2' } else { b'1' };
        let corrupted = String::from_utf8(corrupted).unwrap();
        assert!(ExtendedPublicKey::from_base58(&corrupted).is_err());

        assert!(matches!(
            ExtendedPublicKey::from_base58("0OIl"),
            Err(KeyError::InvalidBase58(_))
        ));
    }

    #[test]
    fn test_public_key_display_and_serde() {
        let public = master().neuter().unwrap();
        let parsed: ExtendedPublicKey = public.to_string().parse().unwrap();
        assert_eq!(parsed, public);

        let json = serde_json::to_string(&public).unwrap();
        assert_eq!(json, format!("\"{}\"", hex::encode(public.encode())));
        let back: ExtendedPublicKey = serde_json::from_str(&json).unwrap();
        assert_eq!(back, public);
    }
}
