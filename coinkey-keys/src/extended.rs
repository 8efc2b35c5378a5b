//! Hierarchical deterministic key nodes.
//!
//! An [`ExtendedKey`] holds a private key with its chain code and position in
//! the tree; an [`ExtendedPublicKey`] is the same node with only the public
//! point. Going from private to public ([`ExtendedKey::neuter`]) is one-way.
//!
//! Both encode to a fixed 74-byte layout:
//!
//! ```text
//! [depth:1][parent_fingerprint:4][child_number:4 BE][chain_code:32][key:33]
//! ```
//!
//! where `key` is `0x00 || secret` for a private node and the compressed
//! point for a public one.

use coinkey_crypto::{
    hash160, hmac_sha512, CryptoError, CurveKeyPair, PublicKey, COMPRESSED_PUBLIC_KEY_SIZE,
};
use zeroize::Zeroizing;

use crate::path::DerivationPath;
use crate::secret_key::SecretKey;
use crate::types::{is_hardened, ChainCode};
use crate::KeyError;

/// Size of an encoded extended key.
pub const EXTENDED_KEY_SIZE: usize = 74;

/// Size of a key fingerprint.
pub const FINGERPRINT_SIZE: usize = 4;

/// HMAC key for master key generation.
pub const MASTER_SEED_KEY: &[u8] = b"Bitcoin seed";

const KEY_OFFSET: usize = 41;

/// A private node in the derivation tree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtendedKey {
    depth: u8,
    parent_fingerprint: [u8; FINGERPRINT_SIZE],
    child_number: u32,
    chain_code: ChainCode,
    key: SecretKey,
}

impl ExtendedKey {
    /// Derive the master node from a seed.
    ///
    /// `I = HMAC-SHA512("Bitcoin seed", seed)`; the left half is the master
    /// secret and the right half the master chain code.
    pub fn from_seed(seed: &[u8]) -> Result<Self, KeyError> {
        let digest = Zeroizing::new(hmac_sha512(MASTER_SEED_KEY, seed)?);
        let key = SecretKey::from_slice(&digest[..32], true)?;
        let chain_code = ChainCode::from_slice(&digest[32..])?;

        log::debug!("Derived master key from a {}-byte seed", seed.len());
        Ok(Self {
            depth: 0,
            parent_fingerprint: [0; FINGERPRINT_SIZE],
            child_number: 0,
            chain_code,
            key,
        })
    }

    /// Replace this node with the master node of `seed`.
    pub fn set_master(&mut self, seed: &[u8]) -> Result<(), KeyError> {
        *self = Self::from_seed(seed)?;
        Ok(())
    }

    pub fn depth(&self) -> u8 {
        self.depth
    }

    pub fn parent_fingerprint(&self) -> [u8; FINGERPRINT_SIZE] {
        self.parent_fingerprint
    }

    pub fn child_number(&self) -> u32 {
        self.child_number
    }

    pub fn chain_code(&self) -> &ChainCode {
        &self.chain_code
    }

    pub fn secret_key(&self) -> &SecretKey {
        &self.key
    }

    /// The node's compressed public key.
    pub fn public_key(&self) -> Result<PublicKey, KeyError> {
        self.key.public_key()
    }

    /// HASH160 of the compressed public key.
    pub fn identifier(&self) -> Result<[u8; 20], KeyError> {
        Ok(self.public_key()?.hash160())
    }

    /// First four bytes of [`identifier`](Self::identifier).
    pub fn fingerprint(&self) -> Result<[u8; FINGERPRINT_SIZE], KeyError> {
        Ok(fingerprint_of(&self.public_key()?))
    }

    /// Derive the child at `index`; indexes with the top bit set are
    /// hardened.
    pub fn derive(&self, index: u32) -> Result<Self, KeyError> {
        let parent_fingerprint = self.fingerprint()?;
        let (key, chain_code) = self.key.derive(index, &self.chain_code)?;
        Ok(Self {
            depth: self.depth.wrapping_add(1),
            parent_fingerprint,
            child_number: index,
            chain_code,
            key,
        })
    }

    /// Derive every step of `path` in turn.
    pub fn derive_path(&self, path: &DerivationPath) -> Result<Self, KeyError> {
        path.iter()
            .try_fold(self.clone(), |node, index| node.derive(index))
    }

    /// The public-only view of this node.
    pub fn neuter(&self) -> Result<ExtendedPublicKey, KeyError> {
        Ok(ExtendedPublicKey {
            depth: self.depth,
            parent_fingerprint: self.parent_fingerprint,
            child_number: self.child_number,
            chain_code: self.chain_code,
            public: self.public_key()?.with_compression(true),
        })
    }

    /// Encode to the 74-byte layout.
    ///
    /// # Security Warning
    /// The output contains the private key.
    pub fn encode(&self) -> Result<Zeroizing<[u8; EXTENDED_KEY_SIZE]>, KeyError> {
        if !self.key.is_valid() {
            return Err(KeyError::InvalidSecretKey);
        }
        let mut out = Zeroizing::new([0u8; EXTENDED_KEY_SIZE]);
        write_header(
            &mut out,
            self.depth,
            &self.parent_fingerprint,
            self.child_number,
            &self.chain_code,
        );
        out[KEY_OFFSET] = 0;
        out[KEY_OFFSET + 1..].copy_from_slice(self.key.as_bytes());
        Ok(out)
    }

    /// Decode from the 74-byte layout.
    pub fn decode(bytes: &[u8]) -> Result<Self, KeyError> {
        let (depth, parent_fingerprint, child_number, chain_code) = read_header(bytes)?;
        if bytes[KEY_OFFSET] != 0 {
            return Err(KeyError::InvalidEncoding(format!(
                "private key marker is {:#04x}",
                bytes[KEY_OFFSET]
            )));
        }
        let key = SecretKey::from_slice(&bytes[KEY_OFFSET + 1..], true)?;
        Ok(Self {
            depth,
            parent_fingerprint,
            child_number,
            chain_code,
            key,
        })
    }
}

/// A public-only node in the derivation tree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtendedPublicKey {
    depth: u8,
    parent_fingerprint: [u8; FINGERPRINT_SIZE],
    child_number: u32,
    chain_code: ChainCode,
    public: PublicKey,
}

impl ExtendedPublicKey {
    pub fn depth(&self) -> u8 {
        self.depth
    }

    pub fn parent_fingerprint(&self) -> [u8; FINGERPRINT_SIZE] {
        self.parent_fingerprint
    }

    pub fn child_number(&self) -> u32 {
        self.child_number
    }

    pub fn chain_code(&self) -> &ChainCode {
        &self.chain_code
    }

    /// The node's compressed public key.
    pub fn public_key(&self) -> &PublicKey {
        &self.public
    }

    pub fn identifier(&self) -> [u8; 20] {
        self.public.hash160()
    }

    pub fn fingerprint(&self) -> [u8; FINGERPRINT_SIZE] {
        fingerprint_of(&self.public)
    }

    /// Derive the normal child at `index`.
    ///
    /// Hardened indexes need the private key and fail with
    /// [`KeyError::HardenedFromPublic`].
    pub fn derive(&self, index: u32) -> Result<Self, KeyError> {
        if is_hardened(index) {
            return Err(KeyError::HardenedFromPublic(index));
        }

        let mut data = Vec::with_capacity(COMPRESSED_PUBLIC_KEY_SIZE + 4);
        data.extend_from_slice(&self.public.to_compressed_bytes());
        data.extend_from_slice(&index.to_be_bytes());

        let digest = hmac_sha512(self.chain_code.as_bytes(), &data)?;
        let mut tweak = [0u8; 32];
        tweak.copy_from_slice(&digest[..32]);

        let mut pair = CurveKeyPair::from_public_key(&self.public);
        pair.tweak_public(&tweak).map_err(|e| match e {
            CryptoError::TweakOutOfRange | CryptoError::TweakIdentity => {
                log::warn!("Child {:#010x} is unusable, skip to the next index", index);
                KeyError::DerivationFailed(index)
            }
            other => KeyError::Crypto(other),
        })?;

        Ok(Self {
            depth: self.depth.wrapping_add(1),
            parent_fingerprint: self.fingerprint(),
            child_number: index,
            chain_code: ChainCode::from_slice(&digest[32..])?,
            public: pair.public_key(true)?,
        })
    }

    /// Derive every step of `path` in turn.
    pub fn derive_path(&self, path: &DerivationPath) -> Result<Self, KeyError> {
        path.iter()
            .try_fold(self.clone(), |node, index| node.derive(index))
    }

    /// Encode to the 74-byte layout.
    pub fn encode(&self) -> [u8; EXTENDED_KEY_SIZE] {
        let mut out = [0u8; EXTENDED_KEY_SIZE];
        write_header(
            &mut out,
            self.depth,
            &self.parent_fingerprint,
            self.child_number,
            &self.chain_code,
        );
        out[KEY_OFFSET..].copy_from_slice(&self.public.to_compressed_bytes());
        out
    }

    /// Decode from the 74-byte layout.
    pub fn decode(bytes: &[u8]) -> Result<Self, KeyError> {
        let (depth, parent_fingerprint, child_number, chain_code) = read_header(bytes)?;
        if !matches!(bytes[KEY_OFFSET], 0x02 | 0x03) {
            return Err(KeyError::InvalidEncoding(format!(
                "public key marker {:#04x}",
                bytes[KEY_OFFSET]
            )));
        }
        let public = PublicKey::from_slice(&bytes[KEY_OFFSET..])
            .map_err(|e| KeyError::InvalidEncoding(e.to_string()))?;
        Ok(Self {
            depth,
            parent_fingerprint,
            child_number,
            chain_code,
            public,
        })
    }
}

fn fingerprint_of(public: &PublicKey) -> [u8; FINGERPRINT_SIZE] {
    let id = hash160(&public.to_compressed_bytes());
    let mut out = [0u8; FINGERPRINT_SIZE];
    out.copy_from_slice(&id[..FINGERPRINT_SIZE]);
    out
}

fn write_header(
    out: &mut [u8; EXTENDED_KEY_SIZE],
    depth: u8,
    parent_fingerprint: &[u8; FINGERPRINT_SIZE],
    child_number: u32,
    chain_code: &ChainCode,
) {
    out[0] = depth;
    out[1..5].copy_from_slice(parent_fingerprint);
    out[5..9].copy_from_slice(&child_number.to_be_bytes());
    out[9..KEY_OFFSET].copy_from_slice(chain_code.as_bytes());
}

fn read_header(bytes: &[u8]) -> Result<(u8, [u8; FINGERPRINT_SIZE], u32, ChainCode), KeyError> {
    if bytes.len() != EXTENDED_KEY_SIZE {
        return Err(KeyError::InvalidLength {
            expected: EXTENDED_KEY_SIZE,
            actual: bytes.len(),
        });
    }
    let mut parent_fingerprint = [0u8; FINGERPRINT_SIZE];
    parent_fingerprint.copy_from_slice(&bytes[1..5]);
    let mut child_number = [0u8; 4];
    child_number.copy_from_slice(&bytes[5..9]);
    let chain_code = ChainCode::from_slice(&bytes[9..KEY_OFFSET])?;
    Ok((
        bytes[0],
        parent_fingerprint,
        u32::from_be_bytes(child_number),
        chain_code,
    ))
}
