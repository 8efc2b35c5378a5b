//! secp256k1 private keys.

use std::fmt;

use coinkey_crypto::{
    check_signature_element, double_sha256, encode_compact, hmac_sha512, CompactSignature,
    CryptoError, CurveKeyPair, DerSignature, EccContext, LockedBytes, PublicKey, HASH_SIZE,
    SECRET_KEY_SIZE,
};
use zeroize::{Zeroize, Zeroizing};

use crate::types::{is_hardened, ChainCode};
use crate::KeyError;

const VERIFY_CHALLENGE_PREFIX: &[u8] = b"coinkey key verification\n";

/// A private key: a scalar in `[1, n)` plus the preferred public key
/// encoding.
///
/// A key starts out invalid and becomes valid through [`set`] or
/// [`make_new_key`]. The scalar lives in a [`LockedBytes`] buffer, so a clone
/// owns a separately pinned copy.
///
/// [`set`]: SecretKey::set
/// [`make_new_key`]: SecretKey::make_new_key
#[derive(Clone, Default)]
pub struct SecretKey {
    valid: bool,
    compressed: bool,
    data: LockedBytes<SECRET_KEY_SIZE>,
}

impl SecretKey {
    /// An invalid, empty key.
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a key from 32 raw bytes.
    pub fn from_slice(bytes: &[u8], compressed: bool) -> Result<Self, KeyError> {
        let mut key = Self::new();
        if key.set(bytes, compressed) {
            Ok(key)
        } else {
            Err(KeyError::InvalidSecretKey)
        }
    }

    /// Load raw key bytes.
    ///
    /// Returns whether the key is now valid. Anything other than 32 bytes
    /// encoding an integer in `[1, n)` leaves the key invalid.
    pub fn set(&mut self, bytes: &[u8], compressed: bool) -> bool {
        self.valid = bytes.len() == SECRET_KEY_SIZE && check_signature_element(bytes, false);
        if self.valid {
            self.data.copy_from_slice(bytes);
            self.compressed = compressed;
        } else {
            self.data.zeroize();
        }
        self.valid
    }

    /// Replace the key with a fresh random scalar from the engine.
    pub fn make_new_key(&mut self, ctx: &EccContext, compressed: bool) -> Result<(), KeyError> {
        let scalar = ctx.random_scalar()?;
        self.data.copy_from_slice(scalar.as_slice());
        self.compressed = compressed;
        self.valid = true;
        Ok(())
    }

    /// 32 when valid, 0 otherwise.
    pub fn size(&self) -> usize {
        if self.valid {
            SECRET_KEY_SIZE
        } else {
            0
        }
    }

    /// The raw scalar, empty when the key is invalid.
    pub fn as_bytes(&self) -> &[u8] {
        &self.data[..self.size()]
    }

    /// Whether the key holds a usable scalar.
    pub fn is_valid(&self) -> bool {
        self.valid
    }

    /// Whether the public key is serialized compressed.
    pub fn is_compressed(&self) -> bool {
        self.compressed
    }

    fn key_pair(&self) -> Result<CurveKeyPair, KeyError> {
        if !self.valid {
            return Err(KeyError::InvalidSecretKey);
        }
        Ok(CurveKeyPair::from_secret_bytes(&self.data)?)
    }

    /// Compute the public key `d * G`.
    pub fn public_key(&self) -> Result<PublicKey, KeyError> {
        Ok(self.key_pair()?.public_key(self.compressed)?)
    }

    /// Sign a 32-byte hash. The signature is always low-S.
    pub fn sign(&self, hash: &[u8; HASH_SIZE]) -> Result<DerSignature, KeyError> {
        Ok(self.key_pair()?.sign(hash)?)
    }

    /// Sign with the deterministic nonce tweaked by `test_case`.
    pub fn sign_with_test_case(
        &self,
        hash: &[u8; HASH_SIZE],
        test_case: u32,
    ) -> Result<DerSignature, KeyError> {
        Ok(self.key_pair()?.sign_with_test_case(hash, test_case)?)
    }

    /// Sign a 32-byte hash in the 65-byte recoverable form.
    pub fn sign_compact(&self, hash: &[u8; HASH_SIZE]) -> Result<CompactSignature, KeyError> {
        let (raw, recovery_id) = self.key_pair()?.sign_compact(hash)?;
        Ok(encode_compact(&raw, recovery_id, self.compressed)?)
    }

    /// Derive the child key and chain code at `index`.
    ///
    /// Hardened indexes hash `0x00 || secret || index`, normal indexes hash
    /// `compressed public key || index`, both keyed with the parent chain
    /// code. The left half of the digest tweaks this key, the right half is
    /// the child chain code.
    pub fn derive(
        &self,
        index: u32,
        chain_code: &ChainCode,
    ) -> Result<(SecretKey, ChainCode), KeyError> {
        let pair = self.key_pair()?;

        let mut data = Zeroizing::new(Vec::with_capacity(37));
        if is_hardened(index) {
            data.push(0);
            data.extend_from_slice(self.as_bytes());
        } else {
            data.extend_from_slice(&pair.public_key(true)?.to_compressed_bytes());
        }
        data.extend_from_slice(&index.to_be_bytes());

        let digest = Zeroizing::new(hmac_sha512(chain_code.as_bytes(), &data)?);
        let mut tweak = Zeroizing::new([0u8; 32]);
        tweak.copy_from_slice(&digest[..32]);

        let child_secret =
            CurveKeyPair::tweak_secret(&self.data, &tweak).map_err(|e| match e {
                CryptoError::TweakOutOfRange | CryptoError::TweakIdentity => {
                    log::warn!("Child {:#010x} is unusable, skip to the next index", index);
                    KeyError::DerivationFailed(index)
                }
                other => KeyError::Crypto(other),
            })?;

        let child = Self::from_slice(child_secret.as_slice(), true)?;
        let child_chain = ChainCode::from_slice(&digest[32..])?;
        Ok((child, child_chain))
    }

    /// Check that `candidate` is this key's public key.
    ///
    /// The check does not recompute `d * G`: it signs a challenge bound to
    /// the candidate, recovers the signer from the compact signature and
    /// verifies a DER signature against the candidate.
    pub fn verify_public_key(&self, candidate: &PublicKey) -> bool {
        if !self.valid || candidate.is_compressed() != self.compressed {
            return false;
        }

        let mut challenge = VERIFY_CHALLENGE_PREFIX.to_vec();
        challenge.extend_from_slice(&candidate.to_bytes());
        let hash = double_sha256(&challenge);

        let Ok(compact) = self.sign_compact(&hash) else {
            return false;
        };
        match compact.recover(&hash) {
            Ok(recovered) if &recovered == candidate => {}
            _ => return false,
        }

        let Ok(der) = self.sign(&hash) else {
            return false;
        };
        CurveKeyPair::from_public_key(candidate).verify(&hash, der.as_bytes())
    }

    /// Export the key as a SEC1 DER private key document.
    pub fn private_key_der(&self) -> Result<Zeroizing<Vec<u8>>, KeyError> {
        Ok(self.key_pair()?.private_key_der(self.compressed)?)
    }

    /// Import a SEC1 DER private key document.
    pub fn set_private_key_der(
        &mut self,
        der: &[u8],
        compressed: bool,
        skip_check: bool,
    ) -> Result<(), KeyError> {
        let mut pair = CurveKeyPair::new();
        pair.set_private_key_der(der, skip_check)?;
        let secret = pair.secret_bytes()?;
        *self = Self::from_slice(secret.as_slice(), compressed)?;
        Ok(())
    }

    /// Restore a key from a DER private key document and its public key.
    ///
    /// Unless `skip_check` is set the public key must pass
    /// [`verify_public_key`](Self::verify_public_key). On failure `self` is
    /// left untouched.
    pub fn load(
        &mut self,
        der: &[u8],
        public: &PublicKey,
        skip_check: bool,
    ) -> Result<(), KeyError> {
        let mut key = Self::new();
        key.set_private_key_der(der, public.is_compressed(), skip_check)?;
        if !skip_check && !key.verify_public_key(public) {
            return Err(KeyError::PublicKeyMismatch);
        }
        *self = key;
        Ok(())
    }

    /// Range check of a raw signature `r` or `s` value.
    pub fn check_signature_element(bytes: &[u8], half: bool) -> bool {
        check_signature_element(bytes, half)
    }
}

impl PartialEq for SecretKey {
    fn eq(&self, other: &Self) -> bool {
        self.compressed == other.compressed && self.as_bytes() == other.as_bytes()
    }
}

impl Eq for SecretKey {}

impl fmt::Debug for SecretKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SecretKey")
            .field("valid", &self.valid)
            .field("compressed", &self.compressed)
            .field("data", &"[REDACTED]")
            .finish()
    }
}
