//! Binding of a secp256k1 key pair to the `k256` engine.
//!
//! A [`CurveKeyPair`] holds an optional secret scalar and an optional public
//! point. Signing needs the secret, verification and tweaking of the point
//! only need the public half.

use std::fmt;

use ecdsa::hazmat::SignPrimitive;
use k256::ecdsa::signature::hazmat::{PrehashSigner, PrehashVerifier};
use k256::ecdsa::{RecoveryId, Signature, SigningKey, VerifyingKey};
use k256::elliptic_curve::PrimeField;
use k256::{FieldBytes, ProjectivePoint, Scalar};
use sha2::Sha256;
use sec1::der::asn1::ObjectIdentifier;
use sec1::der::{Decode, Encode};
use sec1::{EcParameters, EcPrivateKey};
use zeroize::{Zeroize, Zeroizing};

use crate::error::{invariant_violation, CryptoError};
use crate::signature::{enforce_low_s, from_raw, to_der, to_raw};
use crate::types::{DerSignature, PublicKey};

/// Size of a raw secret scalar.
pub const SECRET_KEY_SIZE: usize = 32;

/// Size of the message hashes this module signs.
pub const HASH_SIZE: usize = 32;

/// Named-curve OID of secp256k1.
const SECP256K1_OID: ObjectIdentifier = ObjectIdentifier::new_unwrap("1.3.132.0.10");

/// A secp256k1 key pair, either half of which may be absent.
#[derive(Clone, Default)]
pub struct CurveKeyPair {
    secret: Option<SigningKey>,
    public: Option<VerifyingKey>,
}

impl CurveKeyPair {
    /// An empty key pair.
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a key pair from a raw 32-byte secret.
    pub fn from_secret_bytes(bytes: &[u8; SECRET_KEY_SIZE]) -> Result<Self, CryptoError> {
        let mut pair = Self::new();
        pair.set_secret_bytes(bytes)?;
        Ok(pair)
    }

    /// Build a public-only key pair.
    pub fn from_public_key(key: &PublicKey) -> Self {
        Self {
            secret: None,
            public: Some(key.verifying_key().clone()),
        }
    }

    /// Whether a secret scalar is loaded.
    pub fn has_secret(&self) -> bool {
        self.secret.is_some()
    }

    /// Load a raw secret scalar and recompute the public point.
    ///
    /// Fails without touching `self` when the bytes are zero or not below the
    /// curve order.
    pub fn set_secret_bytes(&mut self, bytes: &[u8; SECRET_KEY_SIZE]) -> Result<(), CryptoError> {
        let key = SigningKey::from_slice(bytes)
            .map_err(|_| CryptoError::InvalidSecretKey("scalar outside [1, n)".to_string()))?;
        self.public = Some(VerifyingKey::from(&key));
        self.secret = Some(key);
        Ok(())
    }

    /// Export the raw secret scalar.
    pub fn secret_bytes(&self) -> Result<Zeroizing<[u8; SECRET_KEY_SIZE]>, CryptoError> {
        let key = self.secret.as_ref().ok_or(CryptoError::MissingSecret)?;
        let mut repr = key.to_bytes();
        let mut out = Zeroizing::new([0u8; SECRET_KEY_SIZE]);
        out.copy_from_slice(&repr);
        repr.as_mut_slice().zeroize();
        Ok(out)
    }

    /// Export the secret as a SEC1 `ECPrivateKey` DER document.
    ///
    /// The embedded public key uses the requested encoding.
    pub fn private_key_der(&self, compressed: bool) -> Result<Zeroizing<Vec<u8>>, CryptoError> {
        let secret = self.secret_bytes()?;
        let public = self.public_key(compressed)?.to_bytes();
        let document = EcPrivateKey {
            private_key: secret.as_slice(),
            parameters: Some(EcParameters::NamedCurve(SECP256K1_OID)),
            public_key: Some(&public),
        };
        document
            .to_der()
            .map(Zeroizing::new)
            .map_err(|e| CryptoError::InvalidPrivateKeyEncoding(e.to_string()))
    }

    /// Import a SEC1 `ECPrivateKey` DER document.
    ///
    /// Unless `skip_check` is set the curve parameters and embedded public
    /// key, when present, must agree with the secret.
    pub fn set_private_key_der(&mut self, der: &[u8], skip_check: bool) -> Result<(), CryptoError> {
        let document = EcPrivateKey::from_der(der)
            .map_err(|e| CryptoError::InvalidPrivateKeyEncoding(e.to_string()))?;

        let raw = document.private_key;
        if raw.len() > SECRET_KEY_SIZE {
            return Err(CryptoError::InvalidPrivateKeyEncoding(format!(
                "private key is {} bytes",
                raw.len()
            )));
        }
        let mut secret = Zeroizing::new([0u8; SECRET_KEY_SIZE]);
        secret[SECRET_KEY_SIZE - raw.len()..].copy_from_slice(raw);

        let mut candidate = Self::new();
        candidate.set_secret_bytes(&secret)?;

        if !skip_check {
            if let Some(params) = document.parameters {
                if params.named_curve() != Some(SECP256K1_OID) {
                    return Err(CryptoError::InconsistentKey);
                }
            }
            if let Some(embedded) = document.public_key {
                let embedded = PublicKey::from_slice(embedded)
                    .map_err(|_| CryptoError::InconsistentKey)?;
                if candidate.public.as_ref() != Some(embedded.verifying_key()) {
                    return Err(CryptoError::InconsistentKey);
                }
            }
        }

        *self = candidate;
        Ok(())
    }

    /// The public point in the requested encoding.
    pub fn public_key(&self, compressed: bool) -> Result<PublicKey, CryptoError> {
        self.public
            .as_ref()
            .map(|key| PublicKey::new(key.clone(), compressed))
            .ok_or(CryptoError::MissingPublic)
    }

    /// Replace the public point. Any loaded secret is dropped.
    pub fn set_public_key(&mut self, key: &PublicKey) {
        self.secret = None;
        self.public = Some(key.verifying_key().clone());
    }

    fn sign_canonical(
        &self,
        hash: &[u8; HASH_SIZE],
        test_case: u32,
    ) -> Result<Signature, CryptoError> {
        let key = self.secret.as_ref().ok_or(CryptoError::MissingSecret)?;
        let signature: Signature = if test_case == 0 {
            key.sign_prehash(hash)
                .map_err(|e| CryptoError::SigningFailed(e.to_string()))?
        } else {
            // Extra nonce data: the test case little-endian, zero padded.
            let mut extra = [0u8; 32];
            extra[..4].copy_from_slice(&test_case.to_le_bytes());
            let scalar: &Scalar = key.as_nonzero_scalar().as_ref();
            let (signature, _) = scalar
                .try_sign_prehashed_rfc6979::<Sha256>(&FieldBytes::from(*hash), &extra)
                .map_err(|e| CryptoError::SigningFailed(e.to_string()))?;
            signature
        };
        enforce_low_s(signature)
    }

    /// Sign a 32-byte hash, returning a canonical (low-S) DER signature.
    pub fn sign(&self, hash: &[u8; HASH_SIZE]) -> Result<DerSignature, CryptoError> {
        self.sign_with_test_case(hash, 0)
    }

    /// Sign with a tweaked deterministic nonce.
    ///
    /// A non-zero `test_case` is fed to RFC 6979 as extra data, so each value
    /// yields a different, equally valid signature. `0` is plain [`sign`].
    ///
    /// [`sign`]: CurveKeyPair::sign
    pub fn sign_with_test_case(
        &self,
        hash: &[u8; HASH_SIZE],
        test_case: u32,
    ) -> Result<DerSignature, CryptoError> {
        self.sign_canonical(hash, test_case).map(|sig| to_der(&sig))
    }

    /// Verify a DER signature over a 32-byte hash.
    ///
    /// High-S signatures are accepted. Malformed input verifies as `false`.
    pub fn verify(&self, hash: &[u8; HASH_SIZE], der: &[u8]) -> bool {
        let Some(public) = self.public.as_ref() else {
            return false;
        };
        let Ok(signature) = Signature::from_der(der) else {
            return false;
        };
        let Ok(signature) = enforce_low_s(signature) else {
            return false;
        };
        public.verify_prehash(hash, &signature).is_ok()
    }

    /// Sign a 32-byte hash and find the recovery id of the result.
    ///
    /// Returns the raw `r || s` bytes and the recovery id. Every candidate id
    /// is tried until one recovers this key; a signature that recovers to no
    /// candidate means the engine is broken, which is fatal.
    pub fn sign_compact(&self, hash: &[u8; HASH_SIZE]) -> Result<([u8; 64], u8), CryptoError> {
        let signature = self.sign_canonical(hash, 0)?;
        let own = self.public.as_ref().ok_or(CryptoError::MissingPublic)?;

        for byte in 0u8..4 {
            let Some(recovery_id) = RecoveryId::from_byte(byte) else {
                continue;
            };
            if let Ok(candidate) = VerifyingKey::recover_from_prehash(hash, &signature, recovery_id)
            {
                if &candidate == own {
                    return Ok((to_raw(&signature), byte));
                }
            }
        }

        invariant_violation("compact signature does not recover its own key")
    }

    /// Recover the signer of a compact signature as a public-only key pair.
    ///
    /// Recovery ids outside `[0, 3)` are rejected. Success implies the
    /// signature is valid for the recovered key over `hash`.
    pub fn recover(
        hash: &[u8; HASH_SIZE],
        raw: &[u8; 64],
        recovery_id: u8,
    ) -> Result<Self, CryptoError> {
        if recovery_id >= 3 {
            return Err(CryptoError::InvalidRecoveryId(recovery_id));
        }
        let mut id =
            RecoveryId::from_byte(recovery_id).ok_or(CryptoError::InvalidRecoveryId(recovery_id))?;

        let signature = from_raw(raw)?;
        let canonical = enforce_low_s(signature)?;
        if canonical != signature {
            // (r, n - s) recovers the same key from the mirrored R.
            id = RecoveryId::new(!id.is_y_odd(), id.is_x_reduced());
        }

        let key = VerifyingKey::recover_from_prehash(hash, &canonical, id)
            .map_err(|_| CryptoError::RecoveryFailed)?;
        Ok(Self {
            secret: None,
            public: Some(key),
        })
    }

    /// Compute `(secret + tweak) mod n` over raw scalars.
    pub fn tweak_secret(
        secret: &[u8; SECRET_KEY_SIZE],
        tweak: &[u8; SECRET_KEY_SIZE],
    ) -> Result<Zeroizing<[u8; SECRET_KEY_SIZE]>, CryptoError> {
        let base = SigningKey::from_slice(secret)
            .map_err(|_| CryptoError::InvalidSecretKey("scalar outside [1, n)".to_string()))?;
        let tweak = scalar_from_bytes(tweak)?;

        let sum: Scalar = **base.as_nonzero_scalar() + tweak;
        if sum == Scalar::ZERO {
            return Err(CryptoError::TweakIdentity);
        }

        let mut repr = sum.to_repr();
        let mut out = Zeroizing::new([0u8; SECRET_KEY_SIZE]);
        out.copy_from_slice(&repr);
        repr.as_mut_slice().zeroize();
        Ok(out)
    }

    /// Replace the public point with `point + tweak * G`.
    ///
    /// The secret, if any, is dropped since it no longer matches.
    pub fn tweak_public(&mut self, tweak: &[u8; SECRET_KEY_SIZE]) -> Result<(), CryptoError> {
        let public = self.public.as_ref().ok_or(CryptoError::MissingPublic)?;
        let tweak = scalar_from_bytes(tweak)?;

        let point = ProjectivePoint::from(*public.as_affine()) + ProjectivePoint::GENERATOR * tweak;
        if point == ProjectivePoint::IDENTITY {
            return Err(CryptoError::TweakIdentity);
        }
        let tweaked = VerifyingKey::from_affine(point.to_affine())
            .map_err(|e| CryptoError::InvalidPublicKey(e.to_string()))?;

        self.secret = None;
        self.public = Some(tweaked);
        Ok(())
    }
}

fn scalar_from_bytes(bytes: &[u8; SECRET_KEY_SIZE]) -> Result<Scalar, CryptoError> {
    Option::<Scalar>::from(Scalar::from_repr(FieldBytes::from(*bytes))).ok_or(CryptoError::TweakOutOfRange)
}

impl fmt::Debug for CurveKeyPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CurveKeyPair")
            .field("secret", &self.secret.as_ref().map(|_| "[REDACTED]"))
            .field(
                "public",
                &self
                    .public
                    .as_ref()
                    .map(|key| PublicKey::new(key.clone(), true).to_hex()),
            )
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::signature::{check_signature_element, CURVE_ORDER};

    const ONE: [u8; 32] = {
        let mut out = [0u8; 32];
        out[31] = 1;
        out
    };

    // Compressed encodings of G and 2G.
    const G: &str = "0279be667ef9dcbbac55a06295ce870b07029bfcdb2dce28d959f2815b16f81798";
    const TWO_G: &str = "02c6047f9441ed7d6d3045406e95c07cd85c778e4b8cef3ca7abac09b95c709ee5";

    fn pair(byte: u8) -> CurveKeyPair {
        CurveKeyPair::from_secret_bytes(&[byte; 32]).unwrap()
    }

    #[test]
    fn test_secret_one_gives_generator() {
        let pair = CurveKeyPair::from_secret_bytes(&ONE).unwrap();
        assert_eq!(pair.public_key(true).unwrap().to_hex(), G);
        assert_eq!(*pair.secret_bytes().unwrap(), ONE);
    }

    #[test]
    fn test_secret_out_of_range() {
        assert!(CurveKeyPair::from_secret_bytes(&[0u8; 32]).is_err());
        assert!(CurveKeyPair::from_secret_bytes(&CURVE_ORDER).is_err());

        let mut pair = pair(3);
        let before = pair.public_key(true).unwrap();
        assert!(pair.set_secret_bytes(&[0u8; 32]).is_err());
        assert_eq!(pair.public_key(true).unwrap(), before);
    }

    #[test]
    fn test_empty_pair_reports_missing_halves() {
        let pair = CurveKeyPair::new();
        assert_eq!(pair.sign(&[1; 32]), Err(CryptoError::MissingSecret));
        assert_eq!(pair.public_key(true), Err(CryptoError::MissingPublic));
        assert!(!pair.verify(&[1; 32], &[0x30, 0x00]));
    }

    #[test]
    fn test_sign_and_verify() {
        let pair = pair(0x42);
        let hash = [0x5a; 32];
        let sig = pair.sign(&hash).unwrap();

        assert!(pair.verify(&hash, sig.as_bytes()));
        assert!(!pair.verify(&[0x5b; 32], sig.as_bytes()));
        assert!(!self::pair(0x43).verify(&hash, sig.as_bytes()));
    }

    #[test]
    fn test_verify_accepts_high_s() {
        let pair = pair(0x17);
        let hash = [0x99; 32];
        let der = pair.sign(&hash).unwrap();

        let low = Signature::from_der(der.as_bytes()).unwrap();
        let high = Signature::from_scalars(low.r(), -low.s()).unwrap();
        let high_der = to_der(&high);

        assert!(!crate::signature::is_low_s(high_der.as_bytes()));
        assert!(pair.verify(&hash, high_der.as_bytes()));
    }

    #[test]
    fn test_test_cases_tweak_the_nonce() {
        let pair = pair(0x3c);
        let hash = [0x6e; 32];

        assert_eq!(
            pair.sign_with_test_case(&hash, 0).unwrap(),
            pair.sign(&hash).unwrap()
        );

        let mut seen = vec![pair.sign(&hash).unwrap()];
        for test_case in 1..16u32 {
            let sig = pair.sign_with_test_case(&hash, test_case).unwrap();
            assert!(pair.verify(&hash, sig.as_bytes()));
            assert!(crate::signature::is_low_s(sig.as_bytes()));
            assert!(!seen.contains(&sig));
            assert_eq!(sig, pair.sign_with_test_case(&hash, test_case).unwrap());
            seen.push(sig);
        }
    }

    #[test]
    fn test_signatures_are_deterministic() {
        let pair = pair(0x21);
        assert_eq!(pair.sign(&[7; 32]).unwrap(), pair.sign(&[7; 32]).unwrap());
    }

    #[test]
    fn test_sign_compact_recovers_own_key() {
        let pair = pair(0x64);
        let hash = [0x01; 32];
        let (raw, recid) = pair.sign_compact(&hash).unwrap();
        assert!(recid < 2);
        assert!(check_signature_element(&raw[32..], true));

        let recovered = CurveKeyPair::recover(&hash, &raw, recid).unwrap();
        assert_eq!(
            recovered.public_key(true).unwrap(),
            pair.public_key(true).unwrap()
        );
        assert!(!recovered.has_secret());
    }

    #[test]
    fn test_recover_rejects_out_of_range_id() {
        let pair = pair(0x64);
        let hash = [0x01; 32];
        let (raw, _) = pair.sign_compact(&hash).unwrap();

        assert_eq!(
            CurveKeyPair::recover(&hash, &raw, 4).unwrap_err(),
            CryptoError::InvalidRecoveryId(4)
        );
        assert_eq!(
            CurveKeyPair::recover(&hash, &raw, 3).unwrap_err(),
            CryptoError::InvalidRecoveryId(3)
        );
    }

    #[test]
    fn test_recover_wrong_hash_yields_other_key() {
        let pair = pair(0x64);
        let (raw, recid) = pair.sign_compact(&[0x01; 32]).unwrap();
        let own = pair.public_key(true).unwrap();

        if let Ok(other) = CurveKeyPair::recover(&[0x02; 32], &raw, recid) {
            assert_ne!(other.public_key(true).unwrap(), own);
        }
    }

    #[test]
    fn test_recover_high_s_twin() {
        let pair = pair(0x31);
        let hash = [0x44; 32];
        let (raw, recid) = pair.sign_compact(&hash).unwrap();

        let low = Signature::from_slice(&raw).unwrap();
        let high = Signature::from_scalars(low.r(), -low.s()).unwrap();
        let twin_id = recid ^ 1;

        let recovered = CurveKeyPair::recover(&hash, &to_raw(&high), twin_id).unwrap();
        assert_eq!(
            recovered.public_key(true).unwrap(),
            pair.public_key(true).unwrap()
        );
    }

    #[test]
    fn test_recover_rejects_zero_r() {
        let mut raw = [0u8; 64];
        raw[63] = 1;
        assert!(CurveKeyPair::recover(&[1; 32], &raw, 0).is_err());
    }

    #[test]
    fn test_private_key_der_roundtrip() {
        let original = pair(0x2b);
        for compressed in [true, false] {
            let der = original.private_key_der(compressed).unwrap();

            let mut restored = CurveKeyPair::new();
            restored.set_private_key_der(&der, false).unwrap();
            assert_eq!(
                *restored.secret_bytes().unwrap(),
                *original.secret_bytes().unwrap()
            );
        }
    }

    #[test]
    fn test_private_key_der_mismatched_public() {
        let first = pair(0x2b);
        let second = pair(0x2c);
        let public = second.public_key(true).unwrap().to_bytes();
        let secret = first.secret_bytes().unwrap();

        let document = EcPrivateKey {
            private_key: secret.as_slice(),
            parameters: Some(EcParameters::NamedCurve(SECP256K1_OID)),
            public_key: Some(&public),
        };
        let der = document.to_der().unwrap();

        let mut target = CurveKeyPair::new();
        assert_eq!(
            target.set_private_key_der(&der, false),
            Err(CryptoError::InconsistentKey)
        );
        assert!(!target.has_secret());

        target.set_private_key_der(&der, true).unwrap();
        assert_eq!(*target.secret_bytes().unwrap(), *secret);
    }

    #[test]
    fn test_private_key_der_short_scalar_is_padded() {
        let document = EcPrivateKey {
            private_key: &[0x01],
            parameters: None,
            public_key: None,
        };
        let der = document.to_der().unwrap();

        let mut target = CurveKeyPair::new();
        target.set_private_key_der(&der, false).unwrap();
        assert_eq!(target.public_key(true).unwrap().to_hex(), G);
    }

    #[test]
    fn test_private_key_der_garbage() {
        let mut target = CurveKeyPair::new();
        assert!(matches!(
            target.set_private_key_der(&[0x30, 0x03, 0x02, 0x01, 0x01], false),
            Err(CryptoError::InvalidPrivateKeyEncoding(_))
        ));
    }

    #[test]
    fn test_tweak_secret_adds_mod_n() {
        let sum = CurveKeyPair::tweak_secret(&ONE, &ONE).unwrap();
        let mut two = [0u8; 32];
        two[31] = 2;
        assert_eq!(*sum, two);

        let mut n_minus_one = CURVE_ORDER;
        n_minus_one[31] -= 1;
        let wrapped = CurveKeyPair::tweak_secret(&n_minus_one, &two).unwrap();
        assert_eq!(*wrapped, ONE);
    }

    #[test]
    fn test_tweak_secret_failures() {
        assert_eq!(
            CurveKeyPair::tweak_secret(&ONE, &CURVE_ORDER).unwrap_err(),
            CryptoError::TweakOutOfRange
        );

        let mut n_minus_one = CURVE_ORDER;
        n_minus_one[31] -= 1;
        assert_eq!(
            CurveKeyPair::tweak_secret(&n_minus_one, &ONE).unwrap_err(),
            CryptoError::TweakIdentity
        );
    }

    #[test]
    fn test_tweak_public_matches_tweak_secret() {
        let base = pair(0x0f);
        let tweak = [0x33; 32];

        let child_secret =
            CurveKeyPair::tweak_secret(&base.secret_bytes().unwrap(), &tweak).unwrap();
        let expected = CurveKeyPair::from_secret_bytes(&child_secret).unwrap();

        let mut public_only = base.clone();
        public_only.tweak_public(&tweak).unwrap();

        assert!(!public_only.has_secret());
        assert_eq!(
            public_only.public_key(true).unwrap(),
            expected.public_key(true).unwrap()
        );
    }

    #[test]
    fn test_tweak_public_generator() {
        let mut pair = CurveKeyPair::from_public_key(&PublicKey::from_hex(G).unwrap());
        pair.tweak_public(&ONE).unwrap();
        assert_eq!(pair.public_key(true).unwrap().to_hex(), TWO_G);
    }

    #[test]
    fn test_tweak_public_to_identity() {
        let mut n_minus_one = CURVE_ORDER;
        n_minus_one[31] -= 1;

        let mut pair = CurveKeyPair::from_public_key(&PublicKey::from_hex(G).unwrap());
        let before = pair.public_key(true).unwrap();
        assert_eq!(
            pair.tweak_public(&n_minus_one),
            Err(CryptoError::TweakIdentity)
        );
        assert_eq!(pair.public_key(true).unwrap(), before);
        assert_eq!(
            pair.tweak_public(&CURVE_ORDER),
            Err(CryptoError::TweakOutOfRange)
        );
    }

    #[test]
    fn test_set_public_key_drops_secret() {
        let mut pair = pair(0x05);
        let other = PublicKey::from_hex(G).unwrap();
        pair.set_public_key(&other);

        assert!(!pair.has_secret());
        assert_eq!(pair.public_key(true).unwrap(), other);
    }

    #[test]
    fn test_debug_hides_secret() {
        let out = format!("{:?}", pair(0xab));
        assert!(out.contains("REDACTED"));
        assert!(!out.contains(&"ab".repeat(32)));
    }
}
