//! secp256k1 Curve Engine Binding
//!
//! This crate binds secp256k1 key pairs to the `k256` engine and provides
//! the signature rules every key operation relies on.
//!
//! # Overview
//!
//! - [`CurveKeyPair`]: raw secret and public halves, signing, verification,
//!   public-key recovery, scalar and point tweaks
//! - Canonical (low-S) DER signatures and the 65-byte compact recoverable form
//! - [`EccContext`]: the process-wide engine lifecycle and randomness source
//! - [`LockedBytes`]: pinned, self-erasing storage for secret bytes
//! - Hash primitives for derivation and fingerprints
//!
//! # Example
//!
//! ```rust
//! use coinkey_crypto::{sha256, CurveKeyPair, EccConfig, EccContext};
//!
//! let ctx = EccContext::start(EccConfig::default()).unwrap();
//! let secret = ctx.random_scalar().unwrap();
//! let pair = CurveKeyPair::from_secret_bytes(&secret).unwrap();
//!
//! let hash = sha256(b"Hello, secp256k1!");
//! let signature = pair.sign(&hash).unwrap();
//! assert!(pair.verify(&hash, signature.as_bytes()));
//!
//! let (raw, recovery_id) = pair.sign_compact(&hash).unwrap();
//! let signer = CurveKeyPair::recover(&hash, &raw, recovery_id).unwrap();
//! assert_eq!(signer.public_key(true).unwrap(), pair.public_key(true).unwrap());
//! ctx.stop();
//! ```

mod context;
mod error;
mod hash;
mod keypair;
mod secure;
mod signature;
mod types;

pub use context::{EccConfig, EccContext};
pub use error::{invariant_violation, ConfigError, ContextError, CryptoError};
pub use hash::{double_sha256, hash160, hmac_sha512, sha256};
pub use keypair::{CurveKeyPair, HASH_SIZE, SECRET_KEY_SIZE};
pub use secure::{memory_lock_enabled, set_memory_lock_enabled, LockedBytes};
pub use signature::{
    check_signature_element, decode_compact, encode_compact, enforce_low_s, is_low_s,
    is_valid_scalar, CURVE_ORDER, HALF_CURVE_ORDER,
};
pub use types::{
    CompactSignature, DerSignature, PublicKey, COMPACT_SIGNATURE_SIZE,
    COMPRESSED_PUBLIC_KEY_SIZE, MAX_DER_SIGNATURE_SIZE, PUBLIC_KEY_SIZE,
};

#[cfg(test)]
mod tests;
