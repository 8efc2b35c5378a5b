//! Error types for key operations.

use coinkey_crypto::CryptoError;
use thiserror::Error;

/// Errors that can occur during key operations.
#[derive(Debug, Error)]
pub enum KeyError {
    /// A curve operation failed.
    #[error(transparent)]
    Crypto(#[from] CryptoError),

    /// Reading or writing a framed record failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A byte buffer has the wrong length.
    #[error("Invalid length: expected {expected}, got {actual}")]
    InvalidLength { expected: usize, actual: usize },

    /// The key is not valid, or not loaded.
    #[error("Invalid secret key")]
    InvalidSecretKey,

    /// Hardened children need the parent's private key.
    #[error("Cannot derive hardened child {0:#010x} from a public key")]
    HardenedFromPublic(u32),

    /// The tweak for this child index was unusable; try the next index.
    #[error("Derivation of child {0:#010x} failed")]
    DerivationFailed(u32),

    /// The 74-byte extended key layout is malformed.
    #[error("Invalid extended key encoding: {0}")]
    InvalidEncoding(String),

    /// The string is not valid Base58.
    #[error("Invalid Base58: {0}")]
    InvalidBase58(String),

    /// The Base58Check checksum does not match.
    #[error("Invalid checksum")]
    InvalidChecksum,

    /// The version prefix is not a known extended key version.
    #[error("Invalid version: {0:#010x}")]
    InvalidVersion(u32),

    /// The derivation path could not be parsed.
    #[error("Invalid derivation path: {0}")]
    InvalidPath(String),

    /// The supplied public key does not belong to the secret.
    #[error("Public key does not match the secret key")]
    PublicKeyMismatch,
}
