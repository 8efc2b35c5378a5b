//! Error types for curve operations.

use thiserror::Error;

/// Errors that can occur during curve operations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CryptoError {
    /// A byte buffer has the wrong length.
    #[error("Invalid length: expected {expected}, got {actual}")]
    InvalidLength { expected: usize, actual: usize },

    /// The secret scalar is zero or not below the curve order.
    #[error("Invalid secret key: {0}")]
    InvalidSecretKey(String),

    /// The public key encoding is not a point on the curve.
    #[error("Invalid public key: {0}")]
    InvalidPublicKey(String),

    /// The signature has an invalid length or format.
    #[error("Invalid signature: {0}")]
    InvalidSignature(String),

    /// The recovery id is outside the accepted range.
    #[error("Invalid recovery id: {0}")]
    InvalidRecoveryId(u8),

    /// The private key blob could not be parsed.
    #[error("Invalid private key encoding: {0}")]
    InvalidPrivateKeyEncoding(String),

    /// The private key blob parsed but failed the consistency check.
    #[error("Private key blob failed the consistency check")]
    InconsistentKey,

    /// The tweak is not below the curve order.
    #[error("Tweak is not below the curve order")]
    TweakOutOfRange,

    /// The tweaked scalar is zero or the tweaked point is the identity.
    #[error("Tweak produced the identity")]
    TweakIdentity,

    /// The operation needs a secret key and none is loaded.
    #[error("No secret key loaded")]
    MissingSecret,

    /// The operation needs a public key and none is loaded.
    #[error("No public key loaded")]
    MissingPublic,

    /// The engine refused to produce a signature.
    #[error("Signing failed: {0}")]
    SigningFailed(String),

    /// No public key could be recovered from the signature.
    #[error("Public key recovery failed")]
    RecoveryFailed,

    /// The HMAC could not be keyed.
    #[error("Hash computation failed: {0}")]
    HashError(String),

    /// The operating system randomness source failed.
    #[error("Randomness source failed: {0}")]
    RandomnessError(String),
}

impl From<k256::ecdsa::Error> for CryptoError {
    fn from(err: k256::ecdsa::Error) -> Self {
        CryptoError::InvalidSignature(err.to_string())
    }
}

/// Errors raised while loading configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// Errors raised by the engine lifecycle.
#[derive(Debug, Error)]
pub enum ContextError {
    /// `start` was called while a context is already running.
    #[error("Curve engine is already running")]
    AlreadyRunning,

    /// The start-up self test did not pass.
    #[error("Curve engine sanity check failed: {0}")]
    SanityCheckFailed(#[source] CryptoError),

    #[error(transparent)]
    Config(#[from] ConfigError),
}

/// Abort on a broken engine invariant.
///
/// Used where continuing would hand out a value whose correctness cannot be
/// trusted, e.g. a compact signature whose own key cannot be recovered.
#[cold]
#[track_caller]
pub fn invariant_violation(what: &str) -> ! {
    log::error!("Curve engine invariant violated: {}", what);
    panic!("curve engine invariant violated: {what}");
}
