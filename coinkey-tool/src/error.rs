//! Error types for the tool.

use coinkey_crypto::{ConfigError, ContextError, CryptoError};
use coinkey_keys::KeyError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ToolError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Engine error: {0}")]
    Context(#[from] ContextError),

    #[error("Crypto error: {0}")]
    Crypto(#[from] CryptoError),

    #[error("Key error: {0}")]
    Key(#[from] KeyError),
}
