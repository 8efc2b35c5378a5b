//! Tool configuration.

use std::env;

use coinkey_crypto::ConfigError;
use coinkey_keys::DerivationPath;
use zeroize::Zeroizing;

/// Tool configuration loaded from environment.
#[derive(Clone)]
pub struct ToolConfig {
    /// Seed bytes; a random seed is drawn when absent.
    pub seed: Option<Zeroizing<Vec<u8>>>,
    /// Path of the leaf key below the master.
    pub path: DerivationPath,
    /// Text to sign with the leaf key.
    pub message: Option<String>,
}

impl ToolConfig {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        let seed = match env::var("COINKEY_SEED") {
            Ok(hex_seed) => Some(Zeroizing::new(
                hex::decode(hex_seed.trim())
                    .map_err(|_| ConfigError::Invalid("COINKEY_SEED".to_string()))?,
            )),
            Err(_) => None,
        };
        if let Some(seed) = &seed {
            if !(16..=64).contains(&seed.len()) {
                return Err(ConfigError::Invalid(
                    "COINKEY_SEED must be 16 to 64 bytes".to_string(),
                ));
            }
        }

        Ok(Self {
            seed,
            path: env::var("COINKEY_PATH")
                .unwrap_or_else(|_| "m/0'/0".to_string())
                .parse()
                .map_err(|_| ConfigError::Invalid("COINKEY_PATH".to_string()))?,
            message: env::var("COINKEY_MESSAGE").ok(),
        })
    }
}
