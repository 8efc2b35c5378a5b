//! Private Keys and Hierarchical Deterministic Derivation
//!
//! This crate implements secp256k1 private keys and the tree of keys derived
//! from a single seed.
//!
//! # Overview
//!
//! A master node is derived from a seed with HMAC-SHA512. Each node derives
//! children by index:
//! ```text
//! I = HMAC-SHA512(chain_code, 0x00 || k || index)   hardened (index >= 2^31)
//! I = HMAC-SHA512(chain_code, K || index)           normal
//! child_k = (k + I[..32]) mod n
//! child_chain_code = I[32..]
//! ```
//! Where:
//! - `k` = parent private key
//! - `K` = parent compressed public key
//! - `n` = curve order
//!
//! Normal children can also be derived from the public node alone, since
//! `child_K = K + I[..32]*G`.
//!
//! # Example
//!
//! ```rust
//! use coinkey_keys::{DerivationPath, ExtendedKey};
//!
//! let master = ExtendedKey::from_seed(&[0u8; 16]).unwrap();
//! let path: DerivationPath = "m/0'/1".parse().unwrap();
//! let leaf = master.derive_path(&path).unwrap();
//!
//! // The public branch derives the same normal children.
//! let account = master.derive(0x8000_0000).unwrap().neuter().unwrap();
//! assert_eq!(account.derive(1).unwrap(), leaf.neuter().unwrap());
//! ```

mod error;
mod extended;
mod path;
mod secret_key;
mod serialization;
mod types;

pub use error::KeyError;
pub use extended::{
    ExtendedKey, ExtendedPublicKey, EXTENDED_KEY_SIZE, FINGERPRINT_SIZE, MASTER_SEED_KEY,
};
pub use path::DerivationPath;
pub use secret_key::SecretKey;
pub use serialization::{read_compact_size, write_compact_size, PRIVATE_VERSION, PUBLIC_VERSION};
pub use types::{is_hardened, ChainCode, CHAIN_CODE_SIZE, HARDENED_BIT};
