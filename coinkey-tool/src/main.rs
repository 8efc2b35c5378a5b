//! coinkey
//!
//! Derives a hierarchical key from a seed and prints the master and leaf
//! nodes. Optionally signs a message with the leaf key.

mod config;
mod error;

use coinkey_crypto::{sha256, EccContext};
use coinkey_keys::ExtendedKey;
use zeroize::Zeroizing;

use config::ToolConfig;
use error::ToolError;

const GENERATED_SEED_SIZE: usize = 32;

fn main() -> Result<(), ToolError> {
    // Initialize logging
    env_logger::init();
    log::info!("Starting coinkey...");

    let ctx = EccContext::from_env()?;
    let config = ToolConfig::from_env()?;
    log::info!("Loaded configuration: path={}", config.path);

    let seed = match config.seed.clone() {
        Some(seed) => seed,
        None => {
            log::info!("No COINKEY_SEED set, generating a random seed");
            let mut seed = Zeroizing::new(vec![0u8; GENERATED_SEED_SIZE]);
            ctx.fill_random(&mut seed)?;
            println!("seed:        {}", hex::encode(seed.as_slice()));
            seed
        }
    };

    let master = ExtendedKey::from_seed(&seed)?;
    let leaf = master.derive_path(&config.path)?;
    let leaf_public = leaf.neuter()?;

    println!("master xpub: {}", master.neuter()?);
    println!("path:        {}", config.path);
    println!("leaf xpub:   {}", leaf_public);
    println!("leaf key:    {}", leaf_public.public_key().to_hex());
    println!("leaf id:     {}", hex::encode(leaf_public.identifier()));

    if let Some(message) = &config.message {
        let hash = sha256(message.as_bytes());
        let der = leaf.secret_key().sign(&hash)?;
        let compact = leaf.secret_key().sign_compact(&hash)?;
        println!("signature:   {}", der.to_hex());
        println!("compact:     {}", compact.to_hex());
    }

    ctx.stop();
    Ok(())
}
