//! Process-wide lifecycle of the curve engine.

use std::env;
use std::sync::atomic::{AtomicBool, Ordering};

use rand::rngs::OsRng;
use rand::RngCore;
use zeroize::Zeroizing;

use crate::error::{ConfigError, ContextError, CryptoError};
use crate::hash::sha256;
use crate::keypair::{CurveKeyPair, SECRET_KEY_SIZE};
use crate::secure::set_memory_lock_enabled;
use crate::signature::is_valid_scalar;

static RUNNING: AtomicBool = AtomicBool::new(false);

/// Draws allowed before giving up on a random scalar. A single retry already
/// has probability below 2^-127.
const MAX_SCALAR_ATTEMPTS: usize = 64;

/// Engine configuration loaded from environment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EccConfig {
    /// Pin secret buffers in memory.
    pub memory_lock: bool,
    /// Run the sign/verify/recover self test on start.
    pub sanity_check: bool,
}

impl Default for EccConfig {
    fn default() -> Self {
        Self {
            memory_lock: true,
            sanity_check: true,
        }
    }
}

impl EccConfig {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Ok(Self {
            memory_lock: env::var("COINKEY_MEMORY_LOCK")
                .unwrap_or_else(|_| "true".to_string())
                .parse()
                .map_err(|_| ConfigError::Invalid("COINKEY_MEMORY_LOCK".to_string()))?,
            sanity_check: env::var("COINKEY_SANITY_CHECK")
                .unwrap_or_else(|_| "true".to_string())
                .parse()
                .map_err(|_| ConfigError::Invalid("COINKEY_SANITY_CHECK".to_string()))?,
        })
    }
}

/// Handle to the running curve engine.
///
/// At most one context exists per process. It is torn down by [`stop`] or
/// when dropped, after which a new one may be started.
///
/// [`stop`]: EccContext::stop
#[derive(Debug)]
pub struct EccContext {
    config: EccConfig,
}

impl EccContext {
    /// Start the engine.
    pub fn start(config: EccConfig) -> Result<Self, ContextError> {
        Self::start_with_check(config, Self::sanity_check)
    }

    fn start_with_check<F>(config: EccConfig, check: F) -> Result<Self, ContextError>
    where
        F: FnOnce(&Self) -> Result<(), CryptoError>,
    {
        if RUNNING
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            log::warn!("Refusing to start a second curve engine context");
            return Err(ContextError::AlreadyRunning);
        }

        let context = Self { config };

        if context.config.sanity_check {
            // Dropping `context` on failure releases the running flag.
            check(&context).map_err(ContextError::SanityCheckFailed)?;
        }
        set_memory_lock_enabled(context.config.memory_lock);

        log::info!(
            "Curve engine started (memory_lock={}, sanity_check={})",
            context.config.memory_lock,
            context.config.sanity_check
        );
        Ok(context)
    }

    /// Start the engine with configuration read from the environment.
    pub fn from_env() -> Result<Self, ContextError> {
        Self::start(EccConfig::from_env()?)
    }

    /// Tear the engine down.
    pub fn stop(self) {
        drop(self);
    }

    /// Whether a context is currently running in this process.
    pub fn is_running() -> bool {
        RUNNING.load(Ordering::SeqCst)
    }

    /// The configuration this context was started with.
    pub fn config(&self) -> &EccConfig {
        &self.config
    }

    /// Fill `buf` from the operating system's secure randomness source.
    pub fn fill_random(&self, buf: &mut [u8]) -> Result<(), CryptoError> {
        OsRng
            .try_fill_bytes(buf)
            .map_err(|e| CryptoError::RandomnessError(e.to_string()))
    }

    /// Draw a uniformly random scalar in `[1, n)`.
    pub fn random_scalar(&self) -> Result<Zeroizing<[u8; SECRET_KEY_SIZE]>, CryptoError> {
        let mut candidate = Zeroizing::new([0u8; SECRET_KEY_SIZE]);
        for _ in 0..MAX_SCALAR_ATTEMPTS {
            self.fill_random(candidate.as_mut_slice())?;
            if is_valid_scalar(&candidate) {
                return Ok(candidate);
            }
        }
        Err(CryptoError::RandomnessError(
            "no valid scalar drawn".to_string(),
        ))
    }

    fn sanity_check(&self) -> Result<(), CryptoError> {
        let secret = self.random_scalar()?;
        let pair = CurveKeyPair::from_secret_bytes(&secret)?;
        let hash = sha256(b"coinkey engine self test");

        let der = pair.sign(&hash)?;
        if !pair.verify(&hash, der.as_bytes()) {
            return Err(CryptoError::InvalidSignature(
                "self-signed signature does not verify".to_string(),
            ));
        }

        let (raw, recovery_id) = pair.sign_compact(&hash)?;
        let recovered = CurveKeyPair::recover(&hash, &raw, recovery_id)?;
        if recovered.public_key(true)? != pair.public_key(true)? {
            return Err(CryptoError::RecoveryFailed);
        }

        log::debug!("Curve engine self test passed");
        Ok(())
    }
}

impl Drop for EccContext {
    fn drop(&mut self) {
        RUNNING.store(false, Ordering::SeqCst);
        log::info!("Curve engine stopped");
    }
}
