//! Canonical (low-S) ECDSA signatures and the compact recoverable encoding.

use std::cmp::Ordering;

use k256::ecdsa::Signature;

use crate::keypair::{CurveKeyPair, HASH_SIZE};
use crate::{CompactSignature, CryptoError, DerSignature, PublicKey, COMPACT_SIGNATURE_SIZE};

/// The secp256k1 group order `n`, big-endian.
pub const CURVE_ORDER: [u8; 32] = [
    0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFE,
    0xBA, 0xAE, 0xDC, 0xE6, 0xAF, 0x48, 0xA0, 0x3B, 0xBF, 0xD2, 0x5E, 0x8C, 0xD0, 0x36, 0x41, 0x41,
];

/// `n / 2` rounded down, big-endian. Canonical signatures have `s <= HALF_ORDER`.
pub const HALF_CURVE_ORDER: [u8; 32] = [
    0x7F, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF,
    0x5D, 0x57, 0x6E, 0x73, 0x57, 0xA4, 0x50, 0x1D, 0xDF, 0xE9, 0x2F, 0x46, 0x68, 0x1B, 0x20, 0xA0,
];

/// Lowest compact header byte (recovery id 0, uncompressed key).
pub const COMPACT_HEADER_BASE: u8 = 27;

/// Added to the compact header when the signer's key is compressed.
pub const COMPACT_HEADER_COMPRESSED: u8 = 4;

/// Compare two big-endian unsigned integers of arbitrary width.
fn compare_big_endian(a: &[u8], b: &[u8]) -> Ordering {
    let a = strip_leading_zeros(a);
    let b = strip_leading_zeros(b);
    a.len().cmp(&b.len()).then_with(|| a.cmp(b))
}

fn strip_leading_zeros(bytes: &[u8]) -> &[u8] {
    let start = bytes.iter().position(|&b| b != 0).unwrap_or(bytes.len());
    &bytes[start..]
}

/// Check that a raw `r` or `s` value is in `[1, n)`, or `[1, n/2]` when
/// `half` is set. The value is big-endian and may carry leading zeros.
pub fn check_signature_element(bytes: &[u8], half: bool) -> bool {
    if strip_leading_zeros(bytes).is_empty() {
        return false;
    }
    if half {
        compare_big_endian(bytes, &HALF_CURVE_ORDER) != Ordering::Greater
    } else {
        compare_big_endian(bytes, &CURVE_ORDER) == Ordering::Less
    }
}

/// Whether 32 big-endian bytes form a usable secret scalar, i.e. `1 <= d < n`.
pub fn is_valid_scalar(bytes: &[u8; 32]) -> bool {
    check_signature_element(bytes, false)
}

/// Rewrite a signature into its low-S form.
///
/// `(r, s)` and `(r, n - s)` verify identically, so any signature with
/// `s > n/2` is replaced by its twin. Signatures that are already canonical
/// come back unchanged.
pub fn enforce_low_s(signature: Signature) -> Result<Signature, CryptoError> {
    let bytes = signature.to_bytes();
    if check_signature_element(&bytes[32..], true) {
        return Ok(signature);
    }
    let r = signature.r();
    let s = -signature.s();
    log::debug!("Normalizing high-S signature");
    Signature::from_scalars(r, s)
        .map_err(|e| CryptoError::SigningFailed(format!("low-S rewrite failed: {}", e)))
}

/// Whether a DER signature is well formed and canonical.
pub fn is_low_s(der: &[u8]) -> bool {
    match Signature::from_der(der) {
        Ok(sig) => check_signature_element(&sig.to_bytes()[32..], true),
        Err(_) => false,
    }
}

/// Encode a signature as DER.
pub fn to_der(signature: &Signature) -> DerSignature {
    DerSignature::new(signature.to_der().as_bytes().to_vec())
}

/// Split a 64-byte `r || s` buffer into a signature, rejecting zero or
/// out-of-range components.
pub fn from_raw(raw: &[u8; 64]) -> Result<Signature, CryptoError> {
    if !check_signature_element(&raw[..32], false) || !check_signature_element(&raw[32..], false)
    {
        return Err(CryptoError::InvalidSignature(
            "r or s outside [1, n)".to_string(),
        ));
    }
    Ok(Signature::from_slice(raw)?)
}

/// The 64-byte `r || s` form of a signature.
pub fn to_raw(signature: &Signature) -> [u8; 64] {
    let mut out = [0u8; 64];
    out.copy_from_slice(&signature.to_bytes());
    out
}

/// Build a compact signature from its raw parts.
pub fn encode_compact(
    raw: &[u8; 64],
    recovery_id: u8,
    compressed: bool,
) -> Result<CompactSignature, CryptoError> {
    if recovery_id >= COMPACT_HEADER_COMPRESSED {
        return Err(CryptoError::InvalidRecoveryId(recovery_id));
    }
    let mut out = [0u8; COMPACT_SIGNATURE_SIZE];
    out[0] = COMPACT_HEADER_BASE
        + recovery_id
        + if compressed { COMPACT_HEADER_COMPRESSED } else { 0 };
    out[1..].copy_from_slice(raw);
    Ok(CompactSignature(out))
}

/// Split a compact signature into `(r || s, recovery id, compressed)`.
pub fn decode_compact(sig: &CompactSignature) -> Result<([u8; 64], u8, bool), CryptoError> {
    let header = sig.0[0];
    if !(COMPACT_HEADER_BASE..COMPACT_HEADER_BASE + 8).contains(&header) {
        return Err(CryptoError::InvalidSignature(format!(
            "Invalid compact header byte {:#04x}",
            header
        )));
    }
    let offset = header - COMPACT_HEADER_BASE;
    let compressed = offset >= COMPACT_HEADER_COMPRESSED;
    let recovery_id = offset % COMPACT_HEADER_COMPRESSED;
    let mut raw = [0u8; 64];
    raw.copy_from_slice(&sig.0[1..]);
    Ok((raw, recovery_id, compressed))
}

impl CompactSignature {
    /// The recovery id carried in the header.
    pub fn recovery_id(&self) -> Result<u8, CryptoError> {
        decode_compact(self).map(|(_, recid, _)| recid)
    }

    /// Whether the signer's key is expected in compressed form.
    pub fn is_compressed(&self) -> Result<bool, CryptoError> {
        decode_compact(self).map(|(_, _, compressed)| compressed)
    }

    /// Recover the signer's public key, in the encoding the header asks for.
    pub fn recover(&self, hash: &[u8; HASH_SIZE]) -> Result<PublicKey, CryptoError> {
        let (raw, recovery_id, compressed) = decode_compact(self)?;
        CurveKeyPair::recover(hash, &raw, recovery_id)?.public_key(compressed)
    }
}
