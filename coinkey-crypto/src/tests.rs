//! Integration tests for the coinkey-crypto crate.

use rand::rngs::OsRng;
use rand::RngCore;

use crate::context::tests::serial;
use crate::*;

fn random_pair() -> CurveKeyPair {
    loop {
        let mut secret = [0u8; 32];
        OsRng.fill_bytes(&mut secret);
        if let Ok(pair) = CurveKeyPair::from_secret_bytes(&secret) {
            return pair;
        }
    }
}

fn random_hash() -> [u8; 32] {
    let mut hash = [0u8; 32];
    OsRng.fill_bytes(&mut hash);
    hash
}

#[test]
fn test_signatures_are_always_low_s() {
    for _ in 0..1000 {
        let pair = random_pair();
        let hash = random_hash();
        let der = pair.sign(&hash).unwrap();

        assert!(is_low_s(der.as_bytes()));
        assert!(der.as_bytes().len() <= MAX_DER_SIGNATURE_SIZE);
        assert!(pair.verify(&hash, der.as_bytes()));
    }
}

#[test]
fn test_compact_roundtrip_random_keys() {
    for _ in 0..100 {
        let pair = random_pair();
        let hash = random_hash();
        let (raw, recovery_id) = pair.sign_compact(&hash).unwrap();

        let recovered = CurveKeyPair::recover(&hash, &raw, recovery_id).unwrap();
        assert_eq!(
            recovered.public_key(true).unwrap(),
            pair.public_key(true).unwrap()
        );
    }
}

#[test]
fn test_compact_signature_recover_honours_header() {
    let pair = random_pair();
    let hash = sha256(b"compact header");
    let (raw, recovery_id) = pair.sign_compact(&hash).unwrap();

    let compressed = encode_compact(&raw, recovery_id, true).unwrap();
    let signer = compressed.recover(&hash).unwrap();
    assert!(signer.is_compressed());
    assert_eq!(signer, pair.public_key(true).unwrap());

    let uncompressed = encode_compact(&raw, recovery_id, false).unwrap();
    let signer = uncompressed.recover(&hash).unwrap();
    assert_eq!(signer.to_bytes().len(), PUBLIC_KEY_SIZE);
    assert_eq!(signer, pair.public_key(false).unwrap());
}

#[test]
fn test_compact_signature_serde() {
    let pair = random_pair();
    let hash = random_hash();
    let (raw, recovery_id) = pair.sign_compact(&hash).unwrap();
    let sig = encode_compact(&raw, recovery_id, true).unwrap();

    let json = serde_json::to_string(&sig).unwrap();
    let back: CompactSignature = serde_json::from_str(&json).unwrap();
    assert_eq!(back, sig);
    assert_eq!(CompactSignature::from_hex(&sig.to_hex()).unwrap(), sig);
}

#[test]
fn test_der_signature_serde() {
    let pair = random_pair();
    let der = pair.sign(&random_hash()).unwrap();

    let json = serde_json::to_string(&der).unwrap();
    assert_eq!(json, format!("\"{}\"", der.to_hex()));

    let back: DerSignature = serde_json::from_str(&json).unwrap();
    assert_eq!(back, der);
}

#[test]
fn test_tweaks_commute_with_public_derivation() {
    for _ in 0..20 {
        let pair = random_pair();
        let tweak = random_hash();
        if !is_valid_scalar(&tweak) {
            continue;
        }

        let secret = pair.secret_bytes().unwrap();
        let Ok(child_secret) = CurveKeyPair::tweak_secret(&secret, &tweak) else {
            continue;
        };
        let child = CurveKeyPair::from_secret_bytes(&child_secret).unwrap();

        let mut public_only = CurveKeyPair::from_public_key(&pair.public_key(true).unwrap());
        public_only.tweak_public(&tweak).unwrap();

        assert_eq!(
            public_only.public_key(true).unwrap(),
            child.public_key(true).unwrap()
        );
    }
}

#[test]
fn test_context_drives_key_generation() {
    let _guard = serial();
    let ctx = EccContext::start(EccConfig::default()).unwrap();

    let secret = ctx.random_scalar().unwrap();
    let pair = CurveKeyPair::from_secret_bytes(&secret).unwrap();
    let hash = double_sha256(b"context");
    assert!(pair.verify(&hash, pair.sign(&hash).unwrap().as_bytes()));

    ctx.stop();
    assert!(!EccContext::is_running());
}

#[test]
fn test_memory_lock_policy_follows_context() {
    let _guard = serial();
    let ctx = EccContext::start(EccConfig {
        memory_lock: false,
        sanity_check: true,
    })
    .unwrap();

    assert!(!memory_lock_enabled());
    assert!(!LockedBytes::<32>::new().is_locked());
    drop(ctx);

    let ctx = EccContext::start(EccConfig::default()).unwrap();
    assert!(memory_lock_enabled());
    ctx.stop();
}
