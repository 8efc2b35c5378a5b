//! Hash primitives used by key derivation and fingerprints.

use hmac::{Hmac, Mac};
use ripemd::Ripemd160;
use sha2::{Digest, Sha256, Sha512};

use crate::CryptoError;

/// Compute HMAC-SHA512 of `data` keyed with `key`.
///
/// This is the keyed 512-bit hash behind master-key generation and every
/// child derivation step.
pub fn hmac_sha512(key: &[u8], data: &[u8]) -> Result<[u8; 64], CryptoError> {
    let mut mac = Hmac::<Sha512>::new_from_slice(key)
        .map_err(|e| CryptoError::HashError(e.to_string()))?;
    mac.update(data);
    let result = mac.finalize().into_bytes();
    let mut output = [0u8; 64];
    output.copy_from_slice(&result);
    Ok(output)
}

/// Compute RIPEMD160(SHA256(data)).
///
/// The first four bytes of this digest over a compressed public key form the
/// key fingerprint.
pub fn hash160(data: &[u8]) -> [u8; 20] {
    let sha = sha256(data);
    let result = Ripemd160::digest(sha);
    let mut output = [0u8; 20];
    output.copy_from_slice(&result);
    output
}

/// Create a SHA-256 hash of arbitrary data.
pub fn sha256(data: &[u8]) -> [u8; 32] {
    let mut hasher = Sha256::new();
    hasher.update(data);
    let result = hasher.finalize();
    let mut output = [0u8; 32];
    output.copy_from_slice(&result);
    output
}

/// Compute SHA256(SHA256(data)).
pub fn double_sha256(data: &[u8]) -> [u8; 32] {
    sha256(&sha256(data))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sha256() {
        let hash = sha256(b"test data");

        // Known SHA-256 hash for "test data"
        let expected =
            hex::decode("916f0027a575074ce72a331777c3478d6513f786a591bd892da1a577bf2335f9")
                .unwrap();

        assert_eq!(hash.as_slice(), expected.as_slice());
    }

    #[test]
    fn test_hmac_sha512_rfc4231_case_2() {
        let mac = hmac_sha512(b"Jefe", b"what do ya want for nothing?").unwrap();

        let expected = hex::decode(
            "164b7a7bfcf819e2e395fbe73b56e0a387bd64222e831fd610270cd7ea250554\
             9758bf75c05a994a6d034f65f8f0e6fdcaeab1a34d4a6b4b636e070a38bce737",
        )
        .unwrap();

        assert_eq!(mac.as_slice(), expected.as_slice());
    }

    #[test]
    fn test_hmac_accepts_long_keys() {
        let key = [0x42u8; 200];
        assert!(hmac_sha512(&key, b"data").is_ok());
    }

    #[test]
    fn test_hash160_of_bip32_master_key() {
        // Compressed master public key of BIP32 test vector 1.
        let pubkey =
            hex::decode("0339a36013301597daef41fbe593a02cc513d0b55527ec2df1050e2e8ff49c85c2")
                .unwrap();

        let id = hash160(&pubkey);
        assert_eq!(hex::encode(&id[..4]), "3442193e");
    }

    #[test]
    fn test_double_sha256_differs_from_single() {
        let data = b"checksum";
        assert_ne!(sha256(data), double_sha256(data));
        assert_eq!(double_sha256(data), sha256(&sha256(data)));
    }
}
