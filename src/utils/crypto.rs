// src/utils/crypto.rs
//! Hashing and hybrid encryption primitives.
//!
//! - SHA-256 and SHA-512Half (first 32 bytes of SHA-512, the ledger's hash)
//! - account ids: RIPEMD-160 over SHA-256 of a public key
//! - ECIES over secp256k1: ephemeral ECDH, HKDF-SHA256, AES-256-GCM
//!
//! ECIES payload layout:
//! ```text
//! ephemeral public key (65, uncompressed SEC1) || nonce (12) || ciphertext || tag (16)
//! ```

use aes_gcm::aead::{Aead, AeadCore, KeyInit};
use aes_gcm::{Aes256Gcm, Nonce};
use k256::ecdh::{diffie_hellman, EphemeralSecret};
use k256::elliptic_curve::sec1::ToEncodedPoint;
use k256::{PublicKey, SecretKey};
use rand::rngs::OsRng;
use ripemd::Ripemd160;
use sha2::{Digest, Sha256, Sha512};
use thiserror::Error;

/// Length of an uncompressed SEC1 secp256k1 point.
pub const EPHEMERAL_KEY_LEN: usize = 65;
/// AES-GCM nonce length.
pub const NONCE_LEN: usize = 12;
/// AES-GCM authentication tag length.
pub const TAG_LEN: usize = 16;

const ECIES_INFO: &[u8] = b"decid-ecies-secp256k1-aes256gcm";

/// Computes SHA-256 of the input.
pub fn sha256(data: &[u8]) -> [u8; 32] {
    Sha256::digest(data).into()
}

/// Computes SHA-512Half: the first 32 bytes of SHA-512.
pub fn sha512_half(data: &[u8]) -> [u8; 32] {
    let digest = Sha512::digest(data);
    let mut half = [0u8; 32];
    half.copy_from_slice(&digest[..32]);
    half
}

/// Account id of a public key: RIPEMD-160(SHA-256(key)).
pub fn account_id(public_key: &[u8]) -> [u8; 20] {
    Ripemd160::digest(sha256(public_key)).into()
}

/// ECIES failures, classified so callers can tell shape errors from
/// authentication errors.
#[derive(Debug, Error)]
pub enum EciesError {
    #[error("payload too short ({0} bytes)")]
    Truncated(usize),

    #[error("invalid ephemeral public key")]
    InvalidEphemeralKey,

    #[error("key derivation failed")]
    KeyDerivation,

    #[error("authenticated encryption failed")]
    Cipher,
}

/// Encrypts `plaintext` for the holder of `receiver`'s secret key.
pub fn ecies_encrypt(receiver: &PublicKey, plaintext: &[u8]) -> Result<Vec<u8>, EciesError> {
    let ephemeral = EphemeralSecret::random(&mut OsRng);
    let ephemeral_point = ephemeral.public_key().to_encoded_point(false);
    let shared = ephemeral.diffie_hellman(receiver);

    let cipher = derive_cipher(&shared, ephemeral_point.as_bytes())?;
    let nonce = Aes256Gcm::generate_nonce(&mut OsRng);
    let sealed = cipher
        .encrypt(&nonce, plaintext)
        .map_err(|_| EciesError::Cipher)?;

    let mut payload = Vec::with_capacity(EPHEMERAL_KEY_LEN + NONCE_LEN + sealed.len());
    payload.extend_from_slice(ephemeral_point.as_bytes());
    payload.extend_from_slice(&nonce);
    payload.extend_from_slice(&sealed);
    Ok(payload)
}

/// Decrypts a payload produced by [`ecies_encrypt`].
pub fn ecies_decrypt(secret: &SecretKey, payload: &[u8]) -> Result<Vec<u8>, EciesError> {
    if payload.len() < EPHEMERAL_KEY_LEN + NONCE_LEN + TAG_LEN {
        return Err(EciesError::Truncated(payload.len()));
    }
    let (ephemeral_bytes, rest) = payload.split_at(EPHEMERAL_KEY_LEN);
    let (nonce, sealed) = rest.split_at(NONCE_LEN);

    let ephemeral =
        PublicKey::from_sec1_bytes(ephemeral_bytes).map_err(|_| EciesError::InvalidEphemeralKey)?;
    let shared = diffie_hellman(secret.to_nonzero_scalar(), ephemeral.as_affine());

    let cipher = derive_cipher(&shared, ephemeral_bytes)?;
    cipher
        .decrypt(Nonce::from_slice(nonce), sealed)
        .map_err(|_| EciesError::Cipher)
}

fn derive_cipher(
    shared: &k256::ecdh::SharedSecret,
    ephemeral_point: &[u8],
) -> Result<Aes256Gcm, EciesError> {
    let mut key = [0u8; 32];
    shared
        .extract::<Sha256>(Some(ephemeral_point))
        .expand(ECIES_INFO, &mut key)
        .map_err(|_| EciesError::KeyDerivation)?;
    Aes256Gcm::new_from_slice(&key).map_err(|_| EciesError::KeyDerivation)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sha512_half_is_prefix_of_sha512() {
        let full = Sha512::digest(b"decid");
        assert_eq!(sha512_half(b"decid")[..], full[..32]);
    }

    #[test]
    fn test_ecies_round_trip() {
        let secret = SecretKey::random(&mut OsRng);
        let payload = ecies_encrypt(&secret.public_key(), b"{\"nationality\":\"French\"}").unwrap();

        assert_eq!(payload[0], 0x04);
        assert_eq!(
            ecies_decrypt(&secret, &payload).unwrap(),
            b"{\"nationality\":\"French\"}"
        );
    }

    #[test]
    fn test_ecies_is_randomized() {
        let secret = SecretKey::random(&mut OsRng);
        let first = ecies_encrypt(&secret.public_key(), b"same").unwrap();
        let second = ecies_encrypt(&secret.public_key(), b"same").unwrap();
        assert_ne!(first, second);
    }

    #[test]
    fn test_ecies_wrong_key_fails_authentication() {
        let secret = SecretKey::random(&mut OsRng);
        let other = SecretKey::random(&mut OsRng);
        let payload = ecies_encrypt(&secret.public_key(), b"claims").unwrap();

        assert!(matches!(ecies_decrypt(&other, &payload), Err(EciesError::Cipher)));
    }

    #[test]
    fn test_ecies_tampered_payload_fails() {
        let secret = SecretKey::random(&mut OsRng);
        let mut payload = ecies_encrypt(&secret.public_key(), b"claims").unwrap();
        let last = payload.len() - 1;
        payload[last] ^= 0x01;

        assert!(matches!(ecies_decrypt(&secret, &payload), Err(EciesError::Cipher)));
    }

    #[test]
    fn test_ecies_truncated_payload() {
        let secret = SecretKey::random(&mut OsRng);
        assert!(matches!(
            ecies_decrypt(&secret, &[0u8; 40]),
            Err(EciesError::Truncated(40))
        ));
    }
}
