// src/wallet/key_management.rs
//! Cryptographic key management for the DID wallet.
//!
//! A session holds two independent keypairs:
//! - a *signing* keypair: the ledger account key, derived from a family
//!   seed (Ed25519 for `sEd…` seeds, secp256k1 otherwise)
//! - an *encryption* keypair: a fresh secp256k1 key used for ECIES
//!
//! Private material never leaves this module. Callers get public keys,
//! signatures and plaintexts, not secrets.

use crate::error::KeyError;
use crate::utils::crypto::{account_id, ecies_decrypt, ecies_encrypt, sha512_half, EciesError};
use crate::wallet::seed::{encode_address, FamilySeed, SeedFamily};
use ed25519_dalek::Signer;
use k256::ecdsa::signature::hazmat::{PrehashSigner, PrehashVerifier};
use k256::elliptic_curve::sec1::ToEncodedPoint;
use k256::elliptic_curve::PrimeField;
use k256::{PublicKey, Scalar, SecretKey};
use rand::rngs::OsRng;
use rand::RngCore;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// Marker byte the ledger puts in front of Ed25519 public keys.
const ED25519_KEY_PREFIX: u8 = 0xED;

/// Signature algorithm of a signing keypair.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum KeyAlgorithm {
    Ed25519,
    Secp256k1,
}

impl KeyAlgorithm {
    /// Infers the algorithm from an encoded ledger public key.
    pub fn of_public_key(public_key: &[u8]) -> Option<Self> {
        match (public_key.first(), public_key.len()) {
            (Some(&ED25519_KEY_PREFIX), 33) => Some(KeyAlgorithm::Ed25519),
            (Some(0x02) | Some(0x03), 33) => Some(KeyAlgorithm::Secp256k1),
            _ => None,
        }
    }
}

enum SigningSecret {
    Ed25519(ed25519_dalek::SigningKey),
    Secp256k1(k256::ecdsa::SigningKey),
}

/// The ledger account keypair.
///
/// Ed25519 signs the message directly; secp256k1 signs the SHA-512Half of
/// the message and emits a DER signature, as the ledger expects.
pub struct SigningKeyPair {
    secret: SigningSecret,
    public_key: Vec<u8>,
    address: String,
}

impl std::fmt::Debug for SigningKeyPair {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SigningKeyPair")
            .field("algorithm", &self.algorithm())
            .field("address", &self.address)
            .field("public_key", &self.public_key_hex())
            .finish()
    }
}

impl SigningKeyPair {
    /// Derives the account keypair from a base58 family seed.
    pub fn from_seed(seed: &str) -> Result<Self, KeyError> {
        let seed = FamilySeed::decode(seed)?;
        let secret = match seed.family {
            SeedFamily::Ed25519 => {
                let mut bytes = [0u8; 32];
                bytes.copy_from_slice(&sha512_half(&seed.entropy));
                SigningSecret::Ed25519(ed25519_dalek::SigningKey::from_bytes(&bytes))
            }
            SeedFamily::Secp256k1 => SigningSecret::Secp256k1(derive_secp256k1(&seed.entropy)?),
        };
        Ok(Self::from_secret(secret))
    }

    fn from_secret(secret: SigningSecret) -> Self {
        let public_key = match &secret {
            SigningSecret::Ed25519(key) => {
                let mut bytes = Vec::with_capacity(33);
                bytes.push(ED25519_KEY_PREFIX);
                bytes.extend_from_slice(key.verifying_key().as_bytes());
                bytes
            }
            SigningSecret::Secp256k1(key) => key
                .verifying_key()
                .to_encoded_point(true)
                .as_bytes()
                .to_vec(),
        };
        let address = encode_address(&account_id(&public_key));
        SigningKeyPair {
            secret,
            public_key,
            address,
        }
    }

    pub fn algorithm(&self) -> KeyAlgorithm {
        match self.secret {
            SigningSecret::Ed25519(_) => KeyAlgorithm::Ed25519,
            SigningSecret::Secp256k1(_) => KeyAlgorithm::Secp256k1,
        }
    }

    /// Ledger-encoded public key (33 bytes for both families).
    pub fn public_key(&self) -> &[u8] {
        &self.public_key
    }

    pub fn public_key_hex(&self) -> String {
        hex::encode_upper(&self.public_key)
    }

    /// Classic `r…` address of the account.
    pub fn address(&self) -> &str {
        &self.address
    }

    /// Signs `message` with the account key.
    ///
    /// # Arguments
    /// * `message` - Raw bytes to sign
    ///
    /// # Returns
    /// A 64-byte Ed25519 signature, or a DER-encoded ECDSA signature over
    /// the SHA-512Half of `message` for secp256k1.
    pub fn sign(&self, message: &[u8]) -> Result<Vec<u8>, KeyError> {
        match &self.secret {
            SigningSecret::Ed25519(key) => key
                .try_sign(message)
                .map(|signature| signature.to_bytes().to_vec())
                .map_err(|e| KeyError::Signing(e.to_string())),
            SigningSecret::Secp256k1(key) => {
                let signature: k256::ecdsa::Signature = key
                    .sign_prehash(&sha512_half(message))
                    .map_err(|e| KeyError::Signing(e.to_string()))?;
                Ok(signature.to_der().as_bytes().to_vec())
            }
        }
    }
}

/// Checks `signature` over `message` against a ledger-encoded public key.
///
/// # Arguments
/// * `public_key` - 33-byte ledger key; an `0xED` prefix selects Ed25519
/// * `message` - Signed bytes
/// * `signature` - Signature as produced by [`SigningKeyPair::sign`]
///
/// # Returns
/// `false` for any malformed key or signature.
pub fn verify_signature(public_key: &[u8], message: &[u8], signature: &[u8]) -> bool {
    match KeyAlgorithm::of_public_key(public_key) {
        Some(KeyAlgorithm::Ed25519) => {
            let Ok(key_bytes) = <[u8; 32]>::try_from(&public_key[1..]) else {
                return false;
            };
            let Ok(key) = ed25519_dalek::VerifyingKey::from_bytes(&key_bytes) else {
                return false;
            };
            let Ok(signature) = ed25519_dalek::Signature::from_slice(signature) else {
                return false;
            };
            key.verify_strict(message, &signature).is_ok()
        }
        Some(KeyAlgorithm::Secp256k1) => {
            let Ok(key) = k256::ecdsa::VerifyingKey::from_sec1_bytes(public_key) else {
                return false;
            };
            let Ok(signature) = k256::ecdsa::Signature::from_der(signature) else {
                return false;
            };
            key.verify_prehash(&sha512_half(message), &signature).is_ok()
        }
        None => false,
    }
}

/// Ledger secp256k1 derivation for account 0: a root private generator is
/// found from the seed, then an intermediate scalar from the root public
/// generator is added to it modulo the curve order.
fn derive_secp256k1(entropy: &[u8]) -> Result<k256::ecdsa::SigningKey, KeyError> {
    let root = derive_scalar(entropy, None)?;
    let root_public = SecretKey::from_bytes(&root.to_repr())
        .map_err(|_| KeyError::InvalidSeed("root generator is not a valid key".into()))?
        .public_key()
        .to_encoded_point(true);
    let intermediate = derive_scalar(root_public.as_bytes(), Some(0))?;
    let account = root + intermediate;

    k256::ecdsa::SigningKey::from_bytes(&account.to_repr())
        .map_err(|_| KeyError::InvalidSeed("derived account key is zero".into()))
}

fn derive_scalar(bytes: &[u8], discriminator: Option<u32>) -> Result<Scalar, KeyError> {
    for counter in 0..=u32::MAX {
        let mut input = bytes.to_vec();
        if let Some(discriminator) = discriminator {
            input.extend_from_slice(&discriminator.to_be_bytes());
        }
        input.extend_from_slice(&counter.to_be_bytes());

        let candidate: Option<Scalar> = Scalar::from_repr(sha512_half(&input).into()).into();
        if let Some(scalar) = candidate {
            if scalar != Scalar::ZERO {
                return Ok(scalar);
            }
        }
    }
    Err(KeyError::InvalidSeed("no valid scalar for seed".into()))
}

/// Public half of an [`EncryptionKeyPair`], safe to hand to anyone.
///
/// Serializes as uppercase hex of the uncompressed SEC1 point.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncryptionPublicKey(PublicKey);

impl EncryptionPublicKey {
    pub fn to_hex(&self) -> String {
        hex::encode_upper(self.0.to_encoded_point(false).as_bytes())
    }

    pub fn from_hex(encoded: &str) -> Result<Self, KeyError> {
        let bytes = hex::decode(encoded)
            .map_err(|e| KeyError::InvalidPublicKey(e.to_string()))?;
        PublicKey::from_sec1_bytes(&bytes)
            .map(EncryptionPublicKey)
            .map_err(|_| KeyError::InvalidPublicKey("not a secp256k1 point".into()))
    }

    /// Encrypts `plaintext` so only the matching keypair can read it.
    pub fn encrypt(&self, plaintext: &[u8]) -> Result<Vec<u8>, EciesError> {
        ecies_encrypt(&self.0, plaintext)
    }
}

impl Serialize for EncryptionPublicKey {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_hex())
    }
}

impl<'de> Deserialize<'de> for EncryptionPublicKey {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let encoded = String::deserialize(deserializer)?;
        EncryptionPublicKey::from_hex(&encoded).map_err(serde::de::Error::custom)
    }
}

/// The asymmetric encryption keypair (secp256k1, ECIES).
pub struct EncryptionKeyPair {
    secret: SecretKey,
    public: EncryptionPublicKey,
}

impl std::fmt::Debug for EncryptionKeyPair {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EncryptionKeyPair")
            .field("public", &self.public.to_hex())
            .finish()
    }
}

impl EncryptionKeyPair {
    /// Generates a keypair from the OS entropy source.
    ///
    /// Fails only if the entropy source itself fails.
    pub fn generate() -> Result<Self, KeyError> {
        loop {
            let mut bytes = [0u8; 32];
            OsRng
                .try_fill_bytes(&mut bytes)
                .map_err(|e| KeyError::KeyGenFailure(e.to_string()))?;
            // Zero and values above the curve order are rejected; draw again.
            if let Ok(secret) = SecretKey::from_slice(&bytes) {
                let public = EncryptionPublicKey(secret.public_key());
                return Ok(EncryptionKeyPair { secret, public });
            }
        }
    }

    pub fn public_key(&self) -> &EncryptionPublicKey {
        &self.public
    }

    /// Decrypts a payload addressed to this keypair.
    pub fn decrypt(&self, payload: &[u8]) -> Result<Vec<u8>, EciesError> {
        ecies_decrypt(&self.secret, payload)
    }
}

/// Owner of both session keypairs.
///
/// Keys are written once, when they are derived or generated, and read
/// through shared references afterwards.
#[derive(Default)]
pub struct KeyManager {
    signing: Option<SigningKeyPair>,
    encryption: Option<EncryptionKeyPair>,
}

impl std::fmt::Debug for KeyManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KeyManager")
            .field("signing", &self.signing)
            .field("encryption", &self.encryption)
            .finish()
    }
}

impl KeyManager {
    /// Creates an empty key manager with no keys loaded.
    pub fn new() -> Self {
        Self::default()
    }

    /// Derives and stores the signing keypair from `seed`.
    ///
    /// # Arguments
    /// * `seed` - Base58 family seed (`s…`), Ed25519 or secp256k1
    ///
    /// # Returns
    /// The stored keypair, replacing any previous one. Fails with
    /// [`KeyError::InvalidSeed`] on a bad alphabet, checksum, length or
    /// family prefix.
    ///
    /// # Process Flow
    /// 1. Decodes the seed and checks its checksum
    /// 2. Derives the account keypair for the seed family
    /// 3. Computes the classic address of the public key
    pub fn derive_signing_key(&mut self, seed: &str) -> Result<&SigningKeyPair, KeyError> {
        let keypair = SigningKeyPair::from_seed(seed)?;
        log::debug!(
            "derived {:?} signing key for {}",
            keypair.algorithm(),
            keypair.address()
        );
        Ok(self.signing.insert(keypair))
    }

    /// Generates and stores a fresh encryption keypair.
    ///
    /// # Returns
    /// The stored keypair, replacing any previous one. Fails with
    /// [`KeyError::KeyGenFailure`] only if the OS entropy source fails.
    pub fn generate_encryption_key(&mut self) -> Result<&EncryptionKeyPair, KeyError> {
        let keypair = EncryptionKeyPair::generate()?;
        Ok(self.encryption.insert(keypair))
    }

    /// The account keypair.
    ///
    /// # Returns
    /// `None` until [`KeyManager::derive_signing_key`] succeeded, or after
    /// [`KeyManager::clear`].
    pub fn signing_key(&self) -> Option<&SigningKeyPair> {
        self.signing.as_ref()
    }

    /// The encryption keypair.
    ///
    /// # Returns
    /// `None` until [`KeyManager::generate_encryption_key`] succeeded, or
    /// after [`KeyManager::clear`].
    pub fn encryption_key(&self) -> Option<&EncryptionKeyPair> {
        self.encryption.as_ref()
    }

    /// Drops all key material.
    pub fn clear(&mut self) {
        self.signing = None;
        self.encryption = None;
    }
}
