// src/wallet/mod.rs
//! Key material: family seeds, signing and encryption keypairs, and the
//! verifier-side payload store.

pub mod credential_storage;
pub mod key_management;
pub mod seed;

pub use key_management::{EncryptionKeyPair, EncryptionPublicKey, KeyAlgorithm, KeyManager, SigningKeyPair};
