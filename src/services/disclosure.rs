// src/services/disclosure.rs
//! Field-level encryption of `credentialSubject`.
//!
//! Only the claim set is encrypted; id, issuer, dates and proof stay
//! readable so the credential can still be indexed and its proof checked
//! against the issuer. The plaintext is the canonical JSON of the claim
//! set, sealed with ECIES ([`crate::utils::crypto::ecies_encrypt`]).

use crate::error::{DecryptionError, EncryptionError};
use crate::models::credential::{CipherText, ClaimSet, CredentialSubject, VerifiableCredential};
use crate::utils::crypto::EciesError;
use crate::utils::serialization::{from_hex, to_canonical_bytes, to_ledger_hex};
use crate::wallet::key_management::{EncryptionKeyPair, EncryptionPublicKey};

/// Algorithm tag written into [`CipherText::algorithm`].
pub const ECIES_ALGORITHM: &str = "secp256k1-aes256gcm";

/// Returns a copy of `credential` whose subject is encrypted to `recipient`.
///
/// # Errors
/// * [`EncryptionError::NoEncryptionKey`] when `recipient` is `None`
/// * [`EncryptionError::AlreadyEncrypted`] for an encrypted subject
/// * [`EncryptionError::EncryptionFailure`] if sealing fails
pub fn encrypt_subject(
    credential: &VerifiableCredential,
    recipient: Option<&EncryptionPublicKey>,
) -> Result<VerifiableCredential, EncryptionError> {
    let recipient = recipient.ok_or(EncryptionError::NoEncryptionKey)?;
    let claims = match &credential.credential_subject {
        CredentialSubject::Cleartext(claims) => claims,
        CredentialSubject::Encrypted(_) => return Err(EncryptionError::AlreadyEncrypted),
    };

    let plaintext =
        to_canonical_bytes(claims).map_err(|e| EncryptionError::EncryptionFailure(e.to_string()))?;
    let sealed = recipient
        .encrypt(&plaintext)
        .map_err(|e| EncryptionError::EncryptionFailure(e.to_string()))?;

    let mut encrypted = credential.clone();
    encrypted.credential_subject = CredentialSubject::Encrypted(CipherText {
        algorithm: ECIES_ALGORITHM.to_string(),
        data: to_ledger_hex(&sealed),
    });
    log::debug!("encrypted subject of {}", credential.id);
    Ok(encrypted)
}

/// Inverse of [`encrypt_subject`].
///
/// # Errors
/// * [`DecryptionError::NoEncryptionKey`] when `keys` is `None`
/// * [`DecryptionError::MalformedCiphertext`] when the subject is not a
///   well-formed ciphertext of a known algorithm
/// * [`DecryptionError::DecryptionFailure`] on a wrong key, tampering, or a
///   plaintext that is not a claim set
pub fn decrypt_subject(
    credential: &VerifiableCredential,
    keys: Option<&EncryptionKeyPair>,
) -> Result<VerifiableCredential, DecryptionError> {
    let keys = keys.ok_or(DecryptionError::NoEncryptionKey)?;
    let claims = open_subject(&credential.credential_subject, keys)?;

    let mut decrypted = credential.clone();
    decrypted.credential_subject = CredentialSubject::Cleartext(claims);
    Ok(decrypted)
}

/// Decrypts an encrypted subject straight to its claim set.
pub fn open_subject(subject: &CredentialSubject, keys: &EncryptionKeyPair) -> Result<ClaimSet, DecryptionError> {
    let ciphertext = match subject {
        CredentialSubject::Encrypted(ciphertext) => ciphertext,
        CredentialSubject::Cleartext(_) => {
            return Err(DecryptionError::MalformedCiphertext(
                "credential subject is not encrypted".into(),
            ))
        }
    };
    if ciphertext.algorithm != ECIES_ALGORITHM {
        return Err(DecryptionError::MalformedCiphertext(format!(
            "unsupported algorithm {}",
            ciphertext.algorithm
        )));
    }

    let sealed = from_hex(&ciphertext.data)
        .map_err(|e| DecryptionError::MalformedCiphertext(e.to_string()))?;
    let plaintext = keys.decrypt(&sealed).map_err(|e| match e {
        EciesError::Truncated(_) | EciesError::InvalidEphemeralKey => {
            DecryptionError::MalformedCiphertext(e.to_string())
        }
        EciesError::KeyDerivation | EciesError::Cipher => DecryptionError::DecryptionFailure(e.to_string()),
    })?;

    serde_json::from_slice(&plaintext)
        .map_err(|e| DecryptionError::DecryptionFailure(format!("plaintext is not a claim set: {}", e)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::credential::{Proof, CREDENTIALS_CONTEXT};

    fn credential() -> VerifiableCredential {
        let claims = ClaimSet::new("did:xrpl:rSubject")
            .with_claim("birthDate", "1990-05-17")
            .with_claim("nationality", "French");
        VerifiableCredential {
            context: vec![CREDENTIALS_CONTEXT.into()],
            id: "urn:uuid:11111111-2222-4333-8444-555555555555".into(),
            types: vec!["VerifiableCredential".into(), "IdentityCard".into()],
            issuer: "did:xrpl:rIssuer".into(),
            issuance_date: "2024-03-01T12:00:00Z".parse().unwrap(),
            credential_subject: CredentialSubject::Cleartext(claims),
            proof: Some(Proof {
                proof_type: "Ed25519Signature2020".into(),
                created: "2024-03-01T12:00:00Z".parse().unwrap(),
                verification_method: "did:xrpl:rIssuer#keys-1".into(),
                proof_purpose: "assertionMethod".into(),
                proof_value: "zSig".into(),
                signed_data: "{}".into(),
            }),
        }
    }

    fn with_subject(subject: CredentialSubject) -> VerifiableCredential {
        VerifiableCredential {
            credential_subject: subject,
            ..credential()
        }
    }

    #[test]
    fn test_round_trip_restores_claims() {
        let keys = EncryptionKeyPair::generate().unwrap();
        let original = credential();

        let encrypted = encrypt_subject(&original, Some(keys.public_key())).unwrap();
        let decrypted = decrypt_subject(&encrypted, Some(&keys)).unwrap();

        assert_eq!(decrypted, original);
    }

    #[test]
    fn test_only_subject_changes() {
        let keys = EncryptionKeyPair::generate().unwrap();
        let original = credential();
        let encrypted = encrypt_subject(&original, Some(keys.public_key())).unwrap();

        assert_eq!(encrypted.id, original.id);
        assert_eq!(encrypted.issuer, original.issuer);
        assert_eq!(encrypted.proof, original.proof);
        match &encrypted.credential_subject {
            CredentialSubject::Encrypted(ciphertext) => {
                assert_eq!(ciphertext.algorithm, ECIES_ALGORITHM);
                assert!(!ciphertext.data.contains("French"));
            }
            other => panic!("expected ciphertext, got {:?}", other),
        }
    }

    #[test]
    fn test_wrong_key_fails_to_decrypt() {
        let alice = EncryptionKeyPair::generate().unwrap();
        let mallory = EncryptionKeyPair::generate().unwrap();
        let encrypted = encrypt_subject(&credential(), Some(alice.public_key())).unwrap();

        assert!(matches!(
            decrypt_subject(&encrypted, Some(&mallory)),
            Err(DecryptionError::DecryptionFailure(_))
        ));
    }

    #[test]
    fn test_tampered_ciphertext_fails_to_decrypt() {
        let keys = EncryptionKeyPair::generate().unwrap();
        let mut encrypted = encrypt_subject(&credential(), Some(keys.public_key())).unwrap();
        if let CredentialSubject::Encrypted(ciphertext) = &mut encrypted.credential_subject {
            let mut bytes = from_hex(&ciphertext.data).unwrap();
            let last = bytes.len() - 1;
            bytes[last] ^= 0x01;
            ciphertext.data = to_ledger_hex(&bytes);
        }

        assert!(matches!(
            decrypt_subject(&encrypted, Some(&keys)),
            Err(DecryptionError::DecryptionFailure(_))
        ));
    }

    #[test]
    fn test_malformed_ciphertexts() {
        let keys = EncryptionKeyPair::generate().unwrap();
        let malformed = |algorithm: &str, data: &str| {
            with_subject(CredentialSubject::Encrypted(CipherText {
                algorithm: algorithm.into(),
                data: data.into(),
            }))
        };

        for credential in [
            malformed(ECIES_ALGORITHM, "not hex at all"),
            malformed(ECIES_ALGORITHM, "04ABCD"),
            malformed("rsa-oaep", "04ABCD"),
            credential(),
        ] {
            assert!(matches!(
                decrypt_subject(&credential, Some(&keys)),
                Err(DecryptionError::MalformedCiphertext(_))
            ));
        }
    }

    #[test]
    fn test_plaintext_that_is_not_claims() {
        let keys = EncryptionKeyPair::generate().unwrap();
        let sealed = keys.public_key().encrypt(b"[1, 2, 3]").unwrap();
        let credential = with_subject(CredentialSubject::Encrypted(CipherText {
            algorithm: ECIES_ALGORITHM.into(),
            data: to_ledger_hex(&sealed),
        }));

        assert!(matches!(
            decrypt_subject(&credential, Some(&keys)),
            Err(DecryptionError::DecryptionFailure(_))
        ));
    }

    #[test]
    fn test_missing_keys_and_double_encryption() {
        let keys = EncryptionKeyPair::generate().unwrap();
        let encrypted = encrypt_subject(&credential(), Some(keys.public_key())).unwrap();

        assert!(matches!(
            encrypt_subject(&credential(), None),
            Err(EncryptionError::NoEncryptionKey)
        ));
        assert!(matches!(
            decrypt_subject(&encrypted, None),
            Err(DecryptionError::NoEncryptionKey)
        ));
        assert!(matches!(
            encrypt_subject(&encrypted, Some(keys.public_key())),
            Err(EncryptionError::AlreadyEncrypted)
        ));
    }
}
