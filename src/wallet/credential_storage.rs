// src/wallet/credential_storage.rs
//! Storage of encrypted credential payloads on the verifier side.
//!
//! A verifier records the encrypted credentials it receives here and
//! evaluates predicates against the most recent one. Only credentials whose
//! subject is encrypted are accepted, so plaintext claims never sit in
//! this store.

use crate::error::VerificationError;
use crate::models::credential::{DisclosureState, VerifiableCredential};
use std::collections::HashMap;

/// In-memory store of encrypted credentials, keyed by credential id.
///
/// Thread-unsafe; owned by a single verification engine.
#[derive(Debug, Default)]
pub struct PayloadStore {
    payloads: HashMap<String, VerifiableCredential>,
    /// Id of the most recently stored payload
    latest: Option<String>,
}

impl PayloadStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Stores an encrypted credential and makes it the latest payload.
    ///
    /// # Behavior
    /// - Overwrites an existing payload with the same credential id
    /// - Refuses credentials whose subject is still in cleartext
    pub fn store_payload(&mut self, credential: VerifiableCredential) -> Result<(), VerificationError> {
        if credential.disclosure_state() != DisclosureState::Encrypted {
            return Err(VerificationError::CleartextPayload);
        }
        let id = credential.id.clone();
        self.payloads.insert(id.clone(), credential);
        self.latest = Some(id);
        Ok(())
    }

    /// The payload stored last.
    pub fn latest(&self) -> Option<&VerifiableCredential> {
        self.latest.as_deref().and_then(|id| self.payloads.get(id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::credential::{CipherText, ClaimSet, CredentialSubject};

    fn credential(id: &str, subject: CredentialSubject) -> VerifiableCredential {
        VerifiableCredential {
            context: vec!["https://www.w3.org/2018/credentials/v1".into()],
            id: id.into(),
            types: vec!["VerifiableCredential".into()],
            issuer: "did:xrpl:rIssuer".into(),
            issuance_date: "2024-01-01T00:00:00Z".parse().unwrap(),
            credential_subject: subject,
            proof: None,
        }
    }

    fn encrypted(id: &str) -> VerifiableCredential {
        credential(
            id,
            CredentialSubject::Encrypted(CipherText {
                algorithm: "secp256k1-aes256gcm".into(),
                data: "04".into(),
            }),
        )
    }

    #[test]
    fn test_cleartext_is_refused() {
        let mut store = PayloadStore::new();
        let cleartext = credential("urn:uuid:1", CredentialSubject::Cleartext(ClaimSet::new("did:xrpl:r1")));

        assert!(matches!(
            store.store_payload(cleartext),
            Err(VerificationError::CleartextPayload)
        ));
        assert!(store.latest().is_none());
    }

    #[test]
    fn test_latest_tracks_last_stored() {
        let mut store = PayloadStore::new();
        store.store_payload(encrypted("urn:uuid:1")).unwrap();
        store.store_payload(encrypted("urn:uuid:2")).unwrap();
        assert_eq!(store.latest().unwrap().id, "urn:uuid:2");

        store.store_payload(encrypted("urn:uuid:1")).unwrap();
        assert_eq!(store.latest().unwrap().id, "urn:uuid:1");
        assert_eq!(store.payloads.len(), 2);
    }
}
