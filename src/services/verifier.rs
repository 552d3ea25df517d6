// src/services/verifier.rs
//! Credential proof verification.
//!
//! Checks a credential's proof against the issuer's DID document, which a
//! verifier obtains independently (for example from the issuer's anchored
//! bundle or the ledger DID entry).

use crate::error::ProofError;
use crate::models::credential::{CredentialSubject, VerifiableCredential};
use crate::models::did::{address_from_did, split_did_url, DidDocument};
use crate::services::credential_issuer::{subject_digest, SignedData};
use crate::utils::crypto::account_id;
use crate::wallet::key_management::verify_signature;
use crate::wallet::seed::encode_address;

/// Verifies credential proofs.
#[derive(Debug, Clone, Copy, Default)]
pub struct ProofVerifier;

impl ProofVerifier {
    pub fn new() -> Self {
        ProofVerifier
    }

    /// Checks that `credential` was signed by the account behind
    /// `issuer_document`.
    ///
    /// # Process Flow
    /// 1. The credential issuer must be the document's DID
    /// 2. The proof's verification method must be one of the document's
    ///    authentication keys, and that key must control the issuer account
    /// 3. The signature must verify over `signedData`
    /// 4. `signedData` must describe this credential
    /// 5. A cleartext subject must match the signed claim digest
    ///
    /// An encrypted subject passes steps 1 to 4 only; decrypt it first for
    /// the full check.
    pub fn verify(&self, credential: &VerifiableCredential, issuer_document: &DidDocument) -> Result<(), ProofError> {
        let proof = credential.proof.as_ref().ok_or(ProofError::MissingProof)?;

        if credential.issuer != issuer_document.id {
            return Err(ProofError::IssuerMismatch {
                claimed: credential.issuer.clone(),
                document: issuer_document.id.clone(),
            });
        }

        let (controller, _) = split_did_url(&proof.verification_method);
        if controller != credential.issuer {
            return Err(ProofError::UnknownVerificationMethod(proof.verification_method.clone()));
        }
        let method = issuer_document
            .authentication_method(&proof.verification_method)
            .ok_or_else(|| ProofError::UnknownVerificationMethod(proof.verification_method.clone()))?;
        let public_key = method.public_key_bytes()?;

        let issuer_address = address_from_did(&credential.issuer)
            .ok_or_else(|| ProofError::IssuerMismatch {
                claimed: credential.issuer.clone(),
                document: issuer_document.id.clone(),
            })?;
        if encode_address(&account_id(&public_key)) != issuer_address {
            return Err(ProofError::InvalidPublicKey(format!(
                "{} does not control {}",
                method.id, issuer_address
            )));
        }

        let signature = proof
            .proof_value
            .strip_prefix('z')
            .and_then(|encoded| bs58::decode(encoded).into_vec().ok())
            .ok_or(ProofError::InvalidSignature)?;
        if !verify_signature(&public_key, proof.signed_data.as_bytes(), &signature) {
            return Err(ProofError::InvalidSignature);
        }

        let signed: SignedData = serde_json::from_str(&proof.signed_data)?;
        if signed.id != credential.id || signed.types != credential.types || signed.issuer != credential.issuer {
            return Err(ProofError::SignedDataMismatch);
        }

        if let CredentialSubject::Cleartext(claims) = &credential.credential_subject {
            if subject_digest(claims)? != signed.subject_digest {
                return Err(ProofError::SubjectDigestMismatch);
            }
        }
        Ok(())
    }
}
