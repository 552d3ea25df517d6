// src/services/credential_issuer.rs
//! Credential Issuer Service
//!
//! Builds Verifiable Credentials from a [`CredentialTemplate`] and signs
//! them with the session's ledger account key. The issuer DID is the DID of
//! that account, so anyone holding the issuer's DID document can check the
//! proof (see [`crate::services::verifier`]).
//!
//! The proof signs [`SignedData`]: the credential id, types and issuer plus
//! a digest of the cleartext claim set. Encrypting the subject afterwards
//! leaves the proof intact; swapping claims is detected once the subject is
//! decrypted again.

use crate::error::IssuanceError;
use crate::models::credential::{
    ClaimSet, CredentialSubject, CredentialTemplate, Proof, VerifiableCredential, CREDENTIALS_CONTEXT,
};
use crate::models::did::{did_for_address, ACCOUNT_KEY_FRAGMENT};
use crate::utils::crypto::sha256;
use crate::utils::serialization::{to_canonical_bytes, to_canonical_string};
use crate::wallet::key_management::{KeyAlgorithm, KeyManager};
use chrono::{SubsecRound, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub const PROOF_PURPOSE: &str = "assertionMethod";

/// What a credential proof signs.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct SignedData {
    pub id: String,
    #[serde(rename = "type")]
    pub types: Vec<String>,
    pub issuer: String,
    /// Hex SHA-256 of the canonical claim set
    pub subject_digest: String,
}

impl SignedData {
    pub fn new(credential: &VerifiableCredential, claims: &ClaimSet) -> Result<Self, serde_json::Error> {
        Ok(SignedData {
            id: credential.id.clone(),
            types: credential.types.clone(),
            issuer: credential.issuer.clone(),
            subject_digest: subject_digest(claims)?,
        })
    }
}

/// Hex SHA-256 of the canonical JSON of `claims`.
pub fn subject_digest(claims: &ClaimSet) -> Result<String, serde_json::Error> {
    Ok(hex::encode(sha256(&to_canonical_bytes(claims)?)))
}

/// Proof type for a signing algorithm.
pub fn proof_type_for(algorithm: KeyAlgorithm) -> &'static str {
    match algorithm {
        KeyAlgorithm::Ed25519 => "Ed25519Signature2020",
        KeyAlgorithm::Secp256k1 => "EcdsaSecp256k1Signature2019",
    }
}

/// Issues credentials under a DID method.
#[derive(Debug, Clone)]
pub struct CredentialIssuer {
    did_method: String,
}

impl CredentialIssuer {
    /// Creates an issuer for DIDs of the form `did:<did_method>:<address>`.
    pub fn new(did_method: impl Into<String>) -> Self {
        CredentialIssuer {
            did_method: did_method.into(),
        }
    }

    /// Issues a signed credential about `subject_did`.
    ///
    /// # Arguments
    /// * `template` - Contexts, types and claims to copy
    /// * `subject_did` - DID the claims are about
    /// * `keys` - Key manager holding the issuer's signing key
    ///
    /// # Returns
    /// A credential in cleartext state with an embedded proof.
    ///
    /// # Errors
    /// * [`IssuanceError::MissingWallet`] without a signing key
    /// * [`IssuanceError::SigningFailure`] if the signature cannot be made
    pub fn issue(
        &self,
        template: &CredentialTemplate,
        subject_did: &str,
        keys: &KeyManager,
    ) -> Result<VerifiableCredential, IssuanceError> {
        let signer = keys.signing_key().ok_or(IssuanceError::MissingWallet)?;
        let issuer = did_for_address(&self.did_method, signer.address());

        let mut claims = ClaimSet::new(subject_did);
        claims.claims = template.claims.clone();
        // The subject id comes from `subject_did`, never from the template.
        claims.claims.remove("id");

        let context = if template.context.is_empty() {
            vec![CREDENTIALS_CONTEXT.to_string()]
        } else {
            template.context.clone()
        };

        let issued = Utc::now().trunc_subsecs(0);
        let mut credential = VerifiableCredential {
            context,
            id: format!("urn:uuid:{}", Uuid::new_v4()),
            types: template.types.clone(),
            issuer,
            issuance_date: issued,
            credential_subject: CredentialSubject::Cleartext(claims.clone()),
            proof: None,
        };

        let signed_data = to_canonical_string(&SignedData::new(&credential, &claims)?)?;
        let signature = signer
            .sign(signed_data.as_bytes())
            .map_err(|e| IssuanceError::SigningFailure(e.to_string()))?;

        credential.proof = Some(Proof {
            proof_type: proof_type_for(signer.algorithm()).to_string(),
            created: issued,
            verification_method: format!("{}#{}", credential.issuer, ACCOUNT_KEY_FRAGMENT),
            proof_purpose: PROOF_PURPOSE.to_string(),
            proof_value: format!("z{}", bs58::encode(signature).into_string()),
            signed_data,
        });

        log::info!("issued credential {} to {}", credential.id, subject_did);
        Ok(credential)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const GENESIS_SEED: &str = "snoPBrXtMeMyMHUVTgbuqAfg1SUTb";

    fn template() -> CredentialTemplate {
        CredentialTemplate::new("IdentityCard")
            .with_claim("birthDate", "1990-05-17")
            .with_claim("nationality", "French")
    }

    #[test]
    fn test_issue_without_wallet_fails() {
        let issuer = CredentialIssuer::new("xrpl");
        let result = issuer.issue(&template(), "did:xrpl:rSubject", &KeyManager::new());
        assert!(matches!(result, Err(IssuanceError::MissingWallet)));
    }

    #[test]
    fn test_issue_copies_template_and_signs() {
        let mut keys = KeyManager::new();
        keys.derive_signing_key(GENESIS_SEED).unwrap();
        let issuer = CredentialIssuer::new("xrpl");

        let credential = issuer.issue(&template(), "did:xrpl:rSubject", &keys).unwrap();

        assert!(credential.id.starts_with("urn:uuid:"));
        assert_eq!(credential.issuer, "did:xrpl:rHb9CJAWyB4rj91VRWn96DkukG4bwdtyTh");
        assert_eq!(credential.types, vec!["VerifiableCredential", "IdentityCard"]);
        let claims = credential.claims().unwrap();
        assert_eq!(claims.id, "did:xrpl:rSubject");
        assert_eq!(claims.get_str("nationality"), Some("French"));

        let proof = credential.proof.as_ref().unwrap();
        assert_eq!(proof.proof_type, "EcdsaSecp256k1Signature2019");
        assert_eq!(proof.proof_purpose, "assertionMethod");
        assert_eq!(
            proof.verification_method,
            "did:xrpl:rHb9CJAWyB4rj91VRWn96DkukG4bwdtyTh#keys-1"
        );
        assert!(proof.proof_value.starts_with('z'));

        let signed: SignedData = serde_json::from_str(&proof.signed_data).unwrap();
        assert_eq!(signed.id, credential.id);
        assert_eq!(signed.subject_digest, subject_digest(claims).unwrap());
    }

    #[test]
    fn test_template_id_claim_is_ignored() {
        let mut keys = KeyManager::new();
        keys.derive_signing_key(GENESIS_SEED).unwrap();
        let template = template().with_claim("id", "did:xrpl:rImpostor");

        let credential = CredentialIssuer::new("xrpl")
            .issue(&template, "did:xrpl:rSubject", &keys)
            .unwrap();

        let claims = credential.claims().unwrap();
        assert_eq!(claims.id, "did:xrpl:rSubject");
        assert!(claims.get("id").is_none());
    }

    #[test]
    fn test_each_credential_gets_a_fresh_id() {
        let mut keys = KeyManager::new();
        keys.derive_signing_key(GENESIS_SEED).unwrap();
        let issuer = CredentialIssuer::new("xrpl");

        let first = issuer.issue(&template(), "did:xrpl:rSubject", &keys).unwrap();
        let second = issuer.issue(&template(), "did:xrpl:rSubject", &keys).unwrap();
        assert_ne!(first.id, second.id);
    }

    #[test]
    fn test_digest_ignores_claim_insertion_order() {
        let a = ClaimSet::new("did:xrpl:r1").with_claim("b", 1).with_claim("a", 2);
        let b = ClaimSet::new("did:xrpl:r1").with_claim("a", 2).with_claim("b", 1);
        assert_eq!(subject_digest(&a).unwrap(), subject_digest(&b).unwrap());
        assert_ne!(
            subject_digest(&a).unwrap(),
            subject_digest(&a.clone().with_claim("a", 3)).unwrap()
        );
    }
}
