// src/models/credential.rs
//! Verifiable Credential data model implementation.
//!
//! Follows the [W3C Verifiable Credentials Data Model](https://www.w3.org/TR/vc-data-model/)
//! with one deliberate deviation: `credentialSubject` is a tagged union
//! whose `state` discriminant says whether the payload is a cleartext
//! claim set or a ciphertext.
//!
//! ```json
//! "credentialSubject": { "state": "cleartext", "payload": { "id": "did:xrpl:r…", "nationality": "French" } }
//! "credentialSubject": { "state": "encrypted", "payload": { "algorithm": "…", "data": "04AB…" } }
//! ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

pub const CREDENTIALS_CONTEXT: &str = "https://www.w3.org/2018/credentials/v1";
pub const BASE_CREDENTIAL_TYPE: &str = "VerifiableCredential";

/// Claims about a subject. `id` is the subject DID; other claims are kept
/// in a sorted map so the canonical form is stable.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct ClaimSet {
    pub id: String,

    #[serde(flatten)]
    pub claims: BTreeMap<String, Value>,
}

impl ClaimSet {
    pub fn new(subject_did: impl Into<String>) -> Self {
        ClaimSet {
            id: subject_did.into(),
            claims: BTreeMap::new(),
        }
    }

    pub fn with_claim(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.claims.insert(name.into(), value.into());
        self
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.claims.get(name)
    }

    /// A claim as a string, if present and a string.
    pub fn get_str(&self, name: &str) -> Option<&str> {
        self.claims.get(name).and_then(Value::as_str)
    }
}

/// An encrypted claim set.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct CipherText {
    /// Scheme identifier, see [`crate::services::disclosure::ECIES_ALGORITHM`]
    pub algorithm: String,

    /// Uppercase hex of the ECIES payload
    pub data: String,
}

/// Disclosure state of a credential.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DisclosureState {
    Cleartext,
    Encrypted,
}

/// `credentialSubject`: either claims or their ciphertext, never both.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(tag = "state", content = "payload", rename_all = "lowercase")]
pub enum CredentialSubject {
    Cleartext(ClaimSet),
    Encrypted(CipherText),
}

impl CredentialSubject {
    pub fn state(&self) -> DisclosureState {
        match self {
            CredentialSubject::Cleartext(_) => DisclosureState::Cleartext,
            CredentialSubject::Encrypted(_) => DisclosureState::Encrypted,
        }
    }
}

/// Cryptographic proof attached to a credential.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Proof {
    #[serde(rename = "type")]
    pub proof_type: String,

    pub created: DateTime<Utc>,

    /// DID URL of the signing key, `<issuer DID>#keys-1`
    pub verification_method: String,

    pub proof_purpose: String,

    /// `z` + base58btc of the signature over `signed_data`
    pub proof_value: String,

    /// Canonical JSON the signature covers
    pub signed_data: String,
}

/// A Verifiable Credential.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct VerifiableCredential {
    #[serde(rename = "@context")]
    pub context: Vec<String>,

    /// Unique URI identifier for the credential
    /// Example: "urn:uuid:123e4567-e89b-12d3-a456-426614174000"
    pub id: String,

    #[serde(rename = "type")]
    pub types: Vec<String>,

    /// DID of the credential issuer
    pub issuer: String,

    pub issuance_date: DateTime<Utc>,

    pub credential_subject: CredentialSubject,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub proof: Option<Proof>,
}

impl VerifiableCredential {
    pub fn disclosure_state(&self) -> DisclosureState {
        self.credential_subject.state()
    }

    /// The claim set, when the credential is in cleartext state.
    pub fn claims(&self) -> Option<&ClaimSet> {
        match &self.credential_subject {
            CredentialSubject::Cleartext(claims) => Some(claims),
            CredentialSubject::Encrypted(_) => None,
        }
    }
}

/// Static parts of a credential: contexts, types and claims.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Default)]
pub struct CredentialTemplate {
    pub context: Vec<String>,
    pub types: Vec<String>,
    pub claims: BTreeMap<String, Value>,
}

impl CredentialTemplate {
    /// A template with the base context and `VerifiableCredential` type plus
    /// `credential_type`.
    pub fn new(credential_type: impl Into<String>) -> Self {
        CredentialTemplate {
            context: vec![CREDENTIALS_CONTEXT.to_string()],
            types: vec![BASE_CREDENTIAL_TYPE.to_string(), credential_type.into()],
            claims: BTreeMap::new(),
        }
    }

    pub fn with_claim(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.claims.insert(name.into(), value.into());
        self
    }
}
