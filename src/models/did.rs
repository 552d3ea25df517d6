// src/models/did.rs
//! Decentralized Identifier (DID) data model implementation.
//!
//! Defines the DID Document following the
//! [DID Core Specification](https://www.w3.org/TR/did-core/), bound to a
//! ledger account: the identifier is `did:<method>:<classic address>` and
//! the single authentication method carries the account's public key.

use crate::error::ProofError;
use crate::wallet::key_management::{KeyAlgorithm, SigningKeyPair};
use serde::{Deserialize, Serialize};

pub const DID_CONTEXT: &str = "https://www.w3.org/ns/did/v1";

/// Fragment of the account key inside its DID Document.
pub const ACCOUNT_KEY_FRAGMENT: &str = "keys-1";

/// Builds `did:<method>:<address>`.
pub fn did_for_address(method: &str, address: &str) -> String {
    format!("did:{}:{}", method, address)
}

/// Returns the method-specific id (the account address) of a DID.
pub fn address_from_did(did: &str) -> Option<&str> {
    let mut parts = did.splitn(3, ':');
    match (parts.next(), parts.next(), parts.next()) {
        (Some("did"), Some(_method), Some(address)) if !address.is_empty() => Some(address),
        _ => None,
    }
}

/// Splits a DID URL into DID and fragment.
pub fn split_did_url(url: &str) -> (&str, Option<&str>) {
    match url.split_once('#') {
        Some((did, fragment)) => (did, Some(fragment)),
        None => (url, None),
    }
}

/// One entry of the DID Document `authentication` array.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct VerificationMethod {
    /// DID URL of the key, e.g. `did:xrpl:r…#keys-1`
    pub id: String,

    #[serde(rename = "type")]
    pub method_type: String,

    /// DID that controls the key
    pub controller: String,

    /// `z` + base58btc of the ledger-encoded public key
    pub public_key_multibase: String,
}

impl VerificationMethod {
    /// Verification-method type string for a key algorithm.
    pub fn type_for(algorithm: KeyAlgorithm) -> &'static str {
        match algorithm {
            KeyAlgorithm::Ed25519 => "Ed25519VerificationKey2020",
            KeyAlgorithm::Secp256k1 => "EcdsaSecp256k1VerificationKey2019",
        }
    }

    /// Decodes `publicKeyMultibase` back to raw key bytes.
    pub fn public_key_bytes(&self) -> Result<Vec<u8>, ProofError> {
        let encoded = self
            .public_key_multibase
            .strip_prefix('z')
            .ok_or_else(|| ProofError::InvalidPublicKey("multibase prefix is not base58btc".into()))?;
        bs58::decode(encoded)
            .into_vec()
            .map_err(|e| ProofError::InvalidPublicKey(e.to_string()))
    }
}

/// A DID Document for a ledger account.
///
/// Immutable once built for a given address: [`DidDocument::for_account`]
/// is deterministic in the method and the signing key.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct DidDocument {
    #[serde(rename = "@context")]
    pub context: String,

    /// The complete DID string identifier
    /// Example: "did:xrpl:rHb9CJAWyB4rj91VRWn96DkukG4bwdtyTh"
    pub id: String,

    pub authentication: Vec<VerificationMethod>,
}

impl DidDocument {
    /// Builds the document of the account controlled by `signing_key`.
    pub fn for_account(method: &str, signing_key: &SigningKeyPair) -> Self {
        let did = did_for_address(method, signing_key.address());
        let key = VerificationMethod {
            id: format!("{}#{}", did, ACCOUNT_KEY_FRAGMENT),
            method_type: VerificationMethod::type_for(signing_key.algorithm()).to_string(),
            controller: did.clone(),
            public_key_multibase: format!("z{}", bs58::encode(signing_key.public_key()).into_string()),
        };
        DidDocument {
            context: DID_CONTEXT.to_string(),
            id: did,
            authentication: vec![key],
        }
    }

    /// DID URL of the account key.
    pub fn account_key_id(&self) -> String {
        format!("{}#{}", self.id, ACCOUNT_KEY_FRAGMENT)
    }

    /// Finds an authentication method by its full DID URL.
    pub fn authentication_method(&self, id: &str) -> Option<&VerificationMethod> {
        self.authentication.iter().find(|method| method.id == id)
    }

    /// The compact form written to the ledger's `DIDDocument` field.
    pub fn to_ledger_form(&self) -> LedgerDidDocument {
        LedgerDidDocument {
            context: self.context.clone(),
            authentication: self
                .authentication
                .iter()
                .map(|method| LedgerKey {
                    method_type: method.method_type.clone(),
                    public_key_multibase: method.public_key_multibase.clone(),
                })
                .collect(),
        }
    }
}

/// A DID Document as carried in a DIDSet `DIDDocument` field.
///
/// The ledger caps that field at 256 bytes, so the DID itself, key ids and
/// controllers are left out: all of them follow from the account that owns
/// the DID entry. [`LedgerDidDocument::expand`] restores the full document.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct LedgerDidDocument {
    #[serde(rename = "@context")]
    pub context: String,

    pub authentication: Vec<LedgerKey>,
}

/// Authentication key of a [`LedgerDidDocument`].
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct LedgerKey {
    #[serde(rename = "type")]
    pub method_type: String,

    pub public_key_multibase: String,
}

impl LedgerDidDocument {
    /// Rebuilds the full document of the DID entry owned by `address`.
    ///
    /// # Arguments
    /// * `method` - DID method, e.g. `xrpl`
    /// * `address` - Account that owns the DID ledger entry
    ///
    /// # Returns
    /// The document with keys numbered `keys-1`, `keys-2`, ... in order.
    pub fn expand(&self, method: &str, address: &str) -> DidDocument {
        let did = did_for_address(method, address);
        let authentication = self
            .authentication
            .iter()
            .enumerate()
            .map(|(n, key)| VerificationMethod {
                id: format!("{}#keys-{}", did, n + 1),
                method_type: key.method_type.clone(),
                controller: did.clone(),
                public_key_multibase: key.public_key_multibase.clone(),
            })
            .collect();
        DidDocument {
            context: self.context.clone(),
            id: did,
            authentication,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const GENESIS_SEED: &str = "snoPBrXtMeMyMHUVTgbuqAfg1SUTb";

    #[test]
    fn test_document_is_deterministic_for_account() {
        let keys = SigningKeyPair::from_seed(GENESIS_SEED).unwrap();
        let first = DidDocument::for_account("xrpl", &keys);
        let second = DidDocument::for_account("xrpl", &keys);

        assert_eq!(first, second);
        assert_eq!(first.id, "did:xrpl:rHb9CJAWyB4rj91VRWn96DkukG4bwdtyTh");
        assert_eq!(first.authentication[0].controller, first.id);
        assert_eq!(
            first.authentication[0].method_type,
            "EcdsaSecp256k1VerificationKey2019"
        );
    }

    #[test]
    fn test_multibase_key_round_trip() {
        let keys = SigningKeyPair::from_seed(GENESIS_SEED).unwrap();
        let document = DidDocument::for_account("xrpl", &keys);
        let method = document
            .authentication_method(&document.account_key_id())
            .unwrap();

        assert!(method.public_key_multibase.starts_with('z'));
        assert_eq!(method.public_key_bytes().unwrap(), keys.public_key());
    }

    #[test]
    fn test_did_parsing_helpers() {
        assert_eq!(address_from_did("did:xrpl:rAbc"), Some("rAbc"));
        assert_eq!(address_from_did("did:xrpl:"), None);
        assert_eq!(address_from_did("urn:uuid:1"), None);
        assert_eq!(
            split_did_url("did:xrpl:rAbc#keys-1"),
            ("did:xrpl:rAbc", Some("keys-1"))
        );
        assert_eq!(split_did_url("did:xrpl:rAbc"), ("did:xrpl:rAbc", None));
    }

    #[test]
    fn test_ledger_form_fits_field_and_expands_back() {
        use crate::blockchain::transaction::MAX_FIELD_BYTES;
        use crate::utils::serialization::to_canonical_bytes;
        use crate::wallet::seed::{FamilySeed, SeedFamily};

        let ed25519_seed = FamilySeed {
            family: SeedFamily::Ed25519,
            entropy: [3; 16],
        }
        .encode();
        for seed in [GENESIS_SEED.to_string(), ed25519_seed] {
            let keys = SigningKeyPair::from_seed(&seed).unwrap();
            let document = DidDocument::for_account("xrpl", &keys);
            let compact = document.to_ledger_form();

            assert!(to_canonical_bytes(&document).unwrap().len() > MAX_FIELD_BYTES);
            assert!(to_canonical_bytes(&compact).unwrap().len() <= MAX_FIELD_BYTES);
            assert_eq!(compact.expand("xrpl", keys.address()), document);
        }
    }

    #[test]
    fn test_serialized_shape() {
        let keys = SigningKeyPair::from_seed(GENESIS_SEED).unwrap();
        let value = serde_json::to_value(DidDocument::for_account("xrpl", &keys)).unwrap();

        assert_eq!(value["@context"], DID_CONTEXT);
        assert!(value["authentication"][0]["publicKeyMultibase"].is_string());
        assert!(value["authentication"][0]["type"].is_string());
    }
}
