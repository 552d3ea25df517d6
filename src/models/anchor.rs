// src/models/anchor.rs
//! Anchor bundle and ledger anchor record.
//!
//! An [`AnchorBundle`] is the JSON document published to content-addressed
//! storage. It is uploaded twice: once before anchoring (its content URI
//! is what the ledger points at) and once after validation with the
//! transaction result embedded, as the audit copy.

use crate::models::credential::VerifiableCredential;
use crate::models::did::{DidDocument, LedgerDidDocument};
use serde::{Deserialize, Serialize};

/// Result of a validated DIDSet transaction.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct TxResult {
    pub hash: String,
    pub ledger_index: u32,
    pub engine_result: String,
    pub validated: bool,

    /// Content URI that was anchored on the ledger
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub uri: Option<String>,
}

/// The published bundle.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct AnchorBundle {
    pub did: String,
    pub did_document: DidDocument,
    pub verifiable_credential: VerifiableCredential,
    pub transaction: Option<TxResult>,
    pub content_uri: Option<String>,
    pub gateway_uri: Option<String>,
}

impl AnchorBundle {
    /// A fresh bundle: no transaction, not yet published.
    pub fn new(did_document: DidDocument, verifiable_credential: VerifiableCredential) -> Self {
        AnchorBundle {
            did: did_document.id.clone(),
            did_document,
            verifiable_credential,
            transaction: None,
            content_uri: None,
            gateway_uri: None,
        }
    }

    pub fn is_confirmed(&self) -> bool {
        self.transaction.as_ref().map_or(false, |tx| tx.validated)
    }

    /// The content URI the ledger actually points at, once anchored.
    pub fn anchored_uri(&self) -> Option<&str> {
        self.transaction.as_ref().and_then(|tx| tx.uri.as_deref())
    }
}

/// The DID ledger entry of an account, as returned by a ledger lookup.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct LedgerAnchorRecord {
    #[serde(rename = "Account")]
    pub account: String,

    #[serde(rename = "DIDDocument", default, skip_serializing_if = "Option::is_none")]
    pub did_document_hex: Option<String>,

    #[serde(rename = "Data", default, skip_serializing_if = "Option::is_none")]
    pub data_hex: Option<String>,

    #[serde(rename = "URI", default, skip_serializing_if = "Option::is_none")]
    pub uri_hex: Option<String>,

    #[serde(rename = "Flags")]
    pub flags: u32,

    #[serde(rename = "LedgerEntryType")]
    pub entry_type: String,

    #[serde(rename = "OwnerNode")]
    pub owner_node: String,

    #[serde(rename = "PreviousTxnID")]
    pub previous_txn_id: String,

    #[serde(rename = "PreviousTxnLgrSeq")]
    pub previous_txn_ledger_seq: u32,

    pub index: String,
}

impl LedgerAnchorRecord {
    /// The anchored content URI, decoded from hex.
    pub fn uri(&self) -> Option<String> {
        decode_hex_text(self.uri_hex.as_deref())
    }

    /// The anchored DID document, decoded from hex and expanded for this
    /// entry's account.
    ///
    /// # Arguments
    /// * `method` - DID method the document was written under
    ///
    /// # Returns
    /// `None` when no document is anchored or the field does not decode.
    pub fn did_document(&self, method: &str) -> Option<DidDocument> {
        decode_hex_text(self.did_document_hex.as_deref())
            .and_then(|json| serde_json::from_str::<LedgerDidDocument>(&json).ok())
            .map(|compact| compact.expand(method, &self.account))
    }

    pub fn data(&self) -> Option<Vec<u8>> {
        self.data_hex.as_deref().and_then(|data| hex::decode(data).ok())
    }
}

fn decode_hex_text(field: Option<&str>) -> Option<String> {
    let bytes = hex::decode(field?).ok()?;
    String::from_utf8(bytes).ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_record_uses_ledger_field_names() {
        let record: LedgerAnchorRecord = serde_json::from_value(json!({
            "Account": "rAccount",
            "URI": "697066733A2F2F62616679",
            "Flags": 0,
            "LedgerEntryType": "DID",
            "OwnerNode": "0",
            "PreviousTxnID": "ABCD",
            "PreviousTxnLgrSeq": 12,
            "index": "EF01"
        }))
        .unwrap();

        assert_eq!(record.uri().as_deref(), Some("ipfs://bafy"));
        assert!(record.did_document("xrpl").is_none());
        assert!(record.data().is_none());
        assert_eq!(record.previous_txn_ledger_seq, 12);
    }

    #[test]
    fn test_undecodable_uri_is_none() {
        let record = LedgerAnchorRecord {
            account: "rAccount".into(),
            did_document_hex: None,
            data_hex: None,
            uri_hex: Some("zz".into()),
            flags: 0,
            entry_type: "DID".into(),
            owner_node: "0".into(),
            previous_txn_id: String::new(),
            previous_txn_ledger_seq: 0,
            index: String::new(),
        };
        assert!(record.uri().is_none());
    }
}
