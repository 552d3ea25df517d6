// src/blockchain/transaction.rs
//! The DIDSet transaction: construction, signing and hashing.
//!
//! Signing covers the `STX\0` prefix followed by the canonical JSON of
//! the transaction without `TxnSignature`. The transaction id is the
//! SHA-512Half of the `TXN\0` prefix followed by the canonical JSON of the
//! signed transaction. Turning the signed transaction into a wire blob is
//! the ledger client's job.

use crate::error::LedgerError;
use crate::models::did::DidDocument;
use crate::utils::crypto::sha512_half;
use crate::utils::serialization::{from_hex, to_canonical_bytes, to_ledger_hex};
use crate::wallet::key_management::{verify_signature, SigningKeyPair};
use serde::{Deserialize, Serialize};

pub const DID_SET: &str = "DIDSet";

/// Ledger limit on each of `DIDDocument`, `URI` and `Data`, in bytes.
pub const MAX_FIELD_BYTES: usize = 256;

const SIGNING_PREFIX: [u8; 4] = *b"STX\0";
const TX_ID_PREFIX: [u8; 4] = *b"TXN\0";

/// What a DIDSet should write. At least one field must be set.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AnchorRequest {
    pub did_document: Option<DidDocument>,
    pub uri: Option<String>,
    pub data: Option<Vec<u8>>,
}

impl AnchorRequest {
    /// Anchors a content URI, the usual case.
    pub fn for_uri(uri: impl Into<String>) -> Self {
        AnchorRequest {
            uri: Some(uri.into()),
            ..Default::default()
        }
    }

    /// Also writes the DID document, in its compact ledger form.
    pub fn with_document(mut self, document: DidDocument) -> Self {
        self.did_document = Some(document);
        self
    }

    pub fn with_data(mut self, data: Vec<u8>) -> Self {
        self.data = Some(data);
        self
    }
}

/// A DIDSet transaction in ledger JSON form.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(rename_all = "PascalCase")]
pub struct DidSetTransaction {
    pub transaction_type: String,
    pub account: String,
    /// Fee in drops, as a decimal string
    pub fee: String,
    pub sequence: u32,
    pub last_ledger_sequence: u32,

    #[serde(rename = "DIDDocument", default, skip_serializing_if = "Option::is_none")]
    pub did_document: Option<String>,

    #[serde(rename = "URI", default, skip_serializing_if = "Option::is_none")]
    pub uri: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<String>,

    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub signing_pub_key: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub txn_signature: Option<String>,
}

/// Ledger-filled values for a transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Autofill {
    pub sequence: u32,
    pub fee_drops: u64,
    pub last_ledger_sequence: u32,
}

impl DidSetTransaction {
    /// Builds an unsigned DIDSet from `request`, hex-encoding each field.
    ///
    /// # Arguments
    /// * `account` - Classic address of the sending account
    /// * `request` - Fields to write; the document goes on-ledger as
    ///   [`crate::models::did::LedgerDidDocument`]
    /// * `fill` - Sequence, fee and expiry obtained from the ledger
    ///
    /// # Returns
    /// The unsigned transaction, or `SubmissionFailure` when no field is set
    /// or a field is empty or over [`MAX_FIELD_BYTES`].
    pub fn build(account: &str, request: &AnchorRequest, fill: Autofill) -> Result<Self, LedgerError> {
        let did_document = match &request.did_document {
            Some(document) => {
                let json = to_canonical_bytes(&document.to_ledger_form())
                    .map_err(|e| LedgerError::SubmissionFailure(e.to_string()))?;
                Some(encode_field("DIDDocument", &json)?)
            }
            None => None,
        };
        let uri = request
            .uri
            .as_deref()
            .map(|uri| encode_field("URI", uri.as_bytes()))
            .transpose()?;
        let data = request
            .data
            .as_deref()
            .map(|data| encode_field("Data", data))
            .transpose()?;

        if did_document.is_none() && uri.is_none() && data.is_none() {
            return Err(LedgerError::SubmissionFailure(
                "DIDSet needs at least one of DIDDocument, URI or Data".into(),
            ));
        }

        Ok(DidSetTransaction {
            transaction_type: DID_SET.to_string(),
            account: account.to_string(),
            fee: fill.fee_drops.to_string(),
            sequence: fill.sequence,
            last_ledger_sequence: fill.last_ledger_sequence,
            did_document,
            uri,
            data,
            signing_pub_key: String::new(),
            txn_signature: None,
        })
    }

    /// Bytes covered by the signature.
    pub fn signing_payload(&self) -> Result<Vec<u8>, LedgerError> {
        let mut unsigned = self.clone();
        unsigned.txn_signature = None;
        let body = to_canonical_bytes(&unsigned)
            .map_err(|e| LedgerError::SubmissionFailure(e.to_string()))?;
        let mut payload = SIGNING_PREFIX.to_vec();
        payload.extend_from_slice(&body);
        Ok(payload)
    }

    /// Sets `SigningPubKey` and `TxnSignature` using the account key.
    pub fn sign(mut self, keys: &SigningKeyPair) -> Result<Self, LedgerError> {
        if keys.address() != self.account {
            return Err(LedgerError::SubmissionFailure(format!(
                "signing key belongs to {}, not {}",
                keys.address(),
                self.account
            )));
        }
        self.signing_pub_key = keys.public_key_hex();
        let signature = keys
            .sign(&self.signing_payload()?)
            .map_err(|e| LedgerError::SubmissionFailure(e.to_string()))?;
        self.txn_signature = Some(to_ledger_hex(&signature));
        Ok(self)
    }

    /// Checks the signature against `SigningPubKey`.
    pub fn verify(&self) -> bool {
        let (Some(signature), Ok(public_key)) =
            (self.txn_signature.as_deref(), from_hex(&self.signing_pub_key))
        else {
            return false;
        };
        let Ok(signature) = from_hex(signature) else {
            return false;
        };
        match self.signing_payload() {
            Ok(payload) => verify_signature(&public_key, &payload, &signature),
            Err(_) => false,
        }
    }

    /// Transaction id: uppercase hex SHA-512Half over the signed form.
    pub fn hash(&self) -> Result<String, LedgerError> {
        let body =
            to_canonical_bytes(self).map_err(|e| LedgerError::SubmissionFailure(e.to_string()))?;
        let mut payload = TX_ID_PREFIX.to_vec();
        payload.extend_from_slice(&body);
        Ok(to_ledger_hex(&sha512_half(&payload)))
    }

    pub fn fee_drops(&self) -> Option<u64> {
        self.fee.parse().ok()
    }

    /// Decoded `URI` field.
    pub fn uri_text(&self) -> Option<String> {
        let bytes = from_hex(self.uri.as_deref()?).ok()?;
        String::from_utf8(bytes).ok()
    }
}

fn encode_field(name: &str, bytes: &[u8]) -> Result<String, LedgerError> {
    if bytes.is_empty() {
        return Err(LedgerError::SubmissionFailure(format!("{} is empty", name)));
    }
    if bytes.len() > MAX_FIELD_BYTES {
        return Err(LedgerError::SubmissionFailure(format!(
            "{} is {} bytes, limit is {}",
            name,
            bytes.len(),
            MAX_FIELD_BYTES
        )));
    }
    Ok(to_ledger_hex(bytes))
}
