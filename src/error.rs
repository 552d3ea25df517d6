// src/error.rs
//! Error taxonomy for the credential lifecycle.
//!
//! Every component returns its own typed error so callers can branch on the
//! failure (for example "fund the account first" versus "ciphertext is
//! malformed") instead of matching on strings. [`Error`] wraps them all for
//! callers that drive the whole pipeline through a [`crate::Session`].

use std::time::Duration;
use thiserror::Error;

/// Failures while deriving or generating key material.
#[derive(Debug, Error)]
pub enum KeyError {
    /// The seed is not a valid ledger family seed.
    #[error("invalid seed: {0}")]
    InvalidSeed(String),

    /// The OS entropy source failed.
    #[error("key generation failed: {0}")]
    KeyGenFailure(String),

    /// The underlying signature primitive refused to sign.
    #[error("signing failed: {0}")]
    Signing(String),

    /// A ledger address did not decode to an account id.
    #[error("invalid account address: {0}")]
    InvalidAddress(String),

    #[error("invalid public key: {0}")]
    InvalidPublicKey(String),
}

/// Failures while issuing a credential.
#[derive(Debug, Error)]
pub enum IssuanceError {
    #[error("no signing wallet is loaded in this session")]
    MissingWallet,

    #[error("failed to sign credential proof: {0}")]
    SigningFailure(String),

    #[error("failed to serialize credential: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Failures while encrypting a credential subject.
#[derive(Debug, Error)]
pub enum EncryptionError {
    #[error("no encryption key is available")]
    NoEncryptionKey,

    #[error("credential subject is already encrypted")]
    AlreadyEncrypted,

    #[error("encryption failed: {0}")]
    EncryptionFailure(String),
}

/// Failures while decrypting a credential subject.
#[derive(Debug, Error)]
pub enum DecryptionError {
    #[error("no encryption key is available")]
    NoEncryptionKey,

    /// Input was not a ciphertext at all (wrong state, not hex, truncated).
    #[error("malformed ciphertext: {0}")]
    MalformedCiphertext(String),

    /// Ciphertext was well formed but did not authenticate or did not
    /// decode to a claim set (wrong key or tampered payload).
    #[error("decryption failed: {0}")]
    DecryptionFailure(String),
}

/// Failures of the content-addressed store.
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("upload failed: {0}")]
    UploadFailure(String),

    #[error("fetch of {content_id} failed: {reason}")]
    FetchFailure { content_id: String, reason: String },

    /// Republish was requested for a bundle without a ledger confirmation.
    #[error("bundle has no ledger confirmation to republish")]
    Unconfirmed,

    #[error("invalid content uri: {0}")]
    InvalidContentUri(String),

    #[error("bundle serialization failed: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Lookups that found nothing.
#[derive(Debug, Error)]
pub enum NotFoundError {
    #[error("no DID ledger entry for account {0}")]
    LedgerEntry(String),

    #[error("no encrypted payload has been recorded")]
    StoredPayload,
}

/// Failures while talking to the ledger or anchoring a DID.
#[derive(Debug, Error)]
pub enum LedgerError {
    /// The account has never been funded on the ledger.
    #[error("account {0} not found on ledger (fund it first)")]
    AccountNotFound(String),

    /// The transaction was ill formed or refused at submission time.
    #[error("submission failed: {0}")]
    SubmissionFailure(String),

    /// The ledger accepted the transaction but did not apply it.
    #[error("transaction {hash} rejected with {engine_result}")]
    Rejected { hash: String, engine_result: String },

    #[error("transaction {hash} not validated after {waited:?}")]
    TimeoutError { hash: String, waited: Duration },

    /// The connection dropped while the operation was in flight.
    #[error("ledger connection lost")]
    Disconnected,

    #[error("ledger transport error: {0}")]
    Transport(String),

    #[error(transparent)]
    NotFound(#[from] NotFoundError),
}

/// Failures while checking a credential proof against its issuer.
#[derive(Debug, Error)]
pub enum ProofError {
    #[error("credential carries no proof")]
    MissingProof,

    #[error("credential issuer {claimed} does not match DID document {document}")]
    IssuerMismatch { claimed: String, document: String },

    #[error("verification method {0} is not listed under authentication")]
    UnknownVerificationMethod(String),

    #[error("verification key could not be decoded: {0}")]
    InvalidPublicKey(String),

    #[error("proof signature does not verify")]
    InvalidSignature,

    #[error("signed data does not describe this credential")]
    SignedDataMismatch,

    #[error("credential subject does not match the signed digest")]
    SubjectDigestMismatch,

    #[error("proof payload is not valid json: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Failures while answering a predicate.
#[derive(Debug, Error)]
pub enum VerificationError {
    #[error(transparent)]
    NotFound(#[from] NotFoundError),

    #[error(transparent)]
    Decryption(#[from] DecryptionError),

    #[error(transparent)]
    Storage(#[from] StorageError),

    /// Only encrypted payloads are accepted for predicate evaluation.
    #[error("refusing to record a cleartext credential subject")]
    CleartextPayload,

    #[error("claim `{0}` is missing")]
    MissingClaim(&'static str),

    #[error("claim `{claim}` has unusable value {value}")]
    InvalidClaim { claim: &'static str, value: String },
}

/// Any failure surfaced by the crate.
#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Key(#[from] KeyError),
    #[error(transparent)]
    Issuance(#[from] IssuanceError),
    #[error(transparent)]
    Encryption(#[from] EncryptionError),
    #[error(transparent)]
    Decryption(#[from] DecryptionError),
    #[error(transparent)]
    Storage(#[from] StorageError),
    #[error(transparent)]
    Ledger(#[from] LedgerError),
    #[error(transparent)]
    NotFound(#[from] NotFoundError),
    #[error(transparent)]
    Proof(#[from] ProofError),
    #[error(transparent)]
    Verification(#[from] VerificationError),
    #[error("configuration error: {0}")]
    Config(#[from] config::ConfigError),
}

/// Flat discriminant of [`Error`] for callers that only need to branch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    InvalidSeed,
    KeyGenFailure,
    MissingWallet,
    SigningFailure,
    NoEncryptionKey,
    EncryptionFailure,
    DecryptionFailure,
    MalformedCiphertext,
    UploadFailure,
    AccountNotFound,
    SubmissionFailure,
    Timeout,
    Disconnected,
    /// The ledger could not be reached at all
    Transport,
    NotFound,
    ProofInvalid,
    InvalidClaim,
    Config,
    Other,
}

impl Error {
    /// Classifies the error for branching.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::Key(KeyError::InvalidSeed(_)) => ErrorKind::InvalidSeed,
            Error::Key(KeyError::InvalidAddress(_)) | Error::Key(KeyError::InvalidPublicKey(_)) => {
                ErrorKind::Other
            }
            Error::Key(KeyError::KeyGenFailure(_)) => ErrorKind::KeyGenFailure,
            Error::Key(KeyError::Signing(_)) => ErrorKind::SigningFailure,
            Error::Issuance(IssuanceError::MissingWallet) => ErrorKind::MissingWallet,
            Error::Issuance(_) => ErrorKind::SigningFailure,
            Error::Encryption(EncryptionError::NoEncryptionKey) => ErrorKind::NoEncryptionKey,
            Error::Encryption(_) => ErrorKind::EncryptionFailure,
            Error::Decryption(e) | Error::Verification(VerificationError::Decryption(e)) => {
                decryption_kind(e)
            }
            Error::Storage(StorageError::UploadFailure(_)) => ErrorKind::UploadFailure,
            Error::Storage(_) | Error::Verification(VerificationError::Storage(_)) => {
                ErrorKind::Other
            }
            Error::Ledger(LedgerError::AccountNotFound(_)) => ErrorKind::AccountNotFound,
            Error::Ledger(LedgerError::TimeoutError { .. }) => ErrorKind::Timeout,
            Error::Ledger(LedgerError::Disconnected) => ErrorKind::Disconnected,
            Error::Ledger(LedgerError::Transport(_)) => ErrorKind::Transport,
            Error::Ledger(LedgerError::NotFound(_))
            | Error::NotFound(_)
            | Error::Verification(VerificationError::NotFound(_)) => ErrorKind::NotFound,
            Error::Ledger(_) => ErrorKind::SubmissionFailure,
            Error::Proof(_) => ErrorKind::ProofInvalid,
            Error::Verification(_) => ErrorKind::InvalidClaim,
            Error::Config(_) => ErrorKind::Config,
        }
    }
}

fn decryption_kind(error: &DecryptionError) -> ErrorKind {
    match error {
        DecryptionError::NoEncryptionKey => ErrorKind::NoEncryptionKey,
        DecryptionError::MalformedCiphertext(_) => ErrorKind::MalformedCiphertext,
        DecryptionError::DecryptionFailure(_) => ErrorKind::DecryptionFailure,
    }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_distinguishes_funding_from_ciphertext_errors() {
        let unfunded: Error = LedgerError::AccountNotFound("rAccount".into()).into();
        let malformed: Error = DecryptionError::MalformedCiphertext("not hex".into()).into();

        assert_eq!(unfunded.kind(), ErrorKind::AccountNotFound);
        assert_eq!(malformed.kind(), ErrorKind::MalformedCiphertext);
    }

    #[test]
    fn test_nested_not_found_is_flattened() {
        let missing: Error = VerificationError::from(NotFoundError::StoredPayload).into();
        assert_eq!(missing.kind(), ErrorKind::NotFound);

        let no_entry: Error = LedgerError::from(NotFoundError::LedgerEntry("r1".into())).into();
        assert_eq!(no_entry.kind(), ErrorKind::NotFound);
    }

    #[test]
    fn test_transport_failure_is_not_a_rejected_submission() {
        let refused: Error = LedgerError::Transport("connection refused".into()).into();
        let rejected: Error = LedgerError::Rejected {
            hash: "AB".into(),
            engine_result: "tefPAST_SEQ".into(),
        }
        .into();

        assert_eq!(refused.kind(), ErrorKind::Transport);
        assert_eq!(rejected.kind(), ErrorKind::SubmissionFailure);
    }
}
