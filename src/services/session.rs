// src/services/session.rs
//! Session context.
//!
//! A [`Session`] owns everything one subject needs for the credential
//! lifecycle: the key manager, the DID document, the supervised ledger
//! connection and the content store. It is created from a family seed with
//! [`Session::open`] and torn down with [`Session::close`]; components get
//! what they need from it by reference.
//!
//! Per credential the flow is strictly sequential:
//! issue -> encrypt -> publish -> anchor -> republish.

use crate::blockchain::connection::{ConnectionHandle, ConnectionState, ConnectionSupervisor};
use crate::blockchain::did_anchor::{AnchorOutcome, LedgerAnchor};
use crate::blockchain::ledger_client::LedgerClient;
use crate::blockchain::transaction::AnchorRequest;
use crate::config::Settings;
use crate::error::{IssuanceError, LedgerError, Result};
use crate::models::anchor::{AnchorBundle, LedgerAnchorRecord};
use crate::models::credential::{CredentialTemplate, VerifiableCredential};
use crate::models::did::DidDocument;
use crate::services::credential_issuer::CredentialIssuer;
use crate::services::disclosure;
use crate::services::verification_engine::VerificationEngine;
use crate::services::verifier::ProofVerifier;
use crate::storage::{ContentAnchorStore, ContentStore, PublishReceipt};
use crate::wallet::key_management::{EncryptionPublicKey, KeyManager};
use std::sync::Arc;

/// Everything produced by [`Session::issue_and_anchor`].
#[derive(Debug, Clone)]
pub struct AnchorTrail {
    /// The bundle in its final, confirmed state
    pub bundle: AnchorBundle,
    /// First publication; the ledger entry points here
    pub anchored: PublishReceipt,
    /// Audit copy with the transaction result embedded
    pub audit: PublishReceipt,
    pub outcome: AnchorOutcome,
}

/// One subject's credential session.
pub struct Session {
    settings: Settings,
    keys: KeyManager,
    did_document: DidDocument,
    issuer: CredentialIssuer,
    store: ContentAnchorStore,
    anchor: LedgerAnchor,
    supervisor: ConnectionSupervisor,
}

impl Session {
    /// Opens a session for the account behind `seed`.
    ///
    /// Derives the signing key, generates a fresh encryption key, builds the
    /// DID document and connects to the ledger.
    ///
    /// # Errors
    /// * [`crate::ErrorKind::InvalidSeed`] for a bad seed
    /// * a ledger error if the initial connection fails
    pub async fn open(
        seed: &str,
        settings: Settings,
        ledger: Arc<dyn LedgerClient>,
        content: Arc<dyn ContentStore>,
    ) -> Result<Self> {
        let mut keys = KeyManager::new();
        let signer = keys.derive_signing_key(seed)?;
        let did_document = DidDocument::for_account(&settings.did_method, signer);
        keys.generate_encryption_key()?;

        let supervisor = ConnectionSupervisor::start(Arc::clone(&ledger), &settings.ledger).await?;
        let anchor = LedgerAnchor::new(ledger, supervisor.handle(), settings.ledger.clone());
        let store = ContentAnchorStore::new(content, settings.storage.gateway_host.clone());

        log::info!("session opened for {}", did_document.id);
        Ok(Session {
            issuer: CredentialIssuer::new(settings.did_method.clone()),
            settings,
            keys,
            did_document,
            store,
            anchor,
            supervisor,
        })
    }

    pub fn did(&self) -> &str {
        &self.did_document.id
    }

    pub fn did_document(&self) -> &DidDocument {
        &self.did_document
    }

    /// Ledger address of the session account.
    pub fn address(&self) -> Option<&str> {
        self.keys.signing_key().map(|keys| keys.address())
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    /// Public half of the session encryption key, to hand to issuers.
    pub fn encryption_public_key(&self) -> Option<&EncryptionPublicKey> {
        self.keys.encryption_key().map(|keys| keys.public_key())
    }

    pub fn content_store(&self) -> &ContentAnchorStore {
        &self.store
    }

    pub fn connection(&self) -> ConnectionHandle {
        self.supervisor.handle()
    }

    pub fn connection_state(&self) -> ConnectionState {
        self.supervisor.handle().state()
    }

    /// Issues a credential about `subject_did`, signed by this session.
    ///
    /// # Arguments
    /// * `template` - Credential type and claims
    /// * `subject_did` - DID the claims are about; this session's DID or
    ///   another holder's
    ///
    /// # Returns
    /// A cleartext credential with an embedded proof.
    pub fn issue_credential(&self, template: &CredentialTemplate, subject_did: &str) -> Result<VerifiableCredential> {
        Ok(self.issuer.issue(template, subject_did, &self.keys)?)
    }

    /// Encrypts the subject to this session's own encryption key.
    pub fn encrypt_subject(&self, credential: &VerifiableCredential) -> Result<VerifiableCredential> {
        Ok(disclosure::encrypt_subject(credential, self.encryption_public_key())?)
    }

    /// Encrypts the subject to someone else's encryption key.
    pub fn encrypt_subject_for(
        &self,
        credential: &VerifiableCredential,
        recipient: &EncryptionPublicKey,
    ) -> Result<VerifiableCredential> {
        Ok(disclosure::encrypt_subject(credential, Some(recipient))?)
    }

    /// Opens a subject encrypted to this session's key.
    ///
    /// # Returns
    /// The credential with a cleartext subject; `MalformedCiphertext` or
    /// `DecryptionFailure` when it was not sealed for this session.
    pub fn decrypt_subject(&self, credential: &VerifiableCredential) -> Result<VerifiableCredential> {
        Ok(disclosure::decrypt_subject(credential, self.keys.encryption_key())?)
    }

    /// Checks a credential proof against its issuer's DID document.
    pub fn verify_credential(&self, credential: &VerifiableCredential, issuer_document: &DidDocument) -> Result<()> {
        Ok(ProofVerifier::new().verify(credential, issuer_document)?)
    }

    /// Wraps a credential into an unpublished bundle for this DID.
    pub fn new_bundle(&self, credential: VerifiableCredential) -> AnchorBundle {
        AnchorBundle::new(self.did_document.clone(), credential)
    }

    /// Uploads the bundle to the content store.
    ///
    /// # Arguments
    /// * `bundle` - Bundle to upload; its `content_uri` and `gateway_uri`
    ///   are set from the receipt
    ///
    /// # Returns
    /// Content id and URIs of the upload.
    pub async fn publish(&self, bundle: &mut AnchorBundle) -> Result<PublishReceipt> {
        Ok(self.store.publish(bundle).await?)
    }

    /// Uploads the audit copy of an anchored bundle.
    ///
    /// # Arguments
    /// * `bundle` - Bundle anchored with [`Session::anchor`]
    ///
    /// # Returns
    /// The receipt of the new copy, whose content id differs from the
    /// anchored one. Fails with `Unconfirmed` before the anchor validated.
    pub async fn republish(&self, bundle: &mut AnchorBundle) -> Result<PublishReceipt> {
        Ok(self.store.republish(bundle).await?)
    }

    /// Anchors the bundle on the ledger and records the transaction result
    /// in the bundle.
    ///
    /// The DIDSet writes the bundle's content URI and the compact form of
    /// this session's DID document.
    ///
    /// # Arguments
    /// * `bundle` - A bundle already published with [`Session::publish`]
    ///
    /// # Returns
    /// The validated outcome; `SubmissionFailure` if the bundle was never
    /// published, otherwise the errors of [`LedgerAnchor::anchor_did`].
    pub async fn anchor(&self, bundle: &mut AnchorBundle) -> Result<AnchorOutcome> {
        let uri = bundle.content_uri.clone().ok_or_else(|| {
            LedgerError::SubmissionFailure("bundle has no content URI, publish it first".into())
        })?;
        let signer = self.keys.signing_key().ok_or(IssuanceError::MissingWallet)?;

        let request = AnchorRequest::for_uri(uri).with_document(self.did_document.clone());
        let outcome = self.anchor.anchor_did(signer, request).await?;
        bundle.transaction = Some(outcome.tx_result.clone());
        Ok(outcome)
    }

    /// The DID entry of this session's account.
    ///
    /// # Returns
    /// The ledger record; `NotFound` if nothing was anchored yet.
    pub async fn fetch_anchor(&self) -> Result<LedgerAnchorRecord> {
        let address = self.address().ok_or(IssuanceError::MissingWallet)?;
        self.fetch_anchor_of(address).await
    }

    /// The DID entry of any account.
    ///
    /// # Arguments
    /// * `account` - Classic address of the DID owner
    pub async fn fetch_anchor_of(&self, account: &str) -> Result<LedgerAnchorRecord> {
        Ok(self.anchor.fetch_anchor(account).await?)
    }

    /// Runs the whole protocol for one credential about this session's DID:
    /// issue, encrypt to the session key, publish, anchor and republish the
    /// audit copy.
    pub async fn issue_and_anchor(&self, template: &CredentialTemplate) -> Result<AnchorTrail> {
        let credential = self.issue_credential(template, self.did())?;
        let encrypted = self.encrypt_subject(&credential)?;

        let mut bundle = self.new_bundle(encrypted);
        let anchored = self.publish(&mut bundle).await?;
        let outcome = self.anchor(&mut bundle).await?;
        let audit = self.republish(&mut bundle).await?;

        Ok(AnchorTrail {
            bundle,
            anchored,
            audit,
            outcome,
        })
    }

    /// A predicate engine that decrypts with this session's key.
    pub fn verification_engine(&self) -> VerificationEngine<'_> {
        VerificationEngine::new(&self.keys)
    }

    /// Closes the ledger connection and drops all key material.
    pub async fn close(mut self) {
        self.supervisor.shutdown().await;
        self.keys.clear();
        log::info!("session closed for {}", self.did_document.id);
    }
}
