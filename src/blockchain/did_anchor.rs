// src/blockchain/did_anchor.rs
//! Anchors a DID on the ledger with a DIDSet transaction.
//!
//! An anchor goes through `Unsubmitted -> Submitted -> {Validated |
//! Rejected | TimedOut}`. Nothing is resubmitted automatically: a
//! rejected or timed out anchor is reported to the caller, who decides
//! whether to try again with a fresh sequence number.

use crate::blockchain::connection::{ConnectionHandle, ConnectionState};
use crate::blockchain::ledger_client::{LedgerClient, TxStatus};
use crate::blockchain::transaction::{AnchorRequest, Autofill, DidSetTransaction};
use crate::config::LedgerSettings;
use crate::error::{LedgerError, NotFoundError};
use crate::models::anchor::{LedgerAnchorRecord, TxResult};
use crate::wallet::key_management::SigningKeyPair;
use std::sync::Arc;
use tokio::sync::watch;
use tokio::time::{Instant, MissedTickBehavior};

const SUCCESS: &str = "tesSUCCESS";

/// Lifecycle of one anchor attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AnchorState {
    Unsubmitted,
    Submitted,
    Validated,
    Rejected,
    TimedOut,
}

/// A validated anchor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnchorOutcome {
    pub tx_result: TxResult,
    pub tx_hash: String,
}

/// Submits DIDSet transactions and looks up DID entries.
pub struct LedgerAnchor {
    client: Arc<dyn LedgerClient>,
    connection: ConnectionHandle,
    settings: LedgerSettings,
}

impl LedgerAnchor {
    pub fn new(client: Arc<dyn LedgerClient>, connection: ConnectionHandle, settings: LedgerSettings) -> Self {
        LedgerAnchor {
            client,
            connection,
            settings,
        }
    }

    /// Builds, signs and submits a DIDSet for the key's account, then waits
    /// for it to be validated.
    ///
    /// # Errors
    /// * [`LedgerError::AccountNotFound`] if the account was never funded
    /// * [`LedgerError::SubmissionFailure`] if the request is empty, a field
    ///   is oversized, or the server refuses the transaction
    /// * [`LedgerError::Rejected`] if the transaction failed in a ledger
    /// * [`LedgerError::TimeoutError`] if it was not validated in time
    /// * [`LedgerError::Disconnected`] if the connection dropped meanwhile
    pub async fn anchor_did(&self, keys: &SigningKeyPair, request: AnchorRequest) -> Result<AnchorOutcome, LedgerError> {
        let mut link = self.connection.subscribe();
        if *link.borrow_and_update() != ConnectionState::Connected {
            return Err(LedgerError::Disconnected);
        }

        let account = keys.address();
        let fill = self.autofill(account).await?;
        let transaction = DidSetTransaction::build(account, &request, fill)?.sign(keys)?;
        let hash = transaction.hash()?;
        let mut state = AnchorState::Unsubmitted;

        let submitted = self.observe(self.client.submit(&transaction).await)?;
        if !submitted.accepted {
            log::warn!("DIDSet {} refused: {}", hash, submitted.engine_result);
            return Err(LedgerError::SubmissionFailure(format!(
                "transaction {} refused with {}",
                hash, submitted.engine_result
            )));
        }
        advance(&hash, &mut state, AnchorState::Submitted);

        let timeout = self.settings.validation_timeout();
        let waited = tokio::time::timeout(
            timeout,
            self.await_validation(&hash, fill.last_ledger_sequence, &mut link),
        )
        .await;

        let ledger_index = match waited {
            Ok(Ok(ledger_index)) => ledger_index,
            Ok(Err(e)) => {
                match e {
                    LedgerError::Rejected { .. } => advance(&hash, &mut state, AnchorState::Rejected),
                    LedgerError::TimeoutError { .. } => advance(&hash, &mut state, AnchorState::TimedOut),
                    _ => {}
                }
                return Err(e);
            }
            Err(_) => {
                advance(&hash, &mut state, AnchorState::TimedOut);
                return Err(LedgerError::TimeoutError { hash, waited: timeout });
            }
        };
        advance(&hash, &mut state, AnchorState::Validated);

        Ok(AnchorOutcome {
            tx_result: TxResult {
                hash: hash.clone(),
                ledger_index,
                engine_result: SUCCESS.to_string(),
                validated: true,
                uri: request.uri,
            },
            tx_hash: hash,
        })
    }

    /// Looks up the DID ledger entry of `account`.
    ///
    /// # Arguments
    /// * `account` - Classic address of the DID owner
    ///
    /// # Returns
    /// The entry with its hex fields as stored on the ledger; decode them
    /// with [`LedgerAnchorRecord::uri`] and
    /// [`LedgerAnchorRecord::did_document`]. Fails with
    /// [`NotFoundError::LedgerEntry`] when the account has no DID.
    pub async fn fetch_anchor(&self, account: &str) -> Result<LedgerAnchorRecord, LedgerError> {
        self.observe(self.client.did_entry(account).await)?
            .ok_or_else(|| NotFoundError::LedgerEntry(account.to_string()).into())
    }

    async fn autofill(&self, account: &str) -> Result<Autofill, LedgerError> {
        let info = self.observe(self.client.account_info(account).await)?;
        let fee_drops = self
            .observe(self.client.fee().await)?
            .max(self.settings.fee_drops_floor);
        let current = self.observe(self.client.current_ledger_index().await)?;

        Ok(Autofill {
            sequence: info.sequence,
            fee_drops,
            last_ledger_sequence: current + self.settings.last_ledger_offset,
        })
    }

    /// Polls until the transaction lands in a validated ledger. Returns the
    /// ledger index.
    async fn await_validation(
        &self,
        hash: &str,
        last_ledger_sequence: u32,
        link: &mut watch::Receiver<ConnectionState>,
    ) -> Result<u32, LedgerError> {
        let started = Instant::now();
        let mut ticker = tokio::time::interval(self.settings.poll_interval());
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = link.changed() => return Err(LedgerError::Disconnected),
                _ = ticker.tick() => {}
            }

            match self.observe(self.client.transaction_status(hash).await)? {
                TxStatus::Validated {
                    ledger_index,
                    engine_result,
                } if engine_result == SUCCESS => return Ok(ledger_index),
                TxStatus::Validated { engine_result, .. } | TxStatus::Failed { engine_result } => {
                    return Err(LedgerError::Rejected {
                        hash: hash.to_string(),
                        engine_result,
                    })
                }
                TxStatus::Pending | TxStatus::Unknown => {
                    let current = self.observe(self.client.current_ledger_index().await)?;
                    if current > last_ledger_sequence {
                        return Err(LedgerError::TimeoutError {
                            hash: hash.to_string(),
                            waited: started.elapsed(),
                        });
                    }
                }
            }
        }
    }

    /// Passes `result` through, reporting a dropped link to the supervisor.
    fn observe<T>(&self, result: Result<T, LedgerError>) -> Result<T, LedgerError> {
        if let Err(LedgerError::Disconnected) = result {
            self.connection.report_disconnect();
        }
        result
    }
}

fn advance(hash: &str, state: &mut AnchorState, next: AnchorState) {
    log::info!("DIDSet {}: {:?} -> {:?}", hash, state, next);
    *state = next;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::blockchain::connection::ConnectionSupervisor;
    use crate::blockchain::memory_ledger::MemoryLedger;
    use std::time::Duration;

    const GENESIS_SEED: &str = "snoPBrXtMeMyMHUVTgbuqAfg1SUTb";

    fn settings() -> LedgerSettings {
        LedgerSettings {
            validation_timeout_secs: 1,
            poll_interval_ms: 10,
            reconnect_backoff_ms: 1,
            ..LedgerSettings::default()
        }
    }

    async fn setup() -> (Arc<MemoryLedger>, ConnectionSupervisor, LedgerAnchor, SigningKeyPair) {
        let keys = SigningKeyPair::from_seed(GENESIS_SEED).unwrap();
        let ledger = Arc::new(MemoryLedger::new());
        ledger.fund(keys.address(), 1_000_000);
        let supervisor = ConnectionSupervisor::start(ledger.clone(), &settings()).await.unwrap();
        let anchor = LedgerAnchor::new(ledger.clone(), supervisor.handle(), settings());
        (ledger, supervisor, anchor, keys)
    }

    #[tokio::test]
    async fn test_anchor_did_validates_and_is_fetchable() {
        let (ledger, supervisor, anchor, keys) = setup().await;

        let outcome = anchor
            .anchor_did(&keys, AnchorRequest::for_uri("ipfs://bafkfirst"))
            .await
            .unwrap();
        assert!(outcome.tx_result.validated);
        assert_eq!(outcome.tx_result.engine_result, "tesSUCCESS");
        assert_eq!(outcome.tx_result.uri.as_deref(), Some("ipfs://bafkfirst"));
        assert_eq!(outcome.tx_hash, outcome.tx_result.hash);

        let record = anchor.fetch_anchor(keys.address()).await.unwrap();
        assert_eq!(record.uri().as_deref(), Some("ipfs://bafkfirst"));
        assert_eq!(record.previous_txn_id, outcome.tx_hash);

        let submitted = ledger.submitted();
        assert_eq!(submitted.len(), 1);
        assert!(submitted[0].fee_drops().unwrap() >= 10);
        supervisor.shutdown().await;
    }

    #[tokio::test]
    async fn test_anchor_carries_did_document() {
        let (_ledger, supervisor, anchor, keys) = setup().await;
        let document = crate::models::did::DidDocument::for_account("xrpl", &keys);

        let request = AnchorRequest::for_uri("ipfs://bafk").with_document(document.clone());
        anchor.anchor_did(&keys, request).await.unwrap();

        let record = anchor.fetch_anchor(keys.address()).await.unwrap();
        assert_eq!(record.did_document("xrpl"), Some(document));
        assert_eq!(record.uri().as_deref(), Some("ipfs://bafk"));
        supervisor.shutdown().await;
    }

    #[tokio::test]
    async fn test_unfunded_account_is_reported() {
        let ledger = Arc::new(MemoryLedger::new());
        let supervisor = ConnectionSupervisor::start(ledger.clone(), &settings()).await.unwrap();
        let anchor = LedgerAnchor::new(ledger, supervisor.handle(), settings());
        let keys = SigningKeyPair::from_seed(GENESIS_SEED).unwrap();

        let result = anchor.anchor_did(&keys, AnchorRequest::for_uri("ipfs://bafk")).await;
        assert!(matches!(result, Err(LedgerError::AccountNotFound(_))));
        supervisor.shutdown().await;
    }

    #[tokio::test]
    async fn test_empty_request_fails_before_submission() {
        let (ledger, supervisor, anchor, keys) = setup().await;

        let result = anchor.anchor_did(&keys, AnchorRequest::default()).await;
        assert!(matches!(result, Err(LedgerError::SubmissionFailure(_))));
        assert!(ledger.submitted().is_empty());
        supervisor.shutdown().await;
    }

    #[tokio::test]
    async fn test_underfunded_transaction_is_rejected() {
        let keys = SigningKeyPair::from_seed(GENESIS_SEED).unwrap();
        let ledger = Arc::new(MemoryLedger::new());
        ledger.fund(keys.address(), 5);
        let supervisor = ConnectionSupervisor::start(ledger.clone(), &settings()).await.unwrap();
        let anchor = LedgerAnchor::new(ledger, supervisor.handle(), settings());

        let result = anchor.anchor_did(&keys, AnchorRequest::for_uri("ipfs://bafk")).await;
        match result {
            Err(LedgerError::Rejected { engine_result, .. }) => assert_eq!(engine_result, "terINSUF_FEE_B"),
            other => panic!("expected rejection, got {:?}", other),
        }
        supervisor.shutdown().await;
    }

    #[tokio::test]
    async fn test_stalled_validation_times_out() {
        let (ledger, supervisor, anchor, keys) = setup().await;
        ledger.freeze(true);

        let result = anchor.anchor_did(&keys, AnchorRequest::for_uri("ipfs://bafk")).await;
        assert!(matches!(result, Err(LedgerError::TimeoutError { .. })));
        supervisor.shutdown().await;
    }

    #[tokio::test]
    async fn test_drop_mid_flight_fails_with_disconnected() {
        let (ledger, supervisor, anchor, keys) = setup().await;
        let handle = supervisor.handle();
        ledger.freeze(true);

        let (result, _) = tokio::join!(
            anchor.anchor_did(&keys, AnchorRequest::for_uri("ipfs://bafk")),
            async {
                tokio::time::sleep(Duration::from_millis(50)).await;
                ledger.drop_connection();
                handle.report_disconnect();
            }
        );

        assert!(matches!(result, Err(LedgerError::Disconnected)));
        supervisor.shutdown().await;
    }

    #[tokio::test]
    async fn test_missing_entry_is_not_found() {
        let (_ledger, supervisor, anchor, keys) = setup().await;

        let result = anchor.fetch_anchor(keys.address()).await;
        assert!(matches!(
            result,
            Err(LedgerError::NotFound(NotFoundError::LedgerEntry(_)))
        ));
        supervisor.shutdown().await;
    }
}
