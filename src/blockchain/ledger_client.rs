// src/blockchain/ledger_client.rs
//! Boundary to the ledger.
//!
//! [`LedgerClient`] is the narrow interface the anchoring code needs from a
//! ledger connection. Wire encoding, websocket framing and server
//! selection live behind it.

use crate::blockchain::transaction::DidSetTransaction;
use crate::error::LedgerError;
use crate::models::anchor::LedgerAnchorRecord;
use async_trait::async_trait;

/// `account_info` result.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccountInfo {
    pub account: String,
    /// Next sequence number the account must use
    pub sequence: u32,
    pub balance_drops: u64,
}

/// Preliminary result of a submission.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubmitResult {
    pub hash: String,
    pub engine_result: String,
    /// True when the transaction was queued for inclusion in a ledger
    pub accepted: bool,
}

/// Where a submitted transaction stands.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TxStatus {
    /// Known but not in a validated ledger yet
    Pending,
    Validated { ledger_index: u32, engine_result: String },
    /// Included or dropped with a failure code
    Failed { engine_result: String },
    Unknown,
}

/// Ledger operations needed to anchor and look up DIDs.
#[async_trait]
pub trait LedgerClient: Send + Sync {
    /// (Re-)establishes the connection.
    async fn connect(&self) -> Result<(), LedgerError>;

    /// Fails with [`LedgerError::AccountNotFound`] for unfunded accounts.
    async fn account_info(&self, account: &str) -> Result<AccountInfo, LedgerError>;

    /// Current open-ledger fee, in drops.
    async fn fee(&self) -> Result<u64, LedgerError>;

    async fn current_ledger_index(&self) -> Result<u32, LedgerError>;

    async fn submit(&self, transaction: &DidSetTransaction) -> Result<SubmitResult, LedgerError>;

    async fn transaction_status(&self, hash: &str) -> Result<TxStatus, LedgerError>;

    /// The DID entry owned by `account`, if any.
    async fn did_entry(&self, account: &str) -> Result<Option<LedgerAnchorRecord>, LedgerError>;
}
