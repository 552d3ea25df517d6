// src/blockchain/memory_ledger.rs
//! In-process ledger.
//!
//! Applies DIDSet transactions with the same checks a validator would:
//! signature, signer/account binding, funded account, fee, sequence,
//! field limits and `LastLedgerSequence` expiry. A ledger closes every time
//! a transaction status is polled, unless closing is frozen.
//!
//! Used by the demo binary and by tests; it also exposes knobs to drop the
//! connection, refuse reconnects and stall validation.

use crate::blockchain::ledger_client::{AccountInfo, LedgerClient, SubmitResult, TxStatus};
use crate::blockchain::transaction::{DidSetTransaction, DID_SET, MAX_FIELD_BYTES};
use crate::error::LedgerError;
use crate::models::anchor::LedgerAnchorRecord;
use crate::utils::crypto::{account_id, sha512_half};
use crate::utils::serialization::{from_hex, to_ledger_hex};
use crate::wallet::seed::{decode_address, encode_address};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};

/// Keylet space of DID entries.
const DID_SPACE: [u8; 2] = [0x00, 0x49];
const BASE_FEE_DROPS: u64 = 10;

struct AccountRoot {
    sequence: u32,
    balance: u64,
}

struct LedgerState {
    connected: bool,
    refuse_connections: bool,
    frozen: bool,
    ledger_index: u32,
    base_fee: u64,
    accounts: HashMap<String, AccountRoot>,
    dids: HashMap<String, LedgerAnchorRecord>,
    pending: Vec<(String, DidSetTransaction)>,
    statuses: HashMap<String, TxStatus>,
    history: Vec<DidSetTransaction>,
}

/// A single-node ledger held in memory.
pub struct MemoryLedger {
    state: Mutex<LedgerState>,
}

impl Default for MemoryLedger {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryLedger {
    pub fn new() -> Self {
        MemoryLedger {
            state: Mutex::new(LedgerState {
                connected: false,
                refuse_connections: false,
                frozen: false,
                ledger_index: 1,
                base_fee: BASE_FEE_DROPS,
                accounts: HashMap::new(),
                dids: HashMap::new(),
                pending: Vec::new(),
                statuses: HashMap::new(),
                history: Vec::new(),
            }),
        }
    }

    fn state(&self) -> MutexGuard<'_, LedgerState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Credits `drops` to `address`, creating the account if needed.
    pub fn fund(&self, address: &str, drops: u64) {
        let mut state = self.state();
        let sequence = state.ledger_index;
        let account = state
            .accounts
            .entry(address.to_string())
            .or_insert(AccountRoot { sequence, balance: 0 });
        account.balance += drops;
        log::debug!("funded {} with {} drops", address, drops);
    }

    /// Changes the fee the ledger asks for from now on.
    pub fn set_base_fee(&self, drops: u64) {
        self.state().base_fee = drops;
    }

    /// Simulates the transport dropping.
    pub fn drop_connection(&self) {
        self.state().connected = false;
    }

    /// Makes every later `connect` fail while set.
    pub fn refuse_connections(&self, refuse: bool) {
        self.state().refuse_connections = refuse;
    }

    /// Stops ledgers from closing, so nothing validates while set.
    pub fn freeze(&self, frozen: bool) {
        self.state().frozen = frozen;
    }

    /// Every transaction accepted so far, in submission order.
    pub fn submitted(&self) -> Vec<DidSetTransaction> {
        self.state().history.clone()
    }

    /// Closes the current ledger, applying or expiring pending transactions.
    pub fn close_ledger(&self) -> u32 {
        let mut state = self.state();
        state.ledger_index += 1;
        let ledger_index = state.ledger_index;

        for (hash, tx) in std::mem::take(&mut state.pending) {
            let status = apply(&mut state, &hash, &tx, ledger_index);
            log::debug!("ledger {} closed tx {}: {:?}", ledger_index, hash, status);
            state.statuses.insert(hash, status);
        }
        ledger_index
    }

    fn ensure_connected(&self) -> Result<(), LedgerError> {
        if self.state().connected {
            Ok(())
        } else {
            Err(LedgerError::Disconnected)
        }
    }
}

fn apply(state: &mut LedgerState, hash: &str, tx: &DidSetTransaction, ledger_index: u32) -> TxStatus {
    let failed = |code: &str| TxStatus::Failed {
        engine_result: code.to_string(),
    };
    if tx.last_ledger_sequence < ledger_index {
        return failed("tefMAX_LEDGER");
    }
    let fee = tx.fee_drops().unwrap_or(u64::MAX);
    let Some(account) = state.accounts.get_mut(&tx.account) else {
        return failed("terNO_ACCOUNT");
    };
    if account.sequence != tx.sequence {
        return failed("tefPAST_SEQ");
    }
    if account.balance < fee {
        return failed("terINSUF_FEE_B");
    }
    account.sequence += 1;
    account.balance -= fee;

    let index = match decode_address(&tx.account) {
        Ok(id) => {
            let mut key = DID_SPACE.to_vec();
            key.extend_from_slice(&id);
            to_ledger_hex(&sha512_half(&key))
        }
        Err(_) => return failed("temBAD_SRC_ACCOUNT"),
    };
    let record = state
        .dids
        .entry(tx.account.clone())
        .or_insert_with(|| LedgerAnchorRecord {
            account: tx.account.clone(),
            did_document_hex: None,
            data_hex: None,
            uri_hex: None,
            flags: 0,
            entry_type: "DID".to_string(),
            owner_node: "0".to_string(),
            previous_txn_id: String::new(),
            previous_txn_ledger_seq: 0,
            index,
        });
    if tx.did_document.is_some() {
        record.did_document_hex = tx.did_document.clone();
    }
    if tx.uri.is_some() {
        record.uri_hex = tx.uri.clone();
    }
    if tx.data.is_some() {
        record.data_hex = tx.data.clone();
    }
    record.previous_txn_id = hash.to_string();
    record.previous_txn_ledger_seq = ledger_index;

    TxStatus::Validated {
        ledger_index,
        engine_result: "tesSUCCESS".to_string(),
    }
}

/// Stateless checks a server runs before queuing a transaction.
fn preflight(tx: &DidSetTransaction) -> Result<(), &'static str> {
    if tx.transaction_type != DID_SET {
        return Err("temUNKNOWN");
    }
    let fields = [&tx.did_document, &tx.uri, &tx.data];
    if fields.iter().all(|field| field.is_none()) {
        return Err("temEMPTY_DID");
    }
    for field in fields.into_iter().flatten() {
        match from_hex(field) {
            Ok(bytes) if !bytes.is_empty() && bytes.len() <= MAX_FIELD_BYTES => {}
            _ => return Err("temMALFORMED"),
        }
    }
    if !tx.verify() {
        return Err("temBAD_SIGNATURE");
    }
    let signer = from_hex(&tx.signing_pub_key).map_err(|_| "temBAD_SIGNATURE")?;
    if encode_address(&account_id(&signer)) != tx.account {
        return Err("tefBAD_AUTH");
    }
    Ok(())
}

#[async_trait]
impl LedgerClient for MemoryLedger {
    async fn connect(&self) -> Result<(), LedgerError> {
        let mut state = self.state();
        if state.refuse_connections {
            return Err(LedgerError::Transport("connection refused".into()));
        }
        state.connected = true;
        Ok(())
    }

    async fn account_info(&self, account: &str) -> Result<AccountInfo, LedgerError> {
        self.ensure_connected()?;
        let state = self.state();
        let root = state
            .accounts
            .get(account)
            .ok_or_else(|| LedgerError::AccountNotFound(account.to_string()))?;
        Ok(AccountInfo {
            account: account.to_string(),
            sequence: root.sequence,
            balance_drops: root.balance,
        })
    }

    async fn fee(&self) -> Result<u64, LedgerError> {
        self.ensure_connected()?;
        Ok(self.state().base_fee)
    }

    async fn current_ledger_index(&self) -> Result<u32, LedgerError> {
        self.ensure_connected()?;
        Ok(self.state().ledger_index)
    }

    async fn submit(&self, transaction: &DidSetTransaction) -> Result<SubmitResult, LedgerError> {
        self.ensure_connected()?;
        let hash = transaction.hash()?;
        let rejected = |code: &str| SubmitResult {
            hash: hash.clone(),
            engine_result: code.to_string(),
            accepted: false,
        };

        if let Err(code) = preflight(transaction) {
            return Ok(rejected(code));
        }

        let mut state = self.state();
        if state.statuses.contains_key(&hash) {
            return Ok(rejected("tefALREADY"));
        }
        let Some(account) = state.accounts.get(&transaction.account) else {
            return Ok(rejected("terNO_ACCOUNT"));
        };
        if transaction.sequence < account.sequence {
            return Ok(rejected("tefPAST_SEQ"));
        }
        if transaction.sequence > account.sequence {
            return Ok(rejected("terPRE_SEQ"));
        }
        if transaction.fee_drops().unwrap_or(0) < state.base_fee {
            return Ok(rejected("telINSUF_FEE_P"));
        }
        if transaction.last_ledger_sequence < state.ledger_index {
            return Ok(rejected("tefMAX_LEDGER"));
        }

        state.pending.push((hash.clone(), transaction.clone()));
        state.statuses.insert(hash.clone(), TxStatus::Pending);
        state.history.push(transaction.clone());
        Ok(SubmitResult {
            hash,
            engine_result: "tesSUCCESS".to_string(),
            accepted: true,
        })
    }

    async fn transaction_status(&self, hash: &str) -> Result<TxStatus, LedgerError> {
        self.ensure_connected()?;
        let frozen = self.state().frozen;
        if !frozen {
            self.close_ledger();
        }
        Ok(self
            .state()
            .statuses
            .get(hash)
            .cloned()
            .unwrap_or(TxStatus::Unknown))
    }

    async fn did_entry(&self, account: &str) -> Result<Option<LedgerAnchorRecord>, LedgerError> {
        self.ensure_connected()?;
        Ok(self.state().dids.get(account).cloned())
    }
}
