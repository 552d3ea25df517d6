// src/blockchain/mod.rs
//! Ledger layer: DIDSet transactions, the ledger client boundary, the
//! supervised connection and DID anchoring.

pub mod connection;
pub mod did_anchor;
pub mod ledger_client;
pub mod memory_ledger;
pub mod transaction;

pub use connection::{ConnectionHandle, ConnectionState, ConnectionSupervisor};
pub use did_anchor::{AnchorOutcome, AnchorState, LedgerAnchor};
pub use ledger_client::{AccountInfo, LedgerClient, SubmitResult, TxStatus};
pub use memory_ledger::MemoryLedger;
pub use transaction::{AnchorRequest, DidSetTransaction};
