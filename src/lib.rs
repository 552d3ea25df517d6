// src/lib.rs
//! # decid
//!
//! Issues Verifiable Credentials bound to an XRP Ledger DID, publishes them
//! with the claim set encrypted, anchors the publication on the ledger with
//! a DIDSet transaction, and answers yes/no predicates over the encrypted
//! claims.
//!
//! ## Architecture Overview
//! 1. **Wallet**: family seeds, signing and encryption keys (`wallet`)
//! 2. **Services**: issuance, selective disclosure, proof checks, predicate
//!    evaluation and the [`Session`] context (`services`)
//! 3. **Storage**: content-addressed publishing on IPFS (`storage`)
//! 4. **Blockchain**: DIDSet anchoring over a supervised ledger connection
//!    (`blockchain`)

pub mod blockchain;
pub mod config;
pub mod error;
pub mod models;
pub mod services;
pub mod storage;
pub mod utils;
pub mod wallet;

pub use config::Settings;
pub use error::{Error, ErrorKind, Result};
pub use services::session::{AnchorTrail, Session};
