// src/models/mod.rs
//! Data structures: DID documents, credentials, anchor bundles.

pub mod anchor;
pub mod credential;
pub mod did;
