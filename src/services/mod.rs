// src/services/mod.rs
//! Credential lifecycle services and the session that ties them together.

pub mod credential_issuer;
pub mod disclosure;
pub mod session;
pub mod verification_engine;
pub mod verifier;

pub use credential_issuer::CredentialIssuer;
pub use session::{AnchorTrail, Session};
pub use verification_engine::{Predicate, VerificationEngine};
pub use verifier::ProofVerifier;
