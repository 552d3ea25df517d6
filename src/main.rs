// src/main.rs

//! # decid - demo entry point
//!
//! Runs the whole credential lifecycle once against an in-process ledger
//! and the configured content store:
//! 1. open a session from a family seed
//! 2. issue an identity credential and encrypt its subject
//! 3. publish the bundle, anchor it with a DIDSet, republish the audit copy
//! 4. read the anchor back and evaluate predicates over the ciphertext
//!
//! ## Environment Variables
//! - `DECID_SEED`: (Optional) family seed of the account, a random Ed25519
//!   seed is used otherwise
//! - `DECID_BIRTH_DATE`, `DECID_NATIONALITY`: (Optional) demo claims
//! - `DECID__<SECTION>__<KEY>`: settings overrides, see `decid::config`
//! - `RUST_LOG`: log filter, e.g. `RUST_LOG=info`

use anyhow::Context;
use decid::blockchain::MemoryLedger;
use decid::config::{StorageBackend, StorageSettings};
use decid::models::credential::CredentialTemplate;
use decid::storage::{ContentStore, IpfsNodeStore, MemoryContentStore, PinataStore};
use decid::wallet::seed::{FamilySeed, SeedFamily};
use decid::wallet::SigningKeyPair;
use decid::{Session, Settings};
use dotenv::dotenv;
use std::sync::Arc;

/// Drops credited to the demo account on the in-process ledger.
const DEMO_FUNDING_DROPS: u64 = 100_000_000;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables from .env file
    dotenv().ok();
    env_logger::init();

    let settings = Settings::load().context("failed to load settings")?;
    let seed = match std::env::var("DECID_SEED") {
        Ok(seed) => seed,
        Err(_) => {
            log::warn!("DECID_SEED not set, using a throwaway Ed25519 account");
            FamilySeed {
                family: SeedFamily::Ed25519,
                entropy: rand::random(),
            }
            .encode()
        }
    };

    let ledger = Arc::new(MemoryLedger::new());
    let account = SigningKeyPair::from_seed(&seed).context("DECID_SEED is not a valid family seed")?;
    ledger.fund(account.address(), DEMO_FUNDING_DROPS);

    let content = content_store(&settings.storage)?;
    let session = Session::open(&seed, settings, ledger.clone(), content)
        .await
        .context("failed to open session")?;
    log::info!("subject DID: {}", session.did());

    let birth_date = std::env::var("DECID_BIRTH_DATE").unwrap_or_else(|_| "1990-05-17".to_string());
    let nationality = std::env::var("DECID_NATIONALITY").unwrap_or_else(|_| "French".to_string());
    let template = CredentialTemplate::new("IdentityCard")
        .with_claim("birthDate", birth_date)
        .with_claim("nationality", nationality);

    let trail = session
        .issue_and_anchor(&template)
        .await
        .context("credential lifecycle failed")?;
    log::info!(
        "anchored {} in ledger {} (tx {})",
        trail.anchored.content_uri,
        trail.outcome.tx_result.ledger_index,
        trail.outcome.tx_hash
    );
    log::info!("audit copy: {}", trail.audit.gateway_uri);

    let record = session.fetch_anchor().await?;
    let mut engine = session.verification_engine();
    engine.load_from_anchor(&record, session.content_store()).await?;
    log::info!("over 18: {}", engine.is_over_age(18)?);
    log::info!("nationality is French: {}", engine.has_nationality("French")?);

    session.close().await;
    Ok(())
}

/// Builds the content store selected in the settings.
fn content_store(storage: &StorageSettings) -> anyhow::Result<Arc<dyn ContentStore>> {
    let store: Arc<dyn ContentStore> = match storage.backend {
        StorageBackend::Ipfs => Arc::new(IpfsNodeStore::new(&storage.ipfs_api_url)?),
        StorageBackend::Pinata => Arc::new(PinataStore::new(
            storage.pinata_endpoint.clone(),
            storage.pinata_jwt.clone(),
            storage.gateway_host.clone(),
        )),
        StorageBackend::Memory => Arc::new(MemoryContentStore::new()),
    };
    Ok(store)
}
