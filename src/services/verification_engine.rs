// src/services/verification_engine.rs
//! Predicate evaluation over encrypted credentials.
//!
//! The engine holds encrypted payloads and answers yes/no questions about
//! them ("is the subject at least 18?", "is the nationality French?"). The
//! claim set is decrypted only for the duration of one evaluation and is
//! never returned to the caller.

use crate::error::{DecryptionError, NotFoundError, StorageError, VerificationError};
use crate::models::anchor::LedgerAnchorRecord;
use crate::models::credential::{ClaimSet, VerifiableCredential};
use crate::services::disclosure::open_subject;
use crate::storage::ContentAnchorStore;
use crate::wallet::credential_storage::PayloadStore;
use crate::wallet::key_management::KeyManager;
use chrono::{Datelike, NaiveDate, Utc};

pub const BIRTH_DATE_CLAIM: &str = "birthDate";
pub const NATIONALITY_CLAIM: &str = "nationality";

/// A yes/no question about the recorded credential.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Predicate {
    /// Subject is at least this many whole years old today
    AgeAtLeast(u32),
    /// `nationality` claim equals this value
    NationalityEquals(String),
}

impl Predicate {
    /// Predicate kind, safe to log.
    fn kind(&self) -> &'static str {
        match self {
            Predicate::AgeAtLeast(_) => "age-at-least",
            Predicate::NationalityEquals(_) => "nationality-equals",
        }
    }
}

/// Answers predicates using the session's encryption key.
pub struct VerificationEngine<'a> {
    keys: &'a KeyManager,
    payloads: PayloadStore,
}

impl<'a> VerificationEngine<'a> {
    pub fn new(keys: &'a KeyManager) -> Self {
        VerificationEngine {
            keys,
            payloads: PayloadStore::new(),
        }
    }

    /// Records an encrypted credential; later predicates run against it.
    ///
    /// # Arguments
    /// * `credential` - Credential whose subject is encrypted
    ///
    /// # Returns
    /// `CleartextPayload` for a cleartext subject, which is not recorded.
    pub fn record(&mut self, credential: VerifiableCredential) -> Result<(), VerificationError> {
        log::debug!("recording encrypted payload of {}", credential.id);
        self.payloads.store_payload(credential)
    }

    /// Fetches the bundle a ledger DID entry points at and records its
    /// credential.
    ///
    /// # Arguments
    /// * `record` - DID ledger entry whose `URI` names the bundle
    /// * `store` - Content store the bundle was published to
    ///
    /// # Process Flow
    /// 1. Decodes the hex `URI` field of the entry
    /// 2. Downloads and parses the bundle
    /// 3. Records the bundle's (encrypted) credential
    pub async fn load_from_anchor(
        &mut self,
        record: &LedgerAnchorRecord,
        store: &ContentAnchorStore,
    ) -> Result<(), VerificationError> {
        let uri = record.uri().ok_or_else(|| {
            StorageError::InvalidContentUri(format!("DID entry of {} has no URI", record.account))
        })?;
        let bundle = store.fetch_bundle(&uri).await?;
        log::info!("loaded anchored bundle {} for {}", uri, bundle.did);
        self.record(bundle.verifiable_credential)
    }

    /// Evaluates `predicate` against the latest recorded payload, as of today.
    pub fn evaluate_predicate(&self, predicate: &Predicate) -> Result<bool, VerificationError> {
        self.evaluate_at(predicate, Utc::now().date_naive())
    }

    /// Evaluates `predicate` as of `today`.
    pub fn evaluate_at(&self, predicate: &Predicate, today: NaiveDate) -> Result<bool, VerificationError> {
        let claims = self.open_latest()?;
        let result = match predicate {
            Predicate::AgeAtLeast(years) => {
                let birth = birth_date(&claims)?;
                age_on(birth, today).map_or(false, |age| age >= *years)
            }
            Predicate::NationalityEquals(country) => {
                claims.get_str(NATIONALITY_CLAIM) == Some(country.as_str())
            }
        };
        log::debug!("predicate {} evaluated to {}", predicate.kind(), result);
        Ok(result)
    }

    /// Whether the subject is at least `years` old today.
    ///
    /// # Returns
    /// `MissingClaim` or `InvalidClaim` when `birthDate` is absent or not
    /// `YYYY-MM-DD`; a birth date in the future answers `false`.
    pub fn is_over_age(&self, years: u32) -> Result<bool, VerificationError> {
        self.evaluate_predicate(&Predicate::AgeAtLeast(years))
    }

    /// Whether the `nationality` claim equals `country` exactly.
    ///
    /// # Returns
    /// `false` when the claim is missing.
    pub fn has_nationality(&self, country: &str) -> Result<bool, VerificationError> {
        self.evaluate_predicate(&Predicate::NationalityEquals(country.to_string()))
    }

    fn open_latest(&self) -> Result<ClaimSet, VerificationError> {
        let payload = self.payloads.latest().ok_or(NotFoundError::StoredPayload)?;
        let keys = self
            .keys
            .encryption_key()
            .ok_or(DecryptionError::NoEncryptionKey)?;
        Ok(open_subject(&payload.credential_subject, keys)?)
    }
}

fn birth_date(claims: &ClaimSet) -> Result<NaiveDate, VerificationError> {
    let value = claims
        .get(BIRTH_DATE_CLAIM)
        .ok_or(VerificationError::MissingClaim(BIRTH_DATE_CLAIM))?;
    value
        .as_str()
        .and_then(|text| NaiveDate::parse_from_str(text, "%Y-%m-%d").ok())
        .ok_or_else(|| VerificationError::InvalidClaim {
            claim: BIRTH_DATE_CLAIM,
            value: value.to_string(),
        })
}

/// Whole years between `birth` and `today`; `None` if born after `today`.
fn age_on(birth: NaiveDate, today: NaiveDate) -> Option<u32> {
    let mut years = today.year() - birth.year();
    if (today.month(), today.day()) < (birth.month(), birth.day()) {
        years -= 1;
    }
    u32::try_from(years).ok()
}
