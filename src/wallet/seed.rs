// src/wallet/seed.rs
//! Ledger family seeds and classic addresses.
//!
//! Seeds and addresses use base58check with the ripple alphabet: the
//! payload is followed by the first four bytes of a double SHA-256.
//!
//! | kind              | prefix           | payload            |
//! |-------------------|------------------|--------------------|
//! | ed25519 seed      | `01 E1 4B`       | 16 bytes entropy   |
//! | secp256k1 seed    | `21`             | 16 bytes entropy   |
//! | classic address   | `00`             | 20 byte account id |

use crate::error::KeyError;
use crate::utils::crypto::sha256;
use bs58::Alphabet;

const ED25519_SEED_PREFIX: [u8; 3] = [0x01, 0xE1, 0x4B];
const SECP256K1_SEED_PREFIX: [u8; 1] = [0x21];
const ACCOUNT_ID_PREFIX: [u8; 1] = [0x00];
const ENTROPY_LEN: usize = 16;
const CHECKSUM_LEN: usize = 4;

/// Key family a seed selects.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SeedFamily {
    Ed25519,
    Secp256k1,
}

/// A decoded family seed: 16 bytes of entropy plus the key family.
pub struct FamilySeed {
    pub family: SeedFamily,
    pub entropy: [u8; ENTROPY_LEN],
}

impl std::fmt::Debug for FamilySeed {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FamilySeed")
            .field("family", &self.family)
            .field("entropy", &"<redacted>")
            .finish()
    }
}

impl FamilySeed {
    /// Decodes a base58 seed such as `sEd…` or `s…`.
    pub fn decode(seed: &str) -> Result<Self, KeyError> {
        let payload = decode_checked(seed.trim())
            .map_err(|reason| KeyError::InvalidSeed(reason.to_string()))?;

        let (family, entropy) = if payload.len() == ED25519_SEED_PREFIX.len() + ENTROPY_LEN
            && payload.starts_with(&ED25519_SEED_PREFIX)
        {
            (SeedFamily::Ed25519, &payload[ED25519_SEED_PREFIX.len()..])
        } else if payload.len() == SECP256K1_SEED_PREFIX.len() + ENTROPY_LEN
            && payload.starts_with(&SECP256K1_SEED_PREFIX)
        {
            (SeedFamily::Secp256k1, &payload[SECP256K1_SEED_PREFIX.len()..])
        } else {
            return Err(KeyError::InvalidSeed("unknown seed prefix or length".into()));
        };

        let mut bytes = [0u8; ENTROPY_LEN];
        bytes.copy_from_slice(entropy);
        Ok(FamilySeed { family, entropy: bytes })
    }

    /// Encodes the seed back to its base58 form.
    pub fn encode(&self) -> String {
        let prefix: &[u8] = match self.family {
            SeedFamily::Ed25519 => &ED25519_SEED_PREFIX,
            SeedFamily::Secp256k1 => &SECP256K1_SEED_PREFIX,
        };
        encode_checked(prefix, &self.entropy)
    }
}

/// Encodes a 20 byte account id as a classic `r…` address.
pub fn encode_address(account_id: &[u8; 20]) -> String {
    encode_checked(&ACCOUNT_ID_PREFIX, account_id)
}

/// Decodes a classic address back to its account id.
pub fn decode_address(address: &str) -> Result<[u8; 20], KeyError> {
    let payload = decode_checked(address)
        .map_err(|reason| KeyError::InvalidAddress(format!("{}: {}", address, reason)))?;
    if payload.len() != 21 || payload[0] != ACCOUNT_ID_PREFIX[0] {
        return Err(KeyError::InvalidAddress(address.to_string()));
    }
    let mut id = [0u8; 20];
    id.copy_from_slice(&payload[1..]);
    Ok(id)
}

fn encode_checked(prefix: &[u8], body: &[u8]) -> String {
    let mut bytes = Vec::with_capacity(prefix.len() + body.len() + CHECKSUM_LEN);
    bytes.extend_from_slice(prefix);
    bytes.extend_from_slice(body);
    let checksum = sha256(&sha256(&bytes));
    bytes.extend_from_slice(&checksum[..CHECKSUM_LEN]);
    bs58::encode(bytes).with_alphabet(Alphabet::RIPPLE).into_string()
}

fn decode_checked(encoded: &str) -> Result<Vec<u8>, &'static str> {
    let mut bytes = bs58::decode(encoded)
        .with_alphabet(Alphabet::RIPPLE)
        .into_vec()
        .map_err(|_| "not base58")?;
    if bytes.len() <= CHECKSUM_LEN {
        return Err("too short");
    }
    let split = bytes.len() - CHECKSUM_LEN;
    let checksum = sha256(&sha256(&bytes[..split]));
    if checksum[..CHECKSUM_LEN] != bytes[split..] {
        return Err("checksum mismatch");
    }
    bytes.truncate(split);
    Ok(bytes)
}
