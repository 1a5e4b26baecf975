//! Address derivation and the base58 address text codec.

use crate::crypto::hash::{Hash160, Hash256, HASH160_LEN};
use crate::{LedgerError, Result};

/// Version byte for a standard address.
pub const ADDRESS_VERSION: u8 = 0x00;

const CHECKSUM_LEN: usize = 4;
const PAYLOAD_LEN: usize = 1 + HASH160_LEN + CHECKSUM_LEN;

/// `RIPEMD160(SHA256(public_key))`
pub fn fingerprint(public_key: &[u8]) -> Hash160 {
    Hash160::hash_sha256(public_key)
}

fn checksum(versioned: &[u8]) -> [u8; CHECKSUM_LEN] {
    let hash = Hash256::double_hash(versioned);
    let mut out = [0u8; CHECKSUM_LEN];
    out.copy_from_slice(&hash.as_bytes()[0..CHECKSUM_LEN]);
    out
}

pub fn to_address_text(fingerprint: &Hash160) -> String {
    let mut data = Vec::with_capacity(PAYLOAD_LEN);
    data.push(ADDRESS_VERSION);
    data.extend_from_slice(fingerprint.as_bytes());

    let checksum = checksum(&data);
    data.extend_from_slice(&checksum);

    bs58::encode(data).into_string()
}

/// Decode address text back to its fingerprint.
///
/// The decoded payload must be 25 bytes with the standard version byte and a
/// valid trailing checksum. The fingerprint is bytes `[1, 21)`.
pub fn from_address_text(address: &str) -> Result<Hash160> {
    let decoded = bs58::decode(address)
        .into_vec()
        .map_err(|e| LedgerError::InvalidAddress(format!("{}: {}", address, e)))?;

    if decoded.len() != PAYLOAD_LEN {
        return Err(LedgerError::InvalidAddress(format!(
            "{}: expected {} bytes, got {}",
            address,
            PAYLOAD_LEN,
            decoded.len()
        )));
    }

    if decoded[0] != ADDRESS_VERSION {
        return Err(LedgerError::InvalidAddress(format!(
            "{}: unknown version byte {:#04x}",
            address, decoded[0]
        )));
    }

    let (versioned, check) = decoded.split_at(1 + HASH160_LEN);
    if checksum(versioned) != check {
        return Err(LedgerError::InvalidAddress(format!("{}: bad checksum", address)));
    }

    Hash160::from_slice(&decoded[1..1 + HASH160_LEN])
        .ok_or_else(|| LedgerError::InvalidAddress(address.to_string()))
}
