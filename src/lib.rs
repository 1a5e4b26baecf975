//! UTXO Hub - a minimal single-process ledger
//!
//! This library implements:
//! - secp256k1 key pairs and base58 addresses
//! - UTXO transactions with per-input signature hashes
//! - A central hub that validates, records and broadcasts transactions
//! - Holder wallets that track their spendable outputs from broadcasts

pub mod config;
pub mod core;
pub mod crypto;
pub mod error;
pub mod network;
pub mod wallet;
pub mod cli;

pub use error::{LedgerError, Result};
