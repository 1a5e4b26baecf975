//! Core ledger components

pub mod store;
pub mod transaction;
pub mod utxo;

pub use store::{TransactionLookup, TransactionStore};
pub use transaction::{Input, OutPoint, Output, Transaction};
pub use utxo::{UtxoEntry, UtxoSet};
