//! Per-holder wallets tracking spendable outputs

pub mod wallet;

pub use wallet::{PendingTransfer, Wallet, WalletHandle, WalletInfo};
