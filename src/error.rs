use crate::core::transaction::OutPoint;
use crate::crypto::hash::Hash256;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, LedgerError>;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LedgerError {
    #[error("Unknown input index {index} (transaction has {count} inputs)")]
    UnknownInputIndex { index: usize, count: usize },

    #[error("Unresolved source transaction: {0}")]
    UnresolvedSource(Hash256),

    #[error("Unresolved output {index} of transaction {txid}")]
    UnresolvedOutput { txid: Hash256, index: u32 },

    #[error("Public key on input {input} does not own the referenced output")]
    OwnershipMismatch { input: usize },

    #[error("Invalid signature on input {input}")]
    InvalidSignature { input: usize },

    #[error("Value creation: outputs {outputs} exceed inputs {inputs}")]
    ValueCreation { inputs: u64, outputs: u64 },

    #[error("Double spend detected for output {0}")]
    DoubleSpend(OutPoint),

    #[error("Transaction {0} is already recorded")]
    DuplicateTransaction(Hash256),

    #[error("Transaction id {actual} does not match its content (expected {expected})")]
    IdMismatch { expected: Hash256, actual: Hash256 },

    #[error("Transaction has neither inputs nor outputs")]
    EmptyTransaction,

    #[error("Issuance is disabled on this hub")]
    IssuanceDisabled,

    #[error("Insufficient funds: required {required}, available {available}")]
    InsufficientFunds { required: u64, available: u64 },

    #[error("Invalid address: {0}")]
    InvalidAddress(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Crypto error: {0}")]
    Crypto(String),

    #[error("Channel closed: {0}")]
    Channel(String),
}

impl<T> From<tokio::sync::mpsc::error::SendError<T>> for LedgerError {
    fn from(_: tokio::sync::mpsc::error::SendError<T>) -> Self {
        LedgerError::Channel("receiver dropped".to_string())
    }
}

impl From<tokio::sync::oneshot::error::RecvError> for LedgerError {
    fn from(_: tokio::sync::oneshot::error::RecvError) -> Self {
        LedgerError::Channel("reply dropped".to_string())
    }
}
