use crate::core::transaction::{OutPoint, Output, Transaction};
use crate::crypto::hash::Hash256;
use crate::{LedgerError, Result};
use std::collections::HashMap;

/// Resolves transaction ids to previously accepted transactions.
pub trait TransactionLookup {
    fn transaction(&self, txid: &Hash256) -> Option<&Transaction>;

    fn resolve(&self, outpoint: &OutPoint) -> Result<&Output> {
        let tx = self
            .transaction(&outpoint.txid)
            .ok_or(LedgerError::UnresolvedSource(outpoint.txid))?;

        tx.outputs
            .get(outpoint.index as usize)
            .ok_or(LedgerError::UnresolvedOutput {
                txid: outpoint.txid,
                index: outpoint.index,
            })
    }
}

impl TransactionLookup for HashMap<Hash256, Transaction> {
    fn transaction(&self, txid: &Hash256) -> Option<&Transaction> {
        self.get(txid)
    }
}

/// Append-only record of accepted transactions, iterated in acceptance order.
#[derive(Debug, Default)]
pub struct TransactionStore {
    transactions: HashMap<Hash256, Transaction>,
    order: Vec<Hash256>,
}

impl TransactionStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, tx: Transaction) -> Result<()> {
        if self.transactions.contains_key(&tx.id) {
            return Err(LedgerError::DuplicateTransaction(tx.id));
        }

        self.order.push(tx.id);
        self.transactions.insert(tx.id, tx);
        Ok(())
    }

    pub fn get(&self, txid: &Hash256) -> Option<&Transaction> {
        self.transactions.get(txid)
    }

    pub fn contains(&self, txid: &Hash256) -> bool {
        self.transactions.contains_key(txid)
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Transaction> + '_ {
        self.order.iter().filter_map(|txid| self.transactions.get(txid))
    }
}

impl TransactionLookup for TransactionStore {
    fn transaction(&self, txid: &Hash256) -> Option<&Transaction> {
        self.get(txid)
    }
}
