use crate::core::transaction::{OutPoint, Output};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UtxoEntry {
    pub outpoint: OutPoint,
    pub output: Output,
}

/// Spendable outputs of one holder, kept in the order they were received.
#[derive(Debug, Default)]
pub struct UtxoSet {
    entries: BTreeMap<u64, UtxoEntry>,
    index: HashMap<OutPoint, u64>,
    next_seq: u64,
}

impl UtxoSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns `false` if the outpoint was already tracked.
    pub fn insert(&mut self, outpoint: OutPoint, output: Output) -> bool {
        if self.index.contains_key(&outpoint) {
            return false;
        }

        let seq = self.next_seq;
        self.next_seq += 1;
        self.index.insert(outpoint, seq);
        self.entries.insert(seq, UtxoEntry { outpoint, output });
        true
    }

    pub fn remove(&mut self, outpoint: &OutPoint) -> Option<UtxoEntry> {
        let seq = self.index.remove(outpoint)?;
        self.entries.remove(&seq)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn balance(&self) -> u64 {
        self.entries.values().map(|entry| u64::from(entry.output.value)).sum()
    }

    pub fn iter(&self) -> impl Iterator<Item = &UtxoEntry> + '_ {
        self.entries.values()
    }

    /// Take entries in insertion order until their total reaches `amount`.
    ///
    /// Returns the accumulated total and the chosen entries; the total is
    /// below `amount` only when the whole set is not enough.
    pub fn select(&self, amount: u64) -> (u64, Vec<UtxoEntry>) {
        let mut accumulated = 0u64;
        let mut selected = Vec::new();

        for entry in self.entries.values() {
            if accumulated >= amount {
                break;
            }
            accumulated += u64::from(entry.output.value);
            selected.push(entry.clone());
        }

        (accumulated, selected)
    }
}
