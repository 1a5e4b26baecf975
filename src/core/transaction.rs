use crate::core::store::TransactionLookup;
use crate::crypto::address;
use crate::crypto::hash::{Hash160, Hash256, Hashable};
use crate::crypto::keys::PrivateKey;
use crate::{LedgerError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;

/// A reference to one output of an accepted transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct OutPoint {
    pub txid: Hash256,
    pub index: u32,
}

impl OutPoint {
    pub fn new(txid: Hash256, index: u32) -> Self {
        Self { txid, index }
    }
}

impl fmt::Display for OutPoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.txid, self.index)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Input {
    pub source_txid: Hash256,
    pub output_index: u32,
    /// Compressed public key of the owner of the referenced output.
    pub public_key: Vec<u8>,
    /// Empty until signed. Never part of any hash.
    pub signature: Vec<u8>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Output {
    pub to_address: Hash160,
    pub value: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transaction {
    pub id: Hash256,
    pub inputs: Vec<Input>,
    pub outputs: Vec<Output>,
}

fn input_digest(source_txid: &Hash256, output_index: u32, key_field: &[u8]) -> Hash256 {
    let mut data = Vec::with_capacity(32 + 4 + key_field.len());
    data.extend_from_slice(source_txid.as_bytes());
    data.extend_from_slice(&output_index.to_be_bytes());
    data.extend_from_slice(key_field);

    Hash256::hash(&data)
}

impl Input {
    pub fn new(source_txid: Hash256, output_index: u32, public_key: Vec<u8>) -> Self {
        Self {
            source_txid,
            output_index,
            public_key,
            signature: Vec::new(),
        }
    }

    pub fn outpoint(&self) -> OutPoint {
        OutPoint::new(self.source_txid, self.output_index)
    }

    pub fn is_signed(&self) -> bool {
        !self.signature.is_empty()
    }
}

impl Hashable for Input {
    fn hash(&self) -> Hash256 {
        input_digest(&self.source_txid, self.output_index, &self.public_key)
    }
}

impl Output {
    pub fn new(to_address: Hash160, value: u32) -> Self {
        Self { to_address, value }
    }
}

impl Hashable for Output {
    fn hash(&self) -> Hash256 {
        let mut data = Vec::with_capacity(20 + 4);
        data.extend_from_slice(self.to_address.as_bytes());
        data.extend_from_slice(&self.value.to_be_bytes());

        Hash256::hash(&data)
    }
}

impl Default for Transaction {
    fn default() -> Self {
        Self::new()
    }
}

impl Transaction {
    pub fn new() -> Self {
        Self {
            id: Hash256::zero(),
            inputs: Vec::new(),
            outputs: Vec::new(),
        }
    }

    /// Mint `amount` to `to_address`. The id is the double digest of the content.
    pub fn issuance(to_address: Hash160, amount: u32) -> Self {
        let mut tx = Self::new();
        tx.add_output(to_address, amount);
        tx.id = tx.expected_id();
        tx
    }

    pub fn issue_to_address(address_text: &str, amount: u32) -> Result<Self> {
        let to_address = address::from_address_text(address_text)?;
        Ok(Self::issuance(to_address, amount))
    }

    pub fn add_input(&mut self, outpoint: OutPoint, public_key: Vec<u8>) {
        self.inputs.push(Input::new(outpoint.txid, outpoint.index, public_key));
    }

    pub fn add_output(&mut self, to_address: Hash160, value: u32) {
        self.outputs.push(Output::new(to_address, value));
    }

    pub fn is_issuance(&self) -> bool {
        self.inputs.is_empty()
    }

    /// Digest of the input hashes followed by the output hashes.
    pub fn content_hash(&self) -> Hash256 {
        let mut data = Vec::with_capacity(32 * (self.inputs.len() + self.outputs.len()));
        for input in &self.inputs {
            data.extend_from_slice(input.hash().as_bytes());
        }
        for output in &self.outputs {
            data.extend_from_slice(output.hash().as_bytes());
        }

        Hash256::hash(&data)
    }

    /// The id this transaction must carry: double digest for issuance,
    /// plain content hash for transfers.
    pub fn expected_id(&self) -> Hash256 {
        let content = self.content_hash();
        if self.is_issuance() {
            Hash256::hash(content.as_bytes())
        } else {
            content
        }
    }

    pub fn total_output_value(&self) -> u64 {
        self.outputs.iter().map(|output| u64::from(output.value)).sum()
    }

    /// Sum of the referenced output values.
    pub fn input_value<L: TransactionLookup + ?Sized>(&self, lookup: &L) -> Result<u64> {
        let mut total = 0u64;
        for input in &self.inputs {
            let output = lookup.resolve(&input.outpoint())?;
            total += u64::from(output.value);
        }
        Ok(total)
    }

    /// The digest a signature on input `input_index` must authenticate.
    ///
    /// Every input is hashed with its signature left out. Public keys are
    /// left out as well, except for the input being signed, whose key field
    /// is replaced by the fingerprint of the output it spends.
    pub fn sighash<L: TransactionLookup + ?Sized>(&self, input_index: usize, lookup: &L) -> Result<Hash256> {
        let signed = self.inputs.get(input_index).ok_or(LedgerError::UnknownInputIndex {
            index: input_index,
            count: self.inputs.len(),
        })?;
        let spent = lookup.resolve(&signed.outpoint())?;

        let mut data = Vec::with_capacity(32 * (self.inputs.len() + self.outputs.len()));
        for (i, input) in self.inputs.iter().enumerate() {
            let key_field: &[u8] = if i == input_index {
                spent.to_address.as_bytes()
            } else {
                &[]
            };
            let digest = input_digest(&input.source_txid, input.output_index, key_field);
            data.extend_from_slice(digest.as_bytes());
        }
        for output in &self.outputs {
            data.extend_from_slice(output.hash().as_bytes());
        }

        Ok(Hash256::hash(&data))
    }

    pub fn sign_input<L: TransactionLookup + ?Sized>(
        &mut self,
        input_index: usize,
        private_key: &PrivateKey,
        lookup: &L,
    ) -> Result<()> {
        let sighash = self.sighash(input_index, lookup)?;
        let signature = private_key.sign(&sighash)?;
        self.inputs[input_index].signature = signature.to_bytes();
        Ok(())
    }
}

impl Hashable for Transaction {
    fn hash(&self) -> Hash256 {
        self.content_hash()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::keys::{self, KeyPair};
    use std::collections::HashMap;

    fn funded(keypair: &KeyPair, amount: u32) -> (Transaction, HashMap<Hash256, Transaction>) {
        let issuance = Transaction::issuance(keypair.fingerprint(), amount);
        let mut lookup = HashMap::new();
        lookup.insert(issuance.id, issuance.clone());
        (issuance, lookup)
    }

    fn spend(keypair: &KeyPair, source: &Transaction, to: Hash160, value: u32) -> Transaction {
        let mut tx = Transaction::new();
        tx.add_input(OutPoint::new(source.id, 0), keypair.public_key.to_bytes().to_vec());
        tx.add_output(to, value);
        tx
    }

    #[test]
    fn test_issuance() {
        let to = Hash160::new([7u8; 20]);
        let tx = Transaction::issuance(to, 100);

        assert!(tx.is_issuance());
        assert_eq!(tx.outputs.len(), 1);
        assert_eq!(tx.outputs[0].value, 100);
        assert_eq!(tx.id, Hash256::hash(tx.content_hash().as_bytes()));
        assert_eq!(tx.id, tx.expected_id());
    }

    #[test]
    fn test_issue_to_address_rejects_bad_text() {
        assert!(matches!(
            Transaction::issue_to_address("not-an-address", 1),
            Err(LedgerError::InvalidAddress(_))
        ));
    }

    #[test]
    fn test_input_hash_excludes_signature() {
        let mut input = Input::new(Hash256::hash(b"src"), 3, vec![2u8; 33]);
        let before = input.hash();
        input.signature = vec![9u8; 64];

        assert_eq!(before, input.hash());
    }

    #[test]
    fn test_output_hash_layout() {
        let output = Output::new(Hash160::new([1u8; 20]), 0x0102_0304);
        let mut expected = vec![1u8; 20];
        expected.extend_from_slice(&[1, 2, 3, 4]);

        assert_eq!(output.hash(), Hash256::hash(&expected));
    }

    #[test]
    fn test_sighash_binds_spent_fingerprint() -> Result<()> {
        let alice = KeyPair::new()?;
        let (issuance, lookup) = funded(&alice, 50);
        let tx = spend(&alice, &issuance, Hash160::new([3u8; 20]), 50);

        let mut data = Vec::new();
        data.extend_from_slice(input_digest(&issuance.id, 0, alice.fingerprint().as_bytes()).as_bytes());
        data.extend_from_slice(tx.outputs[0].hash().as_bytes());

        assert_eq!(tx.sighash(0, &lookup)?, Hash256::hash(&data));
        Ok(())
    }

    #[test]
    fn test_sighash_is_pure() -> Result<()> {
        let alice = KeyPair::new()?;
        let (issuance, lookup) = funded(&alice, 50);
        let mut tx = spend(&alice, &issuance, Hash160::new([3u8; 20]), 20);
        tx.sign_input(0, &alice.private_key, &lookup)?;
        let snapshot = tx.clone();

        let first = tx.sighash(0, &lookup)?;
        let second = tx.sighash(0, &lookup)?;

        assert_eq!(first, second);
        assert_eq!(tx, snapshot);
        Ok(())
    }

    #[test]
    fn test_sighash_errors() -> Result<()> {
        let alice = KeyPair::new()?;
        let (issuance, lookup) = funded(&alice, 50);

        let tx = spend(&alice, &issuance, Hash160::new([3u8; 20]), 20);
        assert_eq!(
            tx.sighash(1, &lookup),
            Err(LedgerError::UnknownInputIndex { index: 1, count: 1 })
        );

        let mut orphan = Transaction::new();
        let missing = Hash256::hash(b"missing");
        orphan.add_input(OutPoint::new(missing, 0), alice.public_key.to_bytes().to_vec());
        assert_eq!(orphan.sighash(0, &lookup), Err(LedgerError::UnresolvedSource(missing)));

        let mut out_of_range = Transaction::new();
        out_of_range.add_input(OutPoint::new(issuance.id, 5), alice.public_key.to_bytes().to_vec());
        assert_eq!(
            out_of_range.sighash(0, &lookup),
            Err(LedgerError::UnresolvedOutput { txid: issuance.id, index: 5 })
        );
        Ok(())
    }

    #[test]
    fn test_tampered_output_breaks_signature() -> Result<()> {
        let alice = KeyPair::new()?;
        let (issuance, lookup) = funded(&alice, 50);
        let mut tx = spend(&alice, &issuance, Hash160::new([3u8; 20]), 20);
        tx.sign_input(0, &alice.private_key, &lookup)?;
        let signed_over = tx.sighash(0, &lookup)?;
        assert!(keys::verify(&tx.inputs[0].signature, &tx.inputs[0].public_key, &signed_over));

        tx.outputs[0].value = 49;
        let tampered = tx.sighash(0, &lookup)?;

        assert_ne!(signed_over, tampered);
        assert!(!keys::verify(&tx.inputs[0].signature, &tx.inputs[0].public_key, &tampered));
        Ok(())
    }

    #[test]
    fn test_signing_keeps_content_hash() -> Result<()> {
        let alice = KeyPair::new()?;
        let (issuance, lookup) = funded(&alice, 50);
        let mut tx = spend(&alice, &issuance, Hash160::new([3u8; 20]), 45);
        let unsigned = tx.content_hash();
        tx.sign_input(0, &alice.private_key, &lookup)?;

        assert_eq!(tx.content_hash(), unsigned);
        assert_eq!(tx.input_value(&lookup)?, 50);
        Ok(())
    }
}
