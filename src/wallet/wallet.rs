use crate::config::{SigningMode, WalletConfig};
use crate::core::{OutPoint, Transaction, UtxoEntry, UtxoSet};
use crate::crypto::address;
use crate::crypto::hash::{Hash160, Hash256};
use crate::crypto::keys::KeyPair;
use crate::network::hub::{HubHandle, Submission, Verdict};
use crate::{LedgerError, Result};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use tokio::sync::{mpsc, oneshot};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WalletInfo {
    pub name: String,
    pub address: String,
    pub balance: u64,
    pub utxo_count: usize,
    pub known_transactions: usize,
}

/// A transfer that has been handed to the hub but not necessarily decided yet.
#[derive(Debug)]
pub struct PendingTransfer {
    pub transaction: Transaction,
    verdict: oneshot::Receiver<Verdict>,
}

impl PendingTransfer {
    pub fn txid(&self) -> Hash256 {
        self.transaction.id
    }

    /// Wait for the hub's decision.
    pub async fn accepted(self) -> Verdict {
        self.verdict.await?
    }
}

#[derive(Debug)]
pub enum WalletCommand {
    Balance {
        reply: oneshot::Sender<u64>,
    },
    Utxos {
        reply: oneshot::Sender<Vec<UtxoEntry>>,
    },
    Info {
        reply: oneshot::Sender<WalletInfo>,
    },
    Send {
        to_address: String,
        amount: u32,
        reply: oneshot::Sender<Result<PendingTransfer>>,
    },
}

/// One participant's keys and spendable outputs, updated from hub broadcasts.
pub struct Wallet {
    name: String,
    keypair: KeyPair,
    address: String,
    fingerprint: Hash160,
    utxos: UtxoSet,
    known: HashMap<Hash256, Transaction>,
    signing_mode: SigningMode,
    outgoing: mpsc::Sender<Submission>,
}

impl Wallet {
    pub fn new(name: &str, keypair: KeyPair, signing_mode: SigningMode, outgoing: mpsc::Sender<Submission>) -> Self {
        let fingerprint = keypair.fingerprint();
        Self {
            name: name.to_string(),
            address: address::to_address_text(&fingerprint),
            fingerprint,
            keypair,
            utxos: UtxoSet::new(),
            known: HashMap::new(),
            signing_mode,
            outgoing,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn address(&self) -> &str {
        &self.address
    }

    pub fn balance(&self) -> u64 {
        self.utxos.balance()
    }

    pub fn utxos(&self) -> &UtxoSet {
        &self.utxos
    }

    pub fn info(&self) -> WalletInfo {
        WalletInfo {
            name: self.name.clone(),
            address: self.address.clone(),
            balance: self.balance(),
            utxo_count: self.utxos.len(),
            known_transactions: self.known.len(),
        }
    }

    /// Apply an accepted transaction: drop the outputs it spends, then add
    /// the outputs it pays to this wallet.
    pub fn on_broadcast(&mut self, tx: &Transaction) {
        log::debug!("[{}] Got TX {}", self.name, tx.id);

        let mut touched = HashSet::new();
        for input in &tx.inputs {
            if let Some(entry) = self.utxos.remove(&input.outpoint()) {
                log::debug!("[{}] Spent {}", self.name, entry.outpoint);
                touched.insert(entry.outpoint.txid);
            }
        }

        let mut received = false;
        for (index, output) in tx.outputs.iter().enumerate() {
            if output.to_address != self.fingerprint {
                continue;
            }
            let outpoint = OutPoint::new(tx.id, index as u32);
            if self.utxos.insert(outpoint, output.clone()) {
                log::info!("[{}] +{} coins! {}", self.name, output.value, tx.id);
                received = true;
            }
        }
        if received {
            self.known.entry(tx.id).or_insert_with(|| tx.clone());
        }

        for txid in touched {
            if !self.utxos.iter().any(|entry| entry.outpoint.txid == txid) {
                log::debug!("[{}] No more outputs on {}, forgetting it", self.name, txid);
                self.known.remove(&txid);
            }
        }
    }

    /// Build and sign a transfer of `amount` to `to_address` from this
    /// wallet's outputs, adding a change output when needed.
    pub fn build_transfer(&self, to_address: &str, amount: u32) -> Result<Transaction> {
        if amount == 0 {
            return Err(LedgerError::InvalidInput("amount must be positive".to_string()));
        }

        let required = u64::from(amount);
        let available = self.balance();
        if available < required {
            return Err(LedgerError::InsufficientFunds { required, available });
        }

        let recipient = address::from_address_text(to_address)?;
        let (total_input, selected) = self.utxos.select(required);

        let mut tx = Transaction::new();
        for entry in &selected {
            tx.add_input(entry.outpoint, self.keypair.public_key.to_bytes().to_vec());
        }
        tx.add_output(recipient, amount);
        if total_input > required {
            let change = u32::try_from(total_input - required)
                .map_err(|_| LedgerError::InvalidInput("change does not fit an output".to_string()))?;
            tx.add_output(self.fingerprint, change);
        }

        let signed = match self.signing_mode {
            SigningMode::AllInputs => tx.inputs.len(),
            SigningMode::FirstInputOnly => 1,
        };
        for index in 0..signed {
            tx.sign_input(index, &self.keypair.private_key, &self.known)?;
        }

        tx.id = tx.content_hash();
        Ok(tx)
    }

    /// Build a transfer and hand it to the hub.
    ///
    /// Insufficient funds are reported here and nothing is emitted.
    pub async fn send(&mut self, to_address: &str, amount: u32) -> Result<PendingTransfer> {
        log::info!("[{}] Send {} coins to {}", self.name, amount, to_address);

        let tx = self.build_transfer(to_address, amount)?;
        let (reply, verdict) = oneshot::channel();
        self.outgoing
            .send(Submission {
                tx: tx.clone(),
                reply,
            })
            .await?;

        Ok(PendingTransfer {
            transaction: tx,
            verdict,
        })
    }

    async fn handle_command(&mut self, command: WalletCommand) {
        match command {
            WalletCommand::Balance { reply } => {
                let _ = reply.send(self.balance());
            }
            WalletCommand::Utxos { reply } => {
                let _ = reply.send(self.utxos.iter().cloned().collect());
            }
            WalletCommand::Info { reply } => {
                let _ = reply.send(self.info());
            }
            WalletCommand::Send {
                to_address,
                amount,
                reply,
            } => {
                let result = self.send(&to_address, amount).await;
                if let Err(e) = &result {
                    log::warn!("[{}] Send failed: {}", self.name, e);
                }
                let _ = reply.send(result);
            }
        }
    }

    /// Process broadcasts and commands until every handle is dropped.
    ///
    /// Broadcasts that are already queued are applied before the next
    /// command, so a command issued after a verdict sees its effect.
    pub async fn run(mut self, mut feed: mpsc::Receiver<Transaction>, mut commands: mpsc::Receiver<WalletCommand>) {
        let mut feed_open = true;

        loop {
            tokio::select! {
                biased;

                tx = feed.recv(), if feed_open => match tx {
                    Some(tx) => self.on_broadcast(&tx),
                    None => {
                        log::warn!("[{}] Hub feed closed", self.name);
                        feed_open = false;
                    }
                },
                command = commands.recv() => match command {
                    Some(command) => self.handle_command(command).await,
                    None => break,
                },
            }
        }

        log::debug!("[{}] Wallet stopped", self.name);
    }
}

/// Cloneable client of a running [`Wallet`] loop.
#[derive(Debug, Clone)]
pub struct WalletHandle {
    name: String,
    address: String,
    fingerprint: Hash160,
    commands: mpsc::Sender<WalletCommand>,
}

impl WalletHandle {
    /// Register with `hub`, wire the outgoing stream into it and start the loop.
    pub async fn spawn(hub: &HubHandle, name: &str, keypair: KeyPair, config: &WalletConfig) -> Result<Self> {
        let feed = hub.register_holder(name).await?;

        let (outgoing, submissions) = mpsc::channel(config.outgoing_capacity.max(1));
        hub.forward_submissions(name, submissions);

        let (commands, command_receiver) = mpsc::channel(config.command_capacity.max(1));
        let wallet = Wallet::new(name, keypair, config.signing_mode, outgoing);

        let handle = Self {
            name: wallet.name.clone(),
            address: wallet.address.clone(),
            fingerprint: wallet.fingerprint,
            commands,
        };

        tokio::spawn(wallet.run(feed, command_receiver));
        Ok(handle)
    }

    async fn request<T>(&self, make: impl FnOnce(oneshot::Sender<T>) -> WalletCommand) -> Result<T> {
        let (reply, response) = oneshot::channel();
        self.commands.send(make(reply)).await?;
        Ok(response.await?)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn address(&self) -> &str {
        &self.address
    }

    pub fn fingerprint(&self) -> Hash160 {
        self.fingerprint
    }

    pub async fn balance(&self) -> Result<u64> {
        self.request(|reply| WalletCommand::Balance { reply }).await
    }

    pub async fn utxos(&self) -> Result<Vec<UtxoEntry>> {
        self.request(|reply| WalletCommand::Utxos { reply }).await
    }

    pub async fn info(&self) -> Result<WalletInfo> {
        self.request(|reply| WalletCommand::Info { reply }).await
    }

    pub async fn send(&self, to_address: &str, amount: u32) -> Result<PendingTransfer> {
        self.request(|reply| WalletCommand::Send {
            to_address: to_address.to_string(),
            amount,
            reply,
        })
        .await?
    }
}
