use crate::config::{HubConfig, WalletConfig};
use crate::core::{OutPoint, Transaction, TransactionLookup, TransactionStore};
use crate::crypto::address::{self, fingerprint};
use crate::crypto::hash::Hash256;
use crate::crypto::keys::{self, KeyPair};
use crate::wallet::WalletHandle;
use crate::{LedgerError, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;

/// Verdict on a submitted transaction: its id when accepted.
pub type Verdict = Result<Hash256>;

/// A transaction emitted by a holder, with the channel its verdict goes back on.
#[derive(Debug)]
pub struct Submission {
    pub tx: Transaction,
    pub reply: oneshot::Sender<Verdict>,
}

#[derive(Debug)]
pub enum HubCommand {
    Submit {
        tx: Transaction,
        reply: Option<oneshot::Sender<Verdict>>,
    },
    RegisterHolder {
        name: String,
        feed: mpsc::Sender<Transaction>,
        reply: oneshot::Sender<usize>,
    },
    GetTransaction {
        txid: Hash256,
        reply: oneshot::Sender<Option<Transaction>>,
    },
    GetTransactions {
        reply: oneshot::Sender<Vec<Transaction>>,
    },
    GetStats {
        reply: oneshot::Sender<HubStats>,
    },
    Shutdown,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct HubStats {
    pub accepted: u64,
    pub rejected: u64,
    pub holders: usize,
    pub issued_total: u64,
    pub fees_total: u64,
}

struct HolderFeed {
    name: String,
    sender: mpsc::Sender<Transaction>,
}

/// The single authority that validates, records and broadcasts transactions.
///
/// All state is owned by the processing loop in [`Hub::run`]; the outside
/// world talks to it through a [`HubHandle`].
pub struct Hub {
    config: HubConfig,
    store: TransactionStore,
    spent: HashSet<OutPoint>,
    holders: Vec<HolderFeed>,
    stats: HubStats,
    command_receiver: mpsc::Receiver<HubCommand>,
}

impl Hub {
    pub fn new(config: HubConfig) -> (Self, HubHandle) {
        let (command_sender, command_receiver) = mpsc::channel(config.submission_capacity.max(1));

        let handle = HubHandle {
            command_sender,
            feed_capacity: config.feed_capacity.max(1),
        };

        let hub = Self {
            config,
            store: TransactionStore::new(),
            spent: HashSet::new(),
            holders: Vec::new(),
            stats: HubStats::default(),
            command_receiver,
        };

        (hub, handle)
    }

    /// Start the processing loop on the current tokio runtime.
    pub fn spawn(config: HubConfig) -> (HubHandle, JoinHandle<()>) {
        let (hub, handle) = Self::new(config);
        let task = tokio::spawn(hub.run());
        (handle, task)
    }

    pub async fn run(mut self) {
        log::info!("🚀 Hub started");

        while let Some(command) = self.command_receiver.recv().await {
            if !self.handle_command(command).await {
                break;
            }
        }

        log::info!(
            "🛑 Hub stopped: {} accepted, {} rejected",
            self.stats.accepted,
            self.stats.rejected
        );
    }

    async fn handle_command(&mut self, command: HubCommand) -> bool {
        match command {
            HubCommand::Submit { tx, reply } => {
                let verdict = self.submit(tx).await;
                if let Some(reply) = reply {
                    let _ = reply.send(verdict);
                }
            }
            HubCommand::RegisterHolder { name, feed, reply } => {
                log::info!("🤝 Registered holder {}", name);
                self.holders.push(HolderFeed { name, sender: feed });
                self.stats.holders = self.holders.len();
                let _ = reply.send(self.holders.len());
            }
            HubCommand::GetTransaction { txid, reply } => {
                let _ = reply.send(self.store.get(&txid).cloned());
            }
            HubCommand::GetTransactions { reply } => {
                let _ = reply.send(self.store.iter().cloned().collect());
            }
            HubCommand::GetStats { reply } => {
                let _ = reply.send(self.stats.clone());
            }
            HubCommand::Shutdown => return false,
        }

        true
    }

    /// Validate, record and broadcast one transaction.
    pub async fn submit(&mut self, tx: Transaction) -> Verdict {
        log::debug!("📨 Got submission of {}", tx.id);

        let fee = match self.validate(&tx) {
            Ok(fee) => fee,
            Err(e) => {
                self.stats.rejected += 1;
                if matches!(e, LedgerError::ValueCreation { .. }) {
                    log::error!("🚨 Rejected {}: {}", tx.id, e);
                } else {
                    log::warn!("❌ Rejected {}: {}", tx.id, e);
                }
                return Err(e);
            }
        };

        if tx.is_issuance() {
            let issued = tx.total_output_value();
            log::info!(
                "💰 Issuance of {} to {}",
                issued,
                address::to_address_text(&tx.outputs[0].to_address)
            );
            self.stats.issued_total += issued;
        } else {
            log::debug!("In: {}, out: {}, fee: {}", tx.total_output_value() + fee, tx.total_output_value(), fee);
            self.stats.fees_total += fee;
        }

        let txid = tx.id;
        if self.config.reject_double_spends {
            self.spent.extend(tx.inputs.iter().map(|input| input.outpoint()));
        }
        self.store.insert(tx.clone())?;
        self.stats.accepted += 1;
        log::info!("✅ TX OK {}", txid);

        self.broadcast(&tx).await;

        Ok(txid)
    }

    /// Check `tx` against the store without changing anything.
    ///
    /// Returns the fee (zero for issuance).
    pub fn validate(&self, tx: &Transaction) -> Result<u64> {
        if tx.inputs.is_empty() && tx.outputs.is_empty() {
            return Err(LedgerError::EmptyTransaction);
        }

        let expected = tx.expected_id();
        if tx.id != expected {
            return Err(LedgerError::IdMismatch {
                expected,
                actual: tx.id,
            });
        }

        if self.store.contains(&tx.id) {
            return Err(LedgerError::DuplicateTransaction(tx.id));
        }

        if tx.is_issuance() {
            if !self.config.allow_issuance {
                return Err(LedgerError::IssuanceDisabled);
            }
            return Ok(0);
        }

        let mut input_value = 0u64;
        let mut seen = HashSet::new();

        for (index, input) in tx.inputs.iter().enumerate() {
            let sighash = tx.sighash(index, &self.store)?;
            let outpoint = input.outpoint();
            let spent_output = self.store.resolve(&outpoint)?;

            if fingerprint(&input.public_key) != spent_output.to_address {
                return Err(LedgerError::OwnershipMismatch { input: index });
            }

            if !keys::verify(&input.signature, &input.public_key, &sighash) {
                log::debug!("Verify fail for {} on input {}", tx.id, index);
                return Err(LedgerError::InvalidSignature { input: index });
            }

            if self.config.reject_double_spends
                && (self.spent.contains(&outpoint) || !seen.insert(outpoint))
            {
                return Err(LedgerError::DoubleSpend(outpoint));
            }

            input_value += u64::from(spent_output.value);
        }

        let output_value = tx.total_output_value();
        if output_value > input_value {
            return Err(LedgerError::ValueCreation {
                inputs: input_value,
                outputs: output_value,
            });
        }

        Ok(input_value - output_value)
    }

    async fn broadcast(&mut self, tx: &Transaction) {
        let mut closed = Vec::new();

        for (position, holder) in self.holders.iter().enumerate() {
            log::debug!("📤 Sending {} to {}", tx.id, holder.name);
            if holder.sender.send(tx.clone()).await.is_err() {
                closed.push(position);
            }
        }

        for position in closed.into_iter().rev() {
            let holder = self.holders.remove(position);
            log::warn!("🗑️ Dropping holder {}: feed closed", holder.name);
        }
        self.stats.holders = self.holders.len();
    }

    pub fn store(&self) -> &TransactionStore {
        &self.store
    }

    pub fn stats(&self) -> &HubStats {
        &self.stats
    }
}

/// Cloneable client of a running [`Hub`].
#[derive(Debug, Clone)]
pub struct HubHandle {
    command_sender: mpsc::Sender<HubCommand>,
    feed_capacity: usize,
}

impl HubHandle {
    async fn request<T>(&self, make: impl FnOnce(oneshot::Sender<T>) -> HubCommand) -> Result<T> {
        let (reply, response) = oneshot::channel();
        self.command_sender.send(make(reply)).await?;
        Ok(response.await?)
    }

    /// Submit a transaction and wait for the hub's verdict.
    pub async fn submit(&self, tx: Transaction) -> Verdict {
        self.request(|reply| HubCommand::Submit {
            tx,
            reply: Some(reply),
        })
        .await?
    }

    /// Add a holder to the broadcast list and return its feed.
    pub async fn register_holder(&self, name: &str) -> Result<mpsc::Receiver<Transaction>> {
        let (feed, receiver) = mpsc::channel(self.feed_capacity);
        self.request(|reply| HubCommand::RegisterHolder {
            name: name.to_string(),
            feed,
            reply,
        })
        .await?;
        Ok(receiver)
    }

    /// Feed every submission a holder emits into the hub, in emission order.
    pub fn forward_submissions(&self, name: &str, mut outgoing: mpsc::Receiver<Submission>) -> JoinHandle<()> {
        let command_sender = self.command_sender.clone();
        let name = name.to_string();

        tokio::spawn(async move {
            while let Some(Submission { tx, reply }) = outgoing.recv().await {
                log::debug!("[{}] Submitting {}", name, tx.id);
                let command = HubCommand::Submit {
                    tx,
                    reply: Some(reply),
                };
                if command_sender.send(command).await.is_err() {
                    log::warn!("[{}] Hub is gone, stopping submissions", name);
                    break;
                }
            }
        })
    }

    /// Register a holder and start its wallet loop, wired to this hub.
    pub async fn register_wallet(&self, name: &str, keypair: KeyPair, config: &WalletConfig) -> Result<WalletHandle> {
        WalletHandle::spawn(self, name, keypair, config).await
    }

    pub async fn transaction(&self, txid: Hash256) -> Result<Option<Transaction>> {
        self.request(|reply| HubCommand::GetTransaction { txid, reply }).await
    }

    /// Snapshot of the store in acceptance order.
    pub async fn transactions(&self) -> Result<Vec<Transaction>> {
        self.request(|reply| HubCommand::GetTransactions { reply }).await
    }

    pub async fn stats(&self) -> Result<HubStats> {
        self.request(|reply| HubCommand::GetStats { reply }).await
    }

    pub async fn shutdown(&self) -> Result<()> {
        self.command_sender.send(HubCommand::Shutdown).await?;
        Ok(())
    }
}
