use tokio::sync::mpsc;
use utxo_hub::config::{Config, HubConfig, SigningMode, WalletConfig};
use utxo_hub::core::{OutPoint, Transaction, TransactionLookup, TransactionStore};
use utxo_hub::crypto::hash::Hash256;
use utxo_hub::crypto::keys::KeyPair;
use utxo_hub::network::{Hub, HubHandle};
use utxo_hub::wallet::{Wallet, WalletHandle};
use utxo_hub::{LedgerError, Result};

async fn wallet(hub: &HubHandle, name: &str, config: &WalletConfig) -> Result<WalletHandle> {
    hub.register_wallet(name, KeyPair::new()?, config).await
}

/// Every accepted transfer spends at least as much as it pays out.
fn assert_conserved(history: &[Transaction]) {
    let mut store = TransactionStore::new();
    for tx in history {
        if !tx.is_issuance() {
            let inputs = tx.input_value(&store).expect("inputs resolve against earlier history");
            assert!(inputs >= tx.total_output_value(), "{} creates value", tx.id);
        }
        store.insert(tx.clone()).expect("ids are unique");
    }
}

#[tokio::test]
async fn issuance_then_spend() -> Result<()> {
    let config = Config::default();
    let (hub, _task) = Hub::spawn(config.hub.clone());
    let alice = wallet(&hub, "alice", &config.wallet).await?;
    let bob = wallet(&hub, "bob", &config.wallet).await?;

    hub.submit(Transaction::issue_to_address(alice.address(), 100)?).await?;
    assert_eq!(alice.balance().await?, 100);

    let pending = alice.send(bob.address(), 30).await?;
    let txid = pending.accepted().await?;

    assert_eq!(alice.balance().await?, 70);
    assert_eq!(bob.balance().await?, 30);

    let change = alice.utxos().await?;
    assert_eq!(change.len(), 1);
    assert_eq!(change[0].outpoint, OutPoint::new(txid, 1));
    assert_eq!(change[0].output.value, 70);

    assert_conserved(&hub.transactions().await?);
    Ok(())
}

#[tokio::test]
async fn chained_transfers_stay_consistent() -> Result<()> {
    let config = Config::default();
    let (hub, _task) = Hub::spawn(config.hub.clone());
    let alice = wallet(&hub, "alice", &config.wallet).await?;
    let bob = wallet(&hub, "bob", &config.wallet).await?;
    let carol = wallet(&hub, "carol", &config.wallet).await?;

    hub.submit(Transaction::issuance(alice.fingerprint(), 50)).await?;
    hub.submit(Transaction::issuance(alice.fingerprint(), 20)).await?;

    // Needs both issuances, so two signed inputs.
    alice.send(bob.address(), 60).await?.accepted().await?;
    bob.send(carol.address(), 15).await?.accepted().await?;
    bob.send(alice.address(), 45).await?.accepted().await?;
    carol.send(carol.address(), 15).await?.accepted().await?;

    assert_eq!(alice.balance().await?, 55);
    assert_eq!(bob.balance().await?, 0);
    assert_eq!(carol.balance().await?, 15);

    let history = hub.transactions().await?;
    assert_eq!(history.len(), 6);
    assert_conserved(&history);

    let stats = hub.stats().await?;
    assert_eq!(stats.accepted, 6);
    assert_eq!(stats.rejected, 0);
    assert_eq!(stats.issued_total, 70);
    Ok(())
}

#[tokio::test]
async fn balance_matches_broadcast_history() -> Result<()> {
    let config = Config::default();
    let (hub, _task) = Hub::spawn(config.hub.clone());
    let alice = wallet(&hub, "alice", &config.wallet).await?;
    let bob = wallet(&hub, "bob", &config.wallet).await?;

    hub.submit(Transaction::issuance(alice.fingerprint(), 40)).await?;
    hub.submit(Transaction::issuance(bob.fingerprint(), 9)).await?;
    alice.send(bob.address(), 12).await?.accepted().await?;
    bob.send(alice.address(), 20).await?.accepted().await?;

    let history = hub.transactions().await?;
    for holder in [&alice, &bob] {
        let mut store = TransactionStore::new();
        let mut received = 0u64;
        let mut spent = 0u64;
        for tx in &history {
            for input in &tx.inputs {
                let output = store.resolve(&input.outpoint())?;
                if output.to_address == holder.fingerprint() {
                    spent += u64::from(output.value);
                }
            }
            received += tx
                .outputs
                .iter()
                .filter(|output| output.to_address == holder.fingerprint())
                .map(|output| u64::from(output.value))
                .sum::<u64>();
            store.insert(tx.clone())?;
        }

        assert_eq!(holder.balance().await?, received - spent);
    }
    Ok(())
}

#[tokio::test]
async fn insufficient_funds_never_reaches_hub() -> Result<()> {
    let config = Config::default();
    let (hub, _task) = Hub::spawn(config.hub.clone());
    let alice = wallet(&hub, "alice", &config.wallet).await?;
    let bob = wallet(&hub, "bob", &config.wallet).await?;

    hub.submit(Transaction::issuance(alice.fingerprint(), 5)).await?;
    let before = hub.stats().await?;

    let result = alice.send(bob.address(), 10).await;
    assert!(matches!(
        result,
        Err(LedgerError::InsufficientFunds { required: 10, available: 5 })
    ));

    let after = hub.stats().await?;
    assert_eq!(before, after);
    assert_eq!(alice.balance().await?, 5);
    Ok(())
}

#[tokio::test]
async fn unknown_reference_is_rejected_and_not_broadcast() -> Result<()> {
    let (hub, _task) = Hub::spawn(HubConfig::default());
    let mut feed = hub.register_holder("observer").await?;
    let mallory = KeyPair::new()?;

    let mut tx = Transaction::new();
    tx.add_input(
        OutPoint::new(Hash256::hash(b"never issued"), 0),
        mallory.public_key.to_bytes().to_vec(),
    );
    tx.add_output(mallory.fingerprint(), 10);
    tx.id = tx.content_hash();

    let verdict = hub.submit(tx.clone()).await;
    assert_eq!(verdict, Err(LedgerError::UnresolvedSource(Hash256::hash(b"never issued"))));
    assert_eq!(hub.transaction(tx.id).await?, None);
    assert!(hub.transactions().await?.is_empty());
    assert!(feed.try_recv().is_err());
    Ok(())
}

#[tokio::test]
async fn double_spend_from_stale_wallet_state_is_rejected() -> Result<()> {
    let config = Config::default();
    let (hub, _task) = Hub::spawn(config.hub.clone());
    let bob = wallet(&hub, "bob", &config.wallet).await?;
    let carol = wallet(&hub, "carol", &config.wallet).await?;

    // A wallet that has not seen its own first transfer yet.
    let (outgoing, _submissions) = mpsc::channel(1);
    let mut stale = Wallet::new("stale", KeyPair::new()?, SigningMode::AllInputs, outgoing);
    let issuance = Transaction::issue_to_address(stale.address(), 10)?;
    hub.submit(issuance.clone()).await?;
    stale.on_broadcast(&issuance);

    let first = stale.build_transfer(bob.address(), 10)?;
    let second = stale.build_transfer(carol.address(), 10)?;

    hub.submit(first).await?;
    assert_eq!(
        hub.submit(second).await,
        Err(LedgerError::DoubleSpend(OutPoint::new(issuance.id, 0)))
    );
    assert_eq!(bob.balance().await?, 10);
    assert_eq!(carol.balance().await?, 0);
    Ok(())
}

#[tokio::test]
async fn first_input_only_signing_is_rejected_for_multi_input_transfers() -> Result<()> {
    let config = Config::legacy();
    let (hub, _task) = Hub::spawn(config.hub.clone());
    let alice = wallet(&hub, "alice", &config.wallet).await?;
    let bob = wallet(&hub, "bob", &config.wallet).await?;

    hub.submit(Transaction::issuance(alice.fingerprint(), 4)).await?;
    hub.submit(Transaction::issuance(alice.fingerprint(), 6)).await?;

    // One input: the legacy contract still works.
    alice.send(bob.address(), 3).await?.accepted().await?;

    // Two inputs (6, then the change of 1): the second carries no signature.
    let verdict = alice.send(bob.address(), 7).await?.accepted().await;
    assert_eq!(verdict, Err(LedgerError::InvalidSignature { input: 1 }));
    assert_eq!(alice.balance().await?, 7);
    Ok(())
}
