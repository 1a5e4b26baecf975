use crate::config::Config;
use crate::core::Transaction;
use crate::crypto::keys::{KeyPair, PrivateKey, PublicKey};
use crate::network::Hub;
use anyhow::Context;
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};

#[derive(Parser)]
#[command(name = "hubd")]
#[command(about = "UTXO Hub - a single-process ledger with signed transfers and a broadcast hub")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    #[arg(long, help = "Enable debug logging")]
    pub debug: bool,

    #[arg(long, help = "Configuration file path")]
    pub config: Option<PathBuf>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Generate a key pair and print its address
    Keygen {
        #[arg(long, help = "Restore from an existing private key (hex) instead of generating one")]
        secret: Option<String>,
    },

    /// Derive the fingerprint and address of a compressed public key
    Address {
        /// Public key as hex
        pubkey: String,
    },

    /// Issue coins to one wallet and send part of them to another
    Demo {
        #[arg(long, default_value_t = 100, help = "Amount issued to the first wallet")]
        issue: u32,

        #[arg(long, default_value_t = 30, help = "Amount sent to the second wallet")]
        send: u32,
    },
}

pub async fn run_cli() -> anyhow::Result<()> {
    run(Cli::parse()).await
}

pub async fn run(cli: Cli) -> anyhow::Result<()> {
    // Initialize logging once
    let _ = if cli.debug {
        env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("debug")).try_init()
    } else {
        env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).try_init()
    };

    match cli.command {
        Commands::Keygen { secret } => keygen(secret.as_deref()),
        Commands::Address { pubkey } => show_address(&pubkey),
        Commands::Demo { issue, send } => {
            let config = load_config(cli.config.as_deref())?;
            run_demo(config, issue, send).await
        }
    }
}

fn load_config(path: Option<&Path>) -> anyhow::Result<Config> {
    match path {
        Some(path) => Config::load_from(path)
            .with_context(|| format!("loading config from {}", path.display())),
        None => Config::load().context("loading default config"),
    }
}

fn keygen(secret: Option<&str>) -> anyhow::Result<()> {
    let keypair = match secret {
        Some(secret) => {
            let bytes = hex::decode(secret).context("private key is not valid hex")?;
            KeyPair::from_private_key(PrivateKey::from_bytes(&bytes)?)
        }
        None => KeyPair::new()?,
    };

    println!("🔑 Private key: {}", hex::encode(keypair.private_key.to_bytes()));
    println!("🔓 Public key:  {}", keypair.public_key);
    println!("📬 Address:     {}", keypair.address());

    Ok(())
}

fn show_address(pubkey: &str) -> anyhow::Result<()> {
    let bytes = hex::decode(pubkey).context("public key is not valid hex")?;
    let public_key = PublicKey::from_bytes(&bytes)?;

    println!("Fingerprint: {}", public_key.fingerprint());
    println!("Address:     {}", public_key.address());

    Ok(())
}

async fn run_demo(config: Config, issue: u32, send: u32) -> anyhow::Result<()> {
    let (hub, hub_task) = Hub::spawn(config.hub.clone());

    let alice = hub.register_wallet("alice", KeyPair::new()?, &config.wallet).await?;
    let bob = hub.register_wallet("bob", KeyPair::new()?, &config.wallet).await?;
    println!("alice: {}", alice.address());
    println!("bob:   {}", bob.address());

    let issuance = Transaction::issue_to_address(alice.address(), issue)?;
    hub.submit(issuance).await?;

    let pending = alice.send(bob.address(), send).await?;
    match pending.accepted().await {
        Ok(txid) => println!("✅ Transfer accepted: {}", txid),
        Err(e) => println!("❌ Transfer rejected: {}", e),
    }

    println!("alice balance: {}", alice.balance().await?);
    println!("bob balance:   {}", bob.balance().await?);

    let stats = hub.stats().await?;
    println!("{}", serde_json::to_string_pretty(&stats)?);

    hub.shutdown().await?;
    hub_task.await?;

    Ok(())
}
