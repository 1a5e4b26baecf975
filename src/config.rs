use serde::{Deserialize, Serialize};
use std::env;
use std::path::{Path, PathBuf};

/// How a wallet signs the inputs of a transfer it builds.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum SigningMode {
    /// One sighash and signature per input.
    AllInputs,
    /// Only input 0 carries a signature. Transfers that select more than
    /// one output are rejected by the hub under this mode.
    FirstInputOnly,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct Config {
    pub hub: HubConfig,
    pub wallet: WalletConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct HubConfig {
    pub submission_capacity: usize,
    pub feed_capacity: usize,
    pub allow_issuance: bool,
    pub reject_double_spends: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct WalletConfig {
    pub command_capacity: usize,
    pub outgoing_capacity: usize,
    pub signing_mode: SigningMode,
}

impl Default for HubConfig {
    fn default() -> Self {
        Self {
            submission_capacity: 64,
            feed_capacity: 64,
            allow_issuance: true,
            reject_double_spends: true,
        }
    }
}

impl Default for WalletConfig {
    fn default() -> Self {
        Self {
            command_capacity: 16,
            outgoing_capacity: 1,
            signing_mode: SigningMode::AllInputs,
        }
    }
}

impl Config {
    /// Lean legacy rules: no global spent-output
    /// tracking and first-input-only signing.
    pub fn legacy() -> Self {
        Self {
            hub: HubConfig {
                reject_double_spends: false,
                ..HubConfig::default()
            },
            wallet: WalletConfig {
                signing_mode: SigningMode::FirstInputOnly,
                ..WalletConfig::default()
            },
        }
    }

    pub fn load() -> anyhow::Result<Self> {
        Self::load_from(&Self::config_path())
    }

    /// Read the config at `path`, writing the defaults there if it does not exist.
    pub fn load_from(path: &Path) -> anyhow::Result<Self> {
        if path.exists() {
            let content = std::fs::read_to_string(path)?;
            let config: Config = serde_json::from_str(&content)?;
            Ok(config)
        } else {
            let config = Self::default();
            config.save_to(path)?;
            Ok(config)
        }
    }

    pub fn save_to(&self, path: &Path) -> anyhow::Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let content = serde_json::to_string_pretty(self)?;
        std::fs::write(path, content)?;

        Ok(())
    }

    fn config_path() -> PathBuf {
        let home_dir = env::var("HOME").unwrap_or_else(|_| ".".to_string());
        PathBuf::from(home_dir).join(".utxo-hub").join("config.json")
    }
}
