//! CLI configuration.

use crate::Args;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use toncoin_wallet::{FeeSchedule, WalletConfig};

/// Complete CLI configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CliConfig {
    /// Base URL of the node API.
    pub node_url: String,
    /// Request timeout in seconds.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    /// File holding persisted wallet data.
    #[serde(default = "default_store_path")]
    pub store_path: PathBuf,
    /// Platform fee schedule.
    #[serde(default)]
    pub fee_schedule: FeeSchedule,
    /// Wallet account configuration.
    #[serde(default)]
    pub wallet: WalletConfig,
}

fn default_timeout_secs() -> u64 {
    30
}

fn default_store_path() -> PathBuf {
    PathBuf::from("wallet.json")
}

impl CliConfig {
    /// Load configuration from file and CLI args.
    pub fn load(config_path: &Path, args: &Args) -> Result<Self> {
        let mut config = if config_path.exists() {
            let content =
                std::fs::read_to_string(config_path).context("Failed to read config file")?;
            toml::from_str(&content).context("Failed to parse config file")?
        } else {
            Self::default_for_network(args.testnet)
        };

        if args.testnet {
            config.wallet.development = true;
        }
        if let Some(ref node_url) = args.node_url {
            config.node_url = node_url.clone();
        }
        if let Some(ref store) = args.store {
            config.store_path = store.clone();
        }

        Ok(config)
    }

    /// Default config for mainnet or testnet.
    pub fn default_for_network(testnet: bool) -> Self {
        let (node_url, wallet) = if testnet {
            ("https://testnet.toncenter.com", WalletConfig::testnet())
        } else {
            ("https://toncenter.com", WalletConfig::default())
        };
        Self {
            node_url: node_url.to_string(),
            timeout_secs: default_timeout_secs(),
            store_path: default_store_path(),
            fee_schedule: FeeSchedule::default(),
            wallet,
        }
    }
}
