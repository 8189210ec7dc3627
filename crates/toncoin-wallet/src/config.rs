//! Wallet configuration.

use crate::keys::DEFAULT_DERIVATION_PATH;
use serde::{Deserialize, Serialize};

/// Fractional digits of the native coin.
pub const NATIVE_DECIMALS: u32 = 9;

/// Asset the wallet account operates on.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum AssetConfig {
    /// Native coin.
    #[default]
    Native,
    /// Token issued by the `master` contract.
    Token {
        /// Token master contract address.
        master: String,
        /// Fractional digits of the token.
        #[serde(default = "default_token_decimals")]
        decimals: u32,
    },
}

impl AssetConfig {
    /// True for token mode.
    pub fn is_token(&self) -> bool {
        matches!(self, AssetConfig::Token { .. })
    }

    /// Fractional digits of the asset.
    pub fn decimals(&self) -> u32 {
        match self {
            AssetConfig::Native => NATIVE_DECIMALS,
            AssetConfig::Token { decimals, .. } => *decimals,
        }
    }
}

fn default_token_decimals() -> u32 {
    9
}

/// Wallet account configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WalletConfig {
    /// Testnet mode.
    pub development: bool,
    /// Asset mode.
    pub asset: AssetConfig,
    /// Derivation path used when none is stored in settings.
    pub derivation_path: String,
    /// Native value attached to a token transfer.
    pub token_transfer_fee: u64,
    /// Native value forwarded to the token recipient.
    pub token_forward_amount: u64,
    /// Smallest transferable amount.
    pub dust_threshold: u64,
    /// History page size.
    pub page_size: usize,
    /// Validity window of signed transfers in seconds.
    pub transfer_timeout_secs: u64,
}

impl Default for WalletConfig {
    fn default() -> Self {
        Self {
            development: false,
            asset: AssetConfig::Native,
            derivation_path: DEFAULT_DERIVATION_PATH.to_string(),
            token_transfer_fee: 50_000_000,
            token_forward_amount: 1,
            dust_threshold: 1,
            page_size: 10,
            transfer_timeout_secs: 60,
        }
    }
}

impl WalletConfig {
    /// Testnet configuration.
    pub fn testnet() -> Self {
        Self {
            development: true,
            ..Default::default()
        }
    }

    /// Token-mode configuration for `master`.
    pub fn token(master: &str, decimals: u32) -> Self {
        Self {
            asset: AssetConfig::Token {
                master: master.to_string(),
                decimals,
            },
            ..Default::default()
        }
    }
}
