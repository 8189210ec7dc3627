//! Wallet error types.

use crate::cell::TonCellError;
use thiserror::Error;

/// Wallet errors.
///
/// Validation variants carry the offending (or limiting) value so callers
/// can display it without re-deriving anything.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum WalletError {
    /// Malformed address text.
    #[error("Invalid address: \"{0}\"")]
    InvalidAddress(String),

    /// Address network flag does not match the active environment.
    #[error("Invalid network \"{0}\"")]
    InvalidNetworkAddress(String),

    /// Transfer target is the wallet itself.
    #[error("Destination address equals source address")]
    DestinationEqualsSource,

    /// Transfer value below the dust floor.
    #[error("Amount is too small, minimum is {min}")]
    SmallAmount { min: u128 },

    /// Transfer value above the spendable maximum.
    #[error("Amount is too big, maximum is {max}")]
    BigAmount { max: u128 },

    /// Native balance cannot cover the fee of a token transfer.
    #[error("Insufficient funds to pay the transaction fee: need {needed}, have {available}")]
    InsufficientFundsForFee { needed: u128, available: u128 },

    /// Memo exceeds the byte-length ceiling.
    #[error("Invalid Memo: \"{0}\"")]
    InvalidMemo(String),

    /// Meta key the wallet does not understand.
    #[error("Unknown meta \"{0}\"")]
    UnknownMeta(String),

    /// Malformed or failed upstream response (raw payload attached).
    #[error("Node error: {0}")]
    Node(String),

    /// Invariant violation.
    #[error("Internal error: {0}")]
    Internal(String),

    /// Derivation path does not match `m(/\d+')*`.
    #[error("Invalid derivation path: {0}")]
    InvalidDerivationPath(String),

    /// Seed rejected by key derivation.
    #[error("Invalid seed: {0}")]
    InvalidSeed(String),

    /// Exported public key could not be decoded.
    #[error("Invalid public key: {0}")]
    InvalidPublicKey(String),

    /// Operation requires a created or opened wallet.
    #[error("Wallet is not ready: {0}")]
    NotReady(&'static str),

    /// Wire codec failure.
    #[error("Cell error: {0}")]
    Cell(String),

    /// Wallet contract could not be derived or assembled.
    #[error("Contract error: {0}")]
    Contract(String),

    /// Persistent store failure.
    #[error("Storage error: {0}")]
    Storage(String),
}

impl WalletError {
    /// True for synchronous input-validation rejections.
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            WalletError::InvalidAddress(_)
                | WalletError::InvalidNetworkAddress(_)
                | WalletError::DestinationEqualsSource
                | WalletError::SmallAmount { .. }
                | WalletError::BigAmount { .. }
                | WalletError::InsufficientFundsForFee { .. }
                | WalletError::InvalidMemo(_)
                | WalletError::UnknownMeta(_)
        )
    }
}

impl From<TonCellError> for WalletError {
    fn from(e: TonCellError) -> Self {
        WalletError::Cell(e.to_string())
    }
}

/// Result type for wallet operations.
pub type WalletResult<T> = Result<T, WalletError>;
