//! # toncoin-wallet
//!
//! Wallet core for TON accounts, native coin and jetton tokens.
//!
//! This crate provides:
//! - Address parsing, network checks and aliasing over `tonlib-core`
//! - Wallet v4R2 message assembly, token envelopes and text comments
//! - SLIP-0010 ed25519 key derivation
//! - De-duplicated account state queries
//! - Fee estimation by simulation and max-amount calculation
//! - Transaction history paging for native and token accounts
//!
//! ## Example
//!
//! ```ignore
//! use toncoin_wallet::{HttpTransport, MemoryStore, NodeClient, TransferRequest, WalletAccount, WalletConfig};
//! let config = WalletConfig::default();
//! use std::sync::Arc;
//! use std::time::Duration;
//!
//! let transport = HttpTransport::new("https://node.example", Duration::from_secs(30))?;
//! let wallet = WalletAccount::new(
//!     config,
//!     NodeClient::new(Arc::new(transport)),
//!     Arc::new(MemoryStore::new()),
//! );
//!
//! wallet.create(&seed)?;
//! wallet.load().await?;
//!
//! let request = TransferRequest::new("UQBj8pDDn0TAuiZ_EI4npXVtNJTUrdAtRpit6UPiy0cnWnMj", 1_000_000_000);
//! wallet.validate_amount(&request).await?;
//! let id = wallet.create_transaction(&request, &seed).await?;
//! ```

pub mod address;
pub mod cell;
pub mod contract;
pub mod jetton;
pub mod keys;
pub mod node;

mod cache;
mod config;
mod error;
mod fee;
mod history;
mod max_amount;
mod platform_fee;
mod state;
mod storage;
mod transfer;
mod wallet;

pub use address::{
    address_from_parts, canonicalize, parse_address, AddressExt, CanonicalAddress, ParsedAddress,
    TonAddress,
};
pub use cache::MemoCache;
pub use cell::{from_boc_base64, parse_comment, to_boc_base64, ArcCell, Cell, CellBuilder};
pub use config::{AssetConfig, WalletConfig, NATIVE_DECIMALS};
pub use error::{WalletError, WalletResult};
pub use fee::{apply_safety_factor, FeeEstimator, MinerFeeSource};
pub use history::{
    token_url, transaction_url, Direction, HistoryMode, HistoryPage, TransactionAction,
    TransactionHistoryReader, TransactionRecord, TransactionStatus,
};
pub use keys::{KeyPair, KeyProvider, Slip10Ed25519, DEFAULT_DERIVATION_PATH};
pub use max_amount::{MaxAmountQuery, MaxAmountSolver};
pub use node::{Cursor, HttpTransport, NodeClient, NodeRequest, NodeTransport};
pub use platform_fee::{FeeSchedule, FeeScheduleProvider, PlatformFeeCalculator, StaticFeeSchedule};
pub use state::{AccountState, AccountStateClient};
pub use storage::{JsonFileStore, KeyValueStore, MemoryStore, BALANCE_KEY};
pub use transfer::{BuiltTransfer, PlatformFeeTransfer, Signing, TransferBuilder, TransferPlan};
pub use wallet::{
    PrivateKeyExport, PublicKeyExport, TransferRequest, WalletAccount, WalletSettings,
    WalletState, MAX_MEMO_BYTES, META_NAMES,
};
