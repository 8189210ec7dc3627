//! Wallet account orchestration.
//!
//! [`WalletAccount`] owns balances, derivation settings and lifecycle state,
//! and exposes the account operations:
//! - create/open from a seed or an exported public key
//! - balance synchronization with the persisted balance
//! - address, amount and memo validation
//! - fee and max-amount quotes
//! - building and submitting transfers
//! - history pages and address unaliasing

use crate::address::{
    canonicalize, parse_address, AddressExt, CanonicalAddress, ParsedAddress, TonAddress,
};
use crate::config::{AssetConfig, WalletConfig, NATIVE_DECIMALS};
use crate::contract::WalletContract;
use crate::fee::{FeeEstimator, MinerFeeSource};
use crate::history::{self, HistoryMode, HistoryPage, TransactionHistoryReader};
use crate::keys::{validate_derivation_path, KeyProvider, Slip10Ed25519};
use crate::max_amount::{MaxAmountQuery, MaxAmountSolver};
use crate::node::{Cursor, NodeClient};
use crate::platform_fee::{
    FeeSchedule, FeeScheduleProvider, PlatformFeeCalculator, StaticFeeSchedule,
};
use crate::state::AccountStateClient;
use crate::storage::{KeyValueStore, BALANCE_KEY};
use crate::transfer::{PlatformFeeTransfer, Signing, TransferBuilder, TransferPlan};
use crate::{WalletError, WalletResult};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, instrument, warn};

/// Maximum memo length in bytes.
pub const MAX_MEMO_BYTES: usize = 657_432;

/// Meta keys understood by [`WalletAccount::validate_meta`].
pub const META_NAMES: &[&str] = &["memo"];

/// Lifecycle state of a wallet account.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WalletState {
    /// Constructed, no key material yet.
    Created,
    /// Deriving keys.
    Initializing,
    /// Keys and address are available.
    Initialized,
    /// Stored public key does not match the current settings.
    NeedInitialization,
    /// Synchronizing balances.
    Loading,
    /// Balances synchronized.
    Loaded,
    /// Last synchronization failed.
    Error,
}

/// Derivation settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WalletSettings {
    /// Derivation path.
    pub bip44: String,
}

/// Exported public key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PublicKeyExport {
    /// Settings the key was derived with.
    pub settings: WalletSettings,
    /// Hex-encoded public key.
    pub data: String,
}

/// Exported private key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PrivateKeyExport {
    /// Wallet address.
    pub address: String,
    /// Hex of `secret || public`.
    pub privatekey: String,
}

/// A transfer request as submitted by the caller.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransferRequest {
    /// Destination address (user-friendly form).
    pub address: String,
    /// Amount in base units of the wallet asset.
    pub amount: u128,
    /// Asset price, used for the platform fee minimum.
    #[serde(default)]
    pub price: Option<f64>,
    /// Optional text comment.
    #[serde(default)]
    pub memo: Option<String>,
}

impl TransferRequest {
    /// Request without memo or price.
    pub fn new(address: &str, amount: u128) -> Self {
        Self {
            address: address.to_string(),
            amount,
            price: None,
            memo: None,
        }
    }

    /// Attach a price.
    pub fn with_price(mut self, price: f64) -> Self {
        self.price = Some(price);
        self
    }

    /// Attach a memo.
    pub fn with_memo(mut self, memo: &str) -> Self {
        self.memo = Some(memo.to_string());
        self
    }

    /// Meta entries carried by the request, keyed by [`META_NAMES`].
    pub fn meta(&self) -> BTreeMap<String, String> {
        self.memo
            .iter()
            .map(|memo| ("memo".to_string(), memo.clone()))
            .collect()
    }
}

/// Components bound to one public key.
struct Session {
    address: String,
    builder: Arc<TransferBuilder>,
    fees: FeeEstimator,
    history: TransactionHistoryReader,
}

/// A wallet account for one asset.
pub struct WalletAccount {
    config: WalletConfig,
    node: NodeClient,
    accounts: Arc<AccountStateClient>,
    storage: Arc<dyn KeyValueStore>,
    fee_schedule: Arc<dyn FeeScheduleProvider>,
    keys: Arc<dyn KeyProvider>,
    calculator: PlatformFeeCalculator,
    state: RwLock<WalletState>,
    settings: RwLock<WalletSettings>,
    public_key: RwLock<Option<[u8; 32]>>,
    session: RwLock<Option<Arc<Session>>>,
    /// Balance of the wallet asset.
    balance: RwLock<u128>,
    /// Native balance, tracked separately in token mode.
    native_balance: RwLock<u128>,
}

impl WalletAccount {
    /// Create an account with a disabled platform fee and SLIP-0010 keys.
    pub fn new(config: WalletConfig, node: NodeClient, storage: Arc<dyn KeyValueStore>) -> Self {
        let settings = WalletSettings {
            bip44: config.derivation_path.clone(),
        };
        Self {
            accounts: Arc::new(AccountStateClient::new(node.clone())),
            node,
            storage,
            fee_schedule: Arc::new(StaticFeeSchedule::default()),
            keys: Arc::new(Slip10Ed25519),
            calculator: PlatformFeeCalculator::new(NATIVE_DECIMALS),
            state: RwLock::new(WalletState::Created),
            settings: RwLock::new(settings),
            public_key: RwLock::new(None),
            session: RwLock::new(None),
            balance: RwLock::new(0),
            native_balance: RwLock::new(0),
            config,
        }
    }

    /// Use `provider` for the platform fee schedule.
    pub fn with_fee_schedule(mut self, provider: Arc<dyn FeeScheduleProvider>) -> Self {
        self.fee_schedule = provider;
        self
    }

    /// Use `keys` for key derivation.
    pub fn with_key_provider(mut self, keys: Arc<dyn KeyProvider>) -> Self {
        self.keys = keys;
        self
    }

    /// Configuration.
    pub fn config(&self) -> &WalletConfig {
        &self.config
    }

    /// Lifecycle state.
    pub fn state(&self) -> WalletState {
        *self.state.read()
    }

    fn set_state(&self, state: WalletState) {
        *self.state.write() = state;
    }

    fn session(&self) -> WalletResult<Arc<Session>> {
        self.session
            .read()
            .clone()
            .ok_or(WalletError::NotReady("wallet is not created or opened"))
    }

    fn token_master(&self) -> Option<&str> {
        match &self.config.asset {
            AssetConfig::Token { master, .. } => Some(master.as_str()),
            AssetConfig::Native => None,
        }
    }

    // --- Lifecycle ---

    /// Derive keys from `seed` and bind the account to them.
    pub fn create(&self, seed: &[u8]) -> WalletResult<()> {
        self.set_state(WalletState::Initializing);
        let path = self.settings.read().bip44.clone();
        let result = self
            .keys
            .derive(seed, &path)
            .and_then(|pair| self.init(pair.public_key()));
        self.finish_init(result)
    }

    /// Bind the account to an exported public key.
    ///
    /// A key exported under different settings leaves the account in
    /// [`WalletState::NeedInitialization`].
    pub fn open(&self, public_key: &PublicKeyExport) -> WalletResult<()> {
        self.set_state(WalletState::Initializing);
        if public_key.settings.bip44 != self.settings.read().bip44 {
            self.set_state(WalletState::NeedInitialization);
            return Ok(());
        }
        let result = decode_public_key(&public_key.data).and_then(|key| self.init(key));
        self.finish_init(result)
    }

    /// Settle the lifecycle state after `create` or `open`. Failures return
    /// the account to [`WalletState::Created`].
    fn finish_init(&self, result: WalletResult<()>) -> WalletResult<()> {
        match result {
            Ok(()) => {
                self.set_state(WalletState::Initialized);
                Ok(())
            }
            Err(e) => {
                warn!(error = %e, "Wallet initialization failed");
                self.set_state(WalletState::Created);
                Err(e)
            }
        }
    }

    fn init(&self, public_key: [u8; 32]) -> WalletResult<()> {
        let contract = WalletContract::new(public_key)?;
        let address = contract
            .address()
            .to_friendly(false, self.config.development);

        let builder = Arc::new(
            TransferBuilder::new(contract, self.accounts.clone(), address.clone())
                .with_token_transfer_fee(self.config.token_transfer_fee as u128)
                .with_token_forward_amount(self.config.token_forward_amount as u128)
                .with_timeout(Duration::from_secs(self.config.transfer_timeout_secs)),
        );
        let session = Session {
            address: address.clone(),
            fees: FeeEstimator::new(builder.clone(), self.config.token_transfer_fee as u128),
            history: TransactionHistoryReader::new(self.node.clone(), self.config.development),
            builder,
        };

        let stored = self
            .storage
            .get(BALANCE_KEY)
            .and_then(|value| value.parse::<u128>().ok())
            .unwrap_or(0);
        *self.balance.write() = stored;
        *self.public_key.write() = Some(public_key);
        *self.session.write() = Some(Arc::new(session));

        info!(address = %address, balance = %stored, "Wallet initialized");
        Ok(())
    }

    /// Synchronize balances with the node and persist them.
    #[instrument(skip(self))]
    pub async fn load(&self) -> WalletResult<()> {
        self.set_state(WalletState::Loading);
        match self.sync().await {
            Ok(()) => {
                self.set_state(WalletState::Loaded);
                Ok(())
            }
            Err(e) => {
                warn!(error = %e, "Wallet load failed");
                self.set_state(WalletState::Error);
                Err(e)
            }
        }
    }

    async fn sync(&self) -> WalletResult<()> {
        let session = self.session()?;
        let account = self.accounts.get_account_state(&session.address).await?;
        *self.native_balance.write() = account.balance;

        let balance = match self.token_master() {
            None => account.balance,
            Some(master) => {
                let subaccount = self
                    .accounts
                    .get_token_subaccount_address(&session.address, master)
                    .await?;
                self.accounts.get_token_balance(&subaccount).await?
            }
        };

        *self.balance.write() = balance;
        self.storage.set(BALANCE_KEY, balance.to_string());
        self.storage.save().await?;
        info!(balance = %balance, native = %account.balance, "Wallet loaded");
        Ok(())
    }

    /// Drop all session caches.
    pub fn cleanup(&self) {
        self.accounts.clear();
        if let Some(session) = self.session.read().as_ref() {
            session.fees.clear();
        }
    }

    // --- Keys and settings ---

    /// Export the public key with the settings it was derived under.
    pub fn public_key(&self) -> WalletResult<PublicKeyExport> {
        let key = (*self.public_key.read())
            .ok_or(WalletError::NotReady("wallet is not created or opened"))?;
        Ok(PublicKeyExport {
            settings: self.settings(),
            data: hex::encode(key),
        })
    }

    /// Export the private key derived from `seed`.
    pub fn private_key(&self, seed: &[u8]) -> WalletResult<Vec<PrivateKeyExport>> {
        let session = self.session()?;
        let pair = self.keys.derive(seed, &self.settings.read().bip44)?;
        Ok(vec![PrivateKeyExport {
            address: session.address.clone(),
            privatekey: pair.private_key_hex().to_string(),
        }])
    }

    /// Current derivation settings.
    pub fn settings(&self) -> WalletSettings {
        self.settings.read().clone()
    }

    /// Settings are supported in native mode only.
    pub fn is_settings_supported(&self) -> bool {
        !self.config.asset.is_token()
    }

    /// Replace the derivation settings.
    pub fn set_settings(&self, settings: WalletSettings) -> WalletResult<()> {
        if !self.is_settings_supported() {
            return Err(WalletError::Internal(
                "settings are not supported for tokens".to_string(),
            ));
        }
        if !validate_derivation_path(&settings.bip44) {
            return Err(WalletError::InvalidDerivationPath(settings.bip44));
        }
        *self.settings.write() = settings;
        Ok(())
    }

    /// True when `path` is a valid derivation path.
    pub fn validate_derivation_path(&self, path: &str) -> bool {
        validate_derivation_path(path)
    }

    // --- Accessors ---

    /// Balance of the wallet asset.
    pub fn balance(&self) -> u128 {
        *self.balance.read()
    }

    /// Native balance (equals [`WalletAccount::balance`] in native mode).
    pub fn native_balance(&self) -> u128 {
        if self.config.asset.is_token() {
            *self.native_balance.read()
        } else {
            self.balance()
        }
    }

    /// Wallet address (non-bounceable form).
    pub fn address(&self) -> WalletResult<String> {
        Ok(self.session()?.address.clone())
    }

    /// Recognised meta keys.
    pub fn meta_names(&self) -> &'static [&'static str] {
        META_NAMES
    }

    // --- Validation ---

    fn own_address(&self) -> WalletResult<TonAddress> {
        Ok(self.session()?.builder.contract().address().clone())
    }

    /// Validate a destination address.
    pub fn validate_address(&self, address: &str) -> WalletResult<()> {
        let parsed = ParsedAddress::parse(address)?;
        parsed.validate_network(address, self.config.development)?;
        if parsed.address == self.own_address()? {
            return Err(WalletError::DestinationEqualsSource);
        }
        Ok(())
    }

    /// Validate an amount: dust floor, token fee coverage, then max amount.
    #[instrument(skip(self))]
    pub async fn validate_amount(&self, request: &TransferRequest) -> WalletResult<()> {
        let dust = self.config.dust_threshold as u128;
        if request.amount < dust {
            return Err(WalletError::SmallAmount { min: dust });
        }
        if self.config.asset.is_token() {
            let needed = self.config.token_transfer_fee as u128;
            let available = self.native_balance();
            if available < needed {
                return Err(WalletError::InsufficientFundsForFee { needed, available });
            }
        }
        let max = self
            .estimate_max_amount(&request.address, request.memo.as_deref(), request.price)
            .await?;
        if request.amount > max {
            return Err(WalletError::BigAmount { max });
        }
        Ok(())
    }

    /// Validate transfer meta: every key must be one of [`META_NAMES`] and
    /// the memo must fit in [`MAX_MEMO_BYTES`].
    pub fn validate_meta(&self, meta: &BTreeMap<String, String>) -> WalletResult<()> {
        for (name, value) in meta {
            if !META_NAMES.contains(&name.as_str()) {
                return Err(WalletError::UnknownMeta(name.clone()));
            }
            if name == "memo" && value.len() > MAX_MEMO_BYTES {
                return Err(WalletError::InvalidMemo(value.clone()));
            }
        }
        Ok(())
    }

    // --- Quotes ---

    fn fee_address(schedule: &FeeSchedule) -> Option<TonAddress> {
        if schedule.disabled {
            return None;
        }
        schedule
            .address
            .as_deref()
            .and_then(|address| parse_address(address).ok())
    }

    /// Build the plan for `request`, returning it with the platform fee value.
    async fn plan(&self, request: &TransferRequest) -> WalletResult<(TransferPlan, u128)> {
        let destination = ParsedAddress::parse(&request.address)?.address;
        match self.token_master() {
            Some(master) => {
                let session = self.session()?;
                let subaccount = self
                    .accounts
                    .get_token_subaccount_address(&session.address, master)
                    .await?;
                let plan = TransferPlan::Token {
                    subaccount: parse_address(&subaccount)?,
                    destination,
                    amount: request.amount,
                    memo: request.memo.clone(),
                };
                Ok((plan, 0))
            }
            None => {
                let schedule = self.fee_schedule.fee_schedule().await?;
                let value = self.calculator.fee(&schedule, request.amount, request.price);
                let platform_fee = match Self::fee_address(&schedule) {
                    Some(address) if value > 0 => Some(PlatformFeeTransfer { address, value }),
                    _ => None,
                };
                let charged = platform_fee.as_ref().map(|fee| fee.value).unwrap_or(0);
                let plan = TransferPlan::Native {
                    destination,
                    value: request.amount,
                    memo: request.memo.clone(),
                    platform_fee,
                };
                Ok((plan, charged))
            }
        }
    }

    /// Total fee (miner fee plus platform fee) for `request`, in native units.
    #[instrument(skip(self))]
    pub async fn estimate_transaction_fee(&self, request: &TransferRequest) -> WalletResult<u128> {
        let session = self.session()?;
        let (plan, platform_fee) = self.plan(request).await?;
        let miner_fee = session.fees.miner_fee(&plan).await?;
        Ok(miner_fee + platform_fee)
    }

    /// Largest amount transferable to `address`.
    #[instrument(skip(self))]
    pub async fn estimate_max_amount(
        &self,
        address: &str,
        memo: Option<&str>,
        price: Option<f64>,
    ) -> WalletResult<u128> {
        let session = self.session()?;
        let solver = MaxAmountSolver::new(&session.fees, self.calculator);
        if self.config.asset.is_token() {
            return Ok(solver.token(self.balance()));
        }

        let schedule = self.fee_schedule.fee_schedule().await?;
        let fee_address = Self::fee_address(&schedule);
        solver
            .native(MaxAmountQuery {
                balance: self.balance(),
                destination: ParsedAddress::parse(address)?.address,
                memo,
                schedule: &schedule,
                fee_address,
                price,
            })
            .await
    }

    // --- Send ---

    /// Build, sign and submit a transfer. Returns the submission receipt,
    /// which is not the on-chain transaction id.
    #[instrument(skip(self, seed))]
    pub async fn create_transaction(&self, request: &TransferRequest, seed: &[u8]) -> WalletResult<String> {
        let session = self.session()?;
        let (plan, platform_fee) = self.plan(request).await?;
        let miner_fee = session.fees.miner_fee(&plan).await?;

        let pair = self.keys.derive(seed, &self.settings.read().bip44)?;
        let built = session.builder.build(&plan, Signing::Key(&pair)).await?;
        self.node.send_boc(&built.boc()?).await?;
        self.accounts.invalidate_account_state(&session.address)?;
        if built.init.is_some() {
            // Every memoized quote priced the deployment.
            session.fees.clear();
        } else {
            session.fees.invalidate(&plan)?;
        }

        let balance = match &plan {
            TransferPlan::Native { value, .. } => {
                let spent = value
                    .saturating_add(miner_fee)
                    .saturating_add(platform_fee);
                let mut balance = self.balance.write();
                *balance = balance.saturating_sub(spent);
                *balance
            }
            TransferPlan::Token { amount, .. } => {
                {
                    let mut native = self.native_balance.write();
                    *native = native.saturating_sub(miner_fee);
                }
                let mut balance = self.balance.write();
                *balance = balance.saturating_sub(*amount);
                *balance
            }
        };
        self.storage.set(BALANCE_KEY, balance.to_string());
        self.storage.save().await?;

        info!(
            id = %built.id,
            amount = %request.amount,
            miner_fee = %miner_fee,
            platform_fee = %platform_fee,
            balance = %balance,
            "Submitted transfer"
        );
        Ok(built.id)
    }

    // --- History ---

    /// Load a page of history starting at `cursor` (newest first when `None`).
    #[instrument(skip(self))]
    pub async fn load_transactions(&self, cursor: Option<&Cursor>) -> WalletResult<HistoryPage> {
        let session = self.session()?;
        let (address, mode) = match self.token_master() {
            Some(master) => (
                self.accounts
                    .get_token_subaccount_address(&session.address, master)
                    .await?,
                HistoryMode::Token,
            ),
            None => (session.address.clone(), HistoryMode::Native),
        };
        session
            .history
            .load_page(&address, cursor, self.config.page_size, mode)
            .await
    }

    // --- Addresses ---

    /// Canonical form of `address`; unparseable input yields `None`.
    pub fn unalias(&self, address: &str) -> Option<CanonicalAddress> {
        canonicalize(address)
    }

    /// Explorer link for a token contract.
    pub fn token_url(token: &str, development: bool) -> String {
        history::token_url(token, development)
    }
}

fn decode_public_key(data: &str) -> WalletResult<[u8; 32]> {
    let bytes = hex::decode(data).map_err(|e| WalletError::InvalidPublicKey(e.to_string()))?;
    bytes
        .try_into()
        .map_err(|_| WalletError::InvalidPublicKey(data.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::keys::KeyPair;
    use crate::node::{
        NodeRequest, NodeTransport, PATH_ESTIMATE_FEE, PATH_SEND_BOC, PATH_WALLET_INFORMATION,
    };
    use crate::storage::MemoryStore;
    use async_trait::async_trait;
    use parking_lot::Mutex;
    use serde_json::{json, Value};
    use std::sync::atomic::{AtomicBool, Ordering};

    const SEED: &str = "2b48a48a752f6c49772bf97205660411cd2163fe6ce2de19537e9c94d3648c85c0d7f405660c20253115aaf1799b1c41cdd62b4cfbb6845bc9475495fc64b874";
    const PUBLIC_KEY: &str = "3551dd99b8e909ffa2388f92c67357e1840b3a6d93f6031119f2286b4fac43eb";
    const ADDRESS: &str = "UQBa1jalGfCwrast5gg_PB-U2cdCHg2mPy2gUO-_4u_vuboO";
    const SECOND_ADDRESS: &str = "UQBj8pDDn0TAuiZ_EI4npXVtNJTUrdAtRpit6UPiy0cnWnMj";

    struct Node;

    #[async_trait]
    impl NodeTransport for Node {
        async fn request(&self, request: NodeRequest) -> WalletResult<Value> {
            match request.path {
                PATH_WALLET_INFORMATION => Ok(json!({
                    "ok": true,
                    "result": { "balance": "4936421995", "account_state": "active", "seqno": 7 }
                })),
                PATH_ESTIMATE_FEE => Ok(json!({
                    "ok": true,
                    "result": { "source_fees": {
                        "in_fwd_fee": 1_000_000, "storage_fee": 335_372,
                        "gas_fee": 130_000_000, "fwd_fee": 8_000_000
                    }}
                })),
                _ => Ok(json!({ "ok": true })),
            }
        }
    }

    /// Account that stays uninitialized until the first transfer is sent.
    #[derive(Default)]
    struct Deploying {
        sent: AtomicBool,
        estimates: Mutex<Vec<bool>>,
    }

    #[async_trait]
    impl NodeTransport for Deploying {
        async fn request(&self, request: NodeRequest) -> WalletResult<Value> {
            match request.path {
                PATH_WALLET_INFORMATION => {
                    let (state, seqno) = if self.sent.load(Ordering::SeqCst) {
                        ("active", 1)
                    } else {
                        ("uninitialized", 0)
                    };
                    Ok(json!({
                        "ok": true,
                        "result": { "balance": "4936421995", "account_state": state, "seqno": seqno }
                    }))
                }
                PATH_ESTIMATE_FEE => {
                    let deploy = request
                        .body
                        .as_ref()
                        .map(|body| body["init_code"].is_string())
                        .unwrap_or(false);
                    self.estimates.lock().push(deploy);
                    let gas_fee = if deploy { 200_000_000 } else { 100_000_000 };
                    Ok(json!({
                        "ok": true,
                        "result": { "source_fees": {
                            "in_fwd_fee": 0, "storage_fee": 0, "gas_fee": gas_fee, "fwd_fee": 0
                        }}
                    }))
                }
                PATH_SEND_BOC => {
                    self.sent.store(true, Ordering::SeqCst);
                    Ok(json!({ "ok": true }))
                }
                _ => Ok(json!({ "ok": true })),
            }
        }
    }

    /// Key derivation that always fails.
    struct BrokenKeys;

    impl KeyProvider for BrokenKeys {
        fn derive(&self, _seed: &[u8], path: &str) -> WalletResult<KeyPair> {
            Err(WalletError::InvalidDerivationPath(path.to_string()))
        }
    }

    fn account(store: Arc<MemoryStore>) -> WalletAccount {
        WalletAccount::new(WalletConfig::default(), NodeClient::new(Arc::new(Node)), store)
    }

    fn opened() -> WalletAccount {
        let wallet = account(Arc::new(MemoryStore::new()));
        wallet
            .open(&PublicKeyExport {
                settings: WalletSettings {
                    bip44: "m/44'/607'/0'".to_string(),
                },
                data: PUBLIC_KEY.to_string(),
            })
            .unwrap();
        wallet
    }

    #[test]
    fn test_create_matches_open() {
        let created = account(Arc::new(MemoryStore::new()));
        assert_eq!(created.state(), WalletState::Created);
        created.create(&hex::decode(SEED).unwrap()).unwrap();
        assert_eq!(created.state(), WalletState::Initialized);

        let export = created.public_key().unwrap();
        assert_eq!(export.data, PUBLIC_KEY);

        let opened = opened();
        assert_eq!(opened.address().unwrap(), created.address().unwrap());
    }

    #[test]
    fn test_default_config_address() {
        let wallet = account(Arc::new(MemoryStore::new()));
        wallet.create(&hex::decode(SEED).unwrap()).unwrap();
        assert_eq!(wallet.address().unwrap(), ADDRESS);
    }

    #[test]
    fn test_failed_open_resets_state() {
        let wallet = account(Arc::new(MemoryStore::new()));
        for data in ["zz", "3551dd99"] {
            let result = wallet.open(&PublicKeyExport {
                settings: WalletSettings {
                    bip44: "m/44'/607'/0'".to_string(),
                },
                data: data.to_string(),
            });
            assert!(matches!(result, Err(WalletError::InvalidPublicKey(_))));
            assert_eq!(wallet.state(), WalletState::Created);
            assert!(matches!(wallet.address(), Err(WalletError::NotReady(_))));
        }
    }

    #[test]
    fn test_failed_create_resets_state() {
        let wallet = account(Arc::new(MemoryStore::new())).with_key_provider(Arc::new(BrokenKeys));
        assert!(wallet.create(&hex::decode(SEED).unwrap()).is_err());
        assert_eq!(wallet.state(), WalletState::Created);
    }

    #[tokio::test]
    async fn test_deploy_quote_dropped_after_send() {
        let node = Arc::new(Deploying::default());
        let wallet = WalletAccount::new(
            WalletConfig::default(),
            NodeClient::new(node.clone()),
            Arc::new(MemoryStore::new()),
        );
        wallet.create(&hex::decode(SEED).unwrap()).unwrap();
        wallet.load().await.unwrap();

        let request = TransferRequest::new(SECOND_ADDRESS, 1_000_000_000);
        assert_eq!(wallet.estimate_transaction_fee(&request).await.unwrap(), 210_000_000);
        wallet
            .create_transaction(&request, &hex::decode(SEED).unwrap())
            .await
            .unwrap();
        assert_eq!(wallet.balance(), 4_936_421_995 - 1_000_000_000 - 210_000_000);

        // The account is deployed now; the same request is priced again.
        assert_eq!(wallet.estimate_transaction_fee(&request).await.unwrap(), 105_000_000);
        assert_eq!(*node.estimates.lock(), vec![true, false]);
    }

    #[test]
    fn test_open_with_other_settings() {
        let wallet = account(Arc::new(MemoryStore::new()));
        wallet
            .open(&PublicKeyExport {
                settings: WalletSettings {
                    bip44: "m/44'/607'/1'".to_string(),
                },
                data: PUBLIC_KEY.to_string(),
            })
            .unwrap();
        assert_eq!(wallet.state(), WalletState::NeedInitialization);
        assert!(matches!(wallet.address(), Err(WalletError::NotReady(_))));
    }

    #[test]
    fn test_stored_balance_restored() {
        let store = Arc::new(MemoryStore::with_value(BALANCE_KEY, "1234567890"));
        let wallet = account(store);
        wallet.create(&hex::decode(SEED).unwrap()).unwrap();
        assert_eq!(wallet.balance(), 1_234_567_890);
    }

    #[tokio::test]
    async fn test_load_persists_balance() {
        let store = Arc::new(MemoryStore::new());
        let wallet = account(store.clone());
        wallet.create(&hex::decode(SEED).unwrap()).unwrap();
        wallet.load().await.unwrap();
        assert_eq!(wallet.state(), WalletState::Loaded);
        assert_eq!(wallet.balance(), 4_936_421_995);
        assert_eq!(store.get(BALANCE_KEY).as_deref(), Some("4936421995"));
        assert_eq!(store.save_count(), 1);
    }

    #[tokio::test]
    async fn test_send_updates_balance() {
        let wallet = opened();
        wallet.load().await.unwrap();
        let request = TransferRequest::new(SECOND_ADDRESS, 1_000_000_000).with_price(2.14);
        assert_eq!(wallet.estimate_transaction_fee(&request).await.unwrap(), 146_302_140);
        wallet
            .create_transaction(&request, &hex::decode(SEED).unwrap())
            .await
            .unwrap();
        assert_eq!(wallet.balance(), 3_790_119_855);
    }

    #[test]
    fn test_validate_address() {
        let wallet = opened();
        assert!(wallet.validate_address(SECOND_ADDRESS).is_ok());
        assert!(matches!(
            wallet.validate_address("foobar"),
            Err(WalletError::InvalidAddress(_))
        ));
        let own = wallet.address().unwrap();
        assert_eq!(
            wallet.validate_address(&own),
            Err(WalletError::DestinationEqualsSource)
        );
    }

    fn meta(entries: &[(&str, String)]) -> BTreeMap<String, String> {
        entries
            .iter()
            .map(|(name, value)| (name.to_string(), value.clone()))
            .collect()
    }

    #[test]
    fn test_validate_meta() {
        let wallet = opened();
        assert!(wallet.validate_meta(&BTreeMap::new()).is_ok());
        assert!(wallet.validate_meta(&meta(&[("memo", String::new())])).is_ok());
        assert!(wallet
            .validate_meta(&meta(&[("memo", "a".repeat(MAX_MEMO_BYTES))]))
            .is_ok());
        assert!(matches!(
            wallet.validate_meta(&meta(&[("memo", "a".repeat(MAX_MEMO_BYTES + 1))])),
            Err(WalletError::InvalidMemo(_))
        ));
        assert_eq!(wallet.meta_names(), &["memo"]);
    }

    #[test]
    fn test_validate_meta_unknown_key() {
        let wallet = opened();
        assert_eq!(
            wallet.validate_meta(&meta(&[("memo", "hi".to_string()), ("tag", "1".to_string())])),
            Err(WalletError::UnknownMeta("tag".to_string()))
        );

        let request = TransferRequest::new(SECOND_ADDRESS, 1).with_memo("hi");
        assert_eq!(request.meta(), meta(&[("memo", "hi".to_string())]));
        assert!(wallet.validate_meta(&request.meta()).is_ok());
        assert!(TransferRequest::new(SECOND_ADDRESS, 1).meta().is_empty());
    }

    #[test]
    fn test_settings() {
        let wallet = account(Arc::new(MemoryStore::new()));
        assert!(wallet.is_settings_supported());
        assert!(matches!(
            wallet.set_settings(WalletSettings {
                bip44: "m/44'/607'/1/2'".to_string()
            }),
            Err(WalletError::InvalidDerivationPath(_))
        ));
        wallet
            .set_settings(WalletSettings {
                bip44: "m/44'/607'/1'".to_string(),
            })
            .unwrap();
        assert_eq!(wallet.settings().bip44, "m/44'/607'/1'");
    }

    #[test]
    fn test_not_ready() {
        let wallet = account(Arc::new(MemoryStore::new()));
        assert!(matches!(wallet.public_key(), Err(WalletError::NotReady(_))));
    }
}
