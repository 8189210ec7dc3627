//! Test harness for integration tests.
//!
//! Provides a scripted node transport and a wallet account wired to it,
//! plus helpers for decoding what the wallet submitted.

use crate::generators::{scenario_fees, test_config, test_seed};
use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;
use toncoin_wallet::contract::{parse_transfer_messages, InternalMessage};
use toncoin_wallet::node::{
    PATH_ESTIMATE_FEE, PATH_SEND_BOC, PATH_TOKEN_DATA, PATH_TOKEN_WALLET_ADDRESS,
    PATH_TRANSACTIONS, PATH_WALLET_INFORMATION,
};
use toncoin_wallet::{
    from_boc_base64, MemoryStore, NodeClient, NodeRequest, NodeTransport, WalletAccount, WalletConfig,
    WalletResult,
};

/// In-memory node answering with scripted data.
pub struct MockNode {
    account: Mutex<Value>,
    fees: Mutex<Value>,
    deploy_fees: Mutex<Value>,
    token_wallet: Mutex<Option<String>>,
    token_balance: Mutex<u128>,
    transactions: Mutex<Vec<Value>>,
    failing: Mutex<Option<&'static str>>,
    latency: Mutex<Duration>,
    requests: Mutex<Vec<NodeRequest>>,
}

impl MockNode {
    /// An active account with zero balance and the scenario fee table.
    pub fn new() -> Self {
        Self {
            account: Mutex::new(json!({ "balance": "0", "account_state": "active", "seqno": 1 })),
            fees: Mutex::new(scenario_fees()),
            deploy_fees: Mutex::new(scenario_fees()),
            token_wallet: Mutex::new(None),
            token_balance: Mutex::new(0),
            transactions: Mutex::new(Vec::new()),
            failing: Mutex::new(None),
            latency: Mutex::new(Duration::ZERO),
            requests: Mutex::new(Vec::new()),
        }
    }

    /// Active account holding `balance` at `seqno`.
    pub fn with_account(self, balance: u128, seqno: u32) -> Self {
        *self.account.lock() = json!({
            "balance": balance.to_string(),
            "account_state": "active",
            "seqno": seqno,
        });
        self
    }

    /// Undeployed account holding `balance`.
    pub fn with_uninitialized_account(self, balance: u128) -> Self {
        *self.account.lock() = json!({
            "balance": balance.to_string(),
            "account_state": "uninitialized",
        });
        self
    }

    /// Fee components reported for bodies without and with a deployment payload.
    pub fn with_fees(self, fees: Value, deploy_fees: Value) -> Self {
        *self.fees.lock() = fees;
        *self.deploy_fees.lock() = deploy_fees;
        self
    }

    /// Token subaccount at `address` holding `balance`.
    pub fn with_token(self, address: &str, balance: u128) -> Self {
        *self.token_wallet.lock() = Some(address.to_string());
        *self.token_balance.lock() = balance;
        self
    }

    /// Full history, newest first.
    pub fn with_transactions(self, transactions: Vec<Value>) -> Self {
        *self.transactions.lock() = transactions;
        self
    }

    /// Delay every response by `latency`.
    pub fn with_latency(self, latency: Duration) -> Self {
        *self.latency.lock() = latency;
        self
    }

    /// Answer requests to `path` with a failure envelope.
    pub fn fail(&self, path: &'static str) {
        *self.failing.lock() = Some(path);
    }

    /// Stop failing.
    pub fn recover(&self) {
        *self.failing.lock() = None;
    }

    /// Replace the reported native balance, keeping the account state.
    pub fn set_balance(&self, balance: u128) {
        self.account.lock()["balance"] = json!(balance.to_string());
    }

    /// Report the account as deployed at `seqno`, keeping the balance.
    pub fn activate(&self, seqno: u32) {
        let mut account = self.account.lock();
        account["account_state"] = json!("active");
        account["seqno"] = json!(seqno);
    }

    /// Requests seen for `path`.
    pub fn requests(&self, path: &str) -> Vec<NodeRequest> {
        self.requests
            .lock()
            .iter()
            .filter(|request| request.path == path)
            .cloned()
            .collect()
    }

    /// Number of requests seen for `path`.
    pub fn calls(&self, path: &str) -> usize {
        self.requests(path).len()
    }

    /// Submitted envelopes, decoded.
    pub fn sent(&self) -> Vec<SentTransfer> {
        self.requests(PATH_SEND_BOC)
            .iter()
            .filter_map(|request| request.body.as_ref()?.get("boc")?.as_str().map(str::to_string))
            .map(|boc| SentTransfer::decode(&boc))
            .collect()
    }

    fn page(&self, request: &NodeRequest) -> Value {
        let transactions = self.transactions.lock();
        let limit = request
            .param("limit")
            .and_then(|limit| limit.parse().ok())
            .unwrap_or(transactions.len());
        let start = match (request.param("lt"), request.param("hash")) {
            (Some(lt), Some(hash)) => transactions
                .iter()
                .position(|tx| {
                    tx["transaction_id"]["lt"] == lt && tx["transaction_id"]["hash"] == hash
                })
                .unwrap_or(transactions.len()),
            _ => 0,
        };
        Value::Array(transactions.iter().skip(start).take(limit).cloned().collect())
    }
}

impl Default for MockNode {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl NodeTransport for MockNode {
    async fn request(&self, request: NodeRequest) -> WalletResult<Value> {
        let latency = *self.latency.lock();
        if !latency.is_zero() {
            tokio::time::sleep(latency).await;
        }
        self.requests.lock().push(request.clone());

        if *self.failing.lock() == Some(request.path) {
            return Ok(json!({ "ok": false, "error": "scripted failure" }));
        }

        let result = match request.path {
            PATH_WALLET_INFORMATION => self.account.lock().clone(),
            PATH_ESTIMATE_FEE => {
                let deploy = request
                    .body
                    .as_ref()
                    .and_then(|body| body.get("init_code"))
                    .map(|code| !code.is_null())
                    .unwrap_or(false);
                let fees = if deploy {
                    self.deploy_fees.lock().clone()
                } else {
                    self.fees.lock().clone()
                };
                json!({ "source_fees": fees, "destination_fees": [] })
            }
            PATH_SEND_BOC => json!({ "@type": "ok" }),
            PATH_TRANSACTIONS => self.page(&request),
            PATH_TOKEN_WALLET_ADDRESS => match self.token_wallet.lock().clone() {
                Some(address) => json!({ "address": address }),
                None => return Ok(json!({ "ok": false, "error": "no token wallet" })),
            },
            PATH_TOKEN_DATA => json!({ "balance": self.token_balance.lock().to_string() }),
            _ => return Ok(json!({ "ok": false, "error": "unknown method" })),
        };
        Ok(json!({ "ok": true, "result": result }))
    }
}

/// A submitted external message, decoded.
#[derive(Debug, Clone)]
pub struct SentTransfer {
    /// Deployment payload attached.
    pub deploy: bool,
    /// Sequence number in the signed payload.
    pub seqno: u32,
    /// Expiry in the signed payload.
    pub valid_until: u32,
    /// Outgoing messages with their send modes.
    pub messages: Vec<(u8, InternalMessage)>,
}

impl SentTransfer {
    /// Decode a base64 BOC produced by the wallet.
    pub fn decode(boc: &str) -> Self {
        let envelope = from_boc_base64(boc).expect("sent BOC decodes");
        let body = envelope
            .references()
            .last()
            .expect("envelope carries a body")
            .clone();
        let mut parser = body.parser();
        parser.skip_bits(512 + 32).expect("signature and wallet id");
        let valid_until = parser.load_u32(32).expect("valid_until");
        let seqno = parser.load_u32(32).expect("seqno");
        Self {
            deploy: envelope.references().len() > 1,
            seqno,
            valid_until,
            messages: parse_transfer_messages(&body).expect("transfer messages"),
        }
    }
}

/// A wallet account wired to a [`MockNode`].
pub struct TestWallet {
    /// The scripted node.
    pub node: Arc<MockNode>,
    /// Balance store.
    pub store: Arc<MemoryStore>,
    /// The account under test.
    pub wallet: WalletAccount,
}

impl TestWallet {
    /// Native-mode wallet created from the test seed.
    pub fn new(node: MockNode) -> Self {
        Self::with_config(node, test_config())
    }

    /// Wallet created from the test seed with `config`.
    pub fn with_config(node: MockNode, config: WalletConfig) -> Self {
        Self::with_store(node, config, Arc::new(MemoryStore::new()))
    }

    /// Wallet created from the test seed over an existing store.
    pub fn with_store(node: MockNode, config: WalletConfig, store: Arc<MemoryStore>) -> Self {
        let node = Arc::new(node);
        let wallet = WalletAccount::new(config, NodeClient::new(node.clone()), store.clone());
        wallet.create(&test_seed()).expect("wallet creates from the test seed");
        Self {
            node,
            store,
            wallet,
        }
    }
}

impl std::ops::Deref for TestWallet {
    type Target = WalletAccount;

    fn deref(&self) -> &Self::Target {
        &self.wallet
    }
}
