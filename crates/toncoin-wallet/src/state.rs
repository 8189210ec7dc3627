//! Account state client.
//!
//! Wraps the node client with session-scoped memoization so overlapping
//! callers asking for the same account observe one upstream round trip.

use crate::cache::MemoCache;
use crate::node::NodeClient;
use crate::WalletResult;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

/// Account state value reported for undeployed wallets.
const STATE_UNINITIALIZED: &str = "uninitialized";

/// On-chain state of the wallet account.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountState {
    /// Next sequence number expected by the contract.
    pub sequence_number: u32,
    /// Contract code is deployed.
    pub initialized: bool,
    /// Native balance.
    pub balance: u128,
}

/// Fetches account and token state from the upstream node.
pub struct AccountStateClient {
    node: NodeClient,
    account_state: MemoCache<AccountState>,
    token_subaccount: MemoCache<String>,
}

impl AccountStateClient {
    /// Create a client over `node`.
    pub fn new(node: NodeClient) -> Self {
        Self {
            node,
            account_state: MemoCache::new("getWalletInformation"),
            token_subaccount: MemoCache::new("getJettonWalletAddress"),
        }
    }

    /// Underlying node client.
    pub fn node(&self) -> &NodeClient {
        &self.node
    }

    /// Account state for `address`. Memoized per address.
    pub async fn get_account_state(&self, address: &str) -> WalletResult<AccountState> {
        self.account_state
            .get_or_try_init(address, || async {
                let info = self.node.get_wallet_information(address).await?;
                let state = AccountState {
                    sequence_number: info.seqno.unwrap_or(0),
                    initialized: info.account_state != STATE_UNINITIALIZED,
                    balance: info.balance,
                };
                debug!(
                    address,
                    seqno = state.sequence_number,
                    initialized = state.initialized,
                    balance = %state.balance,
                    "Fetched account state"
                );
                Ok(state)
            })
            .await
    }

    /// Token subaccount of `owner` for `token`. Memoized per pair.
    pub async fn get_token_subaccount_address(&self, owner: &str, token: &str) -> WalletResult<String> {
        self.token_subaccount
            .get_or_try_init(&(owner, token), || async {
                let address = self.node.get_token_wallet_address(owner, token).await?;
                debug!(owner, token, subaccount = %address, "Resolved token subaccount");
                Ok(address)
            })
            .await
    }

    /// Current token balance of a subaccount.
    pub async fn get_token_balance(&self, subaccount: &str) -> WalletResult<u128> {
        let data = self.node.get_token_data(subaccount).await?;
        Ok(data.balance)
    }

    /// Evict the memoized state of `address`.
    pub fn invalidate_account_state(&self, address: &str) -> WalletResult<()> {
        self.account_state.invalidate(address)
    }

    /// Drop all memoized results.
    pub fn clear(&self) {
        self.account_state.clear();
        self.token_subaccount.clear();
        info!("Cleared account state caches");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::node::{NodeRequest, NodeTransport, PATH_WALLET_INFORMATION};
    use async_trait::async_trait;
    use serde_json::{json, Value};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    struct Counting {
        calls: AtomicUsize,
        state: &'static str,
    }

    #[async_trait]
    impl NodeTransport for Counting {
        async fn request(&self, request: NodeRequest) -> WalletResult<Value> {
            assert_eq!(request.path, PATH_WALLET_INFORMATION);
            self.calls.fetch_add(1, Ordering::SeqCst);
            tokio::time::sleep(std::time::Duration::from_millis(10)).await;
            Ok(json!({
                "ok": true,
                "result": { "balance": "5", "account_state": self.state, "seqno": 3 }
            }))
        }
    }

    fn client(state: &'static str) -> (Arc<AccountStateClient>, Arc<Counting>) {
        let transport = Arc::new(Counting {
            calls: AtomicUsize::new(0),
            state,
        });
        let node = NodeClient::new(transport.clone());
        (Arc::new(AccountStateClient::new(node)), transport)
    }

    #[tokio::test]
    async fn test_concurrent_state_fetch_dedup() {
        let (client, transport) = client("active");
        let (a, b) = tokio::join!(
            client.get_account_state("addr"),
            client.get_account_state("addr")
        );
        assert_eq!(a.unwrap(), b.unwrap());
        assert_eq!(transport.calls.load(Ordering::SeqCst), 1);

        client.get_account_state("other").await.unwrap();
        assert_eq!(transport.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_uninitialized_flag() {
        let (client, _) = client("uninitialized");
        let state = client.get_account_state("addr").await.unwrap();
        assert!(!state.initialized);
        assert_eq!(state.balance, 5);
    }

    #[tokio::test]
    async fn test_invalidate_refetches() {
        let (client, transport) = client("active");
        client.get_account_state("addr").await.unwrap();
        client.invalidate_account_state("addr").unwrap();
        client.get_account_state("addr").await.unwrap();
        assert_eq!(transport.calls.load(Ordering::SeqCst), 2);

        client.clear();
        client.get_account_state("addr").await.unwrap();
        assert_eq!(transport.calls.load(Ordering::SeqCst), 3);
    }
}
