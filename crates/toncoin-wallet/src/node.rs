//! Upstream data source client.
//!
//! Every endpoint answers with an envelope `{ "ok": true, "result": ... }`.
//! Anything else, including transport failures and undecodable results,
//! becomes [`WalletError::Node`] carrying the raw payload. No retries happen
//! at this layer.

use crate::{WalletError, WalletResult};
use async_trait::async_trait;
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

/// Account state endpoint.
pub const PATH_WALLET_INFORMATION: &str = "api/v1/getWalletInformation";
/// Fee appraisal endpoint.
pub const PATH_ESTIMATE_FEE: &str = "api/v1/estimateFee";
/// Submission endpoint.
pub const PATH_SEND_BOC: &str = "api/v1/sendBoc";
/// History endpoint.
pub const PATH_TRANSACTIONS: &str = "api/v1/getTransactions";
/// Token subaccount lookup endpoint.
pub const PATH_TOKEN_WALLET_ADDRESS: &str = "api/v1/getJettonWalletAddress";
/// Token subaccount data endpoint.
pub const PATH_TOKEN_DATA: &str = "api/v1/getJettonData";

/// HTTP method of a node request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    /// Query-string request.
    Get,
    /// JSON body request.
    Post,
}

/// A single upstream request.
#[derive(Debug, Clone, PartialEq)]
pub struct NodeRequest {
    /// HTTP method.
    pub method: Method,
    /// Endpoint path relative to the node base URL.
    pub path: &'static str,
    /// Query parameters (GET).
    pub params: Vec<(&'static str, String)>,
    /// JSON body (POST).
    pub body: Option<Value>,
}

impl NodeRequest {
    /// Build a GET request.
    pub fn get(path: &'static str, params: Vec<(&'static str, String)>) -> Self {
        Self {
            method: Method::Get,
            path,
            params,
            body: None,
        }
    }

    /// Build a POST request.
    pub fn post(path: &'static str, body: Value) -> Self {
        Self {
            method: Method::Post,
            path,
            params: Vec::new(),
            body: Some(body),
        }
    }

    /// Value of a query parameter.
    pub fn param(&self, name: &str) -> Option<&str> {
        self.params
            .iter()
            .find(|(key, _)| *key == name)
            .map(|(_, value)| value.as_str())
    }
}

/// Transport that delivers requests to the upstream node.
#[async_trait]
pub trait NodeTransport: Send + Sync {
    /// Perform the request and return the decoded JSON response.
    async fn request(&self, request: NodeRequest) -> WalletResult<Value>;
}

/// reqwest-based transport.
pub struct HttpTransport {
    client: Client,
    base_url: String,
}

impl HttpTransport {
    /// Create a transport for `base_url`.
    pub fn new(base_url: &str, timeout: Duration) -> WalletResult<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| WalletError::Node(e.to_string()))?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }
}

#[async_trait]
impl NodeTransport for HttpTransport {
    async fn request(&self, request: NodeRequest) -> WalletResult<Value> {
        let url = format!("{}/{}", self.base_url, request.path);
        let builder = match request.method {
            Method::Get => self.client.get(&url).query(&request.params),
            Method::Post => self
                .client
                .post(&url)
                .json(&request.body.unwrap_or(Value::Null)),
        };

        let response = builder
            .send()
            .await
            .map_err(|e| WalletError::Node(e.to_string()))?;
        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|e| WalletError::Node(e.to_string()))?;

        debug!(url = %url, status = status.as_u16(), "Node response");
        serde_json::from_str(&text).map_err(|_| WalletError::Node(text))
    }
}

/// Decimal amounts arrive as strings or numbers.
fn de_amount<'de, D: Deserializer<'de>>(deserializer: D) -> Result<u128, D::Error> {
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Int(u64),
        Float(f64),
        Text(String),
    }
    match Option::<Raw>::deserialize(deserializer)? {
        None => Ok(0),
        Some(Raw::Int(value)) => Ok(value as u128),
        Some(Raw::Float(value)) if value >= 0.0 && value.fract() == 0.0 => Ok(value as u128),
        Some(Raw::Float(value)) => Err(serde::de::Error::custom(format!(
            "invalid amount {}",
            value
        ))),
        Some(Raw::Text(text)) if text.is_empty() => Ok(0),
        Some(Raw::Text(text)) => text.parse().map_err(serde::de::Error::custom),
    }
}

/// Account state as reported by the node.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WalletInformation {
    /// Native balance.
    #[serde(default, deserialize_with = "de_amount")]
    pub balance: u128,
    /// `active`, `uninitialized` or `frozen`.
    #[serde(default)]
    pub account_state: String,
    /// Wallet sequence number, absent before deployment.
    #[serde(default)]
    pub seqno: Option<u32>,
}

/// Fee components returned by the appraisal endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeeComponents {
    /// Storage phase fee.
    #[serde(default, deserialize_with = "de_amount")]
    pub storage_fee: u128,
    /// Inbound external message forward fee.
    #[serde(default, deserialize_with = "de_amount")]
    pub in_fwd_fee: u128,
    /// Outbound forward fee.
    #[serde(default, deserialize_with = "de_amount")]
    pub fwd_fee: u128,
    /// Compute phase fee.
    #[serde(default, deserialize_with = "de_amount")]
    pub gas_fee: u128,
}

impl FeeComponents {
    /// Sum of all components.
    pub fn total(&self) -> u128 {
        self.storage_fee
            .saturating_add(self.in_fwd_fee)
            .saturating_add(self.fwd_fee)
            .saturating_add(self.gas_fee)
    }
}

#[derive(Debug, Deserialize)]
struct EstimateFeeResult {
    source_fees: FeeComponents,
}

/// Pagination cursor identifying the oldest record of a page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Cursor {
    /// Logical time.
    pub lt: String,
    /// Transaction hash (base64).
    pub hash: String,
}

/// Message payload as delivered by the node.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageData {
    /// Base64 BOC of the message body.
    #[serde(default)]
    pub body: Option<String>,
}

/// A message inside a raw transaction.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawMessage {
    /// Sender, empty for external messages.
    #[serde(default)]
    pub source: String,
    /// Recipient.
    #[serde(default)]
    pub destination: String,
    /// Attached native value.
    #[serde(default, deserialize_with = "de_amount")]
    pub value: u128,
    /// Decoded text comment, if any.
    #[serde(default)]
    pub message: Option<String>,
    /// Raw body.
    #[serde(default)]
    pub msg_data: Option<MessageData>,
    /// Marks the platform-fee sub-message.
    #[serde(default)]
    pub csfee: bool,
}

/// Transaction identifier.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionId {
    /// Logical time.
    pub lt: String,
    /// Hash (base64).
    pub hash: String,
}

/// A transaction as returned by the history endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawTransaction {
    /// Identifier.
    pub transaction_id: TransactionId,
    /// Unix time.
    #[serde(default)]
    pub utime: u64,
    /// Total fee paid by the account.
    #[serde(default, deserialize_with = "de_amount")]
    pub fee: u128,
    /// Inbound message.
    #[serde(default)]
    pub in_msg: Option<RawMessage>,
    /// Outbound messages.
    #[serde(default)]
    pub out_msgs: Vec<RawMessage>,
}

impl RawTransaction {
    /// Cursor pointing at this transaction.
    pub fn cursor(&self) -> Cursor {
        Cursor {
            lt: self.transaction_id.lt.clone(),
            hash: self.transaction_id.hash.clone(),
        }
    }
}

/// Token subaccount data.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenWalletData {
    /// Token balance.
    #[serde(default, deserialize_with = "de_amount")]
    pub balance: u128,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum AddressResult {
    Text(String),
    Object { address: String },
}

/// Deployment payload for fee appraisal (base64 BOCs).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InitPayload {
    /// Contract code.
    pub code: String,
    /// Contract data.
    pub data: String,
}

/// Typed client over a [`NodeTransport`].
#[derive(Clone)]
pub struct NodeClient {
    transport: Arc<dyn NodeTransport>,
}

impl NodeClient {
    /// Wrap a transport.
    pub fn new(transport: Arc<dyn NodeTransport>) -> Self {
        Self { transport }
    }

    async fn call<T: DeserializeOwned>(&self, request: NodeRequest) -> WalletResult<T> {
        let path = request.path;
        let data = self.transport.request(request).await?;
        if data.get("ok") != Some(&Value::Bool(true)) {
            return Err(WalletError::Node(format!("Invalid response \"{}\"", data)));
        }
        let result = data.get("result").cloned().unwrap_or(Value::Null);
        serde_json::from_value(result).map_err(|e| {
            WalletError::Node(format!("{}: {} in \"{}\"", path, e, data))
        })
    }

    /// Fetch account state.
    pub async fn get_wallet_information(&self, address: &str) -> WalletResult<WalletInformation> {
        self.call(NodeRequest::get(
            PATH_WALLET_INFORMATION,
            vec![("address", address.to_string())],
        ))
        .await
    }

    /// Appraise the fee of an external message body.
    pub async fn estimate_fee(
        &self,
        address: &str,
        body: &str,
        init: Option<&InitPayload>,
    ) -> WalletResult<FeeComponents> {
        let result: EstimateFeeResult = self
            .call(NodeRequest::post(
                PATH_ESTIMATE_FEE,
                json!({
                    "address": address,
                    "body": body,
                    "init_code": init.map(|i| i.code.as_str()),
                    "init_data": init.map(|i| i.data.as_str()),
                    "ignore_chksig": true,
                }),
            ))
            .await?;
        Ok(result.source_fees)
    }

    /// Submit a serialized external message.
    pub async fn send_boc(&self, boc: &str) -> WalletResult<()> {
        let _: Value = self
            .call(NodeRequest::post(PATH_SEND_BOC, json!({ "boc": boc })))
            .await?;
        Ok(())
    }

    /// Fetch up to `limit` transactions, newest first, starting at `cursor`.
    pub async fn get_transactions(
        &self,
        address: &str,
        cursor: Option<&Cursor>,
        limit: usize,
    ) -> WalletResult<Vec<RawTransaction>> {
        let mut params = vec![("address", address.to_string())];
        if let Some(cursor) = cursor {
            params.push(("lt", cursor.lt.clone()));
            params.push(("hash", cursor.hash.clone()));
        }
        params.push(("limit", limit.to_string()));
        self.call(NodeRequest::get(PATH_TRANSACTIONS, params)).await
    }

    /// Look up the token subaccount of `owner` for token contract `token`.
    pub async fn get_token_wallet_address(&self, owner: &str, token: &str) -> WalletResult<String> {
        let result: AddressResult = self
            .call(NodeRequest::get(
                PATH_TOKEN_WALLET_ADDRESS,
                vec![("address", owner.to_string()), ("jetton", token.to_string())],
            ))
            .await?;
        Ok(match result {
            AddressResult::Text(address) => address,
            AddressResult::Object { address } => address,
        })
    }

    /// Fetch token subaccount data.
    pub async fn get_token_data(&self, address: &str) -> WalletResult<TokenWalletData> {
        self.call(NodeRequest::get(
            PATH_TOKEN_DATA,
            vec![("address", address.to_string())],
        ))
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;

    struct Canned {
        response: Value,
        seen: Mutex<Vec<NodeRequest>>,
    }

    #[async_trait]
    impl NodeTransport for Canned {
        async fn request(&self, request: NodeRequest) -> WalletResult<Value> {
            self.seen.lock().push(request);
            Ok(self.response.clone())
        }
    }

    fn canned(response: Value) -> (NodeClient, Arc<Canned>) {
        let transport = Arc::new(Canned {
            response,
            seen: Mutex::new(Vec::new()),
        });
        (NodeClient::new(transport.clone()), transport)
    }

    #[tokio::test]
    async fn test_wallet_information() {
        let (client, _) = canned(json!({
            "ok": true,
            "result": {
                "wallet": true,
                "balance": "4936421995",
                "account_state": "active",
                "seqno": 12
            }
        }));
        let info = client.get_wallet_information("addr").await.unwrap();
        assert_eq!(info.balance, 4_936_421_995);
        assert_eq!(info.seqno, Some(12));
        assert_eq!(info.account_state, "active");
    }

    #[tokio::test]
    async fn test_envelope_failure_carries_payload() {
        let (client, _) = canned(json!({ "ok": false, "error": "rate limit" }));
        let err = client.get_wallet_information("addr").await.unwrap_err();
        match err {
            WalletError::Node(message) => assert!(message.contains("rate limit")),
            other => panic!("unexpected error {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_estimate_fee_request() {
        let (client, transport) = canned(json!({
            "ok": true,
            "result": {
                "source_fees": {
                    "in_fwd_fee": 1,
                    "storage_fee": 2,
                    "gas_fee": 3,
                    "fwd_fee": 4
                },
                "destination_fees": []
            }
        }));
        let fees = client.estimate_fee("addr", "body", None).await.unwrap();
        assert_eq!(fees.total(), 10);

        let seen = transport.seen.lock();
        let body = seen[0].body.as_ref().unwrap();
        assert_eq!(body["ignore_chksig"], Value::Bool(true));
        assert_eq!(body["init_code"], Value::Null);
    }

    #[tokio::test]
    async fn test_transactions_cursor_params() {
        let (client, transport) = canned(json!({ "ok": true, "result": [] }));
        let cursor = Cursor {
            lt: "100".to_string(),
            hash: "h".to_string(),
        };
        let txs = client.get_transactions("addr", Some(&cursor), 11).await.unwrap();
        assert!(txs.is_empty());

        let seen = transport.seen.lock();
        assert_eq!(seen[0].param("lt"), Some("100"));
        assert_eq!(seen[0].param("limit"), Some("11"));
    }

    #[tokio::test]
    async fn test_token_wallet_address_shapes() {
        let (client, _) = canned(json!({ "ok": true, "result": "EQabc" }));
        assert_eq!(client.get_token_wallet_address("o", "t").await.unwrap(), "EQabc");

        let (client, _) = canned(json!({ "ok": true, "result": { "address": "EQdef" } }));
        assert_eq!(client.get_token_wallet_address("o", "t").await.unwrap(), "EQdef");
    }
}
