//! Transaction history pagination and classification.
//!
//! Pages are fetched newest first. A cursor names the oldest transaction of
//! the previous page; the node returns it again as the first entry of the
//! next page, so a cursor request asks for one extra record and drops it.

use crate::address::AddressExt;
use crate::cell::{from_boc_base64, parse_comment, ArcCell};
use crate::jetton::{decode_envelope, TokenOp};
use crate::node::{Cursor, NodeClient, RawMessage, RawTransaction};
use crate::WalletResult;
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Which asset the history is read for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HistoryMode {
    /// Wallet transactions in native coin.
    Native,
    /// Token subaccount transactions.
    Token,
}

/// Transfer direction relative to the wallet.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    /// Received.
    Incoming,
    /// Sent.
    Outgoing,
}

/// Kind of transfer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransactionAction {
    /// Plain value transfer.
    Transfer,
    /// Native leg of a token transfer.
    TokenTransfer,
}

/// Record status. History only contains confirmed transactions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransactionStatus {
    /// Included on-chain.
    Confirmed,
}

/// A classified history entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionRecord {
    /// Transaction hash (base64).
    pub id: String,
    /// The other side of the transfer.
    pub counterparty: Option<String>,
    /// Transferred amount in base units of the asset.
    pub amount: u128,
    /// Native fee paid by the wallet.
    pub fee: u128,
    /// Direction.
    pub direction: Direction,
    /// Transfer kind.
    pub action: TransactionAction,
    /// Unix time.
    pub timestamp: u64,
    /// Text comment.
    pub memo: Option<String>,
    /// Always confirmed.
    pub status: TransactionStatus,
    /// Explorer link.
    pub url: String,
}

/// One page of history.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HistoryPage {
    /// Classified records, newest first.
    pub records: Vec<TransactionRecord>,
    /// Cursor for the next page (last raw record, before filtering).
    pub next_cursor: Option<Cursor>,
    /// More records are likely available.
    pub has_more: bool,
}

/// Explorer link for a transaction.
pub fn transaction_url(id: &str, development: bool) -> String {
    if development {
        format!("https://testnet.tonscan.org/tx/{}", id)
    } else {
        format!("https://tonscan.org/tx/{}", id)
    }
}

/// Explorer link for a token contract.
pub fn token_url(token: &str, development: bool) -> String {
    if development {
        format!("https://testnet.tonscan.org/jetton/{}", token)
    } else {
        format!("https://tonscan.org/jetton/{}", token)
    }
}

fn message_body(message: &RawMessage) -> Option<ArcCell> {
    let body = message.msg_data.as_ref()?.body.as_deref()?;
    from_boc_base64(body).ok()
}

fn message_memo(message: &RawMessage) -> Option<String> {
    if let Some(text) = message.message.as_ref().filter(|text| !text.is_empty()) {
        return Some(text.clone());
    }
    let body = message_body(message)?;
    parse_comment(&body)
}

/// Reads and classifies transaction history.
pub struct TransactionHistoryReader {
    node: NodeClient,
    development: bool,
}

impl TransactionHistoryReader {
    /// Reader over `node`. `development` selects testnet renderings.
    pub fn new(node: NodeClient, development: bool) -> Self {
        Self { node, development }
    }

    /// Load one page of history for `address`.
    pub async fn load_page(
        &self,
        address: &str,
        cursor: Option<&Cursor>,
        page_size: usize,
        mode: HistoryMode,
    ) -> WalletResult<HistoryPage> {
        let limit = if cursor.is_some() {
            page_size + 1
        } else {
            page_size
        };
        let mut raw = self.node.get_transactions(address, cursor, limit).await?;
        if cursor.is_some() && !raw.is_empty() {
            raw.remove(0);
        }

        let has_more = raw.len() >= page_size;
        let next_cursor = raw.last().map(RawTransaction::cursor);
        let records: Vec<TransactionRecord> =
            raw.iter().filter_map(|tx| self.classify(tx, mode)).collect();

        debug!(
            address,
            fetched = raw.len(),
            records = records.len(),
            has_more,
            "Loaded history page"
        );

        Ok(HistoryPage {
            records,
            next_cursor,
            has_more,
        })
    }

    /// Classify a raw transaction. Unrecognised token envelopes yield `None`.
    pub fn classify(&self, tx: &RawTransaction, mode: HistoryMode) -> Option<TransactionRecord> {
        match mode {
            HistoryMode::Native => Some(self.classify_native(tx)),
            HistoryMode::Token => self.classify_token(tx),
        }
    }

    #[allow(clippy::too_many_arguments)]
    fn record(
        &self,
        tx: &RawTransaction,
        direction: Direction,
        action: TransactionAction,
        counterparty: Option<String>,
        amount: u128,
        fee: u128,
        memo: Option<String>,
    ) -> TransactionRecord {
        let id = tx.transaction_id.hash.clone();
        TransactionRecord {
            url: transaction_url(&id, self.development),
            id,
            counterparty,
            amount,
            fee,
            direction,
            action,
            timestamp: tx.utime,
            memo,
            status: TransactionStatus::Confirmed,
        }
    }

    fn classify_native(&self, tx: &RawTransaction) -> TransactionRecord {
        if let Some(inbound) = tx.in_msg.as_ref().filter(|m| !m.source.is_empty()) {
            return self.record(
                tx,
                Direction::Incoming,
                TransactionAction::Transfer,
                Some(inbound.source.clone()),
                inbound.value,
                tx.fee,
                message_memo(inbound),
            );
        }

        let platform_fee = tx
            .out_msgs
            .get(1)
            .filter(|m| m.csfee)
            .map(|m| m.value)
            .unwrap_or(0);
        let fee = tx.fee.saturating_add(platform_fee);

        match tx.out_msgs.first() {
            Some(outbound) => {
                let is_token = message_body(outbound)
                    .and_then(|body| decode_envelope(&body))
                    .map(|envelope| envelope.op == TokenOp::Transfer)
                    .unwrap_or(false);
                let action = if is_token {
                    TransactionAction::TokenTransfer
                } else {
                    TransactionAction::Transfer
                };
                let memo = if is_token {
                    None
                } else {
                    message_memo(outbound)
                };
                self.record(
                    tx,
                    Direction::Outgoing,
                    action,
                    Some(outbound.destination.clone()).filter(|d| !d.is_empty()),
                    outbound.value,
                    fee,
                    memo,
                )
            }
            None => self.record(
                tx,
                Direction::Outgoing,
                TransactionAction::Transfer,
                None,
                0,
                fee,
                None,
            ),
        }
    }

    fn classify_token(&self, tx: &RawTransaction) -> Option<TransactionRecord> {
        let inbound = tx.in_msg.as_ref()?;
        let body = message_body(inbound)?;
        let envelope = decode_envelope(&body)?;
        let counterparty = envelope
            .counterparty
            .map(|address| address.to_friendly(false, self.development));
        let (direction, fee) = match envelope.op {
            TokenOp::Transfer => (Direction::Outgoing, tx.fee),
            TokenOp::InternalTransfer => (Direction::Incoming, 0),
        };
        Some(self.record(
            tx,
            direction,
            TransactionAction::Transfer,
            counterparty,
            envelope.amount,
            fee,
            envelope.memo,
        ))
    }
}
