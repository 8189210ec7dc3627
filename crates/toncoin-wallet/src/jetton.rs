//! Token (jetton) transfer envelopes.
//!
//! Token balances live in a per-owner subaccount contract. Outgoing token
//! transfers are `transfer` requests to that subaccount; incoming ones arrive
//! as `internal_transfer` from the sender's subaccount.

use crate::address::TonAddress;
use crate::cell::{coins, coins_to_u128, comment_cell, parse_comment, parse_comment_at, Cell};
use crate::cell::{CellBuilder, CellParser};
use crate::WalletResult;
use std::sync::Arc;

/// `transfer` opcode.
pub const OP_TRANSFER: u32 = 0x0f8a_7ea5;

/// `internal_transfer` opcode.
pub const OP_INTERNAL_TRANSFER: u32 = 0x178d_4519;

/// Parameters of an outgoing token transfer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenTransfer {
    /// Token amount in base units.
    pub amount: u128,
    /// Recipient owner address.
    pub destination: TonAddress,
    /// Where excess native value is returned.
    pub response_destination: TonAddress,
    /// Native value forwarded with the notification.
    pub forward_amount: u128,
    /// Optional comment carried as the forward payload.
    pub memo: Option<String>,
}

impl TokenTransfer {
    /// Encode the `transfer` body. `query_id` is always 0.
    pub fn to_cell(&self) -> WalletResult<Cell> {
        let mut builder = CellBuilder::new();
        builder
            .store_u32(32, OP_TRANSFER)?
            .store_u64(64, 0)?
            .store_coins(&coins(self.amount))?
            .store_address(&self.destination)?
            .store_address(&self.response_destination)?
            .store_bit(false)? // no custom payload
            .store_coins(&coins(self.forward_amount))?;
        match &self.memo {
            Some(memo) => {
                let payload = Arc::new(comment_cell(memo)?);
                builder.store_bit(true)?.store_reference(&payload)?;
            }
            None => {
                builder.store_bit(false)?;
            }
        }
        Ok(builder.build()?)
    }
}

/// Kind of a recognised token envelope.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenOp {
    /// Outgoing request from the owner.
    Transfer,
    /// Incoming credit from another subaccount.
    InternalTransfer,
}

/// A decoded token envelope.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenEnvelope {
    /// Operation.
    pub op: TokenOp,
    /// Token amount.
    pub amount: u128,
    /// Recipient for `Transfer`, sender for `InternalTransfer`.
    pub counterparty: Option<TonAddress>,
    /// Comment from the forward payload.
    pub memo: Option<String>,
}

/// Decode a token envelope. Unrecognised opcodes and malformed bodies yield `None`.
pub fn decode_envelope(body: &Cell) -> Option<TokenEnvelope> {
    let mut parser = body.parser();
    let op = match parser.load_u32(32).ok()? {
        OP_TRANSFER => TokenOp::Transfer,
        OP_INTERNAL_TRANSFER => TokenOp::InternalTransfer,
        _ => return None,
    };
    let _query_id = parser.load_u64(64).ok()?;
    let amount = coins_to_u128(&parser.load_coins().ok()?).ok()?;

    let mut next_ref = 0;
    let counterparty = parser.load_address().ok()?;
    let _response = parser.load_address().ok()?;
    if op == TokenOp::Transfer && parser.load_bit().ok()? {
        // custom payload
        next_ref += 1;
    }

    let _forward_amount = parser.load_coins().ok()?;
    let memo = forward_comment(body, &mut parser, next_ref);

    Some(TokenEnvelope {
        op,
        amount,
        counterparty: (counterparty != TonAddress::NULL).then_some(counterparty),
        memo,
    })
}

/// Read `Either Cell ^Cell` and decode it as a comment.
fn forward_comment(body: &Cell, parser: &mut CellParser, next_ref: usize) -> Option<String> {
    let remaining = parser.remaining_bits();
    if remaining == 0 {
        return None;
    }
    if parser.load_bit().ok()? {
        let payload = body.references().get(next_ref)?;
        parse_comment(payload)
    } else {
        parse_comment_at(body, parser, next_ref)
    }
}
