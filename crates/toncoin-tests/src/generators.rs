//! Test data generators for integration tests.
//!
//! Provides seeds, configurations, addresses and raw history records in the
//! shape the node returns them.

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use serde_json::{json, Value};
use std::sync::Arc;
use toncoin_wallet::cell::{coins, comment_cell, to_boc_base64};
use toncoin_wallet::contract::InternalMessage;
use toncoin_wallet::jetton::OP_INTERNAL_TRANSFER;
use toncoin_wallet::{address_from_parts, AddressExt, Cell, CellBuilder, TonAddress, WalletConfig};

/// Seed used by every test wallet.
pub const TEST_SEED: &str = "2b48a48a752f6c49772bf97205660411cd2163fe6ce2de19537e9c94d3648c85c0d7f405660c20253115aaf1799b1c41cdd62b4cfbb6845bc9475495fc64b874";

/// A mainnet recipient in non-bounceable form.
pub const RECIPIENT: &str = "UQBj8pDDn0TAuiZ_EI4npXVtNJTUrdAtRpit6UPiy0cnWnMj";

/// The same recipient in bounceable form.
pub const RECIPIENT_BOUNCEABLE: &str = "EQBj8pDDn0TAuiZ_EI4npXVtNJTUrdAtRpit6UPiy0cnWi7m";

/// Token master contract used by token-mode tests.
pub const TOKEN_MASTER: &str = "EQCxE6mUtQJKFnGfaROTKOt1lZbDiiX1kCixRv7Nw2Id_sDs";

/// Seed bytes.
pub fn test_seed() -> Vec<u8> {
    hex::decode(TEST_SEED).expect("seed hex")
}

/// Mainnet address of the [`TEST_SEED`] wallet (non-bounceable).
pub const TEST_ADDRESS: &str = "UQBa1jalGfCwrast5gg_PB-U2cdCHg2mPy2gUO-_4u_vuboO";

/// Native-mode mainnet configuration.
pub fn test_config() -> WalletConfig {
    WalletConfig::default()
}

/// Token-mode configuration for [`TOKEN_MASTER`].
pub fn token_config() -> WalletConfig {
    WalletConfig::token(TOKEN_MASTER, 6)
}

/// Deterministic basechain address.
pub fn test_address(seed: u8) -> TonAddress {
    let mut hash = [seed; 32];
    hash[0] = 0xAD;
    hash[31] = seed.wrapping_mul(7);
    address_from_parts(0, hash)
}

/// Fee components summing to 139,335,372.
pub fn scenario_fees() -> Value {
    json!({
        "in_fwd_fee": 1_000_000,
        "storage_fee": 335_372,
        "gas_fee": 130_000_000,
        "fwd_fee": 8_000_000,
    })
}

/// Fee components for a deploying transfer, higher than [`scenario_fees`].
pub fn deploy_fees() -> Value {
    json!({
        "in_fwd_fee": 10_000_000,
        "storage_fee": 335_372,
        "gas_fee": 160_000_000,
        "fwd_fee": 8_000_000,
    })
}

/// Base64 transaction hash for `lt`.
pub fn tx_hash(lt: u64) -> String {
    let mut bytes = [0u8; 32];
    bytes[0] = 0xAA;
    bytes[24..].copy_from_slice(&lt.to_be_bytes());
    STANDARD.encode(bytes)
}

/// Raw transaction record.
pub fn raw_tx(lt: u64, fee: u128, in_msg: Value, out_msgs: Vec<Value>) -> Value {
    json!({
        "transaction_id": { "lt": lt.to_string(), "hash": tx_hash(lt) },
        "utime": 1_700_000_000 + lt,
        "fee": fee.to_string(),
        "in_msg": in_msg,
        "out_msgs": out_msgs,
    })
}

/// External inbound message, as seen on outgoing transfers.
pub fn external_in() -> Value {
    json!({ "source": "", "destination": "", "value": "0" })
}

/// Incoming native transfer.
pub fn incoming_tx(lt: u64, source: &str, value: u128, memo: Option<&str>) -> Value {
    raw_tx(
        lt,
        1_000,
        json!({
            "source": source,
            "destination": "",
            "value": value.to_string(),
            "message": memo.unwrap_or_default(),
        }),
        Vec::new(),
    )
}

/// Outgoing native transfer.
pub fn outgoing_tx(lt: u64, destination: &str, value: u128, fee: u128) -> Value {
    raw_tx(
        lt,
        fee,
        external_in(),
        vec![json!({
            "source": "",
            "destination": destination,
            "value": value.to_string(),
        })],
    )
}

/// Outgoing transfer carrying `message` as the node would report it.
pub fn outgoing_message_tx(lt: u64, message: &InternalMessage, fee: u128) -> Value {
    let mut out = json!({
        "source": "",
        "destination": message.destination.to_friendly(true, false),
        "value": message.value.to_string(),
    });
    if let Some(body) = &message.body {
        out["msg_data"] = json!({ "body": to_boc_base64(body).expect("body BOC") });
    }
    raw_tx(lt, fee, external_in(), vec![out])
}

/// Token subaccount transaction whose inbound body is `body`.
pub fn token_tx(lt: u64, fee: u128, body: &Cell) -> Value {
    raw_tx(
        lt,
        fee,
        json!({
            "source": test_address(0x70).to_friendly(true, false),
            "destination": "",
            "value": "50000000",
            "msg_data": { "body": to_boc_base64(body).expect("body BOC") },
        }),
        Vec::new(),
    )
}

/// `internal_transfer` body crediting `amount` from `from`.
pub fn internal_transfer_body(amount: u128, from: &TonAddress, memo: Option<&str>) -> Cell {
    let mut builder = CellBuilder::new();
    builder
        .store_u32(32, OP_INTERNAL_TRANSFER)
        .and_then(|b| b.store_u64(64, 0))
        .and_then(|b| b.store_coins(&coins(amount)))
        .and_then(|b| b.store_address(from))
        .and_then(|b| b.store_address(from))
        .and_then(|b| b.store_coins(&coins(1)))
        .expect("internal transfer fits");
    match memo {
        Some(memo) => {
            let payload = Arc::new(comment_cell(memo).expect("comment"));
            builder
                .store_bit(true)
                .and_then(|b| b.store_reference(&payload))
                .expect("payload ref");
        }
        None => {
            builder.store_bit(false).expect("payload bit");
        }
    }
    builder.build().expect("internal transfer cell")
}

/// `count` incoming transfers, newest first.
pub fn history(count: u64) -> Vec<Value> {
    (0..count)
        .map(|i| {
            let lt = 1_000 + (count - i) * 10;
            incoming_tx(lt, &test_address(i as u8).to_friendly(true, false), 1_000_000 + i as u128, None)
        })
        .collect()
}
