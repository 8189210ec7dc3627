//! Wallet contract (v4R2) and message envelopes.
//!
//! The wallet account is a v4R2 smart contract whose address is the hash of
//! its state-init (code + data); contract code, address derivation and the
//! external envelope come from `tonlib_core`. Outgoing transfers are external
//! messages to the wallet itself carrying a signed list of internal messages.

use crate::address::TonAddress;
use crate::cell::{coins, coins_to_u128, ArcCell, Cell, CellBuilder, CellParser};
use crate::{WalletError, WalletResult};
use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use std::sync::Arc;
use tonlib_core::mnemonic::KeyPair as ContractKey;
use tonlib_core::wallet::{TonWallet, WalletVersion};

/// Pay fees separately and ignore action-phase errors.
pub const SEND_MODE: u8 = 3;

/// Length of an ed25519 signature.
pub const SIGNATURE_LEN: usize = 64;

/// Most internal messages a v4 transfer can carry.
pub const MAX_MESSAGES: usize = 4;

/// Simple send operation in the v4 signing payload.
const OP_SIMPLE_SEND: u8 = 0;

fn contract_error(e: impl std::fmt::Display) -> WalletError {
    WalletError::Contract(e.to_string())
}

/// Code and data deployed with the first outgoing transfer.
#[derive(Debug, Clone, PartialEq)]
pub struct StateInit {
    /// Contract code.
    pub code: ArcCell,
    /// Initial contract data.
    pub data: ArcCell,
}

/// An outgoing internal message. Bounce is never requested.
#[derive(Debug, Clone, PartialEq)]
pub struct InternalMessage {
    /// Recipient.
    pub destination: TonAddress,
    /// Attached native value.
    pub value: u128,
    /// Optional payload.
    pub body: Option<ArcCell>,
}

impl InternalMessage {
    /// Create a non-bounceable message.
    pub fn new(destination: TonAddress, value: u128, body: Option<Cell>) -> Self {
        Self {
            destination,
            value,
            body: body.map(Arc::new),
        }
    }

    /// Encode as a `Message` cell.
    pub fn to_cell(&self) -> WalletResult<Cell> {
        let mut builder = CellBuilder::new();
        builder
            .store_bit(false)? // int_msg_info$0
            .store_bit(true)? // ihr_disabled
            .store_bit(false)? // bounce
            .store_bit(false)? // bounced
            .store_u8(2, 0)? // addr_none
            .store_address(&self.destination)?
            .store_coins(&coins(self.value))?
            .store_bit(false)? // no extra currencies
            .store_coins(&coins(0))? // ihr_fee
            .store_coins(&coins(0))? // fwd_fee
            .store_u64(64, 0)? // created_lt
            .store_u32(32, 0)? // created_at
            .store_bit(false)?; // no state-init
        match &self.body {
            Some(body) => {
                builder.store_bit(true)?.store_reference(body)?;
            }
            None => {
                builder.store_bit(false)?;
            }
        }
        Ok(builder.build()?)
    }

    /// Decode an internal message cell built by [`InternalMessage::to_cell`].
    pub fn from_cell(cell: &Cell) -> WalletResult<Self> {
        let invalid = |what: &str| WalletError::Cell(format!("internal message: {}", what));
        let mut parser = cell.parser();
        if parser.load_bit()? {
            return Err(invalid("external message info"));
        }
        parser.skip_bits(3)?;
        skip_source(&mut parser)?;
        let destination = parser.load_address()?;
        let value = coins_to_u128(&parser.load_coins()?)?;

        let mut next_ref = 0;
        if parser.load_bit()? {
            next_ref += 1;
        }
        parser.load_coins()?;
        parser.load_coins()?;
        parser.skip_bits(64 + 32)?;
        if parser.load_bit()? {
            if !parser.load_bit()? {
                return Err(invalid("inline state-init"));
            }
            next_ref += 1;
        }
        let body = if parser.load_bit()? {
            let body = cell
                .references()
                .get(next_ref)
                .cloned()
                .ok_or_else(|| invalid("missing body reference"))?;
            Some(body)
        } else {
            None
        };
        Ok(Self {
            destination,
            value,
            body,
        })
    }
}

/// Skip a `MsgAddressInt` that may be `addr_none`.
fn skip_source(parser: &mut CellParser) -> WalletResult<()> {
    match parser.load_u8(2)? {
        0 => Ok(()),
        2 => {
            parser.skip_bits(1 + 8 + 256)?;
            Ok(())
        }
        tag => Err(WalletError::Cell(format!("unsupported source address tag {}", tag))),
    }
}

/// A v4R2 wallet bound to one public key on the basechain.
pub struct WalletContract {
    wallet: TonWallet,
    public_key: [u8; 32],
}

impl WalletContract {
    /// Derive the contract for `public_key`.
    pub fn new(public_key: [u8; 32]) -> WalletResult<Self> {
        // Only the public half is needed to derive the address.
        let key = ContractKey {
            public_key: public_key.to_vec(),
            secret_key: Vec::new(),
        };
        let wallet = TonWallet::derive_default(WalletVersion::V4R2, &key).map_err(contract_error)?;
        Ok(Self { wallet, public_key })
    }

    /// Contract address.
    pub fn address(&self) -> &TonAddress {
        &self.wallet.address
    }

    /// Owner public key.
    pub fn public_key(&self) -> &[u8; 32] {
        &self.public_key
    }

    /// Deployment payload.
    pub fn state_init(&self) -> WalletResult<StateInit> {
        let version = WalletVersion::V4R2;
        let code: ArcCell = version.code().map_err(contract_error)?.clone();
        let data: ArcCell = version
            .initial_data(&self.wallet.key_pair, self.wallet.wallet_id)
            .map_err(contract_error)?
            .into();
        Ok(StateInit { code, data })
    }

    /// Build the payload that is hashed and signed.
    ///
    /// `valid_until` is ignored for `seqno == 0`, where it is pinned to
    /// `u32::MAX`.
    pub fn signing_payload(
        &self,
        seqno: u32,
        valid_until: u32,
        messages: &[InternalMessage],
    ) -> WalletResult<Cell> {
        if messages.len() > MAX_MESSAGES {
            return Err(contract_error(format!(
                "{} messages in one transfer",
                messages.len()
            )));
        }
        let valid_until = if seqno == 0 { u32::MAX } else { valid_until };
        let messages = messages
            .iter()
            .map(|message| message.to_cell().map(Arc::new))
            .collect::<WalletResult<Vec<ArcCell>>>()?;
        self.wallet
            .create_external_body(valid_until, seqno, messages)
            .map_err(contract_error)
    }

    /// Prefix the payload with a signature.
    pub fn transfer_body(&self, signature: &[u8; SIGNATURE_LEN], payload: &Cell) -> WalletResult<Cell> {
        let mut builder = CellBuilder::new();
        builder.store_slice(signature)?.store_cell(payload)?;
        Ok(builder.build()?)
    }

    /// Wrap a transfer body into the external message for this wallet.
    pub fn external_message(&self, body: Cell, deploy: bool) -> WalletResult<Cell> {
        self.wallet
            .wrap_signed_body(body, deploy)
            .map_err(contract_error)
    }
}

impl std::fmt::Debug for WalletContract {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WalletContract")
            .field("address", &self.wallet.address.to_hex())
            .field("public_key", &hex::encode(self.public_key))
            .finish()
    }
}

/// Decode the internal messages of a signed transfer body.
pub fn parse_transfer_messages(body: &Cell) -> WalletResult<Vec<(u8, InternalMessage)>> {
    let mut parser = body.parser();
    parser.skip_bits(SIGNATURE_LEN * 8)?;
    parser.skip_bits(32 * 3)?;
    let op = parser.load_u8(8)?;
    if op != OP_SIMPLE_SEND {
        return Err(contract_error(format!("unsupported wallet op {}", op)));
    }
    body.references()
        .iter()
        .map(|reference| -> WalletResult<(u8, InternalMessage)> {
            let mode = parser.load_u8(8)?;
            Ok((mode, InternalMessage::from_cell(reference)?))
        })
        .collect()
}

/// Content-addressed receipt of a message cell (standard base64 of its hash).
pub fn message_id(cell: &Cell) -> String {
    STANDARD.encode(cell.cell_hash())
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::address::{address_from_parts, AddressExt};
    use crate::cell::{comment_cell, to_boc_base64};

    /// Public key derived from the reference seed at `m/44'/607'/0'`.
    pub(crate) const PUBLIC_KEY: [u8; 32] = [
        0x35, 0x51, 0xdd, 0x99, 0xb8, 0xe9, 0x09, 0xff, 0xa2, 0x38, 0x8f, 0x92, 0xc6, 0x73, 0x57,
        0xe1, 0x84, 0x0b, 0x3a, 0x6d, 0x93, 0xf6, 0x03, 0x11, 0x19, 0xf2, 0x28, 0x6b, 0x4f, 0xac,
        0x43, 0xeb,
    ];

    fn contract() -> WalletContract {
        WalletContract::new([7u8; 32]).unwrap()
    }

    #[test]
    fn test_reference_address() {
        let wallet = WalletContract::new(PUBLIC_KEY).unwrap();
        assert_eq!(
            wallet.address().to_friendly(false, false),
            "UQBa1jalGfCwrast5gg_PB-U2cdCHg2mPy2gUO-_4u_vuboO"
        );
    }

    #[test]
    fn test_address_depends_on_key() {
        let wallet = contract();
        assert_eq!(wallet.address().workchain, 0);
        let other = WalletContract::new([8u8; 32]).unwrap();
        assert_ne!(other.address(), wallet.address());
    }

    #[test]
    fn test_state_init_encodes() {
        let init = contract().state_init().unwrap();
        assert!(to_boc_base64(&init.code).is_ok());
        assert!(to_boc_base64(&init.data).is_ok());
    }

    #[test]
    fn test_internal_message_roundtrip() {
        let destination = address_from_parts(0, [3u8; 32]);
        let message = InternalMessage::new(
            destination,
            1_000_000_000,
            Some(comment_cell("hello").unwrap()),
        );
        let cell = message.to_cell().unwrap();
        let decoded = InternalMessage::from_cell(&cell).unwrap();
        assert_eq!(decoded, message);

        let mut parser = cell.parser();
        parser.load_bit().unwrap();
        parser.load_bit().unwrap();
        assert!(!parser.load_bit().unwrap(), "bounce must be off");
    }

    #[test]
    fn test_signing_payload_seqno_zero() {
        let wallet = contract();
        let payload = wallet.signing_payload(0, 1234, &[]).unwrap();
        let mut parser = payload.parser();
        assert_eq!(parser.load_u32(32).unwrap(), 698_983_191);
        assert_eq!(parser.load_u32(32).unwrap(), u32::MAX);
        assert_eq!(parser.load_u32(32).unwrap(), 0);

        let payload = wallet.signing_payload(5, 1234, &[]).unwrap();
        let mut parser = payload.parser();
        parser.load_u32(32).unwrap();
        assert_eq!(parser.load_u32(32).unwrap(), 1234);
        assert_eq!(parser.load_u32(32).unwrap(), 5);
    }

    #[test]
    fn test_transfer_body_messages() {
        let wallet = contract();
        let messages = vec![
            InternalMessage::new(address_from_parts(0, [1u8; 32]), 10, None),
            InternalMessage::new(address_from_parts(0, [2u8; 32]), 20, None),
        ];
        let payload = wallet.signing_payload(3, 99, &messages).unwrap();
        let body = wallet.transfer_body(&[0u8; SIGNATURE_LEN], &payload).unwrap();
        assert_eq!(body.bit_len(), SIGNATURE_LEN * 8 + payload.bit_len());

        let parsed = parse_transfer_messages(&body).unwrap();
        assert_eq!(parsed.len(), 2);
        assert_eq!(parsed[0].0, SEND_MODE);
        assert_eq!(parsed[1].1, messages[1]);
    }

    #[test]
    fn test_external_message_init() {
        let wallet = contract();
        let body = CellBuilder::new().build().unwrap();
        let with_init = wallet.external_message(body.clone(), true).unwrap();
        let without = wallet.external_message(body, false).unwrap();
        assert!(with_init.references().len() > without.references().len());
        assert_ne!(message_id(&with_init), message_id(&without));
    }

    #[test]
    fn test_too_many_messages() {
        let wallet = contract();
        let messages = vec![InternalMessage::new(address_from_parts(0, [1u8; 32]), 1, None); 5];
        assert!(matches!(
            wallet.signing_payload(1, 0, &messages),
            Err(WalletError::Contract(_))
        ));
    }
}
