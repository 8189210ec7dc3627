//! Transfer construction.
//!
//! A transfer is described by a [`TransferPlan`] and turned into a signed
//! external message by [`TransferBuilder`]. The same code path produces the
//! zero-signature dry run used for fee appraisal, so both have identical size.

use crate::address::TonAddress;
use crate::cell::{comment_cell, to_boc_base64, Cell};
use crate::contract::{message_id, InternalMessage, StateInit, WalletContract, SIGNATURE_LEN};
use crate::jetton::TokenTransfer;
use crate::keys::KeyPair;
use crate::state::AccountStateClient;
use crate::{WalletError, WalletResult};
use serde::Serialize;
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use tracing::debug;

/// Platform fee leg of a native transfer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PlatformFeeTransfer {
    /// Fee recipient.
    #[serde(with = "crate::address::raw")]
    pub address: TonAddress,
    /// Fee value.
    pub value: u128,
}

/// What to send. Each variant carries only what its mode needs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum TransferPlan {
    /// Native coin transfer with an optional platform fee leg.
    Native {
        #[serde(with = "crate::address::raw")]
        destination: TonAddress,
        value: u128,
        memo: Option<String>,
        platform_fee: Option<PlatformFeeTransfer>,
    },
    /// Token transfer through the owner's token subaccount.
    Token {
        #[serde(with = "crate::address::raw")]
        subaccount: TonAddress,
        #[serde(with = "crate::address::raw")]
        destination: TonAddress,
        amount: u128,
        memo: Option<String>,
    },
}

/// How the signing payload is authenticated.
pub enum Signing<'a> {
    /// Zero-filled signature of the correct length.
    DryRun,
    /// Real ed25519 signature.
    Key(&'a KeyPair),
}

/// A fully assembled transfer.
#[derive(Debug, Clone)]
pub struct BuiltTransfer {
    /// Sequence number the transfer was built for.
    pub seqno: u32,
    /// Signed transfer body.
    pub body: Cell,
    /// Deployment payload, present for uninitialized accounts.
    pub init: Option<StateInit>,
    /// Outer external message.
    pub external: Cell,
    /// Submission receipt (hash of the external message), not a transaction id.
    pub id: String,
}

impl BuiltTransfer {
    /// Base64 BOC of the external message.
    pub fn boc(&self) -> WalletResult<String> {
        to_boc_base64(&self.external)
    }
}

/// Builds signed transfers for one wallet contract.
pub struct TransferBuilder {
    contract: WalletContract,
    state: Arc<AccountStateClient>,
    owner: String,
    token_transfer_fee: u128,
    token_forward_amount: u128,
    timeout: Duration,
}

impl TransferBuilder {
    /// Create a builder. `owner` is the rendering of the wallet address used
    /// for node queries.
    pub fn new(contract: WalletContract, state: Arc<AccountStateClient>, owner: String) -> Self {
        Self {
            contract,
            state,
            owner,
            token_transfer_fee: 50_000_000,
            token_forward_amount: 1,
            timeout: Duration::from_secs(60),
        }
    }

    /// Native value attached to a token transfer.
    pub fn with_token_transfer_fee(mut self, fee: u128) -> Self {
        self.token_transfer_fee = fee;
        self
    }

    /// Native value forwarded to the token recipient.
    pub fn with_token_forward_amount(mut self, amount: u128) -> Self {
        self.token_forward_amount = amount;
        self
    }

    /// Validity window of a signed transfer.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Wallet contract.
    pub fn contract(&self) -> &WalletContract {
        &self.contract
    }

    /// Rendering of the wallet address used for node queries.
    pub fn owner(&self) -> &str {
        &self.owner
    }

    /// Account state client.
    pub fn state(&self) -> &Arc<AccountStateClient> {
        &self.state
    }

    /// Internal messages carried by `plan`.
    pub fn messages(&self, plan: &TransferPlan) -> WalletResult<Vec<InternalMessage>> {
        match plan {
            TransferPlan::Native {
                destination,
                value,
                memo,
                platform_fee,
            } => {
                let body = memo.as_deref().map(comment_cell).transpose()?;
                let mut messages = vec![InternalMessage::new(destination.clone(), *value, body)];
                if let Some(fee) = platform_fee.as_ref().filter(|fee| fee.value > 0) {
                    messages.push(InternalMessage::new(fee.address.clone(), fee.value, None));
                }
                Ok(messages)
            }
            TransferPlan::Token {
                subaccount,
                destination,
                amount,
                memo,
            } => {
                let body = TokenTransfer {
                    amount: *amount,
                    destination: destination.clone(),
                    response_destination: self.contract.address().clone(),
                    forward_amount: self.token_forward_amount,
                    memo: memo.clone(),
                }
                .to_cell()?;
                Ok(vec![InternalMessage::new(
                    subaccount.clone(),
                    self.token_transfer_fee,
                    Some(body),
                )])
            }
        }
    }

    /// Build the transfer, signing it unless `signing` is a dry run.
    pub async fn build(&self, plan: &TransferPlan, signing: Signing<'_>) -> WalletResult<BuiltTransfer> {
        let state = self.state.get_account_state(&self.owner).await?;
        let messages = self.messages(plan)?;

        let payload =
            self.contract
                .signing_payload(state.sequence_number, self.valid_until()?, &messages)?;
        let signature: [u8; SIGNATURE_LEN] = match signing {
            Signing::DryRun => [0u8; SIGNATURE_LEN],
            Signing::Key(key) => {
                if key.public_key() != *self.contract.public_key() {
                    return Err(WalletError::Internal(
                        "signing key does not match wallet".to_string(),
                    ));
                }
                key.sign(&payload.cell_hash())
            }
        };
        let body = self.contract.transfer_body(&signature, &payload)?;

        let deploy = !state.initialized;
        let init = deploy.then(|| self.contract.state_init()).transpose()?;
        let external = self.contract.external_message(body.clone(), deploy)?;
        let id = message_id(&external);

        debug!(
            seqno = state.sequence_number,
            deploy,
            messages = messages.len(),
            id = %id,
            "Built transfer"
        );

        Ok(BuiltTransfer {
            seqno: state.sequence_number,
            body,
            init,
            external,
            id,
        })
    }

    fn valid_until(&self) -> WalletResult<u32> {
        let now = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map_err(|e| WalletError::Internal(e.to_string()))?;
        Ok(u32::try_from((now + self.timeout).as_secs()).unwrap_or(u32::MAX))
    }
}
