//! Miner fee estimation.
//!
//! Native transfers are priced by building a zero-signature dry run of the
//! exact transfer, submitting it to the node's appraisal endpoint, summing
//! the source fee components and applying a 5% safety factor. Token
//! transfers are charged the fixed native value attached to the token
//! subaccount message instead.

use crate::cache::MemoCache;
use crate::cell::to_boc_base64;
use crate::node::InitPayload;
use crate::transfer::{Signing, TransferBuilder, TransferPlan};
use crate::WalletResult;
use async_trait::async_trait;
use std::sync::Arc;
use tracing::info;

/// Safety factor numerator (×1.05).
pub const FEE_FACTOR_NUMERATOR: u128 = 105;

/// Safety factor denominator.
pub const FEE_FACTOR_DENOMINATOR: u128 = 100;

/// Scale an appraised fee by the safety factor, rounding down.
pub fn apply_safety_factor(fee: u128) -> u128 {
    fee.saturating_mul(FEE_FACTOR_NUMERATOR) / FEE_FACTOR_DENOMINATOR
}

/// Anything that can price a transfer plan.
#[async_trait]
pub trait MinerFeeSource: Send + Sync {
    /// Miner fee for `plan` in native base units.
    async fn miner_fee(&self, plan: &TransferPlan) -> WalletResult<u128>;
}

/// Simulate-then-query fee estimator, memoized per plan.
pub struct FeeEstimator {
    builder: Arc<TransferBuilder>,
    token_transfer_fee: u128,
    cache: MemoCache<u128>,
}

impl FeeEstimator {
    /// Create an estimator that prices plans built by `builder`.
    pub fn new(builder: Arc<TransferBuilder>, token_transfer_fee: u128) -> Self {
        Self {
            builder,
            token_transfer_fee,
            cache: MemoCache::new("estimateMinerFee"),
        }
    }

    async fn simulate(&self, plan: &TransferPlan) -> WalletResult<u128> {
        let dry_run = self.builder.build(plan, Signing::DryRun).await?;
        let init = match &dry_run.init {
            Some(init) => Some(InitPayload {
                code: to_boc_base64(&init.code)?,
                data: to_boc_base64(&init.data)?,
            }),
            None => None,
        };
        let body = to_boc_base64(&dry_run.body)?;

        let fees = self
            .builder
            .state()
            .node()
            .estimate_fee(self.builder.owner(), &body, init.as_ref())
            .await?;
        let raw = fees.total();
        let fee = apply_safety_factor(raw);

        info!(
            storage_fee = %fees.storage_fee,
            in_fwd_fee = %fees.in_fwd_fee,
            fwd_fee = %fees.fwd_fee,
            gas_fee = %fees.gas_fee,
            raw = %raw,
            fee = %fee,
            deploy = init.is_some(),
            "Estimated miner fee"
        );
        Ok(fee)
    }

    /// Forget the memoized estimate for `plan`.
    pub fn invalidate(&self, plan: &TransferPlan) -> WalletResult<()> {
        self.cache.invalidate(plan)
    }

    /// Drop memoized estimates.
    pub fn clear(&self) {
        self.cache.clear();
    }
}

#[async_trait]
impl MinerFeeSource for FeeEstimator {
    async fn miner_fee(&self, plan: &TransferPlan) -> WalletResult<u128> {
        if let TransferPlan::Token { .. } = plan {
            return Ok(self.token_transfer_fee);
        }
        self.cache
            .get_or_try_init(plan, || self.simulate(plan))
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::address::{address_from_parts, AddressExt};
    use crate::contract::WalletContract;
    use crate::node::{NodeClient, NodeRequest, NodeTransport, PATH_ESTIMATE_FEE};
    use crate::state::AccountStateClient;
    use parking_lot::Mutex;
    use serde_json::{json, Value};

    struct Appraiser {
        account_state: &'static str,
        estimates: Mutex<Vec<Value>>,
    }

    #[async_trait]
    impl NodeTransport for Appraiser {
        async fn request(&self, request: NodeRequest) -> WalletResult<Value> {
            if request.path == PATH_ESTIMATE_FEE {
                self.estimates.lock().push(request.body.unwrap_or(Value::Null));
                return Ok(json!({
                    "ok": true,
                    "result": { "source_fees": {
                        "in_fwd_fee": 1_000_000,
                        "storage_fee": 335_372,
                        "gas_fee": 130_000_000,
                        "fwd_fee": 8_000_000
                    }}
                }));
            }
            Ok(json!({
                "ok": true,
                "result": { "balance": "4936421995", "account_state": self.account_state, "seqno": 1 }
            }))
        }
    }

    fn estimator(account_state: &'static str) -> (FeeEstimator, Arc<Appraiser>) {
        let transport = Arc::new(Appraiser {
            account_state,
            estimates: Mutex::new(Vec::new()),
        });
        let contract = WalletContract::new([1u8; 32]).unwrap();
        let owner = contract.address().to_friendly(false, false);
        let state = Arc::new(AccountStateClient::new(NodeClient::new(transport.clone())));
        let builder = Arc::new(TransferBuilder::new(contract, state, owner));
        (FeeEstimator::new(builder, 50_000_000), transport)
    }

    fn plan(value: u128) -> TransferPlan {
        TransferPlan::Native {
            destination: address_from_parts(0, [2u8; 32]),
            value,
            memo: None,
            platform_fee: None,
        }
    }

    #[test]
    fn test_safety_factor_floors() {
        assert_eq!(apply_safety_factor(139_335_372), 146_302_140);
        assert_eq!(apply_safety_factor(0), 0);
        assert_eq!(apply_safety_factor(19), 19);
    }

    #[tokio::test]
    async fn test_native_estimate_memoized() {
        let (estimator, transport) = estimator("active");
        assert_eq!(estimator.miner_fee(&plan(1)).await.unwrap(), 146_302_140);
        assert_eq!(estimator.miner_fee(&plan(1)).await.unwrap(), 146_302_140);
        assert_eq!(transport.estimates.lock().len(), 1);

        estimator.miner_fee(&plan(2)).await.unwrap();
        assert_eq!(transport.estimates.lock().len(), 2);

        estimator.invalidate(&plan(1)).unwrap();
        estimator.miner_fee(&plan(2)).await.unwrap();
        assert_eq!(transport.estimates.lock().len(), 2);
        estimator.miner_fee(&plan(1)).await.unwrap();
        assert_eq!(transport.estimates.lock().len(), 3);

        estimator.clear();
        estimator.miner_fee(&plan(2)).await.unwrap();
        assert_eq!(transport.estimates.lock().len(), 4);
    }

    #[tokio::test]
    async fn test_init_sent_for_uninitialized() {
        let (estimator, transport) = estimator("uninitialized");
        estimator.miner_fee(&plan(1)).await.unwrap();
        let estimates = transport.estimates.lock();
        assert!(estimates[0]["init_code"].is_string());
        assert!(estimates[0]["init_data"].is_string());
        assert_eq!(estimates[0]["ignore_chksig"], Value::Bool(true));
    }

    #[tokio::test]
    async fn test_token_fee_is_fixed() {
        let (estimator, transport) = estimator("active");
        let plan = TransferPlan::Token {
            subaccount: address_from_parts(0, [4u8; 32]),
            destination: address_from_parts(0, [5u8; 32]),
            amount: 1,
            memo: None,
        };
        assert_eq!(estimator.miner_fee(&plan).await.unwrap(), 50_000_000);
        assert!(transport.estimates.lock().is_empty());
    }
}
