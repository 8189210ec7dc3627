//! Maximum spendable amount.
//!
//! Single-pass approximation: the miner fee is quoted once for a sizing plan
//! with the whole balance as value and a 1-unit platform fee (when the
//! schedule is enabled), then the platform fee is computed on what remains.
//! Native transfer size does not depend on the value, so the sizing plan
//! prices the real transfer; a percentage platform fee with a minimum may be
//! off by its placeholder leg. This is not iterated to a fixed point.

use crate::address::TonAddress;
use crate::fee::MinerFeeSource;
use crate::platform_fee::{FeeSchedule, PlatformFeeCalculator};
use crate::transfer::{PlatformFeeTransfer, TransferPlan};
use crate::WalletResult;
use tracing::debug;

/// Inputs for a native max-amount query.
#[derive(Debug, Clone)]
pub struct MaxAmountQuery<'a> {
    /// Spendable native balance.
    pub balance: u128,
    /// Intended recipient.
    pub destination: TonAddress,
    /// Intended memo.
    pub memo: Option<&'a str>,
    /// Current platform fee schedule.
    pub schedule: &'a FeeSchedule,
    /// Fee schedule recipient, parsed.
    pub fee_address: Option<TonAddress>,
    /// Asset price for the platform fee minimum.
    pub price: Option<f64>,
}

/// Computes the largest transferable value.
pub struct MaxAmountSolver<'a> {
    fees: &'a dyn MinerFeeSource,
    calculator: PlatformFeeCalculator,
}

impl<'a> MaxAmountSolver<'a> {
    /// Solver pricing transfers with `fees`.
    pub fn new(fees: &'a dyn MinerFeeSource, calculator: PlatformFeeCalculator) -> Self {
        Self { fees, calculator }
    }

    /// Max native amount after miner and platform fees. Never negative.
    pub async fn native(&self, query: MaxAmountQuery<'_>) -> WalletResult<u128> {
        let balance = query.balance;
        if balance == 0 {
            return Ok(0);
        }

        let platform_fee = match (query.schedule.disabled, query.fee_address) {
            (false, Some(address)) => Some(PlatformFeeTransfer { address, value: 1 }),
            _ => None,
        };
        let sizing = TransferPlan::Native {
            destination: query.destination,
            value: balance,
            memo: query.memo.map(str::to_string),
            platform_fee,
        };
        let miner_fee = self.fees.miner_fee(&sizing).await?;
        if balance < miner_fee {
            debug!(balance = %balance, miner_fee = %miner_fee, "Balance below miner fee");
            return Ok(0);
        }

        let platform_fee =
            self.calculator
                .fee_for_max(query.schedule, balance - miner_fee, query.price);
        let max = balance
            .saturating_sub(miner_fee)
            .saturating_sub(platform_fee);

        debug!(
            balance = %balance,
            miner_fee = %miner_fee,
            platform_fee = %platform_fee,
            max = %max,
            "Solved max amount"
        );
        Ok(max)
    }

    /// Max token amount: the whole token balance, fees are paid in native coin.
    pub fn token(&self, token_balance: u128) -> u128 {
        token_balance
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::address::address_from_parts;
    use async_trait::async_trait;
    use parking_lot::Mutex;

    struct Fixed {
        fee: u128,
        seen: Mutex<Vec<TransferPlan>>,
    }

    #[async_trait]
    impl MinerFeeSource for Fixed {
        async fn miner_fee(&self, plan: &TransferPlan) -> WalletResult<u128> {
            self.seen.lock().push(plan.clone());
            Ok(self.fee)
        }
    }

    fn fixed(fee: u128) -> Fixed {
        Fixed {
            fee,
            seen: Mutex::new(Vec::new()),
        }
    }

    fn query(balance: u128, schedule: &FeeSchedule) -> MaxAmountQuery<'_> {
        MaxAmountQuery {
            balance,
            destination: address_from_parts(0, [1u8; 32]),
            memo: None,
            schedule,
            fee_address: Some(address_from_parts(0, [9u8; 32])),
            price: Some(2.14),
        }
    }

    #[tokio::test]
    async fn test_disabled_platform_fee() {
        let fees = fixed(146_302_140);
        let solver = MaxAmountSolver::new(&fees, PlatformFeeCalculator::new(9));
        let schedule = FeeSchedule::default();
        let max = solver.native(query(4_936_421_995, &schedule)).await.unwrap();
        assert_eq!(max, 4_790_119_855);

        let seen = fees.seen.lock();
        match &seen[0] {
            TransferPlan::Native { value, platform_fee, .. } => {
                assert_eq!(*value, 4_936_421_995);
                assert!(platform_fee.is_none());
            }
            other => panic!("unexpected plan {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_sizing_plan_uses_unit_platform_fee() {
        let fees = fixed(100);
        let solver = MaxAmountSolver::new(&fees, PlatformFeeCalculator::new(9));
        let schedule = FeeSchedule {
            address: Some("EQfee".to_string()),
            disabled: false,
            rate: 0.01,
            minimum: 0.0,
        };
        let max = solver.native(query(101_000_000_100, &schedule)).await.unwrap();
        assert_eq!(max, 100_000_000_000);

        let seen = fees.seen.lock();
        match &seen[0] {
            TransferPlan::Native { platform_fee, .. } => {
                assert_eq!(platform_fee.as_ref().map(|f| f.value), Some(1));
            }
            other => panic!("unexpected plan {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_zero_and_insufficient() {
        let fees = fixed(500);
        let solver = MaxAmountSolver::new(&fees, PlatformFeeCalculator::new(9));
        let schedule = FeeSchedule::default();
        assert_eq!(solver.native(query(0, &schedule)).await.unwrap(), 0);
        assert!(fees.seen.lock().is_empty());
        assert_eq!(solver.native(query(499, &schedule)).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_minimum_clamps_to_zero() {
        let fees = fixed(10);
        let solver = MaxAmountSolver::new(&fees, PlatformFeeCalculator::new(9));
        let schedule = FeeSchedule {
            address: Some("EQfee".to_string()),
            disabled: false,
            rate: 0.0,
            minimum: 1.0,
        };
        assert_eq!(solver.native(query(1_000, &schedule)).await.unwrap(), 0);
    }

    #[test]
    fn test_token_max_is_balance() {
        let fees = fixed(1);
        let solver = MaxAmountSolver::new(&fees, PlatformFeeCalculator::new(9));
        assert_eq!(solver.token(7_000_000), 7_000_000);
    }
}
