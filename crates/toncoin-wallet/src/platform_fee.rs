//! Platform fee schedule and calculator.

use crate::WalletResult;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Fixed-point scale for the percentage rate.
const RATE_SCALE: u128 = 1_000_000_000;

/// Platform fee configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FeeSchedule {
    /// Recipient of the platform fee.
    pub address: Option<String>,
    /// Platform fee switched off.
    pub disabled: bool,
    /// Fraction of the transferred value (e.g. `0.005`).
    pub rate: f64,
    /// Minimum fee in fiat units, converted with the asset price.
    pub minimum: f64,
}

impl Default for FeeSchedule {
    fn default() -> Self {
        Self {
            address: None,
            disabled: true,
            rate: 0.0,
            minimum: 0.0,
        }
    }
}

/// Source of the current fee schedule.
#[async_trait]
pub trait FeeScheduleProvider: Send + Sync {
    /// Current schedule.
    async fn fee_schedule(&self) -> WalletResult<FeeSchedule>;
}

/// A schedule fixed at construction.
#[derive(Debug, Clone, Default)]
pub struct StaticFeeSchedule(pub FeeSchedule);

#[async_trait]
impl FeeScheduleProvider for StaticFeeSchedule {
    async fn fee_schedule(&self) -> WalletResult<FeeSchedule> {
        Ok(self.0.clone())
    }
}

/// Computes platform fees in base units of the native asset.
#[derive(Debug, Clone, Copy)]
pub struct PlatformFeeCalculator {
    decimals: u32,
}

impl PlatformFeeCalculator {
    /// Calculator for an asset with `decimals` fractional digits.
    pub fn new(decimals: u32) -> Self {
        Self { decimals }
    }

    fn scaled_rate(schedule: &FeeSchedule) -> u128 {
        if schedule.rate.is_finite() && schedule.rate > 0.0 {
            (schedule.rate * RATE_SCALE as f64).round() as u128
        } else {
            0
        }
    }

    /// Minimum fee in base units at `price`.
    fn minimum(&self, schedule: &FeeSchedule, price: Option<f64>) -> u128 {
        match price {
            Some(price) if price > 0.0 && schedule.minimum > 0.0 => {
                let units = schedule.minimum / price * 10f64.powi(self.decimals as i32);
                if units.is_finite() {
                    units.floor() as u128
                } else {
                    0
                }
            }
            _ => 0,
        }
    }

    /// Fee for transferring `value`.
    pub fn fee(&self, schedule: &FeeSchedule, value: u128, price: Option<f64>) -> u128 {
        if schedule.disabled {
            return 0;
        }
        let proportional = value.saturating_mul(Self::scaled_rate(schedule)) / RATE_SCALE;
        proportional.max(self.minimum(schedule, price))
    }

    /// Fee when `value` must cover both the transfer and the fee itself.
    pub fn fee_for_max(&self, schedule: &FeeSchedule, value: u128, price: Option<f64>) -> u128 {
        if schedule.disabled {
            return 0;
        }
        let rate = Self::scaled_rate(schedule);
        let proportional = value.saturating_mul(rate) / (RATE_SCALE + rate);
        proportional.max(self.minimum(schedule, price))
    }
}
