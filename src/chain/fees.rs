use alloy::primitives::U256;
use alloy::providers::{DynProvider, Provider};
use async_trait::async_trait;

use crate::error::{AppError, AppResult};

/// EIP-1559 fee pair returned by a fee strategy
#[derive(Debug, Clone, Copy)]
pub struct FeeQuote {
    pub max_fee_per_gas: u128,
    pub max_priority_fee_per_gas: u128,
}

impl FeeQuote {
    /// Worst-case gas spend for a transaction with this fee ceiling
    pub fn gas_budget(&self, gas_limit: u64) -> U256 {
        U256::from(self.max_fee_per_gas) * U256::from(gas_limit)
    }
}

/// Pluggable gas-price discovery. Stateless; selected at process start.
#[async_trait]
pub trait FeeStrategy: Send + Sync {
    /// Quote a fee pair for the network. `urgent` requests a materially
    /// higher ceiling, used when racing a stuck transaction.
    async fn quote(&self, chain_id: u64, urgent: bool) -> AppResult<FeeQuote>;
}

/// Fee strategy backed by the node's own EIP-1559 estimator, with a
/// configured multiplier applied for urgent (speed-up) quotes.
pub struct Eip1559FeeStrategy {
    provider: DynProvider,
    urgent_multiplier_percent: u64,
}

impl Eip1559FeeStrategy {
    pub fn new(provider: DynProvider, urgent_multiplier_percent: u64) -> Self {
        Self {
            provider,
            urgent_multiplier_percent,
        }
    }
}

#[async_trait]
impl FeeStrategy for Eip1559FeeStrategy {
    async fn quote(&self, _chain_id: u64, urgent: bool) -> AppResult<FeeQuote> {
        let estimate = self
            .provider
            .estimate_eip1559_fees()
            .await
            .map_err(|e| AppError::Chain(format!("Fee estimation failed: {e}")))?;

        let mut quote = FeeQuote {
            max_fee_per_gas: estimate.max_fee_per_gas,
            max_priority_fee_per_gas: estimate.max_priority_fee_per_gas,
        };

        if urgent {
            quote.max_fee_per_gas = scale(quote.max_fee_per_gas, self.urgent_multiplier_percent);
            quote.max_priority_fee_per_gas =
                scale(quote.max_priority_fee_per_gas, self.urgent_multiplier_percent);
        }

        Ok(quote)
    }
}

fn scale(fee: u128, percent: u64) -> u128 {
    fee.saturating_mul(percent as u128) / 100
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn urgent_multiplier_scales_fees() {
        assert_eq!(scale(30_000_000_000, 200), 60_000_000_000);
        assert_eq!(scale(30_000_000_000, 150), 45_000_000_000);
        assert_eq!(scale(0, 200), 0);
    }

    #[test]
    fn gas_budget_is_ceiling_times_limit() {
        let quote = FeeQuote {
            max_fee_per_gas: 50_000_000_000,
            max_priority_fee_per_gas: 2_000_000_000,
        };
        assert_eq!(
            quote.gas_budget(21_000),
            U256::from(50_000_000_000u128 * 21_000)
        );
    }
}
