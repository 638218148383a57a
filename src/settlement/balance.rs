use std::sync::Arc;

use alloy::primitives::U256;
use chrono::{Duration, Utc};
use rust_decimal::Decimal;
use tracing::{debug, info, warn};

use super::BalanceCheckOutcome;
use crate::allocator;
use crate::chain::fees::FeeStrategy;
use crate::chain::{usd_to_wei, wei_to_u256, ChainClient, TRANSFER_GAS_LIMIT};
use crate::error::{AppResult, SettlementError};
use crate::ledger::PayoutLedger;
use crate::locks::{JobLock, BALANCE_CHECK_LOCK};
use crate::notify::NotificationSink;
use crate::rates::CurrencyConverter;
use crate::tournament::TournamentSource;

/// Defensive balance check run before any signing
pub struct BalanceGuard {
    chain: Arc<dyn ChainClient>,
}

impl BalanceGuard {
    pub fn new(chain: Arc<dyn ChainClient>) -> Self {
        Self { chain }
    }

    /// Fails with InsufficientFunds when the operating wallet cannot cover
    /// `required` (transfer value plus worst-case gas). No mutation.
    pub async fn verify(&self, required: U256) -> AppResult<()> {
        let available = self.chain.balance().await?;

        if available < required {
            return Err(SettlementError::InsufficientFunds {
                required: required.to_string(),
                available: available.to_string(),
            }
            .into());
        }

        Ok(())
    }
}

/// Read-only advisory job: does the operating wallet cover every pending
/// obligation plus a gas reserve? Performs no ledger writes.
pub struct BalanceMonitor {
    ledger: Arc<dyn PayoutLedger>,
    tournaments: Arc<dyn TournamentSource>,
    chain: Arc<dyn ChainClient>,
    fees: Arc<dyn FeeStrategy>,
    converter: Arc<dyn CurrencyConverter>,
    notifier: Arc<dyn NotificationSink>,
    lock: Arc<dyn JobLock>,
    lookback_days: i64,
}

impl BalanceMonitor {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        ledger: Arc<dyn PayoutLedger>,
        tournaments: Arc<dyn TournamentSource>,
        chain: Arc<dyn ChainClient>,
        fees: Arc<dyn FeeStrategy>,
        converter: Arc<dyn CurrencyConverter>,
        notifier: Arc<dyn NotificationSink>,
        lock: Arc<dyn JobLock>,
        lookback_days: i64,
    ) -> Self {
        Self {
            ledger,
            tournaments,
            chain,
            fees,
            converter,
            notifier,
            lock,
            lookback_days,
        }
    }

    pub async fn run(&self) -> AppResult<BalanceCheckOutcome> {
        if !self.lock.try_acquire(BALANCE_CHECK_LOCK).await? {
            debug!("Balance check already running elsewhere, skipping");
            return Ok(BalanceCheckOutcome::LockBusy);
        }

        let result = self.check().await;

        if let Err(e) = self.lock.release(BALANCE_CHECK_LOCK).await {
            warn!("Failed to release balance check lock: {e}");
        }

        result
    }

    async fn check(&self) -> AppResult<BalanceCheckOutcome> {
        let cutoff = Utc::now() - Duration::days(self.lookback_days);
        let due = self.tournaments.awaiting_payout(cutoff).await?;

        let mut total_fiat = Decimal::ZERO;
        let mut unpaid_count: u64 = 0;

        for tournament in &due {
            let confirmed = self.ledger.confirmed_for_tournament(tournament.id).await?;
            for assignment in allocator::allocate(tournament, &confirmed)? {
                if !assignment.is_paid() {
                    total_fiat += assignment.prize;
                    unpaid_count += 1;
                }
            }
        }

        if unpaid_count == 0 {
            info!("💰 Balance check: nothing to pay out");
            return Ok(BalanceCheckOutcome::NothingToPayOut);
        }

        let rate = self.converter.usd_to_chain_rate().await?;
        let obligations = wei_to_u256(&usd_to_wei(total_fiat, rate)?)?;

        let chain_id = self.chain.chain_id().await?;
        let fee_quote = self.fees.quote(chain_id, false).await?;
        let gas_reserve = fee_quote.gas_budget(TRANSFER_GAS_LIMIT) * U256::from(unpaid_count);

        let required = obligations + gas_reserve;
        let available = self.chain.balance().await?;

        if available < required {
            self.notifier
                .notify_operators(&format!(
                    "🚨 Payout wallet underfunded: {unpaid_count} unpaid obligations totalling \
                     ${total_fiat} need {required} wei (incl. gas reserve), wallet holds {available} wei"
                ))
                .await;
            return Ok(BalanceCheckOutcome::NotEnoughBalance);
        }

        self.notifier
            .notify_operators(&format!(
                "💰 Payout wallet funded: {unpaid_count} unpaid obligations totalling ${total_fiat}, \
                 {required} wei required, {available} wei available"
            ))
            .await;

        Ok(BalanceCheckOutcome::EnoughBalance)
    }
}
