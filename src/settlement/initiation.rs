use std::str::FromStr;
use std::sync::Arc;

use alloy::primitives::Address;
use chrono::{Duration, Utc};
use tracing::{debug, info, warn};

use super::balance::BalanceGuard;
use super::InitiationOutcome;
use crate::allocator;
use crate::chain::fees::FeeStrategy;
use crate::chain::{usd_to_wei, wei_to_u256, ChainClient, TransferRequest, TRANSFER_GAS_LIMIT};
use crate::error::{AppError, AppResult, SettlementError};
use crate::ledger::{NewPayout, PayoutLedger};
use crate::locks::{JobLock, INITIATION_LOCK};
use crate::notify::NotificationSink;
use crate::rates::CurrencyConverter;
use crate::tournament::TournamentSource;

/// Finds the single next entrant owed prize money across all eligible
/// tournaments, builds and broadcasts one signed transfer, and records it.
/// At most one initiation is in flight system-wide: the chain accepts one
/// nonce at a time per wallet, so overlapping initiations would corrupt
/// nonce sequencing.
pub struct InitiationController {
    ledger: Arc<dyn PayoutLedger>,
    tournaments: Arc<dyn TournamentSource>,
    chain: Arc<dyn ChainClient>,
    fees: Arc<dyn FeeStrategy>,
    converter: Arc<dyn CurrencyConverter>,
    notifier: Arc<dyn NotificationSink>,
    lock: Arc<dyn JobLock>,
    balance_guard: BalanceGuard,
    lookback_days: i64,
}

impl InitiationController {
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
        let balance_guard = BalanceGuard::new(chain.clone());
        Self {
            ledger,
            tournaments,
            chain,
            fees,
            converter,
            notifier,
            lock,
            balance_guard,
            lookback_days,
        }
    }

    pub async fn run(&self) -> AppResult<InitiationOutcome> {
        if !self.lock.try_acquire(INITIATION_LOCK).await? {
            debug!("Initiation already running elsewhere, skipping");
            return Ok(InitiationOutcome::LockBusy);
        }

        let result = self.initiate().await;

        if let Err(e) = self.lock.release(INITIATION_LOCK).await {
            warn!("Failed to release initiation lock: {e}");
        }

        result
    }

    async fn initiate(&self) -> AppResult<InitiationOutcome> {
        // Single-flight rule: any unresolved transfer blocks a new one.
        let outstanding = self.ledger.outstanding().await?;
        if !outstanding.is_empty() {
            info!(
                "⏳ {} transfer(s) still unresolved, waiting before initiating another",
                outstanding.len()
            );
            return Ok(InitiationOutcome::WaitingForResolution);
        }

        let cutoff = Utc::now() - Duration::days(self.lookback_days);
        let mut due = self.tournaments.awaiting_payout(cutoff).await?;
        if due.is_empty() {
            return Ok(InitiationOutcome::NothingToDo);
        }
        let tournament = due.remove(0);

        let confirmed = self.ledger.confirmed_for_tournament(tournament.id).await?;
        let assignments = allocator::allocate(&tournament, &confirmed)?;

        let Some(next) = assignments.into_iter().find(|a| !a.is_paid()) else {
            let message = format!(
                "Tournament '{}' ({}) is flagged as awaiting payout but every slot already \
                 has a confirmed payout - it should have been marked paid",
                tournament.name, tournament.id
            );
            self.notifier.notify_operators(&message).await;
            return Err(SettlementError::InvariantViolation(message).into());
        };

        // Entrants settled in one run are all paid at the same rate.
        let rate = match self.ledger.latest_rate_for_tournament(tournament.id).await? {
            Some(rate) => rate,
            None => self.converter.usd_to_chain_rate().await?,
        };

        let chain_id = self.chain.chain_id().await?;
        let fee_quote = self.fees.quote(chain_id, false).await?;

        let amount_wei = usd_to_wei(next.prize, rate)?;
        let value = wei_to_u256(&amount_wei)?;
        let required = value + fee_quote.gas_budget(TRANSFER_GAS_LIMIT);

        if let Err(err) = self.balance_guard.verify(required).await {
            if let AppError::Settlement(SettlementError::InsufficientFunds { .. }) = &err {
                self.notifier
                    .notify_operators(&format!(
                        "🚨 Cannot initiate payout of ${} to {} for tournament '{}': {err}",
                        next.prize, next.entrant.wallet_address, tournament.name
                    ))
                    .await;
            }
            return Err(err);
        }

        let to = Address::from_str(&next.entrant.wallet_address).map_err(|e| {
            AppError::Internal(format!(
                "Invalid entrant wallet address {}: {e}",
                next.entrant.wallet_address
            ))
        })?;

        let nonce = self.chain.next_nonce().await?;
        let request = TransferRequest {
            to,
            value,
            nonce,
            max_fee_per_gas: fee_quote.max_fee_per_gas,
            max_priority_fee_per_gas: fee_quote.max_priority_fee_per_gas,
        };
        let signed = self.chain.sign_transfer(&request).await?;

        // Persist before broadcast: a crash here leaves a tracked row the
        // confirmation job resolves via not-found semantics, instead of an
        // untracked on-chain transfer.
        let payout = self
            .ledger
            .record_initiated(
                NewPayout {
                    amount_fiat: next.prize,
                    amount_chain: amount_wei,
                    rate,
                    wallet: self.chain.wallet_address().to_string(),
                    destination: next.entrant.wallet_address.clone(),
                    tx_hash: format!("{:#x}", signed.tx_hash),
                    nonce: nonce as i64,
                },
                tournament.id,
            )
            .await?;

        self.chain.broadcast(&signed).await?;

        info!(
            "💸 Initiated payout {} of ${} ({} wei) to {} for tournament '{}' (nonce {}, tx {})",
            payout.id,
            payout.amount_fiat,
            payout.amount_chain,
            payout.destination,
            tournament.name,
            payout.nonce,
            payout.tx_hash
        );

        Ok(InitiationOutcome::Initiated)
    }
}
