use std::str::FromStr;
use std::sync::Arc;

use alloy::primitives::{Address, B256};
use chrono::{Duration, Utc};
use tracing::{debug, info, warn};

use super::balance::BalanceGuard;
use super::ConfirmationOutcome;
use crate::chain::fees::FeeStrategy;
use crate::chain::{wei_to_u256, ChainClient, TransferRequest, TxStatus, TRANSFER_GAS_LIMIT};
use crate::error::{AppError, AppResult, SettlementError};
use crate::ledger::{NewPayout, Payout, PayoutLedger};
use crate::locks::{JobLock, CONFIRMATION_LOCK};
use crate::notify::NotificationSink;
use crate::tournament::TournamentSource;

/// Polls outstanding ledger rows against the chain, promotes them to
/// confirmed/errored, and races stuck transactions with a same-nonce
/// replacement. One state change per run keeps reasoning tractable.
pub struct ConfirmationController {
    ledger: Arc<dyn PayoutLedger>,
    tournaments: Arc<dyn TournamentSource>,
    chain: Arc<dyn ChainClient>,
    fees: Arc<dyn FeeStrategy>,
    notifier: Arc<dyn NotificationSink>,
    lock: Arc<dyn JobLock>,
    balance_guard: BalanceGuard,
    staleness_minutes: i64,
    explorer_base_url: String,
}

impl ConfirmationController {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        ledger: Arc<dyn PayoutLedger>,
        tournaments: Arc<dyn TournamentSource>,
        chain: Arc<dyn ChainClient>,
        fees: Arc<dyn FeeStrategy>,
        notifier: Arc<dyn NotificationSink>,
        lock: Arc<dyn JobLock>,
        staleness_minutes: i64,
        explorer_base_url: String,
    ) -> Self {
        let balance_guard = BalanceGuard::new(chain.clone());
        Self {
            ledger,
            tournaments,
            chain,
            fees,
            notifier,
            lock,
            balance_guard,
            staleness_minutes,
            explorer_base_url,
        }
    }

    pub async fn run(&self) -> AppResult<ConfirmationOutcome> {
        if !self.lock.try_acquire(CONFIRMATION_LOCK).await? {
            debug!("Confirmation already running elsewhere, skipping");
            return Ok(ConfirmationOutcome::LockBusy);
        }

        let result = self.confirm().await;

        if let Err(e) = self.lock.release(CONFIRMATION_LOCK).await {
            warn!("Failed to release confirmation lock: {e}");
        }

        result
    }

    async fn confirm(&self) -> AppResult<ConfirmationOutcome> {
        // Newest first: a speed-up creates a newer row sharing the older
        // row's nonce, and whichever the chain included must be detected
        // regardless of which was broadcast first.
        let rows = self.ledger.outstanding().await?;
        if rows.is_empty() {
            return Ok(ConfirmationOutcome::NothingToDo);
        }

        let now = Utc::now();

        for row in &rows {
            let tx_hash = B256::from_str(&row.tx_hash).map_err(|e| {
                AppError::Internal(format!("Ledger row {} has bad tx hash: {e}", row.id))
            })?;

            let status = match self.chain.transaction_status(tx_hash).await {
                Ok(status) => status,
                Err(e) => {
                    // A timed-out poll counts as pending for this cycle.
                    warn!("Poll for {} failed, retrying next run: {e}", row.tx_hash);
                    return Ok(ConfirmationOutcome::PayoutPending);
                }
            };

            match status {
                TxStatus::NotFound => return self.resolve_dropped(row).await,
                TxStatus::Included => return self.resolve_included(row).await,
                TxStatus::Pending => {
                    if row.age(now) < Duration::minutes(self.staleness_minutes) {
                        return Ok(ConfirmationOutcome::PayoutPending);
                    }

                    let sibling = self
                        .ledger
                        .initiated_sibling(&row.wallet, row.nonce, row.id)
                        .await?;
                    if sibling.is_some() {
                        // Already raced. Keep scanning: the replacement's own
                        // fate must be observed too.
                        continue;
                    }

                    self.speed_up(row).await?;
                    return Ok(ConfirmationOutcome::SpeedUpIssued);
                }
            }
        }

        Ok(ConfirmationOutcome::AlreadySpedUp)
    }

    /// The node never saw the hash: the broadcast was dropped. The row is
    /// closed out as errored; the next initiation run re-attempts the
    /// obligation with a fresh row and nonce.
    async fn resolve_dropped(&self, row: &Payout) -> AppResult<ConfirmationOutcome> {
        self.ledger.mark_errored(row.id).await?;

        self.notifier
            .notify_operators(&format!(
                "❌ Payout {} (tx {}) was never seen by the chain and has been marked \
                 errored; it will be re-attempted on the next initiation run",
                row.id, row.tx_hash
            ))
            .await;

        Ok(ConfirmationOutcome::ErrorDetected)
    }

    async fn resolve_included(&self, row: &Payout) -> AppResult<ConfirmationOutcome> {
        let sibling = self
            .ledger
            .initiated_sibling(&row.wallet, row.nonce, row.id)
            .await?;

        let tournament_id = self.ledger.tournament_id_for_payout(row.id).await?;
        let tournament = self.tournaments.tournament(tournament_id).await?;

        let confirmed_before = self.ledger.confirmed_count(tournament_id).await?;
        let fully_paid = confirmed_before + 1 == tournament.payout_slots as i64;

        self.ledger
            .confirm_payout(
                row.id,
                sibling.as_ref().map(|s| s.id),
                fully_paid.then_some(tournament_id),
            )
            .await?;

        info!(
            "✅ Payout {} confirmed (tx {}, nonce {})",
            row.id, row.tx_hash, row.nonce
        );
        if let Some(sibling) = &sibling {
            info!(
                "🏁 Sibling payout {} lost the nonce race and was superseded",
                sibling.id
            );
        }
        if fully_paid {
            info!(
                "🏆 Tournament '{}' is now fully paid ({} slots)",
                tournament.name, tournament.payout_slots
            );
        }

        // Explicit, synchronous notify after the commit; best-effort.
        if let Some(entrant) = tournament
            .entrant_ranking
            .iter()
            .find(|e| e.wallet_address == row.destination)
        {
            let url = format!("{}/tx/{}", self.explorer_base_url, row.tx_hash);
            self.notifier
                .notify_user(
                    entrant.user_id,
                    "Prize payout sent",
                    &format!(
                        "Your ${} prize for '{}' has been paid out on-chain.",
                        row.amount_fiat, tournament.name
                    ),
                    &url,
                )
                .await;
        }

        Ok(ConfirmationOutcome::Confirmed)
    }

    /// Race a stuck transfer with a same-nonce replacement at an urgent fee
    /// ceiling. The stuck row stays Initiated; whichever transaction the
    /// chain includes resolves the sibling pair on a later confirmation run.
    async fn speed_up(&self, stuck: &Payout) -> AppResult<Payout> {
        let chain_id = self.chain.chain_id().await?;
        let fee_quote = self.fees.quote(chain_id, true).await?;

        let value = wei_to_u256(&stuck.amount_chain)?;
        let required = value + fee_quote.gas_budget(TRANSFER_GAS_LIMIT);

        if let Err(err) = self.balance_guard.verify(required).await {
            if let AppError::Settlement(SettlementError::InsufficientFunds { .. }) = &err {
                // A stuck, underfunded wallet is an operational emergency.
                self.notifier
                    .notify_operators(&format!(
                        "🚨 Payout {} (tx {}) is stuck and the wallet cannot fund a \
                         replacement: {err}",
                        stuck.id, stuck.tx_hash
                    ))
                    .await;
            }
            return Err(err);
        }

        let to = Address::from_str(&stuck.destination).map_err(|e| {
            AppError::Internal(format!(
                "Ledger row {} has bad destination {}: {e}",
                stuck.id, stuck.destination
            ))
        })?;

        let request = TransferRequest {
            to,
            value,
            nonce: stuck.nonce as u64,
            max_fee_per_gas: fee_quote.max_fee_per_gas,
            max_priority_fee_per_gas: fee_quote.max_priority_fee_per_gas,
        };
        let signed = self.chain.sign_transfer(&request).await?;

        let tournament_id = self.ledger.tournament_id_for_payout(stuck.id).await?;

        let replacement = self
            .ledger
            .record_initiated(
                NewPayout {
                    amount_fiat: stuck.amount_fiat,
                    amount_chain: stuck.amount_chain,
                    rate: stuck.rate,
                    wallet: stuck.wallet.clone(),
                    destination: stuck.destination.clone(),
                    tx_hash: format!("{:#x}", signed.tx_hash),
                    nonce: stuck.nonce,
                },
                tournament_id,
            )
            .await?;

        self.chain.broadcast(&signed).await?;

        self.notifier
            .notify_operators(&format!(
                "🏎️ Speed-up issued for stuck payout {}: replacement {} re-uses nonce {} \
                 with a higher fee ceiling (tx {})",
                stuck.id, replacement.id, stuck.nonce, replacement.tx_hash
            ))
            .await;

        Ok(replacement)
    }
}
