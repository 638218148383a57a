use async_trait::async_trait;
use rust_decimal::Decimal;
use sqlx::PgPool;
use uuid::Uuid;

use super::models::{NewPayout, Payout, PayoutStatus};
use crate::error::{AppError, AppResult, SettlementError};

const PAYOUT_COLUMNS: &str =
    "id, amount_fiat, amount_chain, rate, wallet, destination, status, tx_hash, nonce, created_at";

/// Durable record of every disbursement attempt. Owned exclusively by the
/// settlement engine: rows are appended by initiation/speed-up and mutated
/// (status only) by confirmation. Nothing is ever deleted.
#[async_trait]
pub trait PayoutLedger: Send + Sync {
    /// Persist a new Payout row (Initiated) together with its
    /// TournamentPayout link, as one atomic unit.
    async fn record_initiated(&self, new: NewPayout, tournament_id: Uuid) -> AppResult<Payout>;

    /// All Initiated rows, newest first.
    async fn outstanding(&self) -> AppResult<Vec<Payout>>;

    /// Confirmed payouts linked to a tournament.
    async fn confirmed_for_tournament(&self, tournament_id: Uuid) -> AppResult<Vec<Payout>>;

    /// Count of confirmed payout slots for a tournament.
    async fn confirmed_count(&self, tournament_id: Uuid) -> AppResult<i64>;

    /// Conversion rate used by the most recent payout recorded for a
    /// tournament, so every entrant of one settlement run is paid at the
    /// same rate.
    async fn latest_rate_for_tournament(&self, tournament_id: Uuid)
        -> AppResult<Option<Decimal>>;

    /// The other Initiated row sharing (wallet, nonce), if one exists.
    async fn initiated_sibling(
        &self,
        wallet: &str,
        nonce: i64,
        excluding: Uuid,
    ) -> AppResult<Option<Payout>>;

    /// Tournament this broadcast attempt was intended to satisfy.
    async fn tournament_id_for_payout(&self, payout_id: Uuid) -> AppResult<Uuid>;

    /// Initiated -> Errored, after the chain reported the hash unknown.
    async fn mark_errored(&self, payout_id: Uuid) -> AppResult<()>;

    /// Initiated -> Confirmed, superseding the same-nonce sibling and
    /// optionally flagging the parent tournament fully paid, all in one
    /// transaction.
    async fn confirm_payout(
        &self,
        payout_id: Uuid,
        superseded_sibling: Option<Uuid>,
        mark_tournament_paid: Option<Uuid>,
    ) -> AppResult<()>;
}

/// Postgres-backed ledger - the source of truth for all settlement state
pub struct PgPayoutLedger {
    pool: PgPool,
}

impl PgPayoutLedger {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl PayoutLedger for PgPayoutLedger {
    async fn record_initiated(&self, new: NewPayout, tournament_id: Uuid) -> AppResult<Payout> {
        let mut tx = self.pool.begin().await?;

        let payout = sqlx::query_as::<_, Payout>(
            r#"
            INSERT INTO payouts (amount_fiat, amount_chain, rate, wallet, destination, status, tx_hash, nonce)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            RETURNING id, amount_fiat, amount_chain, rate, wallet, destination, status, tx_hash, nonce, created_at
            "#,
        )
        .bind(new.amount_fiat)
        .bind(new.amount_chain)
        .bind(new.rate)
        .bind(&new.wallet)
        .bind(&new.destination)
        .bind(PayoutStatus::Initiated)
        .bind(&new.tx_hash)
        .bind(new.nonce)
        .fetch_one(&mut *tx)
        .await?;

        sqlx::query(
            r#"
            INSERT INTO tournament_payouts (tournament_id, payout_id)
            VALUES ($1, $2)
            "#,
        )
        .bind(tournament_id)
        .bind(payout.id)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;

        Ok(payout)
    }

    async fn outstanding(&self) -> AppResult<Vec<Payout>> {
        let rows = sqlx::query_as::<_, Payout>(&format!(
            "SELECT {PAYOUT_COLUMNS} FROM payouts WHERE status = $1 ORDER BY created_at DESC"
        ))
        .bind(PayoutStatus::Initiated)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows)
    }

    async fn confirmed_for_tournament(&self, tournament_id: Uuid) -> AppResult<Vec<Payout>> {
        let rows = sqlx::query_as::<_, Payout>(
            r#"
            SELECT p.id, p.amount_fiat, p.amount_chain, p.rate, p.wallet, p.destination,
                   p.status, p.tx_hash, p.nonce, p.created_at
            FROM payouts p
            INNER JOIN tournament_payouts tp ON tp.payout_id = p.id
            WHERE tp.tournament_id = $1 AND p.status = $2
            ORDER BY p.created_at ASC
            "#,
        )
        .bind(tournament_id)
        .bind(PayoutStatus::Confirmed)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows)
    }

    async fn confirmed_count(&self, tournament_id: Uuid) -> AppResult<i64> {
        let count: i64 = sqlx::query_scalar(
            r#"
            SELECT COUNT(*)
            FROM tournament_payouts tp
            INNER JOIN payouts p ON p.id = tp.payout_id
            WHERE tp.tournament_id = $1 AND p.status = $2
            "#,
        )
        .bind(tournament_id)
        .bind(PayoutStatus::Confirmed)
        .fetch_one(&self.pool)
        .await?;

        Ok(count)
    }

    async fn latest_rate_for_tournament(
        &self,
        tournament_id: Uuid,
    ) -> AppResult<Option<Decimal>> {
        let rate: Option<Decimal> = sqlx::query_scalar(
            r#"
            SELECT p.rate
            FROM payouts p
            INNER JOIN tournament_payouts tp ON tp.payout_id = p.id
            WHERE tp.tournament_id = $1
            ORDER BY p.created_at DESC
            LIMIT 1
            "#,
        )
        .bind(tournament_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(rate)
    }

    async fn initiated_sibling(
        &self,
        wallet: &str,
        nonce: i64,
        excluding: Uuid,
    ) -> AppResult<Option<Payout>> {
        let row = sqlx::query_as::<_, Payout>(&format!(
            r#"
            SELECT {PAYOUT_COLUMNS} FROM payouts
            WHERE wallet = $1 AND nonce = $2 AND status = $3 AND id <> $4
            ORDER BY created_at DESC
            LIMIT 1
            "#
        ))
        .bind(wallet)
        .bind(nonce)
        .bind(PayoutStatus::Initiated)
        .bind(excluding)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row)
    }

    async fn tournament_id_for_payout(&self, payout_id: Uuid) -> AppResult<Uuid> {
        let tournament_id: Option<Uuid> = sqlx::query_scalar(
            "SELECT tournament_id FROM tournament_payouts WHERE payout_id = $1",
        )
        .bind(payout_id)
        .fetch_optional(&self.pool)
        .await?;

        tournament_id
            .ok_or_else(|| AppError::NotFound(format!("No tournament link for payout {payout_id}")))
    }

    async fn mark_errored(&self, payout_id: Uuid) -> AppResult<()> {
        let result = sqlx::query("UPDATE payouts SET status = $2 WHERE id = $1 AND status = $3")
            .bind(payout_id)
            .bind(PayoutStatus::Errored)
            .bind(PayoutStatus::Initiated)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(SettlementError::InvariantViolation(format!(
                "payout {payout_id} was not in Initiated state when marked errored"
            ))
            .into());
        }

        Ok(())
    }

    async fn confirm_payout(
        &self,
        payout_id: Uuid,
        superseded_sibling: Option<Uuid>,
        mark_tournament_paid: Option<Uuid>,
    ) -> AppResult<()> {
        let mut tx = self.pool.begin().await?;

        let confirmed =
            sqlx::query("UPDATE payouts SET status = $2 WHERE id = $1 AND status = $3")
                .bind(payout_id)
                .bind(PayoutStatus::Confirmed)
                .bind(PayoutStatus::Initiated)
                .execute(&mut *tx)
                .await?;

        if confirmed.rows_affected() == 0 {
            return Err(SettlementError::InvariantViolation(format!(
                "payout {payout_id} was not in Initiated state when confirmed"
            ))
            .into());
        }

        if let Some(sibling_id) = superseded_sibling {
            sqlx::query("UPDATE payouts SET status = $2 WHERE id = $1 AND status = $3")
                .bind(sibling_id)
                .bind(PayoutStatus::Superseded)
                .bind(PayoutStatus::Initiated)
                .execute(&mut *tx)
                .await?;
        }

        if let Some(tournament_id) = mark_tournament_paid {
            sqlx::query("UPDATE tournaments SET paid_out = TRUE WHERE id = $1")
                .bind(tournament_id)
                .execute(&mut *tx)
                .await?;
        }

        tx.commit().await?;

        Ok(())
    }
}
