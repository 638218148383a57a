use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use uuid::Uuid;

use crate::error::{AppError, AppResult};

/// One ranked entrant of a finished tournament. Index 0 is the winner.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Entrant {
    pub user_id: Uuid,
    pub wallet_address: String,
}

/// Read-only view of a finished tournament as the settlement engine sees it:
/// a payout breakdown, an entrant ranking and a paid flag the engine sets
/// once every slot has a confirmed payout.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Tournament {
    pub id: Uuid,
    pub name: String,
    /// Fiat prize amounts, one per payout slot
    pub payout_breakdown: Vec<Decimal>,
    /// Entrants by final placement, best first
    pub entrant_ranking: Vec<Entrant>,
    pub payout_slots: i32,
    pub paid_out: bool,
    pub completed_at: DateTime<Utc>,
}

/// Tournament collaborator contract
#[async_trait]
pub trait TournamentSource: Send + Sync {
    /// Finished, unpaid tournaments completed at or after the cutoff,
    /// oldest first.
    async fn awaiting_payout(&self, cutoff: DateTime<Utc>) -> AppResult<Vec<Tournament>>;

    async fn tournament(&self, id: Uuid) -> AppResult<Tournament>;
}

pub struct PgTournamentSource {
    pool: PgPool,
}

impl PgTournamentSource {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(sqlx::FromRow)]
struct TournamentRow {
    id: Uuid,
    name: String,
    payout_breakdown: serde_json::Value,
    entrant_ranking: serde_json::Value,
    payout_slots: i32,
    paid_out: bool,
    completed_at: DateTime<Utc>,
}

impl TryFrom<TournamentRow> for Tournament {
    type Error = AppError;

    fn try_from(row: TournamentRow) -> AppResult<Self> {
        Ok(Tournament {
            id: row.id,
            name: row.name,
            payout_breakdown: serde_json::from_value(row.payout_breakdown)?,
            entrant_ranking: serde_json::from_value(row.entrant_ranking)?,
            payout_slots: row.payout_slots,
            paid_out: row.paid_out,
            completed_at: row.completed_at,
        })
    }
}

#[async_trait]
impl TournamentSource for PgTournamentSource {
    async fn awaiting_payout(&self, cutoff: DateTime<Utc>) -> AppResult<Vec<Tournament>> {
        let rows = sqlx::query_as::<_, TournamentRow>(
            r#"
            SELECT id, name, payout_breakdown, entrant_ranking, payout_slots, paid_out, completed_at
            FROM tournaments
            WHERE paid_out = FALSE AND completed_at IS NOT NULL AND completed_at >= $1
            ORDER BY completed_at ASC
            "#,
        )
        .bind(cutoff)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(Tournament::try_from).collect()
    }

    async fn tournament(&self, id: Uuid) -> AppResult<Tournament> {
        let row = sqlx::query_as::<_, TournamentRow>(
            r#"
            SELECT id, name, payout_breakdown, entrant_ranking, payout_slots, paid_out, completed_at
            FROM tournaments
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Tournament not found: {id}")))?;

        Tournament::try_from(row)
    }
}
