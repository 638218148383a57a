use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::{prelude::FromRow, Type};
use uuid::Uuid;

/// Payout lifecycle status
///
/// One row per broadcast attempt, never per logical payment. Initiated and
/// Errored are transient; Confirmed and Superseded are terminal. Rows are
/// never deleted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Type)]
#[sqlx(type_name = "payout_status", rename_all = "lowercase")]
pub enum PayoutStatus {
    Initiated,
    Confirmed,
    Superseded,
    Errored,
}

impl PayoutStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, PayoutStatus::Confirmed | PayoutStatus::Superseded)
    }
}

/// Payout entity - one broadcast attempt on the ledger
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Payout {
    pub id: Uuid,

    /// Prize value in fiat (USD)
    pub amount_fiat: Decimal,
    /// Transfer value in chain base units (wei), stored as an integral NUMERIC
    pub amount_chain: Decimal,
    /// Fiat -> chain conversion rate used (native units per 1 USD)
    pub rate: Decimal,

    /// Operating wallet the transfer was sent from
    pub wallet: String,
    /// Entrant wallet the transfer pays
    pub destination: String,

    pub status: PayoutStatus,
    pub tx_hash: String,
    pub nonce: i64,
    pub created_at: DateTime<Utc>,
}

impl Payout {
    /// Age of the broadcast attempt, for staleness checks
    pub fn age(&self, now: DateTime<Utc>) -> chrono::Duration {
        now - self.created_at
    }
}

/// Fields of a Payout row about to be recorded
#[derive(Debug, Clone)]
pub struct NewPayout {
    pub amount_fiat: Decimal,
    pub amount_chain: Decimal,
    pub rate: Decimal,
    pub wallet: String,
    pub destination: String,
    pub tx_hash: String,
    pub nonce: i64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn terminal_statuses() {
        assert!(!PayoutStatus::Initiated.is_terminal());
        assert!(!PayoutStatus::Errored.is_terminal());
        assert!(PayoutStatus::Confirmed.is_terminal());
        assert!(PayoutStatus::Superseded.is_terminal());
    }
}
