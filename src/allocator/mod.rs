use rust_decimal::Decimal;

use crate::error::{AppResult, SettlementError};
use crate::ledger::Payout;
use crate::tournament::{Entrant, Tournament};

/// One tournament obligation: a prize, the entrant owed it, and the
/// confirmed payout already covering it, if any.
#[derive(Debug, Clone)]
pub struct PrizeAssignment {
    pub entrant: Entrant,
    pub prize: Decimal,
    pub existing_payout: Option<Payout>,
}

impl PrizeAssignment {
    pub fn is_paid(&self) -> bool {
        self.existing_payout.is_some()
    }
}

/// Pairs the i-th highest prize with the i-th best-placed entrant and
/// cross-references confirmed payouts so callers always discover the
/// highest-value unpaid obligation first.
///
/// Each confirmed payout covers at most one assignment, matched by
/// destination wallet.
pub fn allocate(
    tournament: &Tournament,
    confirmed_payouts: &[Payout],
) -> AppResult<Vec<PrizeAssignment>> {
    let mut breakdown = tournament.payout_breakdown.clone();
    breakdown.sort_by(|a, b| b.cmp(a));

    if tournament.entrant_ranking.len() < breakdown.len() {
        return Err(SettlementError::RankingTooShort {
            payout_slots: breakdown.len(),
            ranked: tournament.entrant_ranking.len(),
        }
        .into());
    }

    let mut unclaimed: Vec<&Payout> = confirmed_payouts.iter().collect();

    let assignments = breakdown
        .into_iter()
        .zip(tournament.entrant_ranking.iter())
        .map(|(prize, entrant)| {
            let existing = unclaimed
                .iter()
                .position(|p| p.destination == entrant.wallet_address)
                .map(|idx| unclaimed.swap_remove(idx).clone());

            PrizeAssignment {
                entrant: entrant.clone(),
                prize,
                existing_payout: existing,
            }
        })
        .collect();

    Ok(assignments)
}
