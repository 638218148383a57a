// In-memory doubles for the settlement engine's collaborator seams.
//
// MemoryStore is both the payout ledger and the tournament source, backed by
// plain vectors, so job semantics can be exercised without Postgres.
// MockChain scripts inclusion status per transaction hash and derives
// deterministic signing hashes, so a fee bump yields a fresh hash the way a
// re-signed transaction does.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use alloy::primitives::{keccak256, Address, B256, U256};
use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use parking_lot::Mutex;
use rust_decimal::Decimal;
use uuid::Uuid;

use tournament_settlement::chain::fees::{FeeQuote, FeeStrategy};
use tournament_settlement::chain::{ChainClient, SignedTransfer, TransferRequest, TxStatus};
use tournament_settlement::error::{AppError, AppResult, SettlementError};
use tournament_settlement::ledger::{NewPayout, Payout, PayoutLedger, PayoutStatus};
use tournament_settlement::locks::JobLock;
use tournament_settlement::notify::NotificationSink;
use tournament_settlement::rates::CurrencyConverter;
use tournament_settlement::tournament::{Tournament, TournamentSource};

pub fn addr(byte: u8) -> String {
    Address::repeat_byte(byte).to_string()
}

#[derive(Default)]
pub struct MemoryStore {
    payouts: Mutex<Vec<Payout>>,
    links: Mutex<Vec<(Uuid, Uuid)>>, // (tournament_id, payout_id)
    tournaments: Mutex<Vec<Tournament>>,
}

impl MemoryStore {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn add_tournament(&self, tournament: Tournament) {
        self.tournaments.lock().push(tournament);
    }

    pub fn payouts(&self) -> Vec<Payout> {
        self.payouts.lock().clone()
    }

    pub fn tournament_paid(&self, id: Uuid) -> bool {
        self.tournaments
            .lock()
            .iter()
            .find(|t| t.id == id)
            .map(|t| t.paid_out)
            .unwrap_or(false)
    }

    /// Shift a payout's creation time into the past, for staleness checks
    pub fn backdate(&self, payout_id: Uuid, minutes: i64) {
        let mut payouts = self.payouts.lock();
        let row = payouts
            .iter_mut()
            .find(|p| p.id == payout_id)
            .expect("backdate of unknown payout");
        row.created_at = Utc::now() - Duration::minutes(minutes);
    }

    pub fn count_with_status(&self, status: PayoutStatus) -> usize {
        self.payouts
            .lock()
            .iter()
            .filter(|p| p.status == status)
            .count()
    }
}

#[async_trait]
impl PayoutLedger for MemoryStore {
    async fn record_initiated(&self, new: NewPayout, tournament_id: Uuid) -> AppResult<Payout> {
        let payout = Payout {
            id: Uuid::new_v4(),
            amount_fiat: new.amount_fiat,
            amount_chain: new.amount_chain,
            rate: new.rate,
            wallet: new.wallet,
            destination: new.destination,
            status: PayoutStatus::Initiated,
            tx_hash: new.tx_hash,
            nonce: new.nonce,
            created_at: Utc::now(),
        };

        self.payouts.lock().push(payout.clone());
        self.links.lock().push((tournament_id, payout.id));

        Ok(payout)
    }

    async fn outstanding(&self) -> AppResult<Vec<Payout>> {
        // Insertion order is creation order; newest first
        Ok(self
            .payouts
            .lock()
            .iter()
            .rev()
            .filter(|p| p.status == PayoutStatus::Initiated)
            .cloned()
            .collect())
    }

    async fn confirmed_for_tournament(&self, tournament_id: Uuid) -> AppResult<Vec<Payout>> {
        let links = self.links.lock();
        let linked: HashSet<Uuid> = links
            .iter()
            .filter(|(t, _)| *t == tournament_id)
            .map(|(_, p)| *p)
            .collect();

        Ok(self
            .payouts
            .lock()
            .iter()
            .filter(|p| p.status == PayoutStatus::Confirmed && linked.contains(&p.id))
            .cloned()
            .collect())
    }

    async fn confirmed_count(&self, tournament_id: Uuid) -> AppResult<i64> {
        Ok(self.confirmed_for_tournament(tournament_id).await?.len() as i64)
    }

    async fn latest_rate_for_tournament(
        &self,
        tournament_id: Uuid,
    ) -> AppResult<Option<Decimal>> {
        let links = self.links.lock();
        let linked: HashSet<Uuid> = links
            .iter()
            .filter(|(t, _)| *t == tournament_id)
            .map(|(_, p)| *p)
            .collect();

        Ok(self
            .payouts
            .lock()
            .iter()
            .rev()
            .find(|p| linked.contains(&p.id))
            .map(|p| p.rate))
    }

    async fn initiated_sibling(
        &self,
        wallet: &str,
        nonce: i64,
        excluding: Uuid,
    ) -> AppResult<Option<Payout>> {
        Ok(self
            .payouts
            .lock()
            .iter()
            .rev()
            .find(|p| {
                p.wallet == wallet
                    && p.nonce == nonce
                    && p.status == PayoutStatus::Initiated
                    && p.id != excluding
            })
            .cloned())
    }

    async fn tournament_id_for_payout(&self, payout_id: Uuid) -> AppResult<Uuid> {
        self.links
            .lock()
            .iter()
            .find(|(_, p)| *p == payout_id)
            .map(|(t, _)| *t)
            .ok_or_else(|| AppError::NotFound(format!("No tournament link for payout {payout_id}")))
    }

    async fn mark_errored(&self, payout_id: Uuid) -> AppResult<()> {
        let mut payouts = self.payouts.lock();
        let row = payouts
            .iter_mut()
            .find(|p| p.id == payout_id && p.status == PayoutStatus::Initiated)
            .ok_or_else(|| {
                AppError::from(SettlementError::InvariantViolation(format!(
                    "payout {payout_id} was not in Initiated state when marked errored"
                )))
            })?;
        row.status = PayoutStatus::Errored;
        Ok(())
    }

    async fn confirm_payout(
        &self,
        payout_id: Uuid,
        superseded_sibling: Option<Uuid>,
        mark_tournament_paid: Option<Uuid>,
    ) -> AppResult<()> {
        {
            let mut payouts = self.payouts.lock();

            let row = payouts
                .iter_mut()
                .find(|p| p.id == payout_id && p.status == PayoutStatus::Initiated)
                .ok_or_else(|| {
                    AppError::from(SettlementError::InvariantViolation(format!(
                        "payout {payout_id} was not in Initiated state when confirmed"
                    )))
                })?;
            row.status = PayoutStatus::Confirmed;

            if let Some(sibling_id) = superseded_sibling {
                if let Some(sibling) = payouts
                    .iter_mut()
                    .find(|p| p.id == sibling_id && p.status == PayoutStatus::Initiated)
                {
                    sibling.status = PayoutStatus::Superseded;
                }
            }
        }

        if let Some(tournament_id) = mark_tournament_paid {
            let mut tournaments = self.tournaments.lock();
            if let Some(t) = tournaments.iter_mut().find(|t| t.id == tournament_id) {
                t.paid_out = true;
            }
        }

        Ok(())
    }
}

#[async_trait]
impl TournamentSource for MemoryStore {
    async fn awaiting_payout(&self, cutoff: DateTime<Utc>) -> AppResult<Vec<Tournament>> {
        let mut due: Vec<Tournament> = self
            .tournaments
            .lock()
            .iter()
            .filter(|t| !t.paid_out && t.completed_at >= cutoff)
            .cloned()
            .collect();
        due.sort_by_key(|t| t.completed_at);
        Ok(due)
    }

    async fn tournament(&self, id: Uuid) -> AppResult<Tournament> {
        self.tournaments
            .lock()
            .iter()
            .find(|t| t.id == id)
            .cloned()
            .ok_or_else(|| AppError::NotFound(format!("Tournament not found: {id}")))
    }
}

pub struct MockChain {
    address: Address,
    chain_id: u64,
    next_nonce: Mutex<u64>,
    balance: Mutex<U256>,
    statuses: Mutex<HashMap<B256, TxStatus>>,
    poll_failures: Mutex<HashSet<B256>>,
    broadcasts: Mutex<Vec<B256>>,
}

impl MockChain {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            address: Address::repeat_byte(0x11),
            chain_id: 1,
            next_nonce: Mutex::new(0),
            balance: Mutex::new(U256::from(10u128.pow(19))), // 10 native units
            statuses: Mutex::new(HashMap::new()),
            poll_failures: Mutex::new(HashSet::new()),
            broadcasts: Mutex::new(Vec::new()),
        })
    }

    pub fn set_balance(&self, balance: U256) {
        *self.balance.lock() = balance;
    }

    pub fn set_status(&self, tx_hash: &str, status: TxStatus) {
        let hash: B256 = tx_hash.parse().expect("bad tx hash in test");
        self.statuses.lock().insert(hash, status);
    }

    pub fn broadcast_count(&self) -> usize {
        self.broadcasts.lock().len()
    }

    /// Make the next status poll for this hash fail, like an RPC timeout
    pub fn fail_next_poll(&self, tx_hash: &str) {
        let hash: B256 = tx_hash.parse().expect("bad tx hash in test");
        self.poll_failures.lock().insert(hash);
    }
}

#[async_trait]
impl ChainClient for MockChain {
    fn wallet_address(&self) -> Address {
        self.address
    }

    async fn chain_id(&self) -> AppResult<u64> {
        Ok(self.chain_id)
    }

    async fn next_nonce(&self) -> AppResult<u64> {
        Ok(*self.next_nonce.lock())
    }

    async fn balance(&self) -> AppResult<U256> {
        Ok(*self.balance.lock())
    }

    async fn sign_transfer(&self, request: &TransferRequest) -> AppResult<SignedTransfer> {
        // Hash over every signed field, like a real signature: a fee bump on
        // the same nonce produces a different hash
        let preimage = format!(
            "{}:{}:{}:{}:{}",
            request.to, request.value, request.nonce, request.max_fee_per_gas,
            request.max_priority_fee_per_gas
        );
        let tx_hash = keccak256(preimage.as_bytes());

        Ok(SignedTransfer {
            tx_hash,
            raw: tx_hash.to_vec(),
            nonce: request.nonce,
        })
    }

    async fn broadcast(&self, signed: &SignedTransfer) -> AppResult<B256> {
        self.broadcasts.lock().push(signed.tx_hash);

        // The mempool knows the hash from here on, unless a test scripts
        // otherwise
        self.statuses
            .lock()
            .entry(signed.tx_hash)
            .or_insert(TxStatus::Pending);

        let mut next = self.next_nonce.lock();
        if signed.nonce >= *next {
            *next = signed.nonce + 1;
        }

        Ok(signed.tx_hash)
    }

    async fn transaction_status(&self, tx_hash: B256) -> AppResult<TxStatus> {
        if self.poll_failures.lock().remove(&tx_hash) {
            return Err(AppError::Chain("RPC request timed out".to_string()));
        }

        Ok(self
            .statuses
            .lock()
            .get(&tx_hash)
            .copied()
            .unwrap_or(TxStatus::NotFound))
    }
}

pub struct StaticFees {
    pub quote: FeeQuote,
    pub urgent_multiplier_percent: u64,
}

impl StaticFees {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            quote: FeeQuote {
                max_fee_per_gas: 30_000_000_000,
                max_priority_fee_per_gas: 1_000_000_000,
            },
            urgent_multiplier_percent: 200,
        })
    }
}

#[async_trait]
impl FeeStrategy for StaticFees {
    async fn quote(&self, _chain_id: u64, urgent: bool) -> AppResult<FeeQuote> {
        if urgent {
            let m = self.urgent_multiplier_percent as u128;
            Ok(FeeQuote {
                max_fee_per_gas: self.quote.max_fee_per_gas * m / 100,
                max_priority_fee_per_gas: self.quote.max_priority_fee_per_gas * m / 100,
            })
        } else {
            Ok(self.quote)
        }
    }
}

pub struct StaticRate(pub Decimal);

#[async_trait]
impl CurrencyConverter for StaticRate {
    async fn usd_to_chain_rate(&self) -> AppResult<Decimal> {
        Ok(self.0)
    }
}

#[derive(Default)]
pub struct MemoryLock {
    held: Mutex<HashSet<String>>,
}

impl MemoryLock {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Pre-hold a lock, simulating another instance mid-run
    pub fn hold(&self, key: &str) {
        self.held.lock().insert(key.to_string());
    }
}

#[async_trait]
impl JobLock for MemoryLock {
    async fn try_acquire(&self, key: &str) -> AppResult<bool> {
        Ok(self.held.lock().insert(key.to_string()))
    }

    async fn release(&self, key: &str) -> AppResult<()> {
        self.held.lock().remove(key);
        Ok(())
    }
}

#[derive(Default)]
pub struct RecordingNotifier {
    ops: Mutex<Vec<String>>,
    users: Mutex<Vec<(Uuid, String)>>,
}

impl RecordingNotifier {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn ops_messages(&self) -> Vec<String> {
        self.ops.lock().clone()
    }

    pub fn user_messages(&self) -> Vec<(Uuid, String)> {
        self.users.lock().clone()
    }
}

#[async_trait]
impl NotificationSink for RecordingNotifier {
    async fn notify_operators(&self, message: &str) {
        self.ops.lock().push(message.to_string());
    }

    async fn notify_user(&self, user_id: Uuid, title: &str, body: &str, url: &str) {
        self.users
            .lock()
            .push((user_id, format!("{title}: {body} {url}")));
    }
}
