// Payout settlement jobs: initiation, confirmation, balance monitoring.
//
// Each job is stateless, invoked on its own interval, and self-excluding via
// a named non-blocking lock. Transient conditions are outcome codes, never
// errors.

pub mod balance;
pub mod confirmation;
pub mod initiation;
pub mod scheduler;

use std::fmt;

/// Outcome of one initiation run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InitiationOutcome {
    /// Another instance already holds the initiation lock
    LockBusy,
    NothingToDo,
    /// An earlier transfer is still outstanding; nonce ordering forbids a
    /// new broadcast until it resolves
    WaitingForResolution,
    Initiated,
}

/// Outcome of one confirmation run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfirmationOutcome {
    LockBusy,
    NothingToDo,
    Confirmed,
    PayoutPending,
    SpeedUpIssued,
    /// Every stale row under review already has its replacement in flight
    AlreadySpedUp,
    ErrorDetected,
}

/// Outcome of one balance-check run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BalanceCheckOutcome {
    LockBusy,
    NothingToPayOut,
    NotEnoughBalance,
    EnoughBalance,
}

impl fmt::Display for InitiationOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            InitiationOutcome::LockBusy => "LOCK_BUSY",
            InitiationOutcome::NothingToDo => "NOTHING_TO_DO",
            InitiationOutcome::WaitingForResolution => "WAITING_FOR_RESOLUTION",
            InitiationOutcome::Initiated => "INITIATED",
        };
        write!(f, "{s}")
    }
}

impl fmt::Display for ConfirmationOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ConfirmationOutcome::LockBusy => "LOCK_BUSY",
            ConfirmationOutcome::NothingToDo => "NOTHING_TO_DO",
            ConfirmationOutcome::Confirmed => "CONFIRMED",
            ConfirmationOutcome::PayoutPending => "PAYOUT_PENDING",
            ConfirmationOutcome::SpeedUpIssued => "SPEED_UP_ISSUED",
            ConfirmationOutcome::AlreadySpedUp => "ALREADY_SPED_UP",
            ConfirmationOutcome::ErrorDetected => "ERROR_DETECTED",
        };
        write!(f, "{s}")
    }
}

impl fmt::Display for BalanceCheckOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            BalanceCheckOutcome::LockBusy => "LOCK_BUSY",
            BalanceCheckOutcome::NothingToPayOut => "NOTHING_TO_PAY_OUT",
            BalanceCheckOutcome::NotEnoughBalance => "NOT_ENOUGH_BALANCE",
            BalanceCheckOutcome::EnoughBalance => "ENOUGH_BALANCE",
        };
        write!(f, "{s}")
    }
}
