use thiserror::Error;

/// Top-level error type for the settlement engine
#[derive(Error, Debug)]
pub enum AppError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Settlement error: {0}")]
    Settlement(#[from] SettlementError),

    #[error("Chain client error: {0}")]
    Chain(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("External error: {0}")]
    External(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

/// Settlement-domain errors
///
/// These are the failures that must reach an operator channel before they
/// propagate. Transient conditions (no work, lock busy, payout pending) are
/// outcome codes, never errors.
#[derive(Error, Debug)]
pub enum SettlementError {
    #[error("Insufficient funds: required {required}, available {available}")]
    InsufficientFunds { required: String, available: String },

    #[error("Invariant violation: {0}")]
    InvariantViolation(String),

    #[error("Entrant ranking too short: {payout_slots} payout slots, {ranked} ranked entrants")]
    RankingTooShort { payout_slots: usize, ranked: usize },
}

impl From<reqwest::Error> for AppError {
    fn from(error: reqwest::Error) -> Self {
        AppError::External(format!("HTTP request error: {:?}", error))
    }
}

impl From<serde_json::Error> for AppError {
    fn from(error: serde_json::Error) -> Self {
        AppError::Internal(format!("JSON error: {:?}", error))
    }
}

/// Result type alias for the application
pub type AppResult<T> = Result<T, AppError>;
