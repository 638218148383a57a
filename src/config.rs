use serde::Deserialize;

use crate::error::{AppError, AppResult};

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub database_url: String,
    pub chain_rpc_url: String,
    /// Hex-encoded private key of the operating (payout) wallet
    pub payout_wallet_key: String,
    /// Block explorer base, used for user-facing payment links
    pub explorer_base_url: String,
    /// Slack-style incoming webhook for operator alerts (optional)
    pub ops_webhook_url: Option<String>,
    /// CoinGecko coin id of the chain's native currency
    pub native_coin_id: String,

    pub initiation_interval_secs: u64,
    pub confirmation_interval_secs: u64,
    pub balance_check_interval_secs: u64,

    /// Minutes before a pending broadcast counts as stuck
    pub staleness_minutes: i64,
    /// How far back to look for tournaments awaiting payout
    pub lookback_days: i64,
    /// Applied to both fee components when a speed-up is issued
    pub urgent_fee_multiplier_percent: u64,
}

impl Config {
    pub fn from_env() -> AppResult<Self> {
        Ok(Self {
            database_url: std::env::var("DATABASE_URL")
                .unwrap_or_else(|_| "postgresql://localhost/settlement".to_string()),
            chain_rpc_url: std::env::var("CHAIN_RPC_URL")
                .unwrap_or_else(|_| "http://localhost:8545".to_string()),
            payout_wallet_key: std::env::var("PAYOUT_WALLET_KEY")
                .map_err(|_| AppError::Config("PAYOUT_WALLET_KEY must be set".into()))?,
            explorer_base_url: std::env::var("EXPLORER_BASE_URL")
                .unwrap_or_else(|_| "https://etherscan.io".to_string()),
            ops_webhook_url: std::env::var("OPS_WEBHOOK_URL").ok(),
            native_coin_id: std::env::var("NATIVE_COIN_ID")
                .unwrap_or_else(|_| "ethereum".to_string()),
            initiation_interval_secs: env_u64("INITIATION_INTERVAL_SECS", 60),
            confirmation_interval_secs: env_u64("CONFIRMATION_INTERVAL_SECS", 30),
            balance_check_interval_secs: env_u64("BALANCE_CHECK_INTERVAL_SECS", 3600),
            staleness_minutes: env_u64("STALENESS_MINUTES", 10) as i64,
            lookback_days: env_u64("LOOKBACK_DAYS", 30) as i64,
            urgent_fee_multiplier_percent: env_u64("URGENT_FEE_MULTIPLIER_PERCENT", 200),
        })
    }
}

fn env_u64(key: &str, default: u64) -> u64 {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}
