use std::sync::Arc;
use std::time::Duration;

use alloy::providers::{Provider as _, ProviderBuilder};
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use tracing::info;

use crate::chain::evm::EvmChainClient;
use crate::chain::fees::Eip1559FeeStrategy;
use crate::chain::ChainClient;
use crate::config::Config;
use crate::error::{AppError, AppResult};
use crate::ledger::PgPayoutLedger;
use crate::locks::PgJobLock;
use crate::notify::WebhookNotifier;
use crate::rates::CoinGeckoConverter;
use crate::settlement::balance::BalanceMonitor;
use crate::settlement::confirmation::ConfirmationController;
use crate::settlement::initiation::InitiationController;
use crate::settlement::scheduler::SettlementScheduler;
use crate::tournament::PgTournamentSource;

/// Fully wired settlement service, ready to schedule
pub struct App {
    pub scheduler: SettlementScheduler,
}

pub async fn initialize_app(config: &Config) -> AppResult<App> {
    info!("Initializing settlement components ...");

    let pool = initialize_database(&config.database_url).await?;

    let ledger = Arc::new(PgPayoutLedger::new(pool.clone()));
    let tournaments = Arc::new(PgTournamentSource::new(pool.clone()));
    let lock = Arc::new(PgJobLock::new(pool.clone()));

    let chain: Arc<dyn ChainClient> = Arc::new(
        EvmChainClient::connect(&config.chain_rpc_url, &config.payout_wallet_key).await?,
    );
    info!("✅ Chain client initialized, payout wallet {}", chain.wallet_address());

    // The fee strategy keeps its own RPC handle; it only reads gas estimates
    let fee_url = config
        .chain_rpc_url
        .parse()
        .map_err(|e| AppError::Config(format!("Invalid chain RPC URL: {e}")))?;
    let fee_provider = ProviderBuilder::new().connect_http(fee_url).erased();
    let fees = Arc::new(Eip1559FeeStrategy::new(
        fee_provider,
        config.urgent_fee_multiplier_percent,
    ));
    info!(
        "✅ Fee strategy initialized (urgent multiplier {}%)",
        config.urgent_fee_multiplier_percent
    );

    let converter = Arc::new(CoinGeckoConverter::new(config.native_coin_id.clone()));
    info!("✅ Currency converter initialized for '{}'", config.native_coin_id);

    let notifier = Arc::new(WebhookNotifier::new(config.ops_webhook_url.clone()));
    if config.ops_webhook_url.is_some() {
        info!("✅ Ops webhook notifier initialized");
    } else {
        info!("⚠️  No ops webhook configured, notifications go to the log only");
    }

    let initiation = Arc::new(InitiationController::new(
        ledger.clone(),
        tournaments.clone(),
        chain.clone(),
        fees.clone(),
        converter.clone(),
        notifier.clone(),
        lock.clone(),
        config.lookback_days,
    ));

    let confirmation = Arc::new(ConfirmationController::new(
        ledger.clone(),
        tournaments.clone(),
        chain.clone(),
        fees.clone(),
        notifier.clone(),
        lock.clone(),
        config.staleness_minutes,
        config.explorer_base_url.clone(),
    ));

    let balance = Arc::new(BalanceMonitor::new(
        ledger,
        tournaments,
        chain,
        fees,
        converter,
        notifier,
        lock,
        config.lookback_days,
    ));

    let scheduler = SettlementScheduler::new(config, initiation, confirmation, balance);

    Ok(App { scheduler })
}

async fn initialize_database(database_url: &str) -> AppResult<PgPool> {
    info!("📊 Connecting to database...");

    let pool = PgPoolOptions::new()
        .max_connections(20)
        .acquire_timeout(Duration::from_secs(30))
        .idle_timeout(Duration::from_secs(600))
        .connect(database_url)
        .await?;

    info!("🔄 Running database migrations...");
    sqlx::migrate!("./migrations").run(&pool).await.map_err(|e| {
        AppError::Internal(format!("Migration failed: {e}"))
    })?;

    info!("✓ Database initialized");
    Ok(pool)
}
