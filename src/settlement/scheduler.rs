// Interval scheduler for the settlement jobs.
//
// Each job runs on its own fixed interval and is self-excluding via its
// advisory lock, so overlapping ticks (or a second deployment of the same
// service) degrade to LOCK_BUSY instead of double-running.

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::interval;
use tracing::{error, info};

use super::balance::BalanceMonitor;
use super::confirmation::ConfirmationController;
use super::initiation::InitiationController;
use crate::config::Config;

pub struct SettlementScheduler {
    initiation: Arc<InitiationController>,
    confirmation: Arc<ConfirmationController>,
    balance: Arc<BalanceMonitor>,
    initiation_interval: Duration,
    confirmation_interval: Duration,
    balance_check_interval: Duration,
}

impl SettlementScheduler {
    pub fn new(
        config: &Config,
        initiation: Arc<InitiationController>,
        confirmation: Arc<ConfirmationController>,
        balance: Arc<BalanceMonitor>,
    ) -> Self {
        Self {
            initiation,
            confirmation,
            balance,
            initiation_interval: Duration::from_secs(config.initiation_interval_secs),
            confirmation_interval: Duration::from_secs(config.confirmation_interval_secs),
            balance_check_interval: Duration::from_secs(config.balance_check_interval_secs),
        }
    }

    /// Spawn the three job loops; they run until the process exits
    pub fn start(&self) -> Vec<JoinHandle<()>> {
        info!(
            "⏰ Scheduler started: initiation every {:?}, confirmation every {:?}, balance check every {:?}",
            self.initiation_interval, self.confirmation_interval, self.balance_check_interval
        );

        let initiation = self.initiation.clone();
        let initiation_loop = {
            let period = self.initiation_interval;
            tokio::spawn(async move {
                let mut ticker = interval(period);
                loop {
                    ticker.tick().await;
                    match initiation.run().await {
                        Ok(outcome) => info!("Initiation run: {outcome}"),
                        Err(e) => error!("❌ Initiation run failed: {e}"),
                    }
                }
            })
        };

        let confirmation = self.confirmation.clone();
        let confirmation_loop = {
            let period = self.confirmation_interval;
            tokio::spawn(async move {
                let mut ticker = interval(period);
                loop {
                    ticker.tick().await;
                    match confirmation.run().await {
                        Ok(outcome) => info!("Confirmation run: {outcome}"),
                        Err(e) => error!("❌ Confirmation run failed: {e}"),
                    }
                }
            })
        };

        let balance = self.balance.clone();
        let balance_loop = {
            let period = self.balance_check_interval;
            tokio::spawn(async move {
                let mut ticker = interval(period);
                loop {
                    ticker.tick().await;
                    match balance.run().await {
                        Ok(outcome) => info!("Balance check run: {outcome}"),
                        Err(e) => error!("❌ Balance check run failed: {e}"),
                    }
                }
            })
        };

        vec![initiation_loop, confirmation_loop, balance_loop]
    }
}
