use std::collections::HashMap;

use async_trait::async_trait;
use rust_decimal::Decimal;
use tracing::info;

use crate::error::{AppError, AppResult};

/// Fiat -> chain currency conversion, selected at process start
#[async_trait]
pub trait CurrencyConverter: Send + Sync {
    /// Native chain units per 1 USD
    async fn usd_to_chain_rate(&self) -> AppResult<Decimal>;
}

/// Spot rate from the CoinGecko simple-price endpoint
pub struct CoinGeckoConverter {
    client: reqwest::Client,
    base_url: String,
    coin_id: String,
}

impl CoinGeckoConverter {
    pub fn new(coin_id: String) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: "https://api.coingecko.com".to_string(),
            coin_id,
        }
    }

}

#[async_trait]
impl CurrencyConverter for CoinGeckoConverter {
    async fn usd_to_chain_rate(&self) -> AppResult<Decimal> {
        let url = format!(
            "{}/api/v3/simple/price?ids={}&vs_currencies=usd",
            self.base_url, self.coin_id
        );

        let response = self.client.get(&url).send().await?;
        if !response.status().is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(AppError::External(format!("CoinGecko error: {body}")));
        }

        let prices: HashMap<String, HashMap<String, Decimal>> = response.json().await?;
        let usd_per_coin = prices
            .get(&self.coin_id)
            .and_then(|p| p.get("usd"))
            .copied()
            .ok_or_else(|| {
                AppError::External(format!("CoinGecko returned no USD price for {}", self.coin_id))
            })?;

        if usd_per_coin <= Decimal::ZERO {
            return Err(AppError::External(format!(
                "CoinGecko returned non-positive price {usd_per_coin} for {}",
                self.coin_id
            )));
        }

        let rate = Decimal::ONE / usd_per_coin;
        info!("💱 Spot rate: 1 USD = {} {}", rate, self.coin_id);
        Ok(rate)
    }
}
