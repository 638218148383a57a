pub mod evm;
pub mod fees;

use alloy::primitives::{Address, B256, U256};
use async_trait::async_trait;
use rust_decimal::Decimal;

use crate::error::{AppError, AppResult};

/// Protocol-level gas cost of a plain value transfer
pub const TRANSFER_GAS_LIMIT: u64 = 21_000;

/// Decimals of the chain's native currency
pub const NATIVE_DECIMALS: u32 = 18;

/// Inclusion state of a broadcast transaction
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TxStatus {
    /// The node does not know the hash - the broadcast never landed or
    /// was dropped from the mempool
    NotFound,
    /// Known but not yet included in a block
    Pending,
    Included,
}

/// A transfer about to be signed
#[derive(Debug, Clone)]
pub struct TransferRequest {
    pub to: Address,
    pub value: U256,
    pub nonce: u64,
    pub max_fee_per_gas: u128,
    pub max_priority_fee_per_gas: u128,
}

/// A signed transfer whose hash is known before any broadcast, so the
/// ledger row can be persisted first.
#[derive(Debug, Clone)]
pub struct SignedTransfer {
    pub tx_hash: B256,
    pub raw: Vec<u8>,
    pub nonce: u64,
}

/// Chain collaborator contract. The single operating wallet and its signer
/// live behind this seam.
#[async_trait]
pub trait ChainClient: Send + Sync {
    /// Address of the operating (payout) wallet
    fn wallet_address(&self) -> Address;

    async fn chain_id(&self) -> AppResult<u64>;

    /// Next usable nonce for the operating wallet, pending txs included
    async fn next_nonce(&self) -> AppResult<u64>;

    /// Spendable balance of the operating wallet, in base units
    async fn balance(&self) -> AppResult<U256>;

    async fn sign_transfer(&self, request: &TransferRequest) -> AppResult<SignedTransfer>;

    /// Broadcast a previously signed transfer. Returns the transaction hash
    /// echoed by the node.
    async fn broadcast(&self, signed: &SignedTransfer) -> AppResult<B256>;

    async fn transaction_status(&self, tx_hash: B256) -> AppResult<TxStatus>;
}

/// Convert a fiat amount to base units (wei) at the given rate
/// (native units per 1 USD). Truncates sub-wei precision.
pub fn usd_to_wei(amount_fiat: Decimal, rate: Decimal) -> AppResult<Decimal> {
    let wei_per_native = Decimal::from(10u64.pow(NATIVE_DECIMALS));
    let wei = amount_fiat
        .checked_mul(rate)
        .and_then(|native| native.checked_mul(wei_per_native))
        .ok_or_else(|| {
            AppError::Internal(format!(
                "fiat->wei conversion overflow: {amount_fiat} at rate {rate}"
            ))
        })?;

    if wei.is_sign_negative() {
        return Err(AppError::Internal(format!(
            "negative transfer amount: {amount_fiat} at rate {rate}"
        )));
    }

    Ok(wei.trunc())
}

/// An integral wei Decimal (as persisted on the ledger) into U256 for the wire
pub fn wei_to_u256(wei: &Decimal) -> AppResult<U256> {
    U256::from_str_radix(&wei.trunc().to_string(), 10)
        .map_err(|e| AppError::Internal(format!("wei out of range: {wei} ({e})")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn converts_fiat_to_wei_at_rate() {
        // $100 at 0.0005 native per USD = 0.05 native = 5e16 wei
        let wei = usd_to_wei(dec!(100), dec!(0.0005)).unwrap();
        assert_eq!(wei, dec!(50000000000000000));
    }

    #[test]
    fn truncates_sub_wei_precision() {
        let wei = usd_to_wei(dec!(0.000000000000000000123), dec!(1)).unwrap();
        assert_eq!(wei, Decimal::ZERO);
    }

    #[test]
    fn wei_decimal_round_trips_to_u256() {
        let wei = dec!(50000000000000000);
        let value = wei_to_u256(&wei).unwrap();
        assert_eq!(value, U256::from(50_000_000_000_000_000u64));
    }

    #[test]
    fn negative_amount_is_rejected() {
        assert!(usd_to_wei(dec!(-1), dec!(0.0005)).is_err());
    }
}
