use alloy::consensus::{SignableTransaction, TxEip1559, TxEnvelope};
use alloy::eips::eip2718::Encodable2718;
use alloy::eips::eip2930::AccessList;
use alloy::eips::BlockId;
use alloy::network::TxSignerSync;
use alloy::primitives::{Address, Bytes, TxKind, B256, U256};
use alloy::providers::{DynProvider, Provider, ProviderBuilder};
use alloy::signers::local::PrivateKeySigner;
use async_trait::async_trait;
use tracing::info;

use super::{ChainClient, SignedTransfer, TransferRequest, TxStatus, TRANSFER_GAS_LIMIT};
use crate::error::{AppError, AppResult};

/// EVM JSON-RPC chain client holding the operating wallet's signer.
///
/// Transfers are signed locally so the transaction hash exists before the
/// network ever sees the payload - the ledger row is persisted against that
/// hash first, and only then is the raw transaction broadcast.
pub struct EvmChainClient {
    provider: DynProvider,
    signer: PrivateKeySigner,
    address: Address,
    chain_id: u64,
}

impl EvmChainClient {
    pub async fn connect(rpc_url: &str, private_key: &str) -> AppResult<Self> {
        let signer: PrivateKeySigner = private_key
            .parse()
            .map_err(|e| AppError::Config(format!("Invalid payout wallet key: {e}")))?;
        let address = signer.address();

        let url = rpc_url
            .parse()
            .map_err(|e| AppError::Config(format!("Invalid chain RPC URL: {e}")))?;
        let provider = ProviderBuilder::new().connect_http(url).erased();

        let chain_id = provider.get_chain_id().await.map_err(rpc_err)?;

        info!("⛓️  Chain client connected: chain {}, wallet {}", chain_id, address);

        Ok(Self {
            provider,
            signer,
            address,
            chain_id,
        })
    }
}

#[async_trait]
impl ChainClient for EvmChainClient {
    fn wallet_address(&self) -> Address {
        self.address
    }

    async fn chain_id(&self) -> AppResult<u64> {
        Ok(self.chain_id)
    }

    async fn next_nonce(&self) -> AppResult<u64> {
        self.provider
            .get_transaction_count(self.address)
            .block_id(BlockId::pending())
            .await
            .map_err(rpc_err)
    }

    async fn balance(&self) -> AppResult<U256> {
        self.provider.get_balance(self.address).await.map_err(rpc_err)
    }

    async fn sign_transfer(&self, request: &TransferRequest) -> AppResult<SignedTransfer> {
        let mut tx = TxEip1559 {
            chain_id: self.chain_id,
            nonce: request.nonce,
            gas_limit: TRANSFER_GAS_LIMIT,
            max_fee_per_gas: request.max_fee_per_gas,
            max_priority_fee_per_gas: request.max_priority_fee_per_gas,
            to: TxKind::Call(request.to),
            value: request.value,
            access_list: AccessList::default(),
            input: Bytes::default(),
        };

        let signature = self
            .signer
            .sign_transaction_sync(&mut tx)
            .map_err(|e| AppError::Chain(format!("Transaction signing failed: {e}")))?;

        let signed = tx.into_signed(signature);
        let tx_hash = *signed.hash();
        let envelope = TxEnvelope::Eip1559(signed);

        Ok(SignedTransfer {
            tx_hash,
            raw: envelope.encoded_2718(),
            nonce: request.nonce,
        })
    }

    async fn broadcast(&self, signed: &SignedTransfer) -> AppResult<B256> {
        let pending = self
            .provider
            .send_raw_transaction(&signed.raw)
            .await
            .map_err(rpc_err)?;

        Ok(*pending.tx_hash())
    }

    async fn transaction_status(&self, tx_hash: B256) -> AppResult<TxStatus> {
        let tx = self
            .provider
            .get_transaction_by_hash(tx_hash)
            .await
            .map_err(rpc_err)?;

        Ok(match tx {
            None => TxStatus::NotFound,
            Some(tx) if tx.block_number.is_some() => TxStatus::Included,
            Some(_) => TxStatus::Pending,
        })
    }
}

fn rpc_err(e: impl std::fmt::Display) -> AppError {
    AppError::Chain(e.to_string())
}
