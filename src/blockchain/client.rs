//! JSON-RPC chain client with timeout, failover, and error classification.
//!
//! # Responsibilities
//! - Submit anchor transactions through a wallet-enabled provider
//! - Resolve transaction hashes to payload + confirmation state
//! - Distinguish transient transport failures (retryable) from node
//!   rejections (permanent)

use alloy::consensus::Transaction as _;
use alloy::network::{EthereumWallet, TransactionBuilder};
use alloy::primitives::{Address, Bytes, B256};
use alloy::providers::{Provider, ProviderBuilder};
use alloy::rpc::types::TransactionRequest;
use alloy::transports::{RpcError, TransportErrorKind};
use chrono::DateTime;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::timeout;

use crate::blockchain::types::{AnchoredTx, ChainError, ChainResult, ChainRpc, TxLookup};
use crate::config::ChainConfig;
use crate::signing::PlatformWallet;

/// Chain client backed by one or more JSON-RPC endpoints.
///
/// Reads fail over across endpoints; anchor submissions go through the
/// primary only, so a flaky failover cannot double-submit.
pub struct RpcChain {
    providers: Vec<Arc<dyn Provider + Send + Sync>>,
    notary: Address,
    chain_id: u64,
    confirmation_blocks: u32,
    timeout_duration: Duration,
    timeout_secs: u64,
}

impl RpcChain {
    /// Build a client from configuration and the platform wallet.
    pub fn new(config: &ChainConfig, wallet: &PlatformWallet) -> ChainResult<Self> {
        let notary = Address::from_str(&config.notary_address)
            .map_err(|_| ChainError::NotAvailable(format!(
                "invalid notary address '{}'",
                config.notary_address
            )))?;

        let signer_wallet = EthereumWallet::from(wallet.signer().clone());

        let mut providers: Vec<Arc<dyn Provider + Send + Sync>> = Vec::new();
        let primary: url::Url = config
            .rpc_url
            .parse()
            .map_err(|e| ChainError::NotAvailable(format!("invalid RPC URL '{}': {e}", config.rpc_url)))?;
        providers.push(Arc::new(
            ProviderBuilder::new()
                .wallet(signer_wallet.clone())
                .connect_http(primary),
        ));

        for url_str in &config.failover_urls {
            match url_str.parse() {
                Ok(url) => providers.push(Arc::new(
                    ProviderBuilder::new()
                        .wallet(signer_wallet.clone())
                        .connect_http(url),
                )),
                Err(_) => {
                    tracing::warn!(url = %url_str, "Ignoring invalid failover RPC URL");
                }
            }
        }

        tracing::info!(
            rpc_url = %config.rpc_url,
            chain_id = config.chain_id,
            notary = %notary,
            "Chain RPC client initialized"
        );

        Ok(Self {
            providers,
            notary,
            chain_id: config.chain_id,
            confirmation_blocks: config.confirmation_blocks,
            timeout_duration: Duration::from_secs(config.rpc_timeout_secs),
            timeout_secs: config.rpc_timeout_secs,
        })
    }

    /// Latest block number, trying each provider in turn.
    async fn block_number(&self) -> ChainResult<u64> {
        for (i, provider) in self.providers.iter().enumerate() {
            match timeout(self.timeout_duration, provider.get_block_number()).await {
                Ok(Ok(number)) => return Ok(number),
                Ok(Err(e)) => tracing::warn!(provider_idx = i, error = %e, "RPC error"),
                Err(_) => tracing::warn!(provider_idx = i, "RPC timeout"),
            }
        }
        Err(ChainError::Rpc("all providers failed to get block number".into()))
    }

    fn classify_send_error(err: RpcError<TransportErrorKind>) -> ChainError {
        match err {
            // The node looked at the transaction and said no. Permanent.
            RpcError::ErrorResp(payload) => ChainError::Rejected(payload.message.to_string()),
            other => ChainError::Rpc(other.to_string()),
        }
    }
}

#[async_trait::async_trait]
impl ChainRpc for RpcChain {
    async fn anchor(&self, payload: Vec<u8>) -> ChainResult<String> {
        let tx = TransactionRequest::default()
            .with_to(self.notary)
            .with_input(Bytes::from(payload))
            .with_chain_id(self.chain_id);

        let pending = match timeout(self.timeout_duration, self.providers[0].send_transaction(tx))
            .await
        {
            Ok(Ok(pending)) => pending,
            Ok(Err(e)) => return Err(Self::classify_send_error(e)),
            Err(_) => return Err(ChainError::Timeout(self.timeout_secs)),
        };

        let tx_hash = *pending.tx_hash();
        tracing::info!(tx_hash = %tx_hash, "Anchor transaction submitted");
        Ok(format!("{tx_hash:#x}"))
    }

    async fn resolve(&self, tx_hash: &str) -> ChainResult<TxLookup> {
        let hash = B256::from_str(tx_hash)
            .map_err(|_| ChainError::Rejected(format!("invalid transaction hash '{tx_hash}'")))?;

        for (i, provider) in self.providers.iter().enumerate() {
            let lookup = async {
                let tx = match provider.get_transaction_by_hash(hash).await? {
                    Some(tx) => tx,
                    None => return Ok::<_, RpcError<TransportErrorKind>>(TxLookup::NotFound),
                };
                let receipt = match provider.get_transaction_receipt(hash).await? {
                    Some(receipt) => receipt,
                    None => return Ok(TxLookup::Pending),
                };
                let tx_block = match receipt.block_number {
                    Some(number) => number,
                    None => return Ok(TxLookup::Pending),
                };

                let current = provider.get_block_number().await?;
                let confirmations = current.saturating_sub(tx_block) as u32;
                if confirmations < self.confirmation_blocks {
                    return Ok(TxLookup::Pending);
                }

                let block_timestamp = match provider.get_block_by_number(tx_block.into()).await? {
                    Some(block) => DateTime::from_timestamp(block.header.timestamp as i64, 0)
                        .unwrap_or_default(),
                    None => return Ok(TxLookup::Pending),
                };

                Ok(TxLookup::Confirmed(AnchoredTx {
                    block_number: tx_block,
                    block_timestamp,
                    payload: tx.input().to_vec(),
                }))
            };

            match timeout(self.timeout_duration, lookup).await {
                Ok(Ok(result)) => return Ok(result),
                Ok(Err(e)) => tracing::warn!(provider_idx = i, error = %e, "RPC error"),
                Err(_) => tracing::warn!(provider_idx = i, "RPC timeout"),
            }
        }
        Err(ChainError::Rpc("all providers failed to resolve transaction".into()))
    }

    async fn is_healthy(&self) -> bool {
        self.block_number().await.is_ok()
    }
}

impl std::fmt::Debug for RpcChain {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RpcChain")
            .field("chain_id", &self.chain_id)
            .field("notary", &self.notary)
            .field("providers", &self.providers.len())
            .finish()
    }
}
