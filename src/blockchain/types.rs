//! Chain-facing types and error definitions.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;

/// ASCII prefix carried in anchor transaction payloads, so anchored
/// hashes are recognizable when resolved.
pub const ANCHOR_PREFIX: &[u8] = b"CERTGATE:";

/// Errors that can occur during chain operations.
#[derive(Debug, Error)]
pub enum ChainError {
    /// RPC connection or request failed. Transient; safe to retry.
    #[error("RPC error: {0}")]
    Rpc(String),

    /// RPC request timed out. Transient; safe to retry.
    #[error("RPC timeout after {0} seconds")]
    Timeout(u64),

    /// The node rejected the transaction. Permanent; never retried.
    #[error("transaction rejected: {0}")]
    Rejected(String),

    /// Chain backend not configured or unusable.
    #[error("chain not available: {0}")]
    NotAvailable(String),
}

impl ChainError {
    /// Whether a bounded retry is worthwhile.
    pub fn is_transient(&self) -> bool {
        matches!(self, ChainError::Rpc(_) | ChainError::Timeout(_))
    }
}

/// Result type for chain operations.
pub type ChainResult<T> = Result<T, ChainError>;

/// A confirmed anchor transaction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnchoredTx {
    pub block_number: u64,
    pub block_timestamp: DateTime<Utc>,
    /// Transaction input data (the anchored payload).
    pub payload: Vec<u8>,
}

/// Outcome of resolving a transaction hash.
///
/// "Not yet confirmed" is a distinct, non-error state from "not found".
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TxLookup {
    Confirmed(AnchoredTx),
    Pending,
    NotFound,
}

/// Narrow chain surface: submit a payload-bearing transaction, resolve a
/// transaction hash back to its payload.
#[async_trait]
pub trait ChainRpc: Send + Sync {
    /// Submit a transaction carrying `payload` as input data.
    /// Returns the transaction hash (0x-prefixed hex).
    async fn anchor(&self, payload: Vec<u8>) -> ChainResult<String>;

    /// Look up a transaction by hash.
    async fn resolve(&self, tx_hash: &str) -> ChainResult<TxLookup>;

    /// Whether the chain backend is currently reachable.
    async fn is_healthy(&self) -> bool;
}
