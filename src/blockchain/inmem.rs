//! In-process chain for local development and tests.
//!
//! Anchors instantly with deterministic block numbers. A failure switch
//! lets tests exercise the "anchoring failed, order stays approved" path.

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use sha2::{Digest, Sha256};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use crate::blockchain::types::{AnchoredTx, ChainError, ChainResult, ChainRpc, TxLookup};

#[derive(Debug, Clone)]
struct StoredTx {
    block_number: u64,
    block_timestamp: DateTime<Utc>,
    payload: Vec<u8>,
}

/// In-memory append-only ledger.
#[derive(Debug, Default)]
pub struct InMemoryChain {
    txs: DashMap<String, StoredTx>,
    height: AtomicU64,
    fail_anchors: AtomicBool,
}

impl InMemoryChain {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make subsequent anchor calls fail with a transient RPC error.
    pub fn set_fail_anchors(&self, fail: bool) {
        self.fail_anchors.store(fail, Ordering::SeqCst);
    }

    /// Current chain height.
    pub fn height(&self) -> u64 {
        self.height.load(Ordering::SeqCst)
    }
}

#[async_trait::async_trait]
impl ChainRpc for InMemoryChain {
    async fn anchor(&self, payload: Vec<u8>) -> ChainResult<String> {
        if self.fail_anchors.load(Ordering::SeqCst) {
            return Err(ChainError::Rpc("simulated node outage".into()));
        }

        let block_number = self.height.fetch_add(1, Ordering::SeqCst) + 1;

        // Tx hash derived from payload + block number, so repeated anchors
        // of the same payload stay distinguishable.
        let mut hasher = Sha256::new();
        hasher.update(&payload);
        hasher.update(block_number.to_be_bytes());
        let tx_hash = format!("0x{}", hex::encode(hasher.finalize()));

        self.txs.insert(
            tx_hash.clone(),
            StoredTx {
                block_number,
                block_timestamp: Utc::now(),
                payload,
            },
        );

        tracing::debug!(tx_hash = %tx_hash, block = block_number, "Anchored in-memory");
        Ok(tx_hash)
    }

    async fn resolve(&self, tx_hash: &str) -> ChainResult<TxLookup> {
        match self.txs.get(tx_hash) {
            Some(tx) => Ok(TxLookup::Confirmed(AnchoredTx {
                block_number: tx.block_number,
                block_timestamp: tx.block_timestamp,
                payload: tx.payload.clone(),
            })),
            None => Ok(TxLookup::NotFound),
        }
    }

    async fn is_healthy(&self) -> bool {
        !self.fail_anchors.load(Ordering::SeqCst)
    }
}
