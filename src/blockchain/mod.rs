//! Blockchain anchoring and lookup.
//!
//! The chain is an external append-only ledger reached through a narrow
//! surface: submit a hash-bearing transaction, look a transaction back up.
//! Two backends implement it: a JSON-RPC client for real nodes and an
//! in-process chain for local development and tests.

pub mod client;
pub mod inmem;
pub mod types;

pub use client::RpcChain;
pub use inmem::InMemoryChain;
pub use types::{AnchoredTx, ChainError, ChainResult, ChainRpc, TxLookup, ANCHOR_PREFIX};
