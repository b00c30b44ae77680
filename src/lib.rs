//! Order approval and blockchain certification service.
//!
//! Tenant-submitted token orders move through a reviewed state machine
//! (`pending_approval` → `approved` → `executed`, or `rejected`), with
//! execution producing a signed, blockchain-anchored ownership
//! certificate anyone can verify without credentials.

// Core workflow
pub mod approval;
pub mod certificate;
pub mod store;

// Key custody and signing
pub mod signing;
pub mod vault;

// Chain access
pub mod blockchain;

// Cross-cutting concerns
pub mod config;
pub mod http;
pub mod observability;
pub mod resilience;

pub use config::ServiceConfig;
pub use http::{AppState, HttpServer};
