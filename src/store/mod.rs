//! In-process persisted state.
//!
//! # Responsibilities
//! - Hold the four collections the service owns: orders, wallet configs,
//!   certificates, audit log
//! - Provide conditional (compare-and-swap) order updates so concurrent
//!   transitions on one order cannot both succeed
//! - Enforce the one-certificate-per-order constraint

pub mod audit;
pub mod certificates;
pub mod orders;
pub mod wallets;

pub use audit::{AuditAction, AuditEntry, AuditLog};
pub use certificates::{Certificate, CertificateStatus, CertificateStore};
pub use orders::{Order, OrderStatus, OrderStore, OrderType, StoreError};
pub use wallets::{EncryptedKey, WalletConfig, WalletStore};
