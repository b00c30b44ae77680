//! Execution signing.
//!
//! The platform wallet signs every execution; tenants with the
//! dual-signature policy enabled co-sign with their own vaulted key.

pub mod coordinator;
pub mod wallet;

pub use coordinator::{DualSignatureCoordinator, SignatureProof, SignerSignature, SigningError};
pub use wallet::PlatformWallet;
