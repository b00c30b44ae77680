//! Platform wallet for execution signing.
//!
//! # Security
//! - The private key is loaded ONLY from an environment variable
//! - The key is never logged or serialized

use alloy::primitives::{Address, B256};
use alloy::signers::local::PrivateKeySigner;
use alloy::signers::Signer;
use thiserror::Error;

/// Environment variable name for the platform signing key.
pub const PLATFORM_KEY_ENV_VAR: &str = "CERTGATE_PLATFORM_KEY";

/// Errors from platform wallet operations.
#[derive(Debug, Error)]
pub enum WalletError {
    #[error("invalid private key format: {0}")]
    InvalidKey(String),

    #[error("environment variable {0} not set")]
    MissingEnv(&'static str),

    #[error("signing failed: {0}")]
    Signing(String),
}

/// The platform's own signing wallet.
#[derive(Clone)]
pub struct PlatformWallet {
    signer: PrivateKeySigner,
}

impl PlatformWallet {
    /// Create a wallet from a hex-encoded private key (with or without
    /// `0x` prefix). The key is parsed and held in memory only.
    pub fn from_private_key(private_key_hex: &str) -> Result<Self, WalletError> {
        let key_hex = private_key_hex.strip_prefix("0x").unwrap_or(private_key_hex);

        let signer: PrivateKeySigner = key_hex
            .parse()
            .map_err(|e| WalletError::InvalidKey(format!("{e}")))?;

        tracing::info!(address = %signer.address(), "Platform wallet initialized");

        Ok(Self { signer })
    }

    /// Load the wallet from `CERTGATE_PLATFORM_KEY`.
    pub fn from_env() -> Result<Self, WalletError> {
        let key = std::env::var(PLATFORM_KEY_ENV_VAR)
            .map_err(|_| WalletError::MissingEnv(PLATFORM_KEY_ENV_VAR))?;
        Self::from_private_key(&key)
    }

    pub fn address(&self) -> Address {
        self.signer.address()
    }

    /// Sign a 32-byte digest.
    pub async fn sign_digest(&self, digest: B256) -> Result<alloy::signers::Signature, WalletError> {
        self.signer
            .sign_hash(&digest)
            .await
            .map_err(|e| WalletError::Signing(format!("{e}")))
    }

    pub(crate) fn signer(&self) -> &PrivateKeySigner {
        &self.signer
    }
}

impl std::fmt::Debug for PlatformWallet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PlatformWallet")
            .field("address", &self.signer.address())
            .finish()
    }
}
