//! Tenant signing-key custody.
//!
//! # Responsibilities
//! - Encrypt tenant signing keys at rest (XChaCha20-Poly1305, per-record
//!   random nonce, master key held only in process memory)
//! - Decrypt only inside a signing operation's call stack; plaintext is
//!   zeroized on drop and never persisted or logged
//! - Manage the wallet configuration surface (configure, toggle dual
//!   signature)
//!
//! # Failure modes
//! An integrity-tag mismatch on decrypt is fatal for that signing attempt.
//! There is no unauthenticated fallback path.

use std::str::FromStr;
use std::sync::Arc;

use alloy::primitives::Address;
use chacha20poly1305::{
    aead::{Aead, KeyInit},
    XChaCha20Poly1305, XNonce,
};
use chrono::Utc;
use rand::RngCore;
use thiserror::Error;
use zeroize::{Zeroize, ZeroizeOnDrop};

use crate::store::{AuditAction, AuditLog, EncryptedKey, WalletConfig, WalletStore};

/// Environment variable holding the hex-encoded 256-bit master key.
pub const MASTER_KEY_ENV_VAR: &str = "CERTGATE_MASTER_KEY";

/// Vault master key (256-bit). Zeroized on drop.
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct MasterKey([u8; 32]);

impl MasterKey {
    pub fn from_bytes(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    /// Load from `CERTGATE_MASTER_KEY` (64 hex chars).
    pub fn from_env() -> Result<Self, VaultError> {
        let hex_key = std::env::var(MASTER_KEY_ENV_VAR)
            .map_err(|_| VaultError::MasterKey(format!("{MASTER_KEY_ENV_VAR} not set")))?;
        let bytes = hex::decode(hex_key.trim())
            .map_err(|_| VaultError::MasterKey("master key is not valid hex".into()))?;
        let bytes: [u8; 32] = bytes
            .try_into()
            .map_err(|_| VaultError::MasterKey("master key must be 32 bytes".into()))?;
        Ok(Self(bytes))
    }

    /// Generate a random key. Test and bootstrap use only.
    pub fn generate() -> Self {
        let mut bytes = [0u8; 32];
        rand::thread_rng().fill_bytes(&mut bytes);
        Self(bytes)
    }

    fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }
}

impl std::fmt::Debug for MasterKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("MasterKey(..)")
    }
}

/// A decrypted tenant key, scoped to one signing call. Zeroized on drop.
#[derive(Zeroize, ZeroizeOnDrop)]
pub struct PlaintextKey(String);

impl PlaintextKey {
    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Debug for PlaintextKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("PlaintextKey(..)")
    }
}

/// Errors from key custody and wallet configuration.
#[derive(Debug, Error)]
pub enum VaultError {
    #[error("invalid wallet address: {0}")]
    InvalidAddress(String),

    #[error("master key error: {0}")]
    MasterKey(String),

    #[error("encryption failed")]
    EncryptionFailed,

    /// Tamper or corruption: the integrity tag did not verify.
    #[error("decryption failed: integrity check did not pass")]
    DecryptionFailed,

    #[error("no wallet configured for tenant")]
    WalletNotConfigured,

    #[error("no signing key stored for tenant")]
    KeyNotConfigured,
}

/// Encrypts, stores, and transiently decrypts tenant signing keys.
pub struct KeyVault {
    master: MasterKey,
    wallets: Arc<WalletStore>,
    audit: Arc<AuditLog>,
}

impl KeyVault {
    pub fn new(master: MasterKey, wallets: Arc<WalletStore>, audit: Arc<AuditLog>) -> Self {
        Self {
            master,
            wallets,
            audit,
        }
    }

    /// Configure (or reconfigure) a tenant's wallet.
    ///
    /// If a plaintext key is supplied it is encrypted immediately and the
    /// plaintext discarded. Reconfiguration overwrites any previous
    /// ciphertext. Toggle state is preserved across reconfiguration.
    pub fn configure(
        &self,
        tenant_id: &str,
        wallet_address: &str,
        plaintext_key: Option<&str>,
        network: &str,
        actor: Option<&str>,
        ip: Option<&str>,
    ) -> Result<WalletConfig, VaultError> {
        let address = Address::from_str(wallet_address)
            .map_err(|_| VaultError::InvalidAddress(wallet_address.to_string()))?;

        let encrypted = match plaintext_key {
            Some(key) => Some(self.encrypt(key.as_bytes())?),
            None => self
                .wallets
                .get(tenant_id)
                .and_then(|w| w.encrypted_private_key),
        };

        let dual_signature_enabled = self
            .wallets
            .get(tenant_id)
            .map(|w| w.dual_signature_enabled)
            .unwrap_or(false);

        let config = WalletConfig {
            tenant_id: tenant_id.to_string(),
            wallet_address: address.to_checksum(None),
            encrypted_private_key: encrypted,
            dual_signature_enabled,
            network: network.to_string(),
            configured_at: Utc::now(),
        };
        self.wallets.upsert(config.clone());

        tracing::info!(
            tenant = %tenant_id,
            address = %config.wallet_address,
            has_key = config.encrypted_private_key.is_some(),
            "Wallet configured"
        );
        self.audit.record(
            tenant_id,
            AuditAction::WalletConfigured,
            "wallet_config",
            &config.wallet_address,
            actor,
            None,
            None,
            ip,
        );

        Ok(config)
    }

    /// Decrypt the tenant's signing key for a single signing call.
    ///
    /// The returned wrapper zeroizes on drop; callers must not persist,
    /// log, or return it across an API boundary.
    pub fn decrypt(&self, tenant_id: &str) -> Result<PlaintextKey, VaultError> {
        let config = self
            .wallets
            .get(tenant_id)
            .ok_or(VaultError::WalletNotConfigured)?;
        let encrypted = config
            .encrypted_private_key
            .ok_or(VaultError::KeyNotConfigured)?;

        let cipher = XChaCha20Poly1305::new(self.master.as_bytes().into());
        let mut plaintext = cipher
            .decrypt(XNonce::from_slice(&encrypted.nonce), encrypted.ciphertext.as_ref())
            .map_err(|_| VaultError::DecryptionFailed)?;

        let key = String::from_utf8(plaintext.clone()).map_err(|_| {
            plaintext.zeroize();
            VaultError::DecryptionFailed
        })?;
        plaintext.zeroize();

        Ok(PlaintextKey(key))
    }

    /// Enable or disable the dual-signature policy for a tenant.
    ///
    /// Enabling requires a configured wallet address.
    pub fn toggle_dual_signature(
        &self,
        tenant_id: &str,
        enabled: bool,
        actor: Option<&str>,
        ip: Option<&str>,
    ) -> Result<bool, VaultError> {
        let updated = self
            .wallets
            .update(tenant_id, |w| w.dual_signature_enabled = enabled)
            .ok_or(VaultError::WalletNotConfigured)?;

        tracing::info!(tenant = %tenant_id, enabled = enabled, "Dual signature toggled");
        self.audit.record(
            tenant_id,
            AuditAction::DualSignatureToggled,
            "wallet_config",
            &updated.wallet_address,
            actor,
            None,
            Some(if enabled { "enabled" } else { "disabled" }),
            ip,
        );

        Ok(updated.dual_signature_enabled)
    }

    fn encrypt(&self, plaintext: &[u8]) -> Result<EncryptedKey, VaultError> {
        let cipher = XChaCha20Poly1305::new(self.master.as_bytes().into());
        let mut nonce = [0u8; 24];
        rand::thread_rng().fill_bytes(&mut nonce);

        let ciphertext = cipher
            .encrypt(XNonce::from_slice(&nonce), plaintext)
            .map_err(|_| VaultError::EncryptionFailed)?;

        Ok(EncryptedKey { ciphertext, nonce })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // Anvil's first well-known account key; safe for tests.
    const TEST_KEY: &str = "ac0974bec39a17e36ba4a6b4d238ff944bacb478cbed5efcae784d7bf4f2ff80";
    const TEST_ADDRESS: &str = "0xf39Fd6e51aad88F6F4ce6aB8827279cffFb92266";

    fn vault() -> KeyVault {
        KeyVault::new(
            MasterKey::generate(),
            Arc::new(WalletStore::new()),
            Arc::new(AuditLog::new()),
        )
    }

    #[test]
    fn test_configure_and_decrypt_roundtrip() {
        let vault = vault();
        let config = vault
            .configure("tenant-a", TEST_ADDRESS, Some(TEST_KEY), "polygon", Some("alice"), None)
            .unwrap();

        assert!(config.encrypted_private_key.is_some());
        // Ciphertext is not the plaintext
        let stored = config.encrypted_private_key.unwrap();
        assert_ne!(stored.ciphertext, TEST_KEY.as_bytes());

        let key = vault.decrypt("tenant-a").unwrap();
        assert_eq!(key.expose(), TEST_KEY);
    }

    #[test]
    fn test_invalid_address_rejected() {
        let vault = vault();
        let result = vault.configure("tenant-a", "not-an-address", None, "polygon", None, None);
        assert!(matches!(result, Err(VaultError::InvalidAddress(_))));
    }

    #[test]
    fn test_tampered_ciphertext_fails_closed() {
        let wallets = Arc::new(WalletStore::new());
        let vault = KeyVault::new(MasterKey::generate(), wallets.clone(), Arc::new(AuditLog::new()));
        vault
            .configure("tenant-a", TEST_ADDRESS, Some(TEST_KEY), "polygon", None, None)
            .unwrap();

        wallets.update("tenant-a", |w| {
            if let Some(ref mut key) = w.encrypted_private_key {
                key.ciphertext[0] ^= 0xFF;
            }
        });

        assert!(matches!(
            vault.decrypt("tenant-a"),
            Err(VaultError::DecryptionFailed)
        ));
    }

    #[test]
    fn test_decrypt_without_key() {
        let vault = vault();
        vault
            .configure("tenant-a", TEST_ADDRESS, None, "polygon", None, None)
            .unwrap();
        assert!(matches!(
            vault.decrypt("tenant-a"),
            Err(VaultError::KeyNotConfigured)
        ));
        assert!(matches!(
            vault.decrypt("tenant-b"),
            Err(VaultError::WalletNotConfigured)
        ));
    }

    #[test]
    fn test_toggle_requires_wallet() {
        let vault = vault();
        assert!(matches!(
            vault.toggle_dual_signature("tenant-a", true, None, None),
            Err(VaultError::WalletNotConfigured)
        ));

        vault
            .configure("tenant-a", TEST_ADDRESS, None, "polygon", None, None)
            .unwrap();
        assert!(vault.toggle_dual_signature("tenant-a", true, None, None).unwrap());
        assert!(!vault.toggle_dual_signature("tenant-a", false, None, None).unwrap());
    }

    #[test]
    fn test_reconfigure_preserves_toggle_and_key() {
        let vault = vault();
        vault
            .configure("tenant-a", TEST_ADDRESS, Some(TEST_KEY), "polygon", None, None)
            .unwrap();
        vault.toggle_dual_signature("tenant-a", true, None, None).unwrap();

        // Reconfigure without supplying the key again
        let config = vault
            .configure("tenant-a", TEST_ADDRESS, None, "polygon", None, None)
            .unwrap();
        assert!(config.dual_signature_enabled);
        assert!(config.encrypted_private_key.is_some());
        assert_eq!(vault.decrypt("tenant-a").unwrap().expose(), TEST_KEY);
    }
}
