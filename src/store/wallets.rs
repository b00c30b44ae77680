//! Per-tenant signing-wallet configuration.
//!
//! The private key only ever appears here as an AEAD ciphertext produced by
//! the vault. Plaintext never touches this store.

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use serde::{Deserialize, Serialize};

/// Ciphertext record for a tenant signing key.
///
/// The Poly1305 tag is carried inside `ciphertext` (AEAD output); `nonce`
/// is the per-record random XChaCha20 nonce.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EncryptedKey {
    pub ciphertext: Vec<u8>,
    pub nonce: [u8; 24],
}

/// One wallet configuration per tenant.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WalletConfig {
    pub tenant_id: String,
    pub wallet_address: String,
    pub encrypted_private_key: Option<EncryptedKey>,
    pub dual_signature_enabled: bool,
    pub network: String,
    pub configured_at: DateTime<Utc>,
}

/// Tenant-keyed wallet configuration store.
#[derive(Debug, Default)]
pub struct WalletStore {
    inner: DashMap<String, WalletConfig>,
}

impl WalletStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, tenant_id: &str) -> Option<WalletConfig> {
        self.inner.get(tenant_id).map(|w| w.clone())
    }

    /// Replace the tenant's configuration. Reconfiguration overwrites the
    /// previous ciphertext; old key material is not retained.
    pub fn upsert(&self, config: WalletConfig) {
        self.inner.insert(config.tenant_id.clone(), config);
    }

    /// Mutate the stored config in place under the entry guard.
    ///
    /// Returns `None` if the tenant has no configuration.
    pub fn update(
        &self,
        tenant_id: &str,
        mutate: impl FnOnce(&mut WalletConfig),
    ) -> Option<WalletConfig> {
        let mut entry = self.inner.get_mut(tenant_id)?;
        mutate(&mut entry);
        Some(entry.clone())
    }
}
