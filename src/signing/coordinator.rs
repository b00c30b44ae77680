//! Dual-signature coordination.
//!
//! Decides per tenant whether an execution is signed by the platform
//! wallet alone or co-signed by the tenant's vaulted wallet. A tenant
//! signature failure fails the whole operation; the configured policy is
//! never silently downgraded to single-signature.

use std::str::FromStr;
use std::sync::Arc;

use alloy::primitives::B256;
use alloy::signers::local::PrivateKeySigner;
use alloy::signers::Signer;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use thiserror::Error;

use crate::signing::wallet::{PlatformWallet, WalletError};
use crate::store::{Order, WalletStore};
use crate::vault::{KeyVault, VaultError};

/// One signer's contribution to a proof.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SignerSignature {
    pub address: String,
    /// 65-byte signature, hex-encoded.
    pub signature: String,
}

/// Combined proof over an execution payload.
///
/// Opaque to the state machine beyond pass/fail; the certificate issuer
/// embeds it in the certificate record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SignatureProof {
    /// SHA-256 of the execution payload, hex-encoded.
    pub payload_digest: String,
    /// Signatures in signing order: tenant first when dual, platform last.
    pub signers: Vec<SignerSignature>,
    pub dual: bool,
}

impl SignatureProof {
    pub fn signer_addresses(&self) -> Vec<String> {
        self.signers.iter().map(|s| s.address.clone()).collect()
    }
}

/// Errors from signature coordination.
#[derive(Debug, Error)]
pub enum SigningError {
    #[error(transparent)]
    Vault(#[from] VaultError),

    #[error("platform signing failed: {0}")]
    Platform(#[from] WalletError),

    /// Tenant co-signature could not be produced. Not recoverable by
    /// falling back to single-signature.
    #[error("tenant signature failed: {0}")]
    TenantSigner(String),
}

/// Orchestrates one or two signing calls per execution.
pub struct DualSignatureCoordinator {
    platform: PlatformWallet,
    vault: Arc<KeyVault>,
    wallets: Arc<WalletStore>,
}

impl DualSignatureCoordinator {
    pub fn new(platform: PlatformWallet, vault: Arc<KeyVault>, wallets: Arc<WalletStore>) -> Self {
        Self {
            platform,
            vault,
            wallets,
        }
    }

    pub fn platform_address(&self) -> String {
        self.platform.address().to_checksum(None)
    }

    /// Produce the signature proof for an order execution.
    pub async fn sign(&self, order: &Order) -> Result<SignatureProof, SigningError> {
        let digest = execution_digest(order);
        let dual = self
            .wallets
            .get(&order.tenant_id)
            .map(|w| w.dual_signature_enabled)
            .unwrap_or(false);

        let mut signers = Vec::with_capacity(2);

        if dual {
            signers.push(self.tenant_signature(&order.tenant_id, digest).await?);
        }

        let platform_sig = self.platform.sign_digest(digest).await?;
        signers.push(SignerSignature {
            address: self.platform.address().to_checksum(None),
            signature: hex::encode(platform_sig.as_bytes()),
        });

        tracing::info!(
            order = %order.order_number,
            dual = dual,
            signers = signers.len(),
            "Execution signed"
        );

        Ok(SignatureProof {
            payload_digest: hex::encode(digest),
            signers,
            dual,
        })
    }

    /// Sign with the tenant's vaulted key. The decrypted key lives only
    /// inside this call.
    async fn tenant_signature(
        &self,
        tenant_id: &str,
        digest: B256,
    ) -> Result<SignerSignature, SigningError> {
        let configured = self
            .wallets
            .get(tenant_id)
            .ok_or(VaultError::WalletNotConfigured)?;

        let plaintext = self.vault.decrypt(tenant_id)?;
        let signer = PrivateKeySigner::from_str(
            plaintext.expose().strip_prefix("0x").unwrap_or(plaintext.expose()),
        )
        .map_err(|_| SigningError::TenantSigner("stored key does not parse".into()))?;

        // The vaulted key must belong to the configured wallet address.
        if signer.address().to_checksum(None) != configured.wallet_address {
            return Err(SigningError::TenantSigner(
                "stored key does not match configured wallet address".into(),
            ));
        }

        let signature = signer
            .sign_hash(&digest)
            .await
            .map_err(|e| SigningError::TenantSigner(format!("{e}")))?;

        Ok(SignerSignature {
            address: signer.address().to_checksum(None),
            signature: hex::encode(signature.as_bytes()),
        })
    }
}

/// Deterministic digest over the fields an execution commits to.
pub fn execution_digest(order: &Order) -> B256 {
    let mut hasher = Sha256::new();
    hasher.update(order.order_number.as_bytes());
    hasher.update(b"|");
    hasher.update(order.tenant_id.as_bytes());
    hasher.update(b"|");
    hasher.update(order.token_symbol.as_bytes());
    hasher.update(b"|");
    hasher.update(order.token_amount.as_bytes());
    hasher.update(b"|");
    hasher.update(order.total_amount.as_bytes());
    hasher.update(b"|");
    hasher.update(order.currency.as_bytes());
    B256::from_slice(&hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{AuditLog, OrderType};
    use crate::vault::MasterKey;

    // Anvil's first two well-known account keys.
    const PLATFORM_KEY: &str = "ac0974bec39a17e36ba4a6b4d238ff944bacb478cbed5efcae784d7bf4f2ff80";
    const TENANT_KEY: &str = "59c6995e998f97a5a0044966f0945389dc9e86dae88c7a8412f4603b6b78690d";
    const TENANT_ADDRESS: &str = "0x70997970C51812dc3A010C7d01b50e0d17dc79C8";

    fn setup() -> (DualSignatureCoordinator, Arc<KeyVault>, Order) {
        let wallets = Arc::new(WalletStore::new());
        let audit = Arc::new(AuditLog::new());
        let vault = Arc::new(KeyVault::new(MasterKey::generate(), wallets.clone(), audit));
        let platform = PlatformWallet::from_private_key(PLATFORM_KEY).unwrap();
        let coordinator = DualSignatureCoordinator::new(platform, vault.clone(), wallets);

        let order = Order::new(
            "tenant-a",
            "ORD-100",
            OrderType::Buy,
            "client-1",
            "Harbor Tower",
            "HBT",
            "250",
            "12500.00",
            "USD",
            "user-1",
        );
        (coordinator, vault, order)
    }

    #[tokio::test]
    async fn test_single_signature_when_disabled() {
        let (coordinator, _vault, order) = setup();

        let proof = coordinator.sign(&order).await.unwrap();
        assert!(!proof.dual);
        assert_eq!(proof.signers.len(), 1);
        assert_eq!(
            proof.signers[0].address.to_lowercase(),
            "0xf39fd6e51aad88f6f4ce6ab8827279cfffb92266"
        );
    }

    #[tokio::test]
    async fn test_dual_signature_when_enabled() {
        let (coordinator, vault, order) = setup();
        vault
            .configure("tenant-a", TENANT_ADDRESS, Some(TENANT_KEY), "polygon", None, None)
            .unwrap();
        vault.toggle_dual_signature("tenant-a", true, None, None).unwrap();

        let proof = coordinator.sign(&order).await.unwrap();
        assert!(proof.dual);
        assert_eq!(proof.signers.len(), 2);
        // Tenant first, platform last
        assert_eq!(proof.signers[0].address, TENANT_ADDRESS);
        assert_eq!(
            proof.signers[1].address.to_lowercase(),
            "0xf39fd6e51aad88f6f4ce6ab8827279cfffb92266"
        );
    }

    #[tokio::test]
    async fn test_dual_without_key_fails_without_fallback() {
        let (coordinator, vault, order) = setup();
        vault
            .configure("tenant-a", TENANT_ADDRESS, None, "polygon", None, None)
            .unwrap();
        vault.toggle_dual_signature("tenant-a", true, None, None).unwrap();

        let result = coordinator.sign(&order).await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_key_address_mismatch_rejected() {
        let (coordinator, vault, order) = setup();
        // Key belongs to a different address than the configured wallet
        vault
            .configure(
                "tenant-a",
                "0xf39Fd6e51aad88F6F4ce6aB8827279cffFb92266",
                Some(TENANT_KEY),
                "polygon",
                None,
                None,
            )
            .unwrap();
        vault.toggle_dual_signature("tenant-a", true, None, None).unwrap();

        let result = coordinator.sign(&order).await;
        assert!(matches!(result, Err(SigningError::TenantSigner(_))));
    }

    #[test]
    fn test_execution_digest_is_field_sensitive() {
        let (_, _, order) = setup();
        let base = execution_digest(&order);

        let mut altered = order.clone();
        altered.token_amount = "251".into();
        assert_ne!(base, execution_digest(&altered));
        assert_eq!(base, execution_digest(&order));
    }
}
