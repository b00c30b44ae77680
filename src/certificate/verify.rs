//! Public certificate verification.
//!
//! Unauthenticated read path. Results expose only what a certificate
//! intentionally makes public; behavior does not vary by caller. Chain
//! unavailability degrades the confirmation section instead of failing
//! the whole lookup.

use std::sync::Arc;

use serde::Serialize;
use thiserror::Error;

use crate::certificate::issuer::{content_hash, hash_from_anchor_payload, CertificatePayload};
use crate::observability::metrics;
use crate::blockchain::{ChainRpc, TxLookup};
use crate::store::{Certificate, CertificateStatus, CertificateStore};

/// Publicly visible certificate fields. No tenant-internal identifiers,
/// no wallet material.
#[derive(Debug, Clone, Serialize)]
pub struct CertificatePublicView {
    pub number: String,
    pub title: String,
    pub beneficiary: String,
    pub asset: String,
    pub token_amount: String,
    pub token_symbol: String,
    pub total_value: String,
    pub currency: String,
    pub issued_at: chrono::DateTime<chrono::Utc>,
    pub status: CertificateStatus,
    pub content_hash: String,
    pub blockchain_tx_hash: String,
    pub blockchain_network: String,
}

impl From<&Certificate> for CertificatePublicView {
    fn from(certificate: &Certificate) -> Self {
        Self {
            number: certificate.number.clone(),
            title: certificate.title.clone(),
            beneficiary: certificate.beneficiary.clone(),
            asset: certificate.asset_name.clone(),
            token_amount: certificate.token_amount.clone(),
            token_symbol: certificate.token_symbol.clone(),
            total_value: certificate.total_value.clone(),
            currency: certificate.currency.clone(),
            issued_at: certificate.issued_at,
            status: certificate.status,
            content_hash: certificate.content_hash.clone(),
            blockchain_tx_hash: certificate.blockchain_tx_hash.clone(),
            blockchain_network: certificate.blockchain_network.clone(),
        }
    }
}

/// Live chain confirmation state for a certificate.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum ChainConfirmation {
    Confirmed {
        block_number: u64,
        block_timestamp: chrono::DateTime<chrono::Utc>,
        /// Whether the anchored payload matches the stored content hash.
        payload_matches: bool,
    },
    /// Submitted but not yet confirmed. Distinct from not found.
    Pending,
    /// The chain does not know this transaction.
    NotFound,
    /// The chain could not be queried right now.
    Unavailable,
}

/// Combined verification result.
#[derive(Debug, Clone, Serialize)]
pub struct VerificationResult {
    pub certificate: CertificatePublicView,
    /// Explicit revocation flag; a revoked certificate never verifies
    /// silently.
    pub revoked: bool,
    /// Whether the recomputed content hash matches the stored one.
    pub hash_valid: bool,
    pub blockchain: ChainConfirmation,
}

#[derive(Debug, Error)]
pub enum VerifyError {
    #[error("certificate not found")]
    NotFound,

    /// The lookup hinges on a chain read that could not be made. Distinct
    /// from not-found: the certificate may exist.
    #[error("blockchain confirmation unavailable")]
    ChainUnavailable,
}

/// Public, unauthenticated verification lookups.
pub struct VerificationService {
    certificates: Arc<CertificateStore>,
    chain: Arc<dyn ChainRpc>,
}

impl VerificationService {
    pub fn new(certificates: Arc<CertificateStore>, chain: Arc<dyn ChainRpc>) -> Self {
        Self {
            certificates,
            chain,
        }
    }

    /// Verify a certificate by its public code.
    pub async fn verify_by_code(&self, code: &str) -> Result<VerificationResult, VerifyError> {
        let certificate = self.certificates.get(code).ok_or_else(|| {
            metrics::record_verification("code", "not_found");
            VerifyError::NotFound
        })?;

        let result = self.assemble(&certificate).await;
        metrics::record_verification("code", "ok");
        Ok(result)
    }

    /// Verify by transaction hash: resolve the chain transaction first,
    /// then match it back to a certificate by its embedded content hash.
    pub async fn verify_by_tx_hash(&self, tx_hash: &str) -> Result<VerificationResult, VerifyError> {
        let certificate = match self.chain.resolve(tx_hash).await {
            Ok(TxLookup::Confirmed(tx)) => hash_from_anchor_payload(&tx.payload)
                .and_then(|hash| self.certificates.find_by_content_hash(hash)),
            // Unconfirmed or unknown: nothing to match on
            Ok(_) => None,
            // An unreachable chain is not "no such certificate"
            Err(e) => {
                metrics::record_verification("tx_hash", "unavailable");
                tracing::warn!(tx_hash = %tx_hash, error = %e, "Chain lookup unavailable");
                return Err(VerifyError::ChainUnavailable);
            }
        };

        let certificate = match certificate {
            Some(c) => c,
            None => {
                metrics::record_verification("tx_hash", "not_found");
                return Err(VerifyError::NotFound);
            }
        };

        let result = self.assemble(&certificate).await;
        metrics::record_verification("tx_hash", "ok");
        Ok(result)
    }

    async fn assemble(&self, certificate: &Certificate) -> VerificationResult {
        let recomputed = content_hash(&CertificatePayload::from_certificate(certificate));
        let hash_valid = recomputed == certificate.content_hash;

        let blockchain = match self.chain.resolve(&certificate.blockchain_tx_hash).await {
            Ok(TxLookup::Confirmed(tx)) => {
                let payload_matches = hash_from_anchor_payload(&tx.payload)
                    .map(|hash| hash == certificate.content_hash)
                    .unwrap_or(false);
                ChainConfirmation::Confirmed {
                    block_number: tx.block_number,
                    block_timestamp: tx.block_timestamp,
                    payload_matches,
                }
            }
            Ok(TxLookup::Pending) => ChainConfirmation::Pending,
            Ok(TxLookup::NotFound) => ChainConfirmation::NotFound,
            Err(e) => {
                tracing::warn!(certificate = %certificate.number, error = %e, "Chain lookup unavailable");
                ChainConfirmation::Unavailable
            }
        };

        VerificationResult {
            certificate: certificate.into(),
            revoked: certificate.status == CertificateStatus::Revoked,
            hash_valid,
            blockchain,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::blockchain::InMemoryChain;
    use crate::certificate::issuer::CertificateIssuer;
    use crate::config::AnchorRetryConfig;
    use crate::signing::{SignatureProof, SignerSignature};
    use crate::store::{Order, OrderType};

    async fn issued() -> (VerificationService, Arc<CertificateStore>, Certificate) {
        let chain = Arc::new(InMemoryChain::new());
        let certificates = Arc::new(CertificateStore::new());
        let issuer = CertificateIssuer::new(
            certificates.clone(),
            chain.clone(),
            "local".into(),
            AnchorRetryConfig::default(),
        );

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
        let proof = SignatureProof {
            payload_digest: "00".repeat(32),
            signers: vec![SignerSignature {
                address: "0xf39Fd6e51aad88F6F4ce6aB8827279cffFb92266".into(),
                signature: "11".repeat(65),
            }],
            dual: false,
        };
        let certificate = issuer.issue(&order, &proof).await.unwrap();

        let service = VerificationService::new(certificates.clone(), chain);
        (service, certificates, certificate)
    }

    #[tokio::test]
    async fn test_verify_by_code() {
        let (service, _, certificate) = issued().await;

        let result = service.verify_by_code(&certificate.number).await.unwrap();
        assert!(result.hash_valid);
        assert!(!result.revoked);
        match result.blockchain {
            ChainConfirmation::Confirmed { payload_matches, .. } => assert!(payload_matches),
            other => panic!("expected confirmed, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_verify_symmetry() {
        let (service, _, certificate) = issued().await;

        let by_code = service.verify_by_code(&certificate.number).await.unwrap();
        let by_tx = service
            .verify_by_tx_hash(&certificate.blockchain_tx_hash)
            .await
            .unwrap();

        assert_eq!(by_code.certificate.number, by_tx.certificate.number);
        assert_eq!(by_code.certificate.content_hash, by_tx.certificate.content_hash);
        assert_eq!(by_code.hash_valid, by_tx.hash_valid);
    }

    #[tokio::test]
    async fn test_unknown_code_and_hash() {
        let (service, _, _) = issued().await;
        assert!(matches!(
            service.verify_by_code("CERT-0000-00000").await,
            Err(VerifyError::NotFound)
        ));
        assert!(matches!(
            service.verify_by_tx_hash("0xabcdef").await,
            Err(VerifyError::NotFound)
        ));
    }

    /// Chain whose reads always fail, as during a node outage.
    struct DownChain;

    #[async_trait::async_trait]
    impl ChainRpc for DownChain {
        async fn anchor(&self, _payload: Vec<u8>) -> crate::blockchain::ChainResult<String> {
            Err(crate::blockchain::ChainError::Rpc("node down".into()))
        }

        async fn resolve(&self, _tx_hash: &str) -> crate::blockchain::ChainResult<TxLookup> {
            Err(crate::blockchain::ChainError::Rpc("node down".into()))
        }

        async fn is_healthy(&self) -> bool {
            false
        }
    }

    #[tokio::test]
    async fn test_chain_outage_is_not_reported_as_missing() {
        let (_, certificates, certificate) = issued().await;
        let degraded = VerificationService::new(certificates, Arc::new(DownChain));

        // By code the record still verifies, with the chain section degraded
        let result = degraded.verify_by_code(&certificate.number).await.unwrap();
        assert!(result.hash_valid);
        assert!(matches!(result.blockchain, ChainConfirmation::Unavailable));

        // By tx hash the lookup needs the chain, so it degrades explicitly
        // rather than claiming the certificate does not exist
        assert!(matches!(
            degraded
                .verify_by_tx_hash(&certificate.blockchain_tx_hash)
                .await,
            Err(VerifyError::ChainUnavailable)
        ));
    }

    #[tokio::test]
    async fn test_revoked_is_explicit() {
        let (service, certificates, certificate) = issued().await;
        certificates.revoke(&certificate.number).unwrap();

        let result = service.verify_by_code(&certificate.number).await.unwrap();
        assert!(result.revoked);
        assert_eq!(result.certificate.status, CertificateStatus::Revoked);
    }

    #[tokio::test]
    async fn test_tampered_record_fails_hash_check() {
        let chain = Arc::new(InMemoryChain::new());
        let certificates = Arc::new(CertificateStore::new());
        let issuer = CertificateIssuer::new(
            certificates.clone(),
            chain.clone(),
            "local".into(),
            AnchorRetryConfig::default(),
        );
        let order = Order::new(
            "tenant-a", "ORD-1", OrderType::Sell, "client-2", "Dock Nine", "DCK",
            "10", "900.00", "EUR", "user-2",
        );
        let proof = SignatureProof {
            payload_digest: "00".repeat(32),
            signers: vec![],
            dual: false,
        };
        let issued = issuer.issue(&order, &proof).await.unwrap();

        // Tamper with a declared field behind the store's back
        let mut tampered = certificates.get(&issued.number).unwrap();
        tampered.token_amount = "9999".into();
        let service = VerificationService::new(certificates.clone(), chain);
        let recomputed = content_hash(&CertificatePayload::from_certificate(&tampered));
        assert_ne!(recomputed, tampered.content_hash);

        // Untampered store record still verifies
        let result = service.verify_by_code(&issued.number).await.unwrap();
        assert!(result.hash_valid);
    }
}
