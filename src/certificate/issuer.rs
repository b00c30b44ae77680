//! Certificate assembly, content hashing, and anchoring.
//!
//! `issue` is all-or-nothing: the certificate record is only persisted
//! after the anchor transaction is accepted, so a failed anchor leaves no
//! partial state and the caller can retry. The order index in the store
//! guarantees at most one certificate per order.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use thiserror::Error;

use crate::blockchain::{ChainError, ChainRpc, ANCHOR_PREFIX};
use crate::config::AnchorRetryConfig;
use crate::observability::metrics;
use crate::resilience::anchor_retry_delay;
use crate::signing::SignatureProof;
use crate::store::{
    Certificate, CertificateStatus, CertificateStore, Order,
};

/// Canonical certificate payload. Field order is fixed by this struct;
/// its JSON serialization is the hashing pre-image, so the layout must
/// never change once certificates exist in the wild.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CertificatePayload {
    pub number: String,
    pub title: String,
    pub beneficiary: String,
    pub asset: String,
    pub token_amount: String,
    pub token_symbol: String,
    pub total_value: String,
    pub currency: String,
    /// RFC 3339, second precision.
    pub issued_at: String,
    pub signers: Vec<String>,
}

impl CertificatePayload {
    pub fn from_certificate(certificate: &Certificate) -> Self {
        Self {
            number: certificate.number.clone(),
            title: certificate.title.clone(),
            beneficiary: certificate.beneficiary.clone(),
            asset: certificate.asset_name.clone(),
            token_amount: certificate.token_amount.clone(),
            token_symbol: certificate.token_symbol.clone(),
            total_value: certificate.total_value.clone(),
            currency: certificate.currency.clone(),
            issued_at: certificate
                .issued_at
                .to_rfc3339_opts(chrono::SecondsFormat::Secs, true),
            signers: certificate.signer_addresses.clone(),
        }
    }
}

/// SHA-256 over the canonical JSON payload, hex-encoded.
pub fn content_hash(payload: &CertificatePayload) -> String {
    // Struct-order serialization keeps the pre-image deterministic.
    let bytes = serde_json::to_vec(payload).expect("payload serialization cannot fail");
    hex::encode(Sha256::digest(&bytes))
}

/// Errors from certificate issuance.
#[derive(Debug, Error)]
pub enum IssueError {
    /// The order already has a certificate.
    #[error("order already certified as {0}")]
    Duplicate(String),

    /// Anchoring failed after bounded retries. No certificate was created.
    #[error("anchoring failed: {0}")]
    Anchor(#[from] ChainError),
}

/// Builds and anchors certificates for executed orders.
pub struct CertificateIssuer {
    certificates: Arc<CertificateStore>,
    chain: Arc<dyn ChainRpc>,
    network: String,
    retry: AnchorRetryConfig,
}

impl CertificateIssuer {
    pub fn new(
        certificates: Arc<CertificateStore>,
        chain: Arc<dyn ChainRpc>,
        network: String,
        retry: AnchorRetryConfig,
    ) -> Self {
        Self {
            certificates,
            chain,
            network,
            retry,
        }
    }

    /// Issue a certificate for an executed order.
    pub async fn issue(
        &self,
        order: &Order,
        proof: &SignatureProof,
    ) -> Result<Certificate, IssueError> {
        if let Some(existing) = self.certificates.find_by_order(order.id) {
            return Err(IssueError::Duplicate(existing.number));
        }

        let mut certificate = Certificate {
            number: self.certificates.next_number(),
            tenant_id: order.tenant_id.clone(),
            order_id: order.id,
            title: format!("Ownership Certificate - {}", order.token_name),
            beneficiary: order.client_ref.clone(),
            asset_name: order.token_name.clone(),
            token_amount: order.token_amount.clone(),
            token_symbol: order.token_symbol.clone(),
            total_value: order.total_amount.clone(),
            currency: order.currency.clone(),
            issued_at: chrono::Utc::now(),
            status: CertificateStatus::Active,
            content_hash: String::new(),
            blockchain_tx_hash: String::new(),
            blockchain_network: self.network.clone(),
            signer_addresses: proof.signer_addresses(),
        };

        let payload = CertificatePayload::from_certificate(&certificate);
        certificate.content_hash = content_hash(&payload);

        let tx_hash = self.anchor_with_retry(&certificate.content_hash).await?;
        certificate.blockchain_tx_hash = tx_hash;

        self.certificates
            .insert_for_order(certificate.clone())
            .map_err(|e| IssueError::Duplicate(e.existing_number))?;

        tracing::info!(
            certificate = %certificate.number,
            order = %order.order_number,
            tx_hash = %certificate.blockchain_tx_hash,
            "Certificate issued and anchored"
        );

        Ok(certificate)
    }

    /// Submit the anchor transaction, retrying transient failures only.
    async fn anchor_with_retry(&self, hash_hex: &str) -> Result<String, ChainError> {
        let mut payload = ANCHOR_PREFIX.to_vec();
        payload.extend_from_slice(hash_hex.as_bytes());

        let mut attempt = 0;
        loop {
            attempt += 1;
            match self.chain.anchor(payload.clone()).await {
                Ok(tx_hash) => {
                    metrics::record_anchor_attempt("ok");
                    return Ok(tx_hash);
                }
                Err(e) if e.is_transient() && attempt < self.retry.max_attempts => {
                    metrics::record_anchor_attempt("retry");
                    let delay = anchor_retry_delay(attempt, &self.retry);
                    tracing::warn!(attempt = attempt, error = %e, delay = ?delay, "Anchor failed, retrying");
                    tokio::time::sleep(delay).await;
                }
                Err(e) => {
                    metrics::record_anchor_attempt("failed");
                    tracing::error!(attempt = attempt, error = %e, "Anchor failed");
                    return Err(e);
                }
            }
        }
    }
}

/// Extract the content hash from an anchored payload, if it carries the
/// service prefix.
pub fn hash_from_anchor_payload(payload: &[u8]) -> Option<&str> {
    let rest = payload.strip_prefix(ANCHOR_PREFIX)?;
    std::str::from_utf8(rest).ok()
}
