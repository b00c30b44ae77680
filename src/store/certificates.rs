//! Certificate records and the one-per-order constraint.
//!
//! `content_hash` and `blockchain_tx_hash` must stay byte-stable once a
//! certificate is issued; outside parties verify against them.

use chrono::{DateTime, Utc};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};
use uuid::Uuid;

/// Certificate lifecycle. `active -> revoked`, never backward.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CertificateStatus {
    Active,
    Revoked,
}

/// Immutable proof of one executed order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Certificate {
    pub number: String,
    pub tenant_id: String,
    pub order_id: Uuid,
    pub title: String,
    pub beneficiary: String,
    pub asset_name: String,
    pub token_amount: String,
    pub token_symbol: String,
    pub total_value: String,
    pub currency: String,
    pub issued_at: DateTime<Utc>,
    pub status: CertificateStatus,
    /// SHA-256 of the canonical certificate payload, hex-encoded.
    pub content_hash: String,
    pub blockchain_tx_hash: String,
    pub blockchain_network: String,
    /// Addresses that signed the execution, in signing order.
    pub signer_addresses: Vec<String>,
}

/// Certificate collection indexed by number, order, and content hash.
#[derive(Debug, Default)]
pub struct CertificateStore {
    by_number: DashMap<String, Certificate>,
    by_order: DashMap<Uuid, String>,
    by_hash: DashMap<String, String>,
    sequence: AtomicU64,
}

impl CertificateStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Next human-readable certificate number, e.g. `CERT-2026-00007`.
    pub fn next_number(&self) -> String {
        let seq = self.sequence.fetch_add(1, Ordering::SeqCst) + 1;
        format!("CERT-{}-{:05}", Utc::now().format("%Y"), seq)
    }

    /// Insert a certificate, enforcing at most one per order.
    ///
    /// The order index entry is claimed atomically; a concurrent duplicate
    /// insert for the same order loses here.
    pub fn insert_for_order(&self, certificate: Certificate) -> Result<(), DuplicateCertificate> {
        match self.by_order.entry(certificate.order_id) {
            Entry::Occupied(existing) => Err(DuplicateCertificate {
                existing_number: existing.get().clone(),
            }),
            Entry::Vacant(slot) => {
                slot.insert(certificate.number.clone());
                self.by_hash
                    .insert(certificate.content_hash.clone(), certificate.number.clone());
                self.by_number
                    .insert(certificate.number.clone(), certificate);
                Ok(())
            }
        }
    }

    pub fn get(&self, number: &str) -> Option<Certificate> {
        self.by_number.get(number).map(|c| c.clone())
    }

    pub fn find_by_order(&self, order_id: Uuid) -> Option<Certificate> {
        let number = self.by_order.get(&order_id)?;
        self.get(number.value())
    }

    pub fn find_by_content_hash(&self, content_hash: &str) -> Option<Certificate> {
        let number = self.by_hash.get(content_hash)?;
        self.get(number.value())
    }

    /// `active -> revoked`. Driven by an external revocation action.
    pub fn revoke(&self, number: &str) -> Option<Certificate> {
        let mut entry = self.by_number.get_mut(number)?;
        entry.status = CertificateStatus::Revoked;
        Some(entry.clone())
    }
}

/// An order already has a certificate.
#[derive(Debug, thiserror::Error)]
#[error("order already certified as {existing_number}")]
pub struct DuplicateCertificate {
    pub existing_number: String,
}
