//! Append-only audit trail.
//!
//! Every state transition and configuration change lands here exactly once.
//! Entries are never updated or deleted.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Mutex;
use uuid::Uuid;

/// Audited actions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditAction {
    OrderApproved,
    OrderRejected,
    OrderExecuted,
    WalletConfigured,
    DualSignatureToggled,
    MarketplaceAutoEnabled,
}

impl AuditAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            AuditAction::OrderApproved => "order_approved",
            AuditAction::OrderRejected => "order_rejected",
            AuditAction::OrderExecuted => "order_executed",
            AuditAction::WalletConfigured => "wallet_configured",
            AuditAction::DualSignatureToggled => "dual_signature_toggled",
            AuditAction::MarketplaceAutoEnabled => "marketplace_auto_enabled",
        }
    }
}

/// One immutable audit record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditEntry {
    pub id: Uuid,
    pub tenant_id: String,
    pub action: AuditAction,
    pub entity_type: String,
    pub entity_id: String,
    /// `None` for system-initiated actions.
    pub actor: Option<String>,
    pub previous_status: Option<String>,
    pub new_status: Option<String>,
    pub ip_address: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Append-only log. The mutex guards the single append point; readers get
/// cloned snapshots.
#[derive(Debug, Default)]
pub struct AuditLog {
    entries: Mutex<Vec<AuditEntry>>,
}

impl AuditLog {
    pub fn new() -> Self {
        Self::default()
    }

    #[allow(clippy::too_many_arguments)]
    pub fn record(
        &self,
        tenant_id: &str,
        action: AuditAction,
        entity_type: &str,
        entity_id: &str,
        actor: Option<&str>,
        previous_status: Option<&str>,
        new_status: Option<&str>,
        ip_address: Option<&str>,
    ) {
        let entry = AuditEntry {
            id: Uuid::new_v4(),
            tenant_id: tenant_id.to_string(),
            action,
            entity_type: entity_type.to_string(),
            entity_id: entity_id.to_string(),
            actor: actor.map(str::to_string),
            previous_status: previous_status.map(str::to_string),
            new_status: new_status.map(str::to_string),
            ip_address: ip_address.map(str::to_string),
            created_at: Utc::now(),
        };

        tracing::debug!(
            tenant = %entry.tenant_id,
            action = entry.action.as_str(),
            entity = %entry.entity_id,
            "Audit entry recorded"
        );

        self.entries
            .lock()
            .expect("audit log mutex poisoned")
            .push(entry);
    }

    /// Newest-first slice of the tenant's history.
    pub fn recent(&self, tenant_id: &str, limit: usize) -> Vec<AuditEntry> {
        let entries = self.entries.lock().expect("audit log mutex poisoned");
        entries
            .iter()
            .rev()
            .filter(|e| e.tenant_id == tenant_id)
            .take(limit)
            .cloned()
            .collect()
    }

    pub fn len(&self) -> usize {
        self.entries.lock().expect("audit log mutex poisoned").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_and_recent() {
        let log = AuditLog::new();
        log.record(
            "tenant-a",
            AuditAction::OrderApproved,
            "order",
            "ORD-1",
            Some("alice"),
            Some("pending_approval"),
            Some("approved"),
            Some("10.0.0.1"),
        );
        log.record(
            "tenant-a",
            AuditAction::OrderExecuted,
            "order",
            "ORD-1",
            Some("alice"),
            Some("approved"),
            Some("executed"),
            None,
        );
        log.record(
            "tenant-b",
            AuditAction::OrderRejected,
            "order",
            "ORD-9",
            Some("bob"),
            Some("pending_approval"),
            Some("rejected"),
            None,
        );

        let recent = log.recent("tenant-a", 10);
        assert_eq!(recent.len(), 2);
        // Newest first
        assert_eq!(recent[0].action, AuditAction::OrderExecuted);
        assert_eq!(recent[1].action, AuditAction::OrderApproved);
    }

    #[test]
    fn test_recent_respects_limit() {
        let log = AuditLog::new();
        for i in 0..5 {
            log.record(
                "tenant-a",
                AuditAction::OrderApproved,
                "order",
                &format!("ORD-{i}"),
                None,
                None,
                None,
                None,
            );
        }
        assert_eq!(log.recent("tenant-a", 3).len(), 3);
        assert_eq!(log.len(), 5);
    }
}
