//! Order approval state machine.
//!
//! Transitions are conditional updates against the stored status, so two
//! concurrent calls on one order resolve to exactly one winner. Every
//! quota-drawing transition additionally claims a per-order guard before
//! consuming, and re-reads the status under it, so a losing racer never
//! spends quota and a losing execute never reaches the chain. A failed
//! execution leaves the order `approved` and retryable.

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use serde::Serialize;
use std::sync::Arc;
use thiserror::Error;
use uuid::Uuid;

use crate::approval::rate_limit::RateLimiter;
use crate::certificate::{CertificateIssuer, IssueError};
use crate::observability::metrics;
use crate::signing::{DualSignatureCoordinator, SignatureProof};
use crate::store::{
    AuditAction, AuditLog, Certificate, Order, OrderStatus, OrderStore, StoreError,
};

/// Errors surfaced by approval operations.
#[derive(Debug, Error)]
pub enum ApprovalError {
    #[error("order not found")]
    NotFound,

    #[error("order is {current}, transition not allowed")]
    InvalidState { current: OrderStatus },

    #[error("rejection requires a reason")]
    MissingReason,

    #[error("rate limit exhausted, resets at {reset_at}")]
    RateLimited {
        remaining: u32,
        reset_at: DateTime<Utc>,
    },

    /// Signing or anchoring failed; no state was committed and the call
    /// is safe to retry.
    #[error("execution failed: {0}")]
    ExecutionFailed(String),
}

impl From<StoreError> for ApprovalError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound => ApprovalError::NotFound,
            StoreError::InvalidState { current } => ApprovalError::InvalidState { current },
        }
    }
}

/// Side effects of an execution, as a tagged shape callers can branch on.
#[derive(Debug, Clone, Copy, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecutionActions {
    pub status_changed: bool,
    pub tenant_marketplace_auto_enabled: bool,
}

/// Everything a successful execution produced.
#[derive(Debug, Clone)]
pub struct ExecutionOutcome {
    pub order: Order,
    pub certificate: Certificate,
    pub proof: SignatureProof,
    pub actions: ExecutionActions,
}

/// Owns the order lifecycle from creation to terminal state.
pub struct ApprovalService {
    orders: Arc<OrderStore>,
    audit: Arc<AuditLog>,
    limiter: Arc<RateLimiter>,
    coordinator: Arc<DualSignatureCoordinator>,
    issuer: Arc<CertificateIssuer>,
    marketplace_enabled: DashMap<String, bool>,
    in_transition: DashMap<Uuid, ()>,
}

impl ApprovalService {
    pub fn new(
        orders: Arc<OrderStore>,
        audit: Arc<AuditLog>,
        limiter: Arc<RateLimiter>,
        coordinator: Arc<DualSignatureCoordinator>,
        issuer: Arc<CertificateIssuer>,
    ) -> Self {
        Self {
            orders,
            audit,
            limiter,
            coordinator,
            issuer,
            marketplace_enabled: DashMap::new(),
            in_transition: DashMap::new(),
        }
    }

    /// Fetch an order scoped to the calling tenant. Cross-tenant lookups
    /// report not-found rather than leaking existence.
    fn tenant_order(&self, order_id: Uuid, tenant_id: &str) -> Result<Order, ApprovalError> {
        let order = self.orders.get(order_id).ok_or(ApprovalError::NotFound)?;
        if order.tenant_id != tenant_id {
            return Err(ApprovalError::NotFound);
        }
        Ok(order)
    }

    pub fn list_pending(&self, tenant_id: &str) -> Vec<Order> {
        self.orders.list_pending(tenant_id)
    }

    /// `pending_approval` → `approved`.
    pub fn approve(
        &self,
        order_id: Uuid,
        tenant_id: &str,
        actor: &str,
        ip: Option<&str>,
    ) -> Result<Order, ApprovalError> {
        let order = self.tenant_order(order_id, tenant_id)?;
        if order.status != OrderStatus::PendingApproval {
            return Err(ApprovalError::InvalidState {
                current: order.status,
            });
        }

        // Claim the order before drawing quota; a concurrent transition
        // in flight means this call loses either way.
        let _guard = match TransitionGuard::acquire(&self.in_transition, order_id) {
            Some(guard) => guard,
            None => {
                return Err(ApprovalError::InvalidState {
                    current: order.status,
                })
            }
        };

        // Re-read under the guard: a racer that won between the first
        // check and the claim must not cost this caller quota.
        let order = self.tenant_order(order_id, tenant_id)?;
        if order.status != OrderStatus::PendingApproval {
            return Err(ApprovalError::InvalidState {
                current: order.status,
            });
        }

        let decision = self.limiter.consume(tenant_id, "approve");
        if !decision.allowed {
            metrics::record_rate_limited("approve".into());
            tracing::info!(tenant = %tenant_id, order = %order.order_number, "Approve denied by rate limit");
            return Err(ApprovalError::RateLimited {
                remaining: decision.remaining,
                reset_at: decision.reset_at,
            });
        }

        let updated = self
            .orders
            .update_if(order_id, OrderStatus::PendingApproval, |o| {
                o.status = OrderStatus::Approved;
                o.decided_by = Some(actor.to_string());
                o.decided_at = Some(Utc::now());
            })?;

        self.audit.record(
            tenant_id,
            AuditAction::OrderApproved,
            "order",
            &updated.order_number,
            Some(actor),
            Some(OrderStatus::PendingApproval.as_str()),
            Some(OrderStatus::Approved.as_str()),
            ip,
        );
        metrics::record_transition("approve", "ok");
        tracing::info!(tenant = %tenant_id, order = %updated.order_number, actor = %actor, "Order approved");

        Ok(updated)
    }

    /// `pending_approval` → `rejected`. Requires a non-empty reason.
    pub fn reject(
        &self,
        order_id: Uuid,
        tenant_id: &str,
        actor: &str,
        reason: &str,
        ip: Option<&str>,
    ) -> Result<Order, ApprovalError> {
        self.tenant_order(order_id, tenant_id)?;
        if reason.trim().is_empty() {
            return Err(ApprovalError::MissingReason);
        }

        let updated = self
            .orders
            .update_if(order_id, OrderStatus::PendingApproval, |o| {
                o.status = OrderStatus::Rejected;
                o.decided_by = Some(actor.to_string());
                o.decided_at = Some(Utc::now());
                o.rejection_reason = Some(reason.trim().to_string());
            })?;

        self.audit.record(
            tenant_id,
            AuditAction::OrderRejected,
            "order",
            &updated.order_number,
            Some(actor),
            Some(OrderStatus::PendingApproval.as_str()),
            Some(OrderStatus::Rejected.as_str()),
            ip,
        );
        metrics::record_transition("reject", "ok");
        tracing::info!(tenant = %tenant_id, order = %updated.order_number, actor = %actor, "Order rejected");

        Ok(updated)
    }

    /// `approved` → `executed`: sign, anchor, certify.
    ///
    /// On any signing or anchoring failure the order stays `approved` and
    /// the call can be retried.
    pub async fn execute(
        &self,
        order_id: Uuid,
        tenant_id: &str,
        actor: &str,
        ip: Option<&str>,
    ) -> Result<ExecutionOutcome, ApprovalError> {
        let order = self.tenant_order(order_id, tenant_id)?;
        if order.status != OrderStatus::Approved {
            return Err(ApprovalError::InvalidState {
                current: order.status,
            });
        }

        // One executor per order at a time; a concurrent loser never
        // signs or anchors.
        let _guard = match TransitionGuard::acquire(&self.in_transition, order_id) {
            Some(guard) => guard,
            None => {
                return Err(ApprovalError::InvalidState {
                    current: order.status,
                })
            }
        };

        // Re-read under the guard so a caller arriving right after the
        // winner released it fails here, before spending quota.
        let order = self.tenant_order(order_id, tenant_id)?;
        if order.status != OrderStatus::Approved {
            return Err(ApprovalError::InvalidState {
                current: order.status,
            });
        }

        let decision = self.limiter.consume(tenant_id, "execute");
        if !decision.allowed {
            metrics::record_rate_limited("execute".into());
            return Err(ApprovalError::RateLimited {
                remaining: decision.remaining,
                reset_at: decision.reset_at,
            });
        }

        let proof = self.coordinator.sign(&order).await.map_err(|e| {
            metrics::record_transition("execute", "signing_failed");
            tracing::warn!(order = %order.order_number, error = %e, "Execution signing failed");
            ApprovalError::ExecutionFailed(e.to_string())
        })?;

        let certificate = match self.issuer.issue(&order, &proof).await {
            Ok(certificate) => certificate,
            Err(IssueError::Duplicate(_)) => {
                // Someone already certified this order; the status CAS
                // below would reject anyway.
                return Err(ApprovalError::InvalidState {
                    current: OrderStatus::Executed,
                });
            }
            Err(IssueError::Anchor(e)) => {
                metrics::record_transition("execute", "anchor_failed");
                tracing::warn!(order = %order.order_number, error = %e, "Anchoring failed, order stays approved");
                return Err(ApprovalError::ExecutionFailed(e.to_string()));
            }
        };

        let updated = self.orders.update_if(order_id, OrderStatus::Approved, |o| {
            o.status = OrderStatus::Executed;
            o.executed_at = Some(Utc::now());
        })?;

        self.audit.record(
            tenant_id,
            AuditAction::OrderExecuted,
            "order",
            &updated.order_number,
            Some(actor),
            Some(OrderStatus::Approved.as_str()),
            Some(OrderStatus::Executed.as_str()),
            ip,
        );
        metrics::record_transition("execute", "ok");

        // First executed order flips the tenant's marketplace listing on
        let first_execution = self
            .marketplace_enabled
            .insert(tenant_id.to_string(), true)
            .is_none();
        if first_execution {
            self.audit.record(
                tenant_id,
                AuditAction::MarketplaceAutoEnabled,
                "tenant",
                tenant_id,
                None,
                None,
                None,
                None,
            );
        }

        tracing::info!(
            tenant = %tenant_id,
            order = %updated.order_number,
            certificate = %certificate.number,
            dual = proof.dual,
            "Order executed"
        );

        Ok(ExecutionOutcome {
            order: updated,
            certificate,
            proof,
            actions: ExecutionActions {
                status_changed: true,
                tenant_marketplace_auto_enabled: first_execution,
            },
        })
    }
}

/// RAII claim on an order's transition slot.
struct TransitionGuard<'a> {
    in_transition: &'a DashMap<Uuid, ()>,
    order_id: Uuid,
}

impl<'a> TransitionGuard<'a> {
    fn acquire(in_transition: &'a DashMap<Uuid, ()>, order_id: Uuid) -> Option<Self> {
        use dashmap::mapref::entry::Entry;
        match in_transition.entry(order_id) {
            Entry::Occupied(_) => None,
            Entry::Vacant(slot) => {
                slot.insert(());
                Some(Self {
                    in_transition,
                    order_id,
                })
            }
        }
    }
}

impl Drop for TransitionGuard<'_> {
    fn drop(&mut self) {
        self.in_transition.remove(&self.order_id);
    }
}
