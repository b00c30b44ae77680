//! Order records and the conditional-update store.
//!
//! All status transitions go through [`OrderStore::update_if`], which holds
//! the map entry for the duration of the check-and-mutate closure. Two
//! concurrent transitions on one order therefore resolve to exactly one
//! winner; the loser observes the already-updated status.

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

/// Buy or sell side of an order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OrderType {
    Buy,
    Sell,
}

/// Order lifecycle states.
///
/// `pending_approval` -> `approved` -> `executed` (terminal)
/// `pending_approval` -> `rejected` (terminal)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    PendingApproval,
    Approved,
    Executed,
    Rejected,
}

impl OrderStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderStatus::PendingApproval => "pending_approval",
            OrderStatus::Approved => "approved",
            OrderStatus::Executed => "executed",
            OrderStatus::Rejected => "rejected",
        }
    }
}

impl std::fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A buy/sell request for tokens of a tokenized asset.
///
/// Amounts are carried as decimal strings so they stay byte-stable through
/// certificate hashing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Order {
    pub id: Uuid,
    pub tenant_id: String,
    pub order_number: String,
    pub order_type: OrderType,
    pub status: OrderStatus,
    pub client_ref: String,
    pub token_name: String,
    pub token_symbol: String,
    pub token_amount: String,
    pub total_amount: String,
    pub currency: String,
    pub requested_by: String,
    pub decided_by: Option<String>,
    pub rejection_reason: Option<String>,
    pub created_at: DateTime<Utc>,
    pub decided_at: Option<DateTime<Utc>>,
    pub executed_at: Option<DateTime<Utc>>,
}

impl Order {
    /// Create a new order in `pending_approval`.
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        tenant_id: impl Into<String>,
        order_number: impl Into<String>,
        order_type: OrderType,
        client_ref: impl Into<String>,
        token_name: impl Into<String>,
        token_symbol: impl Into<String>,
        token_amount: impl Into<String>,
        total_amount: impl Into<String>,
        currency: impl Into<String>,
        requested_by: impl Into<String>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            tenant_id: tenant_id.into(),
            order_number: order_number.into(),
            order_type,
            status: OrderStatus::PendingApproval,
            client_ref: client_ref.into(),
            token_name: token_name.into(),
            token_symbol: token_symbol.into(),
            token_amount: token_amount.into(),
            total_amount: total_amount.into(),
            currency: currency.into(),
            requested_by: requested_by.into(),
            decided_by: None,
            rejection_reason: None,
            created_at: Utc::now(),
            decided_at: None,
            executed_at: None,
        }
    }
}

/// Errors from conditional order updates.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("order not found")]
    NotFound,

    #[error("order is {current}, transition not allowed")]
    InvalidState { current: OrderStatus },
}

/// Keyed order collection with compare-and-swap updates.
#[derive(Debug, Default)]
pub struct OrderStore {
    inner: DashMap<Uuid, Order>,
}

impl OrderStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a new order. Called by the (external) trading flow and tests.
    pub fn insert(&self, order: Order) {
        self.inner.insert(order.id, order);
    }

    pub fn get(&self, id: Uuid) -> Option<Order> {
        self.inner.get(&id).map(|o| o.clone())
    }

    /// All orders in `pending_approval` for one tenant, oldest first.
    pub fn list_pending(&self, tenant_id: &str) -> Vec<Order> {
        let mut pending: Vec<Order> = self
            .inner
            .iter()
            .filter(|o| o.tenant_id == tenant_id && o.status == OrderStatus::PendingApproval)
            .map(|o| o.clone())
            .collect();
        pending.sort_by_key(|o| o.created_at);
        pending
    }

    /// Apply `mutate` to the order only if its status equals `expected`.
    ///
    /// The entry guard is held across check and mutation, so concurrent
    /// callers serialize here: exactly one observes `expected` and wins.
    pub fn update_if(
        &self,
        id: Uuid,
        expected: OrderStatus,
        mutate: impl FnOnce(&mut Order),
    ) -> Result<Order, StoreError> {
        let mut entry = self.inner.get_mut(&id).ok_or(StoreError::NotFound)?;
        if entry.status != expected {
            return Err(StoreError::InvalidState {
                current: entry.status,
            });
        }
        mutate(&mut entry);
        Ok(entry.clone())
    }
}
