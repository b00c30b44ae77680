//! Order approval workflow.
//!
//! # Responsibilities
//! - Own the order lifecycle: `pending_approval` → `approved` →
//!   `executed`, with `rejected` as the alternate terminal state
//! - Bound approval-affecting operations per tenant and hour
//! - Write one audit entry per transition

pub mod rate_limit;
pub mod state_machine;

pub use rate_limit::{Decision, QuotaStatus, RateLimiter};
pub use state_machine::{ApprovalError, ApprovalService, ExecutionActions, ExecutionOutcome};
