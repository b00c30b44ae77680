//! Request handlers.

pub mod approvals;
pub mod verify;
