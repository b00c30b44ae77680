//! HTTP surface.
//!
//! Tenant-scoped endpoints live under `/approvals/*` behind bearer-token
//! auth; the verification endpoints under `/marketplace/*` are public.

pub mod auth;
pub mod error;
pub mod handlers;
pub mod server;

pub use server::{AppState, HttpServer};
