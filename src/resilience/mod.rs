//! Retry and backoff utilities for unreliable chain I/O.

pub mod backoff;

pub use backoff::anchor_retry_delay;
