//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the
//! certification service. All types derive Serde traits for
//! deserialization from config files.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Root configuration for the certification service.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct ServiceConfig {
    /// HTTP server settings (bind address, timeouts, body limits).
    pub server: ServerConfig,

    /// Tenants allowed to call the authenticated endpoints.
    pub tenants: Vec<TenantConfig>,

    /// Approval/execution rate limiting.
    pub rate_limit: RateLimitConfig,

    /// Blockchain anchoring settings.
    pub chain: ChainConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,
}

/// HTTP server configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Bind address (e.g., "0.0.0.0:8080").
    pub bind_address: String,

    /// Request timeout (total time for request/response) in seconds.
    pub request_timeout_secs: u64,

    /// Maximum request body size in bytes.
    pub max_body_bytes: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:8080".to_string(),
            request_timeout_secs: 30,
            max_body_bytes: 256 * 1024,
        }
    }
}

/// One tenant allowed through the authenticated API surface.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct TenantConfig {
    /// Tenant identifier, referenced by orders and wallet configs.
    pub tenant_id: String,

    /// Bearer token for this tenant (static mapping; a production IdP is
    /// out of scope).
    pub api_key: String,
}

/// Whether approve and execute draw from one counter or separate ones.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum QuotaScope {
    /// One combined counter for all approval-affecting operations.
    Combined,
    /// Separate counters per operation kind.
    #[default]
    PerAction,
}

/// Rate limiting configuration for approval-affecting operations.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct RateLimitConfig {
    /// Default maximum operations per window.
    pub max_operations: u32,

    /// Sliding window length in seconds.
    pub window_secs: u64,

    /// Counter scope (combined vs per-action).
    pub scope: QuotaScope,

    /// Per-tenant overrides of `max_operations`.
    pub tenant_overrides: HashMap<String, u32>,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            max_operations: 3,
            window_secs: 3600,
            scope: QuotaScope::default(),
            tenant_overrides: HashMap::new(),
        }
    }
}

/// Chain backend selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ChainMode {
    /// In-process chain stub for local development and tests.
    #[default]
    InMemory,
    /// External node over JSON-RPC.
    Rpc,
}

/// Blockchain anchoring configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ChainConfig {
    /// Backend mode.
    pub mode: ChainMode,

    /// JSON-RPC endpoint URL.
    pub rpc_url: String,

    /// Failover JSON-RPC endpoint URLs.
    pub failover_urls: Vec<String>,

    /// Chain ID (e.g., 137 for Polygon, 31337 for local Anvil).
    pub chain_id: u64,

    /// Human-readable network name recorded on certificates.
    pub network: String,

    /// Address anchor transactions are sent to.
    pub notary_address: String,

    /// RPC request timeout in seconds.
    pub rpc_timeout_secs: u64,

    /// Number of block confirmations required before a transaction is
    /// reported as confirmed.
    pub confirmation_blocks: u32,

    /// Retry policy for anchor submissions.
    pub anchor: AnchorRetryConfig,
}

impl Default for ChainConfig {
    fn default() -> Self {
        Self {
            mode: ChainMode::default(),
            rpc_url: "http://localhost:8545".to_string(),
            failover_urls: Vec::new(),
            chain_id: 31337,
            network: "local".to_string(),
            notary_address: "0x0000000000000000000000000000000000000000".to_string(),
            rpc_timeout_secs: 10,
            confirmation_blocks: 3,
            anchor: AnchorRetryConfig::default(),
        }
    }
}

/// Bounded retry with exponential backoff for anchor submissions.
/// Only transient failures are retried.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct AnchorRetryConfig {
    /// Maximum number of attempts (first try included).
    pub max_attempts: u32,

    /// Base delay for exponential backoff in milliseconds.
    pub base_delay_ms: u64,

    /// Maximum delay for exponential backoff in milliseconds.
    pub max_delay_ms: u64,
}

impl Default for AnchorRetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay_ms: 200,
            max_delay_ms: 2000,
        }
    }
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Enable metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            metrics_enabled: false,
            metrics_address: "0.0.0.0:9090".to_string(),
        }
    }
}

impl ServiceConfig {
    /// Look up a tenant by its bearer token.
    pub fn tenant_for_key(&self, api_key: &str) -> Option<&TenantConfig> {
        self.tenants.iter().find(|t| t.api_key == api_key)
    }
}
