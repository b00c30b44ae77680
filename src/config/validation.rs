//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate value ranges (quotas > 0, timeouts > 0)
//! - Check addresses and URLs parse before the service accepts them
//!
//! # Design Decisions
//! - Returns all validation errors, not just the first
//! - Validation is a pure function: ServiceConfig → Result<(), Vec<ValidationError>>

use std::collections::HashSet;
use std::str::FromStr;

use alloy::primitives::Address;

use crate::config::schema::{ChainMode, ServiceConfig};

/// A single semantic problem in the configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    pub field: String,
    pub message: String,
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

/// Validate a loaded configuration.
pub fn validate_config(config: &ServiceConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.server.bind_address.parse::<std::net::SocketAddr>().is_err() {
        errors.push(ValidationError {
            field: "server.bind_address".into(),
            message: format!("not a valid socket address: {}", config.server.bind_address),
        });
    }

    if config.server.request_timeout_secs == 0 {
        errors.push(ValidationError {
            field: "server.request_timeout_secs".into(),
            message: "must be greater than zero".into(),
        });
    }

    let mut seen_tenants = HashSet::new();
    for tenant in &config.tenants {
        if tenant.tenant_id.is_empty() {
            errors.push(ValidationError {
                field: "tenants.tenant_id".into(),
                message: "must not be empty".into(),
            });
        }
        if tenant.api_key.len() < 8 {
            errors.push(ValidationError {
                field: format!("tenants.{}.api_key", tenant.tenant_id),
                message: "must be at least 8 characters".into(),
            });
        }
        if !seen_tenants.insert(tenant.tenant_id.clone()) {
            errors.push(ValidationError {
                field: "tenants".into(),
                message: format!("duplicate tenant_id: {}", tenant.tenant_id),
            });
        }
    }

    if config.rate_limit.max_operations == 0 {
        errors.push(ValidationError {
            field: "rate_limit.max_operations".into(),
            message: "must be greater than zero".into(),
        });
    }
    if config.rate_limit.window_secs == 0 {
        errors.push(ValidationError {
            field: "rate_limit.window_secs".into(),
            message: "must be greater than zero".into(),
        });
    }
    for (tenant_id, max) in &config.rate_limit.tenant_overrides {
        if *max == 0 {
            errors.push(ValidationError {
                field: format!("rate_limit.tenant_overrides.{tenant_id}"),
                message: "must be greater than zero".into(),
            });
        }
    }

    if config.chain.mode == ChainMode::Rpc {
        if url::Url::parse(&config.chain.rpc_url).is_err() {
            errors.push(ValidationError {
                field: "chain.rpc_url".into(),
                message: format!("not a valid URL: {}", config.chain.rpc_url),
            });
        }
        for failover in &config.chain.failover_urls {
            if url::Url::parse(failover).is_err() {
                errors.push(ValidationError {
                    field: "chain.failover_urls".into(),
                    message: format!("not a valid URL: {failover}"),
                });
            }
        }
        if Address::from_str(&config.chain.notary_address).is_err() {
            errors.push(ValidationError {
                field: "chain.notary_address".into(),
                message: format!("not a valid address: {}", config.chain.notary_address),
            });
        }
    }

    if config.chain.anchor.max_attempts == 0 {
        errors.push(ValidationError {
            field: "chain.anchor.max_attempts".into(),
            message: "must be greater than zero".into(),
        });
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
