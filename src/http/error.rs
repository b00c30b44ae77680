//! Domain-error to HTTP mapping.
//!
//! Validation and state failures come back as typed results from the
//! services; this is the single place they become status codes and JSON
//! bodies.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;

use crate::approval::ApprovalError;
use crate::certificate::VerifyError;
use crate::vault::VaultError;

/// API-facing error wrapper.
#[derive(Debug)]
pub enum ApiError {
    Approval(ApprovalError),
    Vault(VaultError),
    Verify(VerifyError),
    NotFound,
}

impl From<ApprovalError> for ApiError {
    fn from(err: ApprovalError) -> Self {
        ApiError::Approval(err)
    }
}

impl From<VaultError> for ApiError {
    fn from(err: VaultError) -> Self {
        ApiError::Vault(err)
    }
}

impl From<VerifyError> for ApiError {
    fn from(err: VerifyError) -> Self {
        ApiError::Verify(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, code, body) = match self {
            ApiError::NotFound => (
                StatusCode::NOT_FOUND,
                "not_found",
                json!({ "message": "resource not found" }),
            ),
            ApiError::Approval(err) => match &err {
                ApprovalError::NotFound => (
                    StatusCode::NOT_FOUND,
                    "not_found",
                    json!({ "message": err.to_string() }),
                ),
                ApprovalError::InvalidState { current } => (
                    StatusCode::CONFLICT,
                    "invalid_state",
                    json!({ "message": err.to_string(), "currentStatus": current.as_str() }),
                ),
                ApprovalError::MissingReason => (
                    StatusCode::BAD_REQUEST,
                    "missing_reason",
                    json!({ "message": err.to_string() }),
                ),
                ApprovalError::RateLimited { remaining, reset_at } => (
                    StatusCode::TOO_MANY_REQUESTS,
                    "rate_limited",
                    json!({
                        "message": err.to_string(),
                        "operationsRemaining": remaining,
                        "resetAt": reset_at,
                    }),
                ),
                ApprovalError::ExecutionFailed(cause) => (
                    StatusCode::BAD_GATEWAY,
                    "execution_failed",
                    json!({ "message": err.to_string(), "cause": cause }),
                ),
            },
            ApiError::Vault(err) => match &err {
                VaultError::InvalidAddress(_) => (
                    StatusCode::BAD_REQUEST,
                    "invalid_address",
                    json!({ "message": err.to_string() }),
                ),
                VaultError::WalletNotConfigured => (
                    StatusCode::BAD_REQUEST,
                    "wallet_not_configured",
                    json!({ "message": err.to_string() }),
                ),
                VaultError::KeyNotConfigured => (
                    StatusCode::BAD_REQUEST,
                    "key_not_configured",
                    json!({ "message": err.to_string() }),
                ),
                // Custody and integrity defects never expose detail
                _ => (
                    StatusCode::BAD_GATEWAY,
                    "vault_error",
                    json!({ "message": "key custody operation failed" }),
                ),
            },
            ApiError::Verify(VerifyError::NotFound) => (
                StatusCode::NOT_FOUND,
                "not_found",
                json!({ "message": "certificate not found" }),
            ),
            ApiError::Verify(VerifyError::ChainUnavailable) => (
                StatusCode::BAD_GATEWAY,
                "chain_unavailable",
                json!({ "message": "blockchain confirmation unavailable" }),
            ),
        };

        let mut payload = json!({ "error": code });
        if let (Some(map), Some(extra)) = (payload.as_object_mut(), body.as_object()) {
            for (k, v) in extra {
                map.insert(k.clone(), v.clone());
            }
        }

        (status, Json(payload)).into_response()
    }
}
