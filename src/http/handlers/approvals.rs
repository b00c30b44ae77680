//! Tenant-scoped approval endpoints.

use axum::extract::{ConnectInfo, Path, Query, State};
use axum::{Extension, Json};
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use uuid::Uuid;

use crate::approval::ExecutionActions;
use crate::http::auth::TenantContext;
use crate::http::error::ApiError;
use crate::http::server::AppState;
use crate::signing::SignatureProof;
use crate::store::{AuditEntry, Order};

fn parse_order_id(raw: &str) -> Result<Uuid, ApiError> {
    Uuid::parse_str(raw).map_err(|_| ApiError::NotFound)
}

fn client_ip(addr: &SocketAddr) -> String {
    addr.ip().to_string()
}

#[derive(Serialize)]
pub struct PendingResponse {
    pub approvals: Vec<Order>,
    pub count: usize,
}

pub async fn list_pending(
    State(state): State<AppState>,
    Extension(ctx): Extension<TenantContext>,
) -> Json<PendingResponse> {
    let approvals = state.approvals.list_pending(&ctx.tenant_id);
    let count = approvals.len();
    Json(PendingResponse { approvals, count })
}

#[derive(Deserialize, Default)]
pub struct ApproveRequest {
    #[allow(dead_code)]
    pub notes: Option<String>,
}

#[derive(Serialize)]
pub struct OrderResponse {
    pub order: Order,
}

pub async fn approve(
    State(state): State<AppState>,
    Extension(ctx): Extension<TenantContext>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    Path(id): Path<String>,
    body: Option<Json<ApproveRequest>>,
) -> Result<Json<OrderResponse>, ApiError> {
    let _ = body;
    let order_id = parse_order_id(&id)?;
    let order = state.approvals.approve(
        order_id,
        &ctx.tenant_id,
        &ctx.actor,
        Some(&client_ip(&addr)),
    )?;
    Ok(Json(OrderResponse { order }))
}

#[derive(Deserialize)]
pub struct RejectRequest {
    #[serde(default)]
    pub reason: String,
    #[allow(dead_code)]
    pub notes: Option<String>,
}

pub async fn reject(
    State(state): State<AppState>,
    Extension(ctx): Extension<TenantContext>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    Path(id): Path<String>,
    Json(body): Json<RejectRequest>,
) -> Result<Json<OrderResponse>, ApiError> {
    let order_id = parse_order_id(&id)?;
    let order = state.approvals.reject(
        order_id,
        &ctx.tenant_id,
        &ctx.actor,
        &body.reason,
        Some(&client_ip(&addr)),
    )?;
    Ok(Json(OrderResponse { order }))
}

#[derive(Serialize)]
pub struct ExecuteResponse {
    pub order: Order,
    pub certificate: crate::store::Certificate,
    #[serde(rename = "dualSignature", skip_serializing_if = "Option::is_none")]
    pub dual_signature: Option<SignatureProof>,
    pub actions: ExecutionActions,
}

pub async fn execute(
    State(state): State<AppState>,
    Extension(ctx): Extension<TenantContext>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    Path(id): Path<String>,
) -> Result<Json<ExecuteResponse>, ApiError> {
    let order_id = parse_order_id(&id)?;
    let outcome = state
        .approvals
        .execute(
            order_id,
            &ctx.tenant_id,
            &ctx.actor,
            Some(&client_ip(&addr)),
        )
        .await?;

    let dual_signature = outcome.proof.dual.then_some(outcome.proof);
    Ok(Json(ExecuteResponse {
        order: outcome.order,
        certificate: outcome.certificate,
        dual_signature,
        actions: outcome.actions,
    }))
}

/// Wallet configuration as returned to callers. The private key never
/// appears here in any form; only its presence is reported.
#[derive(Serialize)]
pub struct WalletConfigView {
    #[serde(rename = "walletAddress")]
    pub wallet_address: Option<String>,
    pub has_private_key: bool,
    pub dual_signature_enabled: bool,
    pub network: Option<String>,
    pub configured_at: Option<chrono::DateTime<chrono::Utc>>,
}

pub async fn get_wallet_config(
    State(state): State<AppState>,
    Extension(ctx): Extension<TenantContext>,
) -> Json<WalletConfigView> {
    let view = match state.wallets.get(&ctx.tenant_id) {
        Some(config) => WalletConfigView {
            wallet_address: Some(config.wallet_address),
            has_private_key: config.encrypted_private_key.is_some(),
            dual_signature_enabled: config.dual_signature_enabled,
            network: Some(config.network),
            configured_at: Some(config.configured_at),
        },
        None => WalletConfigView {
            wallet_address: None,
            has_private_key: false,
            dual_signature_enabled: false,
            network: None,
            configured_at: None,
        },
    };
    Json(view)
}

#[derive(Deserialize)]
pub struct SetWalletConfigRequest {
    #[serde(rename = "walletAddress")]
    pub wallet_address: String,
    #[serde(rename = "privateKey")]
    pub private_key: Option<String>,
}

#[derive(Serialize)]
pub struct SetWalletConfigResponse {
    #[serde(rename = "walletConfig")]
    pub wallet_config: WalletConfigView,
}

pub async fn set_wallet_config(
    State(state): State<AppState>,
    Extension(ctx): Extension<TenantContext>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    Json(body): Json<SetWalletConfigRequest>,
) -> Result<Json<SetWalletConfigResponse>, ApiError> {
    let config = state.vault.configure(
        &ctx.tenant_id,
        &body.wallet_address,
        body.private_key.as_deref(),
        &state.config.chain.network,
        Some(&ctx.actor),
        Some(&client_ip(&addr)),
    )?;

    Ok(Json(SetWalletConfigResponse {
        wallet_config: WalletConfigView {
            wallet_address: Some(config.wallet_address),
            has_private_key: config.encrypted_private_key.is_some(),
            dual_signature_enabled: config.dual_signature_enabled,
            network: Some(config.network),
            configured_at: Some(config.configured_at),
        },
    }))
}

#[derive(Deserialize)]
pub struct ToggleDualSignatureRequest {
    pub enabled: bool,
}

#[derive(Serialize)]
pub struct ToggleDualSignatureResponse {
    pub dual_signature_enabled: bool,
}

pub async fn toggle_dual_signature(
    State(state): State<AppState>,
    Extension(ctx): Extension<TenantContext>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    Json(body): Json<ToggleDualSignatureRequest>,
) -> Result<Json<ToggleDualSignatureResponse>, ApiError> {
    let enabled = state.vault.toggle_dual_signature(
        &ctx.tenant_id,
        body.enabled,
        Some(&ctx.actor),
        Some(&client_ip(&addr)),
    )?;
    Ok(Json(ToggleDualSignatureResponse {
        dual_signature_enabled: enabled,
    }))
}

#[derive(Serialize)]
pub struct RateLimitStatusResponse {
    #[serde(rename = "operationsUsed")]
    pub operations_used: u32,
    #[serde(rename = "operationsRemaining")]
    pub operations_remaining: u32,
    #[serde(rename = "maxOperations")]
    pub max_operations: u32,
    #[serde(rename = "resetAt")]
    pub reset_at: chrono::DateTime<chrono::Utc>,
}

pub async fn rate_limit_status(
    State(state): State<AppState>,
    Extension(ctx): Extension<TenantContext>,
) -> Json<RateLimitStatusResponse> {
    let status = state.limiter.status(&ctx.tenant_id);
    Json(RateLimitStatusResponse {
        operations_used: status.used,
        operations_remaining: status.remaining,
        max_operations: status.max,
        reset_at: status.reset_at,
    })
}

#[derive(Deserialize)]
pub struct AuditQuery {
    pub limit: Option<usize>,
}

#[derive(Serialize)]
pub struct AuditResponse {
    pub history: Vec<AuditEntry>,
}

const AUDIT_DEFAULT_LIMIT: usize = 50;
const AUDIT_MAX_LIMIT: usize = 500;

pub async fn audit_history(
    State(state): State<AppState>,
    Extension(ctx): Extension<TenantContext>,
    Query(query): Query<AuditQuery>,
) -> Json<AuditResponse> {
    let limit = query
        .limit
        .unwrap_or(AUDIT_DEFAULT_LIMIT)
        .min(AUDIT_MAX_LIMIT);
    Json(AuditResponse {
        history: state.audit.recent(&ctx.tenant_id, limit),
    })
}
