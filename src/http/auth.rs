//! Tenant bearer-token authentication.
//!
//! A static token → tenant mapping from configuration. Every request on
//! the authenticated surface gets a [`TenantContext`] extension; the
//! verification endpoints never pass through here.

use axum::{
    body::Body,
    extract::State,
    http::{Request, StatusCode},
    middleware::Next,
    response::Response,
};

use crate::http::server::AppState;

/// Identity of the authenticated caller.
#[derive(Debug, Clone)]
pub struct TenantContext {
    pub tenant_id: String,
    /// Acting user, from the `x-actor-id` header; defaults to the tenant.
    pub actor: String,
}

pub async fn tenant_auth_middleware(
    State(state): State<AppState>,
    mut request: Request<Body>,
    next: Next,
) -> Result<Response, StatusCode> {
    let token = request
        .headers()
        .get("Authorization")
        .and_then(|h| h.to_str().ok())
        .and_then(|h| h.strip_prefix("Bearer "));

    let tenant = token
        .and_then(|t| state.config.tenant_for_key(t))
        .ok_or(StatusCode::UNAUTHORIZED)?;

    let actor = request
        .headers()
        .get("x-actor-id")
        .and_then(|h| h.to_str().ok())
        .unwrap_or(&tenant.tenant_id)
        .to_string();

    request.extensions_mut().insert(TenantContext {
        tenant_id: tenant.tenant_id.clone(),
        actor,
    });

    Ok(next.run(request).await)
}
