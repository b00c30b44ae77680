//! Public certificate verification endpoints.
//!
//! No authentication and no tenant scoping; anyone holding a certificate
//! number or anchor transaction hash gets the same answer.

use axum::extract::{Path, State};
use axum::Json;
use serde::Serialize;
use serde_json::{json, Value};

use crate::certificate::VerificationResult;
use crate::http::error::ApiError;
use crate::http::server::AppState;

pub async fn verify_by_code(
    State(state): State<AppState>,
    Path(code): Path<String>,
) -> Result<Json<VerificationResult>, ApiError> {
    let result = state.verification.verify_by_code(&code).await?;
    Ok(Json(result))
}

pub async fn verify_by_tx_hash(
    State(state): State<AppState>,
    Path(hash): Path<String>,
) -> Result<Json<VerificationResult>, ApiError> {
    let result = state.verification.verify_by_tx_hash(&hash).await?;
    Ok(Json(result))
}

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub chain: Value,
}

pub async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    let reachable = state.chain.is_healthy().await;
    Json(HealthResponse {
        status: "ok",
        chain: json!({
            "network": state.config.chain.network,
            "reachable": reachable,
        }),
    })
}
