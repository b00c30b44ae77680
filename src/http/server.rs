//! Router assembly and server lifecycle.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::middleware;
use axum::routing::{get, post};
use axum::Router;
use tokio::net::TcpListener;
use tower::ServiceBuilder;
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer};
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;

use crate::approval::{ApprovalService, RateLimiter};
use crate::blockchain::ChainRpc;
use crate::certificate::{CertificateIssuer, VerificationService};
use crate::config::ServiceConfig;
use crate::http::auth::tenant_auth_middleware;
use crate::http::handlers::{approvals, verify};
use crate::signing::{DualSignatureCoordinator, PlatformWallet};
use crate::store::{AuditLog, CertificateStore, OrderStore, WalletStore};
use crate::vault::{KeyVault, MasterKey};

/// Shared handles for all request handlers. Cheap to clone.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<ServiceConfig>,
    pub orders: Arc<OrderStore>,
    pub wallets: Arc<WalletStore>,
    pub certificates: Arc<CertificateStore>,
    pub audit: Arc<AuditLog>,
    pub limiter: Arc<RateLimiter>,
    pub vault: Arc<KeyVault>,
    pub approvals: Arc<ApprovalService>,
    pub verification: Arc<VerificationService>,
    pub chain: Arc<dyn ChainRpc>,
}

impl AppState {
    /// Wire the full service graph from its three inputs: validated
    /// configuration, the vault master key, and the platform wallet.
    pub fn build(
        config: ServiceConfig,
        master_key: MasterKey,
        platform: PlatformWallet,
        chain: Arc<dyn ChainRpc>,
    ) -> Self {
        let config = Arc::new(config);
        let orders = Arc::new(OrderStore::new());
        let wallets = Arc::new(WalletStore::new());
        let certificates = Arc::new(CertificateStore::new());
        let audit = Arc::new(AuditLog::new());
        let limiter = Arc::new(RateLimiter::new(config.rate_limit.clone()));

        let vault = Arc::new(KeyVault::new(
            master_key,
            Arc::clone(&wallets),
            Arc::clone(&audit),
        ));
        let coordinator = Arc::new(DualSignatureCoordinator::new(
            platform,
            Arc::clone(&vault),
            Arc::clone(&wallets),
        ));
        let issuer = Arc::new(CertificateIssuer::new(
            Arc::clone(&certificates),
            Arc::clone(&chain),
            config.chain.network.clone(),
            config.chain.anchor.clone(),
        ));
        let approvals = Arc::new(ApprovalService::new(
            Arc::clone(&orders),
            Arc::clone(&audit),
            Arc::clone(&limiter),
            coordinator,
            issuer,
        ));
        let verification = Arc::new(VerificationService::new(
            Arc::clone(&certificates),
            Arc::clone(&chain),
        ));

        Self {
            config,
            orders,
            wallets,
            certificates,
            audit,
            limiter,
            vault,
            approvals,
            verification,
            chain,
        }
    }
}

pub struct HttpServer {
    state: AppState,
}

impl HttpServer {
    pub fn new(state: AppState) -> Self {
        Self { state }
    }

    pub fn router(&self) -> Router {
        let state = self.state.clone();

        let authed = Router::new()
            .route("/approvals/pending", get(approvals::list_pending))
            .route("/approvals/{id}/approve", post(approvals::approve))
            .route("/approvals/{id}/reject", post(approvals::reject))
            .route("/approvals/{id}/execute", post(approvals::execute))
            .route(
                "/approvals/wallet-config",
                get(approvals::get_wallet_config).post(approvals::set_wallet_config),
            )
            .route(
                "/approvals/toggle-dual-signature",
                post(approvals::toggle_dual_signature),
            )
            .route(
                "/approvals/rate-limit-status",
                get(approvals::rate_limit_status),
            )
            .route("/approvals/audit", get(approvals::audit_history))
            .layer(middleware::from_fn_with_state(
                state.clone(),
                tenant_auth_middleware,
            ));

        let public = Router::new()
            .route("/marketplace/verify/{code}", get(verify::verify_by_code))
            .route(
                "/marketplace/verify-tx/{hash}",
                get(verify::verify_by_tx_hash),
            )
            .route("/health", get(verify::health));

        // Outermost first: the request id exists before anything traces it
        Router::new()
            .merge(authed)
            .merge(public)
            .layer(
                ServiceBuilder::new()
                    .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
                    .layer(PropagateRequestIdLayer::x_request_id())
                    .layer(TraceLayer::new_for_http())
                    .layer(RequestBodyLimitLayer::new(
                        self.state.config.server.max_body_bytes,
                    ))
                    .layer(TimeoutLayer::new(Duration::from_secs(
                        self.state.config.server.request_timeout_secs,
                    ))),
            )
            .with_state(state)
    }

    /// Serve until ctrl-c. In-flight requests drain before exit.
    pub async fn run(&self, listener: TcpListener) -> std::io::Result<()> {
        let addr = listener.local_addr()?;
        tracing::info!(%addr, "Listening");

        axum::serve(
            listener,
            self.router()
                .into_make_service_with_connect_info::<SocketAddr>(),
        )
        .with_graceful_shutdown(shutdown_signal())
        .await
    }
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %err, "Failed to install shutdown handler");
        return;
    }
    tracing::info!("Shutdown signal received, draining connections");
}
