//! Shared harness for integration tests: a full service on an ephemeral
//! port, an in-memory chain, and two configured tenants.

#![allow(dead_code)]

use std::net::SocketAddr;
use std::sync::Arc;

use tokio::net::TcpListener;

use certgate::blockchain::{ChainRpc, InMemoryChain};
use certgate::config::{ServiceConfig, TenantConfig};
use certgate::http::{AppState, HttpServer};
use certgate::signing::PlatformWallet;
use certgate::store::{Order, OrderType};
use certgate::vault::MasterKey;

pub const TENANT_A: &str = "tenant-a";
pub const TENANT_A_KEY: &str = "tenant-a-key-1234";
pub const TENANT_B: &str = "tenant-b";
pub const TENANT_B_KEY: &str = "tenant-b-key-5678";

// Anvil's first two well-known dev accounts.
pub const PLATFORM_PRIVATE_KEY: &str =
    "ac0974bec39a17e36ba4a6b4d238ff944bacb478cbed5efcae784d7bf4f2ff80";
pub const TENANT_PRIVATE_KEY: &str =
    "59c6995e998f97a5a0044966f0945389dc9e86dae88c7a8412f4603b6b78690d";
pub const TENANT_WALLET_ADDRESS: &str = "0x70997970C51812dc3A010C7d01b50e0d17dc79C8";

pub fn test_config() -> ServiceConfig {
    let mut config = ServiceConfig::default();
    config.tenants = vec![
        TenantConfig {
            tenant_id: TENANT_A.into(),
            api_key: TENANT_A_KEY.into(),
        },
        TenantConfig {
            tenant_id: TENANT_B.into(),
            api_key: TENANT_B_KEY.into(),
        },
    ];
    // Keep anchor retries cheap under test.
    config.chain.anchor.max_attempts = 2;
    config.chain.anchor.base_delay_ms = 10;
    config.chain.anchor.max_delay_ms = 20;
    config
}

pub struct TestApp {
    pub base_url: String,
    pub state: AppState,
    pub chain: Arc<InMemoryChain>,
    pub client: reqwest::Client,
}

impl TestApp {
    pub async fn spawn() -> Self {
        Self::spawn_with(test_config()).await
    }

    pub async fn spawn_with(config: ServiceConfig) -> Self {
        let chain = Arc::new(InMemoryChain::new());
        let master_key = MasterKey::generate();
        let platform = PlatformWallet::from_private_key(PLATFORM_PRIVATE_KEY)
            .expect("valid platform key");

        let state = AppState::build(
            config,
            master_key,
            platform,
            Arc::clone(&chain) as Arc<dyn ChainRpc>,
        );

        let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
        let addr = listener.local_addr().expect("local addr");

        let router = HttpServer::new(state.clone()).router();
        tokio::spawn(async move {
            axum::serve(
                listener,
                router.into_make_service_with_connect_info::<SocketAddr>(),
            )
            .await
            .expect("server");
        });

        Self {
            base_url: format!("http://{addr}"),
            state,
            chain,
            client: reqwest::Client::new(),
        }
    }

    /// Seed a pending order for a tenant and return its id.
    pub fn seed_order(&self, tenant_id: &str, order_number: &str) -> uuid::Uuid {
        let order = Order::new(
            tenant_id,
            order_number,
            OrderType::Buy,
            "client-ref-1",
            "Solar Farm Token",
            "SOLAR",
            "1500",
            "75000.00",
            "EUR",
            "requester@example.com",
        );
        let id = order.id;
        self.state.orders.insert(order);
        id
    }

    pub fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base_url)
    }

    pub async fn get(&self, path: &str, api_key: &str) -> reqwest::Response {
        self.client
            .get(self.url(path))
            .bearer_auth(api_key)
            .send()
            .await
            .expect("request")
    }

    pub async fn post(
        &self,
        path: &str,
        api_key: &str,
        body: serde_json::Value,
    ) -> reqwest::Response {
        self.client
            .post(self.url(path))
            .bearer_auth(api_key)
            .json(&body)
            .send()
            .await
            .expect("request")
    }

    /// POST with no body, as the execute endpoint allows.
    pub async fn post_empty(&self, path: &str, api_key: &str) -> reqwest::Response {
        self.client
            .post(self.url(path))
            .bearer_auth(api_key)
            .send()
            .await
            .expect("request")
    }
}
