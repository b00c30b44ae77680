//! Service entry point.

use std::path::Path;
use std::sync::Arc;

use clap::Parser;
use tokio::net::TcpListener;

use certgate::blockchain::{ChainRpc, InMemoryChain, RpcChain};
use certgate::config::{load_config, ChainMode, ServiceConfig};
use certgate::http::{AppState, HttpServer};
use certgate::observability::{logging, metrics};
use certgate::signing::PlatformWallet;
use certgate::vault::MasterKey;

#[derive(Parser, Debug)]
#[command(name = "certgate", about = "Order approval and certification service")]
struct Args {
    /// Path to the TOML configuration file. Defaults apply when omitted.
    #[arg(long)]
    config: Option<String>,

    /// Override the configured bind address.
    #[arg(long)]
    bind: Option<String>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    let mut config = match &args.config {
        Some(path) => load_config(Path::new(path))?,
        None => ServiceConfig::default(),
    };
    if let Some(bind) = args.bind {
        config.server.bind_address = bind;
    }

    logging::init(&config.observability.log_level);
    tracing::info!(
        bind_address = %config.server.bind_address,
        tenants = config.tenants.len(),
        chain_mode = ?config.chain.mode,
        network = %config.chain.network,
        "Configuration loaded"
    );

    let master_key = MasterKey::from_env()?;
    let platform = PlatformWallet::from_env()?;
    tracing::info!(platform_address = %platform.address(), "Platform wallet loaded");

    let chain: Arc<dyn ChainRpc> = match config.chain.mode {
        ChainMode::InMemory => {
            tracing::warn!("Using in-memory chain; anchors are not durable");
            Arc::new(InMemoryChain::new())
        }
        ChainMode::Rpc => Arc::new(RpcChain::new(&config.chain, &platform)?),
    };

    if config.observability.metrics_enabled {
        match config.observability.metrics_address.parse() {
            Ok(addr) => {
                if let Err(err) = metrics::install_exporter(addr) {
                    tracing::error!(error = %err, "Metrics exporter not started");
                }
            }
            Err(_) => {
                tracing::error!(
                    metrics_address = %config.observability.metrics_address,
                    "Failed to parse metrics address"
                );
            }
        }
    }

    let listener = TcpListener::bind(&config.server.bind_address).await?;
    let state = AppState::build(config, master_key, platform, chain);
    let server = HttpServer::new(state);
    server.run(listener).await?;

    tracing::info!("Shutdown complete");
    Ok(())
}
