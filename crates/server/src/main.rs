//! Player auction server.
//!
//! Hosts the auction engine behind a JSON-RPC endpoint and runs the
//! deadline sweep in the background.

use anyhow::{Context, Result};
use clap::Parser;
use jsonrpsee::server::Server;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

use auction_module::{AuctionEngine, EngineConfig};

mod clock;
mod codes;
mod hooks;
mod rpc;

use clock::Clock;
use hooks::TracingHooks;
use rpc::{AuctionApiServer, AuctionServer};

#[derive(Parser)]
#[command(name = "auction-server")]
#[command(about = "JSON-RPC server for live player auctions")]
struct Args {
    /// Address to listen on
    #[arg(long, default_value = "127.0.0.1:9944")]
    listen: SocketAddr,

    /// Engine configuration (JSON); defaults when omitted
    #[arg(long)]
    config: Option<PathBuf>,

    /// Use a manual clock starting at this unix timestamp (testing)
    #[arg(long)]
    manual_clock: Option<u64>,

    /// Extra log directive, e.g. `auction_module=debug`
    #[arg(long)]
    log_filter: Option<String>,
}

fn load_config(path: Option<&PathBuf>) -> Result<EngineConfig> {
    let Some(path) = path else {
        return Ok(EngineConfig::default());
    };
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("reading config {}", path.display()))?;
    let config: EngineConfig = serde_json::from_str(&raw)
        .with_context(|| format!("parsing config {}", path.display()))?;
    Ok(config)
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Initialize logging
    let mut filter = tracing_subscriber::EnvFilter::from_default_env()
        .add_directive("auction_server=info".parse()?)
        .add_directive("auction_module=info".parse()?)
        .add_directive("jsonrpsee=warn".parse()?);
    if let Some(directive) = &args.log_filter {
        filter = filter.add_directive(directive.parse()?);
    }
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let config = load_config(args.config.as_ref())?;
    let sweep_interval = Duration::from_millis(config.sweep_interval_ms);

    let engine = Arc::new(AuctionEngine::with_hooks(config, Arc::new(TracingHooks))?);
    let clock = Arc::new(match args.manual_clock {
        Some(start) => {
            warn!("Running on a manual clock starting at {}", start);
            Clock::manual(start)
        }
        None => Clock::System,
    });

    let sweeper = {
        let engine = Arc::clone(&engine);
        let clock = Arc::clone(&clock);
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(sweep_interval);
            loop {
                interval.tick().await;
                rpc::sweep(&engine, &clock);
            }
        })
    };

    info!("Starting auction server on {}", args.listen);

    let server = Server::builder().build(args.listen).await?;
    let handle = server.start(AuctionServer::new(engine, clock).into_rpc());

    info!("Auction server running. Press Ctrl+C to stop.");

    // Wait for shutdown signal
    tokio::signal::ctrl_c().await?;

    info!("Shutting down...");
    sweeper.abort();
    handle.stop()?;
    handle.stopped().await;

    Ok(())
}
