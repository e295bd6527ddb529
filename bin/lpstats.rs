use std::sync::Arc;

use alloy::primitives::U256;
use anyhow::Context;
use clap::Parser;
use jemallocator::Jemalloc;
use log::{info, warn, LevelFilter};
use simple_logger::SimpleLogger;

#[global_allocator]
static GLOBAL: Jemalloc = Jemalloc;

use lpstats::{AnalyticsOptions, CachedReader, PositionAnalytics, RequestCache, RpcReader, Settings};

#[derive(Parser, Debug)]
#[command(name = "lpstats")]
#[command(about = "Deposits, withdrawals, fees and APR of a concentrated-liquidity position")]
struct Args {
    /// Position NFT id
    position_id: U256,

    /// Configuration file name, extension optional
    #[arg(short, long, default_value = "config")]
    config: String,

    /// Debug logging
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main()]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    SimpleLogger::new()
        .with_level(if args.verbose {
            LevelFilter::Debug
        } else {
            LevelFilter::Info
        })
        .init()
        .context("Failed to install logger")?;

    let settings = Settings::from_file(&args.config)
        .with_context(|| format!("Failed to load configuration from {}", args.config))?;

    let cache = Arc::new(RequestCache::new());
    if let Some(path) = &settings.cache.path {
        if let Err(e) = cache.load(path).await {
            warn!("Ignoring unreadable cache {path}: {e:#}");
        }
    }

    let reader = RpcReader::connect(&settings.rpc, &settings.contracts)
        .await
        .context("Failed to connect to RPC endpoint")?;
    let chain_id = reader.chain_id();
    info!("Connected to chain {chain_id}");

    let analytics = PositionAnalytics::new(
        CachedReader::new(reader, cache.clone(), chain_id),
        AnalyticsOptions::from(&settings.analytics),
    );
    let stats = analytics
        .position_stats(args.position_id)
        .await
        .with_context(|| format!("Failed to compute stats for position {}", args.position_id))?;

    if let Some(path) = &settings.cache.path {
        cache.save(path).await?;
    }

    println!("{stats}");
    Ok(())
}
