//! Valuation & arbitrage-signal engine
//!
//! Main entry point. Loads the token/pool registry, spins up the refresh
//! scheduler, and periodically reports arbitrage signals on traded
//! composites. SIGHUP re-reads the registry file (admin processes update it
//! out of band) and restarts the stack with the revalidated graph; a cyclic
//! registry aborts startup loudly.
//!
//! Author: AI-Generated
//! Created: 2026-08-06

use anyhow::{Context, Result};
use clap::Parser;
use futures::StreamExt;
use lpval_engine::api::EngineHandle;
use lpval_engine::arbitrage::ArbitrageDetector;
use lpval_engine::cache::PriceCache;
use lpval_engine::config::{load_config, EngineConfig};
use lpval_engine::price_log::PriceLogger;
use lpval_engine::registry::Registry;
use lpval_engine::scheduler::RefreshScheduler;
use lpval_engine::sources::{HttpMarketSource, HttpReserveSource};
use lpval_engine::valuation::{ValuationEngine, ValuationTuning};
use signal_hook::consts::SIGHUP;
use signal_hook_tokio::Signals;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::watch;
use tracing::{error, info, warn};
use tracing_subscriber::{fmt, EnvFilter};

/// Reload flag - set by SIGHUP handler
static RELOAD_FLAG: AtomicBool = AtomicBool::new(false);

/// LP & Synthetic Token Valuation and Arbitrage-Signal Engine
#[derive(Parser)]
#[command(name = "lpval-engine")]
struct Args {
    /// Registry TOML file (overrides REGISTRY_FILE)
    #[arg(short, long, env = "REGISTRY_FILE")]
    registry: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let args = Args::parse();

    info!("===========================================");
    info!("   LP Valuation & Arbitrage-Signal Engine");
    info!("===========================================");

    // Set up SIGHUP handler for registry hot reload
    let mut signals = Signals::new([SIGHUP])?;
    tokio::spawn(async move {
        while let Some(sig) = signals.next().await {
            if sig == SIGHUP {
                info!("Received SIGHUP - flagging registry reload");
                RELOAD_FLAG.store(true, Ordering::SeqCst);
            }
        }
    });

    // Main loop - restarts the stack on registry reload
    loop {
        let mut config = load_config().context("Failed to load configuration")?;
        if let Some(registry_file) = &args.registry {
            config.registry_file = registry_file.clone();
        }

        match run_engine(&config).await {
            Ok(true) => {
                info!("Restarting with reloaded registry...");
                continue;
            }
            Ok(false) => {
                info!("Engine stopped normally");
                break;
            }
            Err(e) => {
                // A cyclic or unreadable registry is fatal configuration,
                // not a transient condition
                error!("Engine failed to start: {:#}", e);
                std::process::exit(1);
            }
        }
    }

    Ok(())
}

/// Run the engine stack until shutdown. Returns true when a SIGHUP asked for
/// a registry reload, false on ctrl-c.
async fn run_engine(config: &EngineConfig) -> Result<bool> {
    let registry = Arc::new(
        Registry::load(&config.registry_file)
            .with_context(|| format!("registry {} rejected", config.registry_file))?,
    );
    info!(
        "Registry validated: {} symbols, {} traded composites",
        registry.all_symbols().len(),
        registry.traded_composites().len()
    );

    let market = Arc::new(HttpMarketSource::new(
        &config.market_api_url,
        config.source_timeout,
    )?);
    let reserves = Arc::new(HttpReserveSource::new(
        &config.node_api_url,
        config.source_timeout,
    )?);

    let cache = PriceCache::new();
    let engine = Arc::new(ValuationEngine::new(
        Arc::clone(&registry),
        cache.clone(),
        market,
        reserves,
        ValuationTuning::from(config),
    ));

    let mut scheduler = RefreshScheduler::new(Arc::clone(&engine), config.refresh_interval);
    if let Some(dir) = &config.price_log_dir {
        scheduler = scheduler.with_price_log(PriceLogger::new(dir));
    }
    let scheduler = Arc::new(scheduler);

    let detector = ArbitrageDetector::new(Arc::clone(&registry), cache);
    let handle = EngineHandle::new(Arc::clone(&engine), Arc::clone(&scheduler), detector);

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let scheduler_task = {
        let scheduler = Arc::clone(&scheduler);
        tokio::spawn(async move { scheduler.run(shutdown_rx).await })
    };

    // Report loop: periodic signal scan + reload/ctrl-c watch
    let mut report = tokio::time::interval(config.report_interval);
    report.tick().await; // skip the immediate tick
    let reload = loop {
        tokio::select! {
            _ = report.tick() => {
                let signals = handle.get_arbitrage_signals(config.arb_threshold_pct);
                if signals.is_empty() {
                    info!(
                        "No discrepancies above {:.1}% ({} prices cached)",
                        config.arb_threshold_pct * 100.0,
                        handle.get_all_prices().len()
                    );
                }
                // One JSON line per signal for downstream consumers
                for signal in &signals {
                    match serde_json::to_string(signal) {
                        Ok(line) => info!("signal: {}", line),
                        Err(e) => warn!("failed to serialize signal: {}", e),
                    }
                }
                if RELOAD_FLAG.swap(false, Ordering::SeqCst) {
                    break true;
                }
            }
            result = tokio::signal::ctrl_c() => {
                if let Err(e) = result {
                    warn!("ctrl-c handler failed: {}", e);
                }
                info!("Shutdown requested");
                break false;
            }
        }
    };

    let _ = shutdown_tx.send(true);
    if let Err(e) = scheduler_task.await {
        warn!("scheduler task ended abnormally: {}", e);
    }

    Ok(reload)
}
