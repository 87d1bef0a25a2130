//! Refresh scheduler
//!
//! Background loop that keeps the cache warm: every interval it walks the
//! registry in dependency order (base tokens first, composites after their
//! components) and prices each layer concurrently on a JoinSet. Per-symbol
//! failures are logged and isolated — a dead feed for one token never aborts
//! the pass. Shutdown mid-pass just drops the in-flight layer; entries
//! already written stay valid.
//!
//! Author: AI-Generated
//! Created: 2026-08-05

use crate::price_log::PriceLogger;
use crate::valuation::ValuationEngine;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tokio::sync::watch;
use tokio::task::JoinSet;
use tokio_stream::wrappers::IntervalStream;
use tokio_stream::StreamExt;
use tracing::{debug, error, info, warn};

pub struct RefreshScheduler {
    engine: Arc<ValuationEngine>,
    interval: Duration,
    price_log: Option<Mutex<PriceLogger>>,
}

/// Outcome counts for one full pass
#[derive(Debug, Default, Clone, Copy)]
pub struct PassStats {
    pub ok: usize,
    pub failed: usize,
}

impl RefreshScheduler {
    pub fn new(engine: Arc<ValuationEngine>, interval: Duration) -> Self {
        Self {
            engine,
            interval,
            price_log: None,
        }
    }

    /// Append each pass's cache snapshot to a daily CSV history
    pub fn with_price_log(mut self, logger: PriceLogger) -> Self {
        self.price_log = Some(Mutex::new(logger));
        self
    }

    /// Run until the shutdown channel flips. The first pass fires
    /// immediately (interval streams tick once at startup).
    pub async fn run(&self, mut shutdown: watch::Receiver<bool>) {
        info!(
            "Refresh scheduler started: interval {}s",
            self.interval.as_secs()
        );
        let mut ticks = IntervalStream::new(tokio::time::interval(self.interval));

        loop {
            tokio::select! {
                _ = ticks.next() => {
                    tokio::select! {
                        stats = self.refresh_pass() => {
                            debug!("pass complete: {} ok, {} failed", stats.ok, stats.failed);
                        }
                        _ = shutdown.changed() => {
                            info!("Refresh scheduler stopping mid-pass");
                            return;
                        }
                    }
                }
                _ = shutdown.changed() => {
                    info!("Refresh scheduler stopping");
                    return;
                }
            }
        }
    }

    /// One full valuation pass in topological order. Symbols within a layer
    /// are priced concurrently; layers run in sequence so a composite never
    /// computes from a component the same pass could have refreshed.
    pub async fn refresh_pass(&self) -> PassStats {
        let started = Instant::now();
        let mut stats = PassStats::default();

        for layer in self.engine.registry().topo_layers() {
            let mut tasks = JoinSet::new();
            for symbol in layer {
                let engine = Arc::clone(&self.engine);
                tasks.spawn(async move {
                    let result = engine.price_of(&symbol).await;
                    (symbol, result)
                });
            }

            while let Some(joined) = tasks.join_next().await {
                match joined {
                    Ok((symbol, Ok(price))) => {
                        debug!("refreshed {} = {:.6}", symbol, price);
                        stats.ok += 1;
                    }
                    Ok((symbol, Err(e))) => {
                        warn!("refresh failed for {}: {}", symbol, e);
                        stats.failed += 1;
                    }
                    Err(e) => {
                        error!("refresh task panicked: {}", e);
                        stats.failed += 1;
                    }
                }
            }
        }

        info!(
            "Valuation pass: {} ok, {} failed in {}ms",
            stats.ok,
            stats.failed,
            started.elapsed().as_millis()
        );

        if let Some(logger) = &self.price_log {
            let snapshot = self.engine.cache().snapshot();
            match logger.lock() {
                Ok(mut logger) => logger.log_pass(&snapshot),
                Err(e) => error!("price log lock poisoned: {}", e),
            }
        }

        stats
    }

    /// On-demand invalidation and recompute, e.g. after a new pool
    /// registration. Returns the fresh (or fallback) price.
    pub async fn force_refresh(&self, symbol: &str) -> Result<f64, crate::error::ValuationError> {
        self.engine.cache().invalidate(symbol);
        self.engine.price_of(symbol).await
    }
}
