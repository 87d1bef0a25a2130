//! Valuation engine
//!
//! Prices any registered symbol: base tokens from the market feed, composite
//! tokens recursively from their pool's reserves and component prices. One
//! pass carries a memo (each symbol computed at most once — diamonds
//! short-circuit) and an in-progress set (re-entry means a cycle). Concurrent
//! callers for the same symbol coalesce onto a single in-flight computation.
//!
//! Failure policy: a source failure falls back to the last cached value
//! flagged stale; only a symbol with no history surfaces `SourceUnavailable`.
//! Never returns a silent zero.
//!
//! Author: AI-Generated
//! Created: 2026-08-04
//! Modified: 2026-08-06 - single-flight coalescing via watch channels

use crate::cache::PriceCache;
use crate::config::EngineConfig;
use crate::error::ValuationError;
use crate::registry::Registry;
use crate::sources::{MarketPriceSource, PoolReserveSource};
use crate::types::{PriceSource, TokenDescriptor, TokenKind};
use dashmap::DashMap;
use std::collections::{HashMap, HashSet};
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::time::timeout;
use tracing::{debug, warn};

type PriceResult = Result<f64, ValuationError>;

/// TTL / timeout knobs, split out of the full EngineConfig so tests can
/// construct an engine without env plumbing.
#[derive(Debug, Clone)]
pub struct ValuationTuning {
    pub market_ttl: Duration,
    pub derived_ttl: Duration,
    pub source_timeout: Duration,
}

impl Default for ValuationTuning {
    fn default() -> Self {
        Self {
            market_ttl: Duration::from_secs(60),
            derived_ttl: Duration::from_secs(300),
            source_timeout: Duration::from_secs(8),
        }
    }
}

impl From<&EngineConfig> for ValuationTuning {
    fn from(config: &EngineConfig) -> Self {
        Self {
            market_ttl: config.market_ttl,
            derived_ttl: config.derived_ttl,
            source_timeout: config.source_timeout,
        }
    }
}

/// Per-pass recursion state
#[derive(Default)]
struct PassCtx {
    /// Symbols already priced this pass (diamond short-circuit)
    memo: HashMap<String, f64>,
    /// Symbols currently on the recursion path (cycle guard)
    in_progress: HashSet<String>,
}

/// The valuation engine. Cheap to share behind an Arc; the cache and
/// in-flight map are the only mutable state and both are concurrent maps.
pub struct ValuationEngine {
    registry: Arc<Registry>,
    cache: PriceCache,
    market: Arc<dyn MarketPriceSource>,
    reserves: Arc<dyn PoolReserveSource>,
    tuning: ValuationTuning,
    /// symbol -> receiver for the in-flight computation's result
    inflight: DashMap<String, watch::Receiver<Option<PriceResult>>>,
}

impl ValuationEngine {
    pub fn new(
        registry: Arc<Registry>,
        cache: PriceCache,
        market: Arc<dyn MarketPriceSource>,
        reserves: Arc<dyn PoolReserveSource>,
        tuning: ValuationTuning,
    ) -> Self {
        Self {
            registry,
            cache,
            market,
            reserves,
            tuning,
            inflight: DashMap::new(),
        }
    }

    pub fn cache(&self) -> &PriceCache {
        &self.cache
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    /// Price one symbol. Concurrent calls for the same symbol are coalesced:
    /// the first caller computes, late joiners await its published result.
    pub async fn price_of(&self, symbol: &str) -> PriceResult {
        loop {
            let joined = self.inflight.get(symbol).map(|e| e.value().clone());
            if let Some(mut rx) = joined {
                match Self::await_leader(&mut rx).await {
                    Some(result) => return result,
                    // Leader dropped without publishing; take over
                    None => continue,
                }
            }

            let (tx, rx) = watch::channel(None);
            match self.inflight.entry(symbol.to_string()) {
                dashmap::mapref::entry::Entry::Occupied(occupied) => {
                    // Lost the race — join the winner. Release the shard
                    // guard before awaiting.
                    let mut rx = occupied.get().clone();
                    drop(occupied);
                    match Self::await_leader(&mut rx).await {
                        Some(result) => return result,
                        None => continue,
                    }
                }
                dashmap::mapref::entry::Entry::Vacant(vacant) => {
                    vacant.insert(rx);
                }
            }

            let mut ctx = PassCtx::default();
            let result = self.price_in_pass(symbol, &mut ctx).await;
            self.inflight.remove(symbol);
            let _ = tx.send(Some(result.clone()));
            return result;
        }
    }

    async fn await_leader(
        rx: &mut watch::Receiver<Option<PriceResult>>,
    ) -> Option<PriceResult> {
        loop {
            if let Some(result) = rx.borrow().clone() {
                return Some(result);
            }
            if rx.changed().await.is_err() {
                return None;
            }
        }
    }

    /// One recursion step within a pass. Boxed because composite pricing
    /// recurses through it.
    fn price_in_pass<'a>(
        &'a self,
        symbol: &'a str,
        ctx: &'a mut PassCtx,
    ) -> Pin<Box<dyn Future<Output = PriceResult> + Send + 'a>> {
        Box::pin(async move {
            if let Some(price) = ctx.memo.get(symbol) {
                return Ok(*price);
            }
            if ctx.in_progress.contains(symbol) {
                return Err(ValuationError::CyclicComposition {
                    symbol: symbol.to_string(),
                });
            }

            let descriptor = self
                .registry
                .describe(symbol)
                .ok_or_else(|| ValuationError::NotFound {
                    symbol: symbol.to_string(),
                })?
                .clone();

            let (slot, ttl) = if descriptor.is_composite() {
                (PriceSource::Derived, self.tuning.derived_ttl)
            } else {
                (PriceSource::Market, self.tuning.market_ttl)
            };
            if self.cache.is_fresh(symbol, slot, ttl) {
                if let Some(entry) = self.cache.entry(symbol, slot) {
                    // Derived value is current; the independent market quote
                    // of a traded composite may still need a refresh.
                    if descriptor.is_composite() && descriptor.market_quoted {
                        self.refresh_market_quote(&descriptor).await;
                    }
                    ctx.memo.insert(symbol.to_string(), entry.price);
                    return Ok(entry.price);
                }
            }

            ctx.in_progress.insert(symbol.to_string());
            let result = match descriptor.kind.clone() {
                TokenKind::Base => self.price_base(&descriptor).await,
                TokenKind::Composite {
                    pool_id,
                    component0,
                    component1,
                } => {
                    self.price_composite(&descriptor, pool_id, &component0, &component1, ctx)
                        .await
                }
            };
            ctx.in_progress.remove(symbol);

            if let Ok(price) = &result {
                ctx.memo.insert(symbol.to_string(), *price);
            }
            result
        })
    }

    /// Base token: pegged value or market feed, with stale fallback
    async fn price_base(&self, token: &TokenDescriptor) -> PriceResult {
        if let Some(peg) = token.peg_usd {
            self.cache.put(&token.symbol, peg, PriceSource::Market);
            return Ok(peg);
        }

        match timeout(
            self.tuning.source_timeout,
            self.market.price(token.feed_symbol()),
        )
        .await
        {
            Ok(Ok(price)) => {
                self.cache.put(&token.symbol, price, PriceSource::Market);
                Ok(price)
            }
            Ok(Err(e)) => self.fallback(&token.symbol, PriceSource::Market, &e.to_string()),
            Err(_) => self.fallback(&token.symbol, PriceSource::Market, "timed out"),
        }
    }

    /// Composite token: pool value over total supply, components priced
    /// recursively within the same pass
    async fn price_composite(
        &self,
        token: &TokenDescriptor,
        pool_id: u32,
        component0: &str,
        component1: &str,
        ctx: &mut PassCtx,
    ) -> PriceResult {
        let snapshot = match timeout(self.tuning.source_timeout, self.reserves.reserves(pool_id))
            .await
        {
            Ok(Ok(snapshot)) => snapshot,
            Ok(Err(e)) => {
                return self.fallback(&token.symbol, PriceSource::Derived, &e.to_string())
            }
            Err(_) => return self.fallback(&token.symbol, PriceSource::Derived, "timed out"),
        };

        if snapshot.total_supply == 0 {
            return Err(ValuationError::EmptySupply {
                symbol: token.symbol.clone(),
                pool_id,
            });
        }

        let price0 = self.price_in_pass(component0, ctx).await?;
        let price1 = self.price_in_pass(component1, ctx).await?;

        let decimals_of = |symbol: &str| -> Result<u32, ValuationError> {
            self.registry
                .describe(symbol)
                .map(|t| t.decimals)
                .ok_or_else(|| ValuationError::NotFound {
                    symbol: symbol.to_string(),
                })
        };
        let scale = |raw: u128, decimals: u32| raw as f64 / 10f64.powi(decimals as i32);

        let total_value = scale(snapshot.reserve0, decimals_of(component0)?) * price0
            + scale(snapshot.reserve1, decimals_of(component1)?) * price1;
        let unit_value = total_value / scale(snapshot.total_supply, token.decimals);

        debug!(
            "{}: pool {} value {:.6} / supply -> {:.6}",
            token.symbol, pool_id, total_value, unit_value
        );
        self.cache
            .put(&token.symbol, unit_value, PriceSource::Derived);

        if token.market_quoted {
            self.refresh_market_quote(token).await;
        }

        Ok(unit_value)
    }

    /// Best-effort market quote for a traded composite. Never fails the
    /// valuation — a feed outage just leaves the market slot stale.
    async fn refresh_market_quote(&self, token: &TokenDescriptor) {
        if self
            .cache
            .is_fresh(&token.symbol, PriceSource::Market, self.tuning.market_ttl)
        {
            return;
        }

        match timeout(
            self.tuning.source_timeout,
            self.market.price(token.feed_symbol()),
        )
        .await
        {
            Ok(Ok(price)) => self.cache.put(&token.symbol, price, PriceSource::Market),
            Ok(Err(e)) => {
                debug!("market quote refresh failed for {}: {}", token.symbol, e);
                self.cache.mark_stale(&token.symbol, PriceSource::Market);
            }
            Err(_) => {
                debug!("market quote refresh timed out for {}", token.symbol);
                self.cache.mark_stale(&token.symbol, PriceSource::Market);
            }
        }
    }

    /// Source failure: serve the previous value flagged stale if one exists
    fn fallback(&self, symbol: &str, slot: PriceSource, reason: &str) -> PriceResult {
        match self.cache.entry(symbol, slot) {
            Some(previous) => {
                warn!(
                    "{} source failed ({}); serving stale {:.6}",
                    symbol, reason, previous.price
                );
                self.cache.mark_stale(symbol, slot);
                Ok(previous.price)
            }
            None => Err(ValuationError::SourceUnavailable {
                symbol: symbol.to_string(),
                reason: reason.to_string(),
            }),
        }
    }
}
