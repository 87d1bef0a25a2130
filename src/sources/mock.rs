//! Deterministic in-memory sources
//!
//! Used by the test suites and handy for offline demos. Call counters back
//! the single-flight assertions: each symbol's quote must be fetched at most
//! once per pass no matter how many composites reference it.
//!
//! Author: AI-Generated
//! Created: 2026-08-04

use super::{MarketPriceSource, PoolReserveSource};
use crate::types::ReservesSnapshot;
use anyhow::{anyhow, Result};
use async_trait::async_trait;
use chrono::Utc;
use dashmap::DashMap;
use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};

/// Fixed symbol -> price map with per-symbol call counting
#[derive(Default)]
pub struct MockMarketSource {
    prices: DashMap<String, f64>,
    failing: DashMap<String, ()>,
    calls: DashMap<String, AtomicU32>,
    delay_ms: AtomicU64,
}

impl MockMarketSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_price(&self, symbol: &str, price: f64) {
        self.prices.insert(symbol.to_string(), price);
        self.failing.remove(symbol);
    }

    /// Artificial latency per call — lets tests hold a fetch in flight
    pub fn set_delay_ms(&self, delay_ms: u64) {
        self.delay_ms.store(delay_ms, Ordering::SeqCst);
    }

    /// Make subsequent fetches for this symbol fail
    pub fn fail(&self, symbol: &str) {
        self.failing.insert(symbol.to_string(), ());
    }

    pub fn call_count(&self, symbol: &str) -> u32 {
        self.calls
            .get(symbol)
            .map(|c| c.load(Ordering::SeqCst))
            .unwrap_or(0)
    }
}

#[async_trait]
impl MarketPriceSource for MockMarketSource {
    async fn price(&self, symbol: &str) -> Result<f64> {
        self.calls
            .entry(symbol.to_string())
            .or_insert_with(|| AtomicU32::new(0))
            .fetch_add(1, Ordering::SeqCst);

        let delay = self.delay_ms.load(Ordering::SeqCst);
        if delay > 0 {
            tokio::time::sleep(std::time::Duration::from_millis(delay)).await;
        }

        if self.failing.contains_key(symbol) {
            return Err(anyhow!("mock feed outage for {}", symbol));
        }
        self.prices
            .get(symbol)
            .map(|p| *p)
            .ok_or_else(|| anyhow!("no mock quote for {}", symbol))
    }
}

/// Fixed pool_id -> (reserve0, reserve1, total_supply) map
#[derive(Default)]
pub struct MockReserveSource {
    pools: DashMap<u32, (u128, u128, u128)>,
    failing: DashMap<u32, ()>,
    calls: DashMap<u32, AtomicU32>,
}

impl MockReserveSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_reserves(&self, pool_id: u32, reserve0: u128, reserve1: u128, total_supply: u128) {
        self.pools.insert(pool_id, (reserve0, reserve1, total_supply));
        self.failing.remove(&pool_id);
    }

    pub fn fail(&self, pool_id: u32) {
        self.failing.insert(pool_id, ());
    }

    pub fn call_count(&self, pool_id: u32) -> u32 {
        self.calls
            .get(&pool_id)
            .map(|c| c.load(Ordering::SeqCst))
            .unwrap_or(0)
    }
}

#[async_trait]
impl PoolReserveSource for MockReserveSource {
    async fn reserves(&self, pool_id: u32) -> Result<ReservesSnapshot> {
        self.calls
            .entry(pool_id)
            .or_insert_with(|| AtomicU32::new(0))
            .fetch_add(1, Ordering::SeqCst);

        if self.failing.contains_key(&pool_id) {
            return Err(anyhow!("mock node outage for pool {}", pool_id));
        }
        let (reserve0, reserve1, total_supply) = self
            .pools
            .get(&pool_id)
            .map(|p| *p)
            .ok_or_else(|| anyhow!("no mock reserves for pool {}", pool_id))?;

        Ok(ReservesSnapshot {
            reserve0,
            reserve1,
            total_supply,
            observed_at: Utc::now(),
        })
    }
}
