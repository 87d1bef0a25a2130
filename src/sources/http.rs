//! HTTP source implementations
//!
//! `HttpMarketSource` talks to an aggregator quote API; `HttpReserveSource`
//! talks to a node's read-only pool endpoint. Both are plain JSON-over-HTTP —
//! chain-specific encoding stays behind the node API. Raw integer fields come
//! back as strings to avoid JSON number precision loss.
//!
//! Author: AI-Generated
//! Created: 2026-08-04

use super::{MarketPriceSource, PoolReserveSource};
use crate::types::ReservesSnapshot;
use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::Utc;
use serde::Deserialize;
use std::time::Duration;

/// Quote API response: `GET {base}/v1/price/{symbol}`
#[derive(Debug, Deserialize)]
struct QuoteResponse {
    symbol: String,
    price: f64,
}

/// Aggregator-backed market quotes
pub struct HttpMarketSource {
    client: reqwest::Client,
    base_url: String,
}

impl HttpMarketSource {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .context("failed to build quote API client")?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }
}

#[async_trait]
impl MarketPriceSource for HttpMarketSource {
    async fn price(&self, symbol: &str) -> Result<f64> {
        let url = format!("{}/v1/price/{}", self.base_url, symbol);
        let quote: QuoteResponse = self
            .client
            .get(&url)
            .send()
            .await
            .with_context(|| format!("quote request failed for {}", symbol))?
            .error_for_status()
            .with_context(|| format!("quote API rejected {}", symbol))?
            .json()
            .await
            .with_context(|| format!("malformed quote payload for {}", symbol))?;

        anyhow::ensure!(
            quote.symbol == symbol,
            "quote API answered for {} instead of {}",
            quote.symbol,
            symbol
        );
        anyhow::ensure!(
            quote.price.is_finite() && quote.price > 0.0,
            "non-positive quote {} for {}",
            quote.price,
            symbol
        );
        Ok(quote.price)
    }
}

/// Node pool endpoint response: `GET {base}/v2/pools/{id}`
#[derive(Debug, Deserialize)]
struct PoolResponse {
    reserve0: String,
    reserve1: String,
    total_supply: String,
}

/// Node read-only pool reserves
pub struct HttpReserveSource {
    client: reqwest::Client,
    base_url: String,
}

impl HttpReserveSource {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .context("failed to build node API client")?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }
}

#[async_trait]
impl PoolReserveSource for HttpReserveSource {
    async fn reserves(&self, pool_id: u32) -> Result<ReservesSnapshot> {
        let url = format!("{}/v2/pools/{}", self.base_url, pool_id);
        let pool: PoolResponse = self
            .client
            .get(&url)
            .send()
            .await
            .with_context(|| format!("reserve request failed for pool {}", pool_id))?
            .error_for_status()
            .with_context(|| format!("node API rejected pool {}", pool_id))?
            .json()
            .await
            .with_context(|| format!("malformed pool payload for {}", pool_id))?;

        let parse = |field: &str, raw: &str| -> Result<u128> {
            raw.parse()
                .with_context(|| format!("pool {} {} is not an integer: {}", pool_id, field, raw))
        };

        Ok(ReservesSnapshot {
            reserve0: parse("reserve0", &pool.reserve0)?,
            reserve1: parse("reserve1", &pool.reserve1)?,
            total_supply: parse("total_supply", &pool.total_supply)?,
            observed_at: Utc::now(),
        })
    }
}
