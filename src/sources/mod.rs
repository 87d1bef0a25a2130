//! External data sources
//!
//! The two narrow interfaces the engine consumes the outside world through.
//! Implementations must be idempotent and side-effect-free from the engine's
//! perspective; the engine wraps every call in a timeout and treats any error
//! as a source failure with stale-fallback semantics.
//!
//! Author: AI-Generated
//! Created: 2026-08-03

use crate::types::ReservesSnapshot;
use anyhow::Result;
use async_trait::async_trait;

pub mod http;
pub mod mock;

pub use http::{HttpMarketSource, HttpReserveSource};
pub use mock::{MockMarketSource, MockReserveSource};

/// Spot quotes for base-asset symbols (CEX/aggregator APIs, reference pools)
#[async_trait]
pub trait MarketPriceSource: Send + Sync {
    /// USD price for one symbol
    async fn price(&self, symbol: &str) -> Result<f64>;
}

/// Current reserves and total supply for a pool (read-only chain call)
#[async_trait]
pub trait PoolReserveSource: Send + Sync {
    async fn reserves(&self, pool_id: u32) -> Result<ReservesSnapshot>;
}
