//! Core data structures for the valuation engine
//!
//! Token/pool descriptors are static registry data; reserve snapshots are
//! ephemeral per-pass fetches; price entries live in the cache; arbitrage
//! signals are per-scan reports with no lifecycle of their own.
//!
//! Author: AI-Generated
//! Created: 2026-08-02

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// What kind of token a registry entry describes
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TokenKind {
    /// Priced directly by the market-data feed
    Base,
    /// LP share / synthetic: value derived from a pool's reserves
    Composite {
        pool_id: u32,
        component0: String,
        component1: String,
    },
}

/// Static description of one token. Immutable per refresh cycle.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenDescriptor {
    pub symbol: String,
    pub contract_id: String,
    pub decimals: u32,
    pub kind: TokenKind,
    /// Composite tokens that are themselves traded carry an independent
    /// market quote; these are the arbitrage detector's input set.
    #[serde(default)]
    pub market_quoted: bool,
    /// Fetch this symbol's quote instead (IOU wrappers quote as their
    /// underlying).
    #[serde(default)]
    pub quote_symbol: Option<String>,
    /// Hard USD peg (stables). Skips the market call entirely.
    #[serde(default)]
    pub peg_usd: Option<f64>,
}

impl TokenDescriptor {
    pub fn is_composite(&self) -> bool {
        matches!(self.kind, TokenKind::Composite { .. })
    }

    /// Symbol to ask the market feed for (alias-aware)
    pub fn feed_symbol(&self) -> &str {
        self.quote_symbol.as_deref().unwrap_or(&self.symbol)
    }
}

/// Static description of one liquidity pool
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PoolDescriptor {
    pub id: u32,
    pub token0_symbol: String,
    pub token1_symbol: String,
    pub contract_address: String,
}

/// Reserves + supply observed from a pool contract. Raw integer units,
/// short-lived — fetched on demand, never persisted beyond the pass.
#[derive(Debug, Clone)]
pub struct ReservesSnapshot {
    pub reserve0: u128,
    pub reserve1: u128,
    pub total_supply: u128,
    pub observed_at: DateTime<Utc>,
}

/// Where a cached price came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PriceSource {
    /// External market-data quote
    Market,
    /// Computed from pool composition
    Derived,
}

impl fmt::Display for PriceSource {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            PriceSource::Market => write!(f, "market"),
            PriceSource::Derived => write!(f, "derived"),
        }
    }
}

/// One cached price observation. The cache is the single read surface for
/// consumers; `stale` flags a value past its TTL that survived as fallback.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PriceEntry {
    pub symbol: String,
    pub price: f64,
    pub observed_at: DateTime<Utc>,
    pub source: PriceSource,
    pub stale: bool,
}

/// Which side of the discrepancy the composition sits on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    /// Composition value below market quote
    CompositionCheap,
    /// Composition value above market quote (composite undervalued vs parts)
    CompositionRich,
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Direction::CompositionCheap => write!(f, "composition_cheap"),
            Direction::CompositionRich => write!(f, "composition_rich"),
        }
    }
}

/// Valuation discrepancy on a traded composite token. A report, discarded
/// after consumption.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArbitrageSignal {
    pub symbol: String,
    pub market_price: f64,
    pub composition_value: f64,
    /// Signed fraction: (composition - market) / market
    pub deviation_pct: f64,
    pub direction: Direction,
    pub computed_at: DateTime<Utc>,
}

impl ArbitrageSignal {
    pub fn new(symbol: String, market_price: f64, composition_value: f64) -> Self {
        let deviation_pct = (composition_value - market_price) / market_price;
        let direction = if composition_value > market_price {
            Direction::CompositionRich
        } else {
            Direction::CompositionCheap
        };

        Self {
            symbol,
            market_price,
            composition_value,
            deviation_pct,
            direction,
            computed_at: Utc::now(),
        }
    }
}
