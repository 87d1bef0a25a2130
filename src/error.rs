//! Error taxonomy
//!
//! `ValuationError` is Clone so single-flight followers can receive the
//! leader's failure verbatim. Registry integrity problems get their own type:
//! they are configuration errors surfaced once at load, not per-request
//! conditions.
//!
//! Author: AI-Generated
//! Created: 2026-08-02

use thiserror::Error;

/// Per-symbol valuation failures
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ValuationError {
    /// External fetch failed or timed out and no cached fallback exists
    #[error("source unavailable for {symbol}: {reason}")]
    SourceUnavailable { symbol: String, reason: String },

    /// Pool reported zero total supply — division guard, not a zero price
    #[error("pool {pool_id} has zero total supply (pricing {symbol})")]
    EmptySupply { symbol: String, pool_id: u32 },

    /// A composite definition reached itself mid-pass
    #[error("cyclic composition detected at {symbol}")]
    CyclicComposition { symbol: String },

    /// Symbol or pool not present in the registry
    #[error("unknown symbol {symbol}")]
    NotFound { symbol: String },
}

/// Fatal registry-load failures. A cyclic or inconsistent registry refuses
/// to serve anything.
#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("composite derivation cycle: {}", path.join(" -> "))]
    Cycle { path: Vec<String> },

    #[error("token {symbol} references unknown pool {pool_id}")]
    UnknownPool { symbol: String, pool_id: u32 },

    #[error("token {symbol} references unregistered component {component}")]
    UnknownToken { symbol: String, component: String },

    #[error("token {symbol} components ({component0}, {component1}) do not match pool {pool_id} ({token0}, {token1})")]
    ComponentMismatch {
        symbol: String,
        pool_id: u32,
        component0: String,
        component1: String,
        token0: String,
        token1: String,
    },

    #[error("failed to read registry file {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse registry file {path}: {source}")]
    Parse {
        path: String,
        #[source]
        source: toml::de::Error,
    },
}
