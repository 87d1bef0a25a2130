//! Configuration management
//! Load engine tuning from .env / environment with defaults

use anyhow::{Context, Result};
use std::time::Duration;

/// Engine tuning. Registry data lives in its own TOML file (see
/// `registry::Registry::load`), maintained by an external admin process.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Path to the token/pool registry TOML file
    pub registry_file: String,

    /// TTL for externally-quoted market prices
    pub market_ttl: Duration,
    /// TTL for reserve-derived prices
    pub derived_ttl: Duration,
    /// Per-call timeout for external sources
    pub source_timeout: Duration,

    /// Full refresh pass cadence
    pub refresh_interval: Duration,
    /// Cadence of the arbitrage report loop in the binary
    pub report_interval: Duration,
    /// Signal threshold as a fraction (0.05 = 5%)
    pub arb_threshold_pct: f64,

    /// Market quote API base URL
    pub market_api_url: String,
    /// Node read-only API base URL (pool reserves)
    pub node_api_url: String,

    /// Optional directory for CSV price history (disabled if unset)
    pub price_log_dir: Option<String>,
}

fn env_or<T: std::str::FromStr>(key: &str, default: T) -> Result<T>
where
    T::Err: std::fmt::Display,
{
    match std::env::var(key) {
        Ok(raw) => raw
            .parse()
            .map_err(|e| anyhow::anyhow!("invalid {}={}: {}", key, raw, e)),
        Err(_) => Ok(default),
    }
}

pub fn load_config() -> Result<EngineConfig> {
    dotenv::dotenv().ok();

    Ok(EngineConfig {
        registry_file: std::env::var("REGISTRY_FILE")
            .unwrap_or_else(|_| "registry.toml".to_string()),

        market_ttl: Duration::from_secs(env_or("MARKET_TTL_SECS", 60u64)?),
        derived_ttl: Duration::from_secs(env_or("DERIVED_TTL_SECS", 300u64)?),
        source_timeout: Duration::from_secs(env_or("SOURCE_TIMEOUT_SECS", 8u64)?),

        refresh_interval: Duration::from_secs(env_or("REFRESH_INTERVAL_SECS", 60u64)?),
        report_interval: Duration::from_secs(env_or("REPORT_INTERVAL_SECS", 30u64)?),
        arb_threshold_pct: env_or("ARB_THRESHOLD_PCT", 0.05f64)?,

        market_api_url: std::env::var("MARKET_API_URL")
            .context("MARKET_API_URL not set")?,
        node_api_url: std::env::var("NODE_API_URL")
            .context("NODE_API_URL not set")?,

        price_log_dir: std::env::var("PRICE_LOG_DIR").ok(),
    })
}

impl Default for EngineConfig {
    /// Defaults used by tests and demos; real deployments load from env.
    fn default() -> Self {
        Self {
            registry_file: "registry.toml".to_string(),
            market_ttl: Duration::from_secs(60),
            derived_ttl: Duration::from_secs(300),
            source_timeout: Duration::from_secs(8),
            refresh_interval: Duration::from_secs(60),
            report_interval: Duration::from_secs(30),
            arb_threshold_pct: 0.05,
            market_api_url: String::new(),
            node_api_url: String::new(),
            price_log_dir: None,
        }
    }
}
