//! LP & Synthetic Token Valuation Engine Library
//!
//! Prices a graph of base and composite (LP/synthetic) tokens and detects
//! discrepancies between a composite's market quote and the value implied by
//! its on-chain composition.
//!
//! Author: AI-Generated
//! Created: 2026-08-02

pub mod api;
pub mod arbitrage;
pub mod cache;
pub mod config;
pub mod error;
pub mod price_log;
pub mod registry;
pub mod scheduler;
pub mod sources;
pub mod types;
pub mod valuation;

// Re-export commonly used types
pub use api::EngineHandle;
pub use arbitrage::ArbitrageDetector;
pub use cache::PriceCache;
pub use config::{load_config, EngineConfig};
pub use error::{RegistryError, ValuationError};
pub use registry::Registry;
pub use scheduler::RefreshScheduler;
pub use types::{
    ArbitrageSignal, Direction, PoolDescriptor, PriceEntry, PriceSource, ReservesSnapshot,
    TokenDescriptor, TokenKind,
};
pub use valuation::{ValuationEngine, ValuationTuning};
