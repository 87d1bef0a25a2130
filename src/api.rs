//! Consumer API
//!
//! The read surface handed to the UI/API layer. Reads come straight from the
//! cache and never block on a refresh pass in progress — the best currently
//! cached value (possibly stale) wins over waiting on the network.
//!
//! Author: AI-Generated
//! Created: 2026-08-06

use crate::arbitrage::ArbitrageDetector;
use crate::error::ValuationError;
use crate::scheduler::RefreshScheduler;
use crate::types::{ArbitrageSignal, PriceEntry};
use crate::valuation::ValuationEngine;
use std::collections::HashMap;
use std::sync::Arc;

pub struct EngineHandle {
    engine: Arc<ValuationEngine>,
    scheduler: Arc<RefreshScheduler>,
    detector: ArbitrageDetector,
}

impl EngineHandle {
    pub fn new(
        engine: Arc<ValuationEngine>,
        scheduler: Arc<RefreshScheduler>,
        detector: ArbitrageDetector,
    ) -> Self {
        Self {
            engine,
            scheduler,
            detector,
        }
    }

    /// Best cached entry for a symbol. `NotFound` for an unregistered
    /// symbol; `SourceUnavailable` for one the engine has never managed to
    /// price. Stale entries are returned flagged, not withheld.
    pub fn get_price(&self, symbol: &str) -> Result<PriceEntry, ValuationError> {
        if self.engine.registry().describe(symbol).is_none() {
            return Err(ValuationError::NotFound {
                symbol: symbol.to_string(),
            });
        }
        self.engine
            .cache()
            .get(symbol)
            .ok_or_else(|| ValuationError::SourceUnavailable {
                symbol: symbol.to_string(),
                reason: "not yet priced".to_string(),
            })
    }

    /// Canonical entry per symbol — whatever the cache currently holds
    pub fn get_all_prices(&self) -> HashMap<String, PriceEntry> {
        self.engine.cache().all_entries()
    }

    /// Fresh discrepancy scan at the given threshold fraction
    pub fn get_arbitrage_signals(&self, threshold_pct: f64) -> Vec<ArbitrageSignal> {
        self.detector.scan(threshold_pct)
    }

    /// Invalidate and recompute one symbol (after an external write such as
    /// a new pool registration)
    pub async fn force_refresh(&self, symbol: &str) -> Result<f64, ValuationError> {
        self.scheduler.force_refresh(symbol).await
    }
}
