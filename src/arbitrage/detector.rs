//! Arbitrage detector
//!
//! Scans traded composite tokens for gaps between the market quote and the
//! composition-implied value. Pure read over the price cache: one pass per
//! call, no state carried between calls, results sorted by absolute
//! deviation (largest first).
//!
//! Author: AI-Generated
//! Created: 2026-08-05

use crate::cache::PriceCache;
use crate::registry::Registry;
use crate::types::{ArbitrageSignal, PriceSource};
use std::sync::Arc;
use tracing::{debug, info};

pub struct ArbitrageDetector {
    registry: Arc<Registry>,
    cache: PriceCache,
}

impl ArbitrageDetector {
    pub fn new(registry: Arc<Registry>, cache: PriceCache) -> Self {
        Self { registry, cache }
    }

    /// One scan over every traded composite. Emits a signal where
    /// `|composition - market| / market >= threshold_pct` (fraction,
    /// 0.05 = 5%). Symbols missing either cache slot are skipped, not
    /// errored — the scan reports on what the cache holds right now.
    pub fn scan(&self, threshold_pct: f64) -> Vec<ArbitrageSignal> {
        let mut signals = Vec::new();

        for token in self.registry.traded_composites() {
            let market = match self.cache.entry(&token.symbol, PriceSource::Market) {
                Some(entry) => entry,
                None => {
                    debug!("{}: no market quote cached, skipping", token.symbol);
                    continue;
                }
            };
            let derived = match self.cache.entry(&token.symbol, PriceSource::Derived) {
                Some(entry) => entry,
                None => {
                    debug!("{}: no composition value cached, skipping", token.symbol);
                    continue;
                }
            };

            if market.price <= 0.0 {
                debug!("{}: non-positive market quote, skipping", token.symbol);
                continue;
            }

            let signal = ArbitrageSignal::new(token.symbol.clone(), market.price, derived.price);
            if signal.deviation_pct.abs() < threshold_pct {
                continue;
            }

            info!(
                "🎯 SIGNAL: {} | market {:.6} | composition {:.6} | deviation {:+.2}% | {}",
                signal.symbol,
                signal.market_price,
                signal.composition_value,
                signal.deviation_pct * 100.0,
                signal.direction
            );
            signals.push(signal);
        }

        // Largest discrepancy first
        signals.sort_by(|a, b| {
            b.deviation_pct
                .abs()
                .partial_cmp(&a.deviation_pct.abs())
                .unwrap_or(std::cmp::Ordering::Equal)
        });

        signals
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Direction, PoolDescriptor, TokenDescriptor, TokenKind};

    fn base(symbol: &str) -> TokenDescriptor {
        TokenDescriptor {
            symbol: symbol.to_string(),
            contract_id: format!("SP000.{}", symbol.to_lowercase()),
            decimals: 6,
            kind: TokenKind::Base,
            market_quoted: false,
            quote_symbol: None,
            peg_usd: None,
        }
    }

    fn traded_lp(symbol: &str, pool_id: u32, c0: &str, c1: &str) -> TokenDescriptor {
        TokenDescriptor {
            symbol: symbol.to_string(),
            contract_id: format!("SP000.{}", symbol.to_lowercase()),
            decimals: 6,
            kind: TokenKind::Composite {
                pool_id,
                component0: c0.to_string(),
                component1: c1.to_string(),
            },
            market_quoted: true,
            quote_symbol: None,
            peg_usd: None,
        }
    }

    fn pool(id: u32, t0: &str, t1: &str) -> PoolDescriptor {
        PoolDescriptor {
            id,
            token0_symbol: t0.to_string(),
            token1_symbol: t1.to_string(),
            contract_address: "SP000.univ2-core".to_string(),
        }
    }

    fn detector_with(entries: &[(&str, f64, PriceSource)]) -> ArbitrageDetector {
        let registry = Registry::new(
            vec![
                base("STX"),
                base("CHA"),
                traded_lp("STX-CHA-LP", 4, "STX", "CHA"),
            ],
            vec![pool(4, "STX", "CHA")],
        )
        .unwrap();
        let cache = PriceCache::new();
        for (symbol, price, source) in entries {
            cache.put(symbol, *price, *source);
        }
        ArbitrageDetector::new(Arc::new(registry), cache)
    }

    #[test]
    fn test_emits_composition_rich_signal() {
        let detector = detector_with(&[
            ("STX-CHA-LP", 3.6, PriceSource::Market),
            ("STX-CHA-LP", 4.0, PriceSource::Derived),
        ]);

        let signals = detector.scan(0.05);
        assert_eq!(signals.len(), 1);

        let signal = &signals[0];
        assert_eq!(signal.symbol, "STX-CHA-LP");
        assert_eq!(signal.direction, Direction::CompositionRich);
        assert!((signal.deviation_pct - 0.1111).abs() < 0.001);
    }

    #[test]
    fn test_below_threshold_is_silent() {
        let detector = detector_with(&[
            ("STX-CHA-LP", 4.0, PriceSource::Market),
            ("STX-CHA-LP", 4.1, PriceSource::Derived),
        ]);

        // 2.5% deviation under a 5% threshold
        assert!(detector.scan(0.05).is_empty());
        // ... but visible at 2%
        assert_eq!(detector.scan(0.02).len(), 1);
    }

    #[test]
    fn test_composition_cheap_direction() {
        let detector = detector_with(&[
            ("STX-CHA-LP", 4.0, PriceSource::Market),
            ("STX-CHA-LP", 3.0, PriceSource::Derived),
        ]);

        let signals = detector.scan(0.05);
        assert_eq!(signals[0].direction, Direction::CompositionCheap);
        assert!((signals[0].deviation_pct + 0.25).abs() < 0.001);
    }

    #[test]
    fn test_missing_slot_skipped() {
        // Derived value only — nothing to compare against
        let detector = detector_with(&[("STX-CHA-LP", 4.0, PriceSource::Derived)]);
        assert!(detector.scan(0.0).is_empty());
    }

    #[test]
    fn test_rescan_is_stateless() {
        let detector = detector_with(&[
            ("STX-CHA-LP", 3.6, PriceSource::Market),
            ("STX-CHA-LP", 4.0, PriceSource::Derived),
        ]);

        assert_eq!(detector.scan(0.05).len(), 1);
        assert_eq!(detector.scan(0.05).len(), 1);
    }
}
