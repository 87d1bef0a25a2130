//! Price cache
//!
//! Thread-safe TTL-keyed store of price observations using DashMap. Entries
//! are keyed by (symbol, source) — a traded composite holds both its market
//! quote and its composition-derived value. The ValuationEngine is the only
//! writer; the detector and consumer API read. `invalidate` marks entries
//! stale without deleting them, so an expired value survives as a fallback
//! until replaced.
//!
//! Author: AI-Generated
//! Created: 2026-08-03

use crate::types::{PriceEntry, PriceSource};
use chrono::Utc;
use dashmap::DashMap;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct CacheKey {
    symbol: String,
    source: PriceSource,
}

/// Shared price cache. Clone is cheap (shared Arc), matching how the pool
/// state manager is passed around.
#[derive(Debug, Default)]
pub struct PriceCache {
    entries: Arc<DashMap<CacheKey, PriceEntry>>,
}

impl Clone for PriceCache {
    fn clone(&self) -> Self {
        Self {
            entries: Arc::clone(&self.entries),
        }
    }
}

impl PriceCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Canonical entry for a symbol: the market quote when one exists (what
    /// the token actually trades at), otherwise the derived value.
    pub fn get(&self, symbol: &str) -> Option<PriceEntry> {
        self.entry(symbol, PriceSource::Market)
            .or_else(|| self.entry(symbol, PriceSource::Derived))
    }

    /// Entry for one specific source slot
    pub fn entry(&self, symbol: &str, source: PriceSource) -> Option<PriceEntry> {
        let key = CacheKey {
            symbol: symbol.to_string(),
            source,
        };
        self.entries.get(&key).map(|e| e.clone())
    }

    /// Store an observation. Stamps `observed_at = now`, clears `stale`.
    pub fn put(&self, symbol: &str, price: f64, source: PriceSource) {
        let entry = PriceEntry {
            symbol: symbol.to_string(),
            price,
            observed_at: Utc::now(),
            source,
            stale: false,
        };
        debug!("cache put: {} = {:.6} ({})", symbol, price, source);
        self.entries.insert(
            CacheKey {
                symbol: symbol.to_string(),
                source,
            },
            entry,
        );
    }

    /// Freshness of one slot: `now - observed_at < ttl` and not flagged stale
    pub fn is_fresh(&self, symbol: &str, source: PriceSource, ttl: Duration) -> bool {
        match self.entry(symbol, source) {
            Some(entry) if !entry.stale => {
                let age = Utc::now().signed_duration_since(entry.observed_at);
                let ttl = chrono::Duration::from_std(ttl)
                    .unwrap_or_else(|_| chrono::Duration::max_value());
                age < ttl
            }
            _ => false,
        }
    }

    /// Flag one slot as stale without deleting the value
    /// (stale-but-usable fallback).
    pub fn mark_stale(&self, symbol: &str, source: PriceSource) {
        let key = CacheKey {
            symbol: symbol.to_string(),
            source,
        };
        if let Some(mut entry) = self.entries.get_mut(&key) {
            entry.stale = true;
        }
    }

    /// Flag every slot for a symbol as stale
    pub fn invalidate(&self, symbol: &str) {
        for source in [PriceSource::Market, PriceSource::Derived] {
            self.mark_stale(symbol, source);
        }
    }

    /// Canonical entry per symbol, for the consumer API
    pub fn all_entries(&self) -> HashMap<String, PriceEntry> {
        let mut out: HashMap<String, PriceEntry> = HashMap::new();
        for entry in self.entries.iter() {
            let current = out.get(&entry.key().symbol);
            let replace = match current {
                None => true,
                // Market quote wins over derived for the same symbol
                Some(existing) => {
                    existing.source == PriceSource::Derived
                        && entry.value().source == PriceSource::Market
                }
            };
            if replace {
                out.insert(entry.key().symbol.clone(), entry.value().clone());
            }
        }
        out
    }

    /// Every entry including both slots of dual-sourced symbols, for the
    /// price history log
    pub fn snapshot(&self) -> Vec<PriceEntry> {
        let mut entries: Vec<PriceEntry> =
            self.entries.iter().map(|e| e.value().clone()).collect();
        entries.sort_by(|a, b| a.symbol.cmp(&b.symbol));
        entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_put_and_get() {
        let cache = PriceCache::new();
        cache.put("STX", 2.5, PriceSource::Market);

        let entry = cache.get("STX").unwrap();
        assert_eq!(entry.price, 2.5);
        assert_eq!(entry.source, PriceSource::Market);
        assert!(!entry.stale);
    }

    #[test]
    fn test_market_preferred_over_derived() {
        let cache = PriceCache::new();
        cache.put("LP", 4.0, PriceSource::Derived);
        cache.put("LP", 3.6, PriceSource::Market);

        assert_eq!(cache.get("LP").unwrap().price, 3.6);
        assert_eq!(cache.entry("LP", PriceSource::Derived).unwrap().price, 4.0);
        assert_eq!(cache.all_entries().get("LP").unwrap().price, 3.6);
    }

    #[test]
    fn test_ttl_freshness() {
        let cache = PriceCache::new();
        cache.put("STX", 2.5, PriceSource::Market);

        assert!(cache.is_fresh("STX", PriceSource::Market, Duration::from_secs(60)));

        std::thread::sleep(Duration::from_millis(30));
        assert!(!cache.is_fresh("STX", PriceSource::Market, Duration::from_millis(10)));
        // Expired but still readable
        assert!(cache.get("STX").is_some());
    }

    #[test]
    fn test_invalidate_marks_stale_keeps_value() {
        let cache = PriceCache::new();
        cache.put("LP", 4.0, PriceSource::Derived);
        cache.put("LP", 3.6, PriceSource::Market);

        cache.invalidate("LP");

        let market = cache.entry("LP", PriceSource::Market).unwrap();
        let derived = cache.entry("LP", PriceSource::Derived).unwrap();
        assert!(market.stale && derived.stale);
        assert_eq!(market.price, 3.6);
        assert!(!cache.is_fresh("LP", PriceSource::Market, Duration::from_secs(3600)));
    }

    #[test]
    fn test_put_clears_stale() {
        let cache = PriceCache::new();
        cache.put("STX", 2.5, PriceSource::Market);
        cache.invalidate("STX");
        cache.put("STX", 2.6, PriceSource::Market);

        let entry = cache.get("STX").unwrap();
        assert!(!entry.stale);
        assert_eq!(entry.price, 2.6);
    }
}
