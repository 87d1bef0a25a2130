//! Token & pool registry
//!
//! Static description of every token and pool, loaded from a TOML file that
//! an external administrative process maintains. Read-only from the engine's
//! perspective. Validation runs the full composite-derivation graph at load:
//! a cyclic registry is a fatal configuration error and refuses to serve.
//!
//! Author: AI-Generated
//! Created: 2026-08-02
//! Modified: 2026-08-05 - topological layering for the refresh scheduler

use crate::error::RegistryError;
use crate::types::{PoolDescriptor, TokenDescriptor, TokenKind};
use serde::Deserialize;
use std::collections::{HashMap, HashSet};
use std::path::Path;
use tracing::info;

/// Raw TOML shape — flat token rows converted into `TokenDescriptor`s
#[derive(Debug, Deserialize)]
struct RegistryFile {
    #[serde(default)]
    tokens: Vec<TokenRow>,
    #[serde(default)]
    pools: Vec<PoolDescriptor>,
}

#[derive(Debug, Deserialize)]
struct TokenRow {
    symbol: String,
    contract_id: String,
    decimals: u32,
    kind: String,
    pool_id: Option<u32>,
    component0: Option<String>,
    component1: Option<String>,
    #[serde(default)]
    market_quoted: bool,
    quote_symbol: Option<String>,
    peg_usd: Option<f64>,
}

impl TokenRow {
    fn into_descriptor(self) -> anyhow::Result<TokenDescriptor> {
        let kind = match self.kind.as_str() {
            "base" => TokenKind::Base,
            "composite" => TokenKind::Composite {
                pool_id: self
                    .pool_id
                    .ok_or_else(|| anyhow::anyhow!("composite {} missing pool_id", self.symbol))?,
                component0: self
                    .component0
                    .ok_or_else(|| anyhow::anyhow!("composite {} missing component0", self.symbol))?,
                component1: self
                    .component1
                    .ok_or_else(|| anyhow::anyhow!("composite {} missing component1", self.symbol))?,
            },
            other => anyhow::bail!("token {} has unknown kind '{}'", self.symbol, other),
        };

        Ok(TokenDescriptor {
            symbol: self.symbol,
            contract_id: self.contract_id,
            decimals: self.decimals,
            kind,
            market_quoted: self.market_quoted,
            quote_symbol: self.quote_symbol,
            peg_usd: self.peg_usd,
        })
    }
}

/// Validated, immutable token/pool registry
#[derive(Debug)]
pub struct Registry {
    tokens: HashMap<String, TokenDescriptor>,
    pools: HashMap<u32, PoolDescriptor>,
}

impl Registry {
    /// Build and validate a registry from descriptors
    pub fn new(
        tokens: Vec<TokenDescriptor>,
        pools: Vec<PoolDescriptor>,
    ) -> Result<Self, RegistryError> {
        let registry = Self {
            tokens: tokens.into_iter().map(|t| (t.symbol.clone(), t)).collect(),
            pools: pools.into_iter().map(|p| (p.id, p)).collect(),
        };
        registry.validate()?;
        Ok(registry)
    }

    /// Build without validation — for exercising the engine's runtime cycle
    /// guard against definitions a validated registry would reject.
    #[cfg(test)]
    pub(crate) fn new_unchecked(
        tokens: Vec<TokenDescriptor>,
        pools: Vec<PoolDescriptor>,
    ) -> Self {
        Self {
            tokens: tokens.into_iter().map(|t| (t.symbol.clone(), t)).collect(),
            pools: pools.into_iter().map(|p| (p.id, p)).collect(),
        }
    }

    /// Load + validate from a TOML file
    pub fn load<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let path_str = path.as_ref().display().to_string();
        let raw = std::fs::read_to_string(&path).map_err(|e| RegistryError::Io {
            path: path_str.clone(),
            source: e,
        })?;
        let file: RegistryFile = toml::from_str(&raw).map_err(|e| RegistryError::Parse {
            path: path_str.clone(),
            source: e,
        })?;

        let tokens = file
            .tokens
            .into_iter()
            .map(TokenRow::into_descriptor)
            .collect::<anyhow::Result<Vec<_>>>()?;

        let registry = Self::new(tokens, file.pools)?;
        info!(
            "Registry loaded from {}: {} tokens, {} pools",
            path_str,
            registry.tokens.len(),
            registry.pools.len()
        );
        Ok(registry)
    }

    pub fn describe(&self, symbol: &str) -> Option<&TokenDescriptor> {
        self.tokens.get(symbol)
    }

    pub fn pool_of(&self, pool_id: u32) -> Option<&PoolDescriptor> {
        self.pools.get(&pool_id)
    }

    /// All registered symbols, sorted for deterministic traversal
    pub fn all_symbols(&self) -> Vec<String> {
        let mut symbols: Vec<String> = self.tokens.keys().cloned().collect();
        symbols.sort();
        symbols
    }

    /// Traded composites — the arbitrage detector's input set
    pub fn traded_composites(&self) -> Vec<&TokenDescriptor> {
        let mut traded: Vec<&TokenDescriptor> = self
            .tokens
            .values()
            .filter(|t| t.is_composite() && t.market_quoted)
            .collect();
        traded.sort_by(|a, b| a.symbol.cmp(&b.symbol));
        traded
    }

    /// Full-graph integrity check: pool references, component consistency,
    /// and acyclicity of the derives-from relation.
    fn validate(&self) -> Result<(), RegistryError> {
        for token in self.tokens.values() {
            let TokenKind::Composite {
                pool_id,
                component0,
                component1,
            } = &token.kind
            else {
                continue;
            };

            let pool = self
                .pools
                .get(pool_id)
                .ok_or_else(|| RegistryError::UnknownPool {
                    symbol: token.symbol.clone(),
                    pool_id: *pool_id,
                })?;

            for component in [component0, component1] {
                if !self.tokens.contains_key(component) {
                    return Err(RegistryError::UnknownToken {
                        symbol: token.symbol.clone(),
                        component: component.clone(),
                    });
                }
            }

            if *component0 != pool.token0_symbol || *component1 != pool.token1_symbol {
                return Err(RegistryError::ComponentMismatch {
                    symbol: token.symbol.clone(),
                    pool_id: *pool_id,
                    component0: component0.clone(),
                    component1: component1.clone(),
                    token0: pool.token0_symbol.clone(),
                    token1: pool.token1_symbol.clone(),
                });
            }
        }

        self.check_acyclic()
    }

    /// DFS three-color walk over composite -> component edges. Returns the
    /// offending path on the first back-edge.
    fn check_acyclic(&self) -> Result<(), RegistryError> {
        let mut done: HashSet<&str> = HashSet::new();

        for symbol in self.tokens.keys() {
            if done.contains(symbol.as_str()) {
                continue;
            }
            let mut on_path: Vec<&str> = Vec::new();
            self.visit(symbol, &mut on_path, &mut done)?;
        }
        Ok(())
    }

    fn visit<'a>(
        &'a self,
        symbol: &'a str,
        on_path: &mut Vec<&'a str>,
        done: &mut HashSet<&'a str>,
    ) -> Result<(), RegistryError> {
        if done.contains(symbol) {
            return Ok(());
        }
        if let Some(pos) = on_path.iter().position(|s| *s == symbol) {
            let mut path: Vec<String> = on_path[pos..].iter().map(|s| s.to_string()).collect();
            path.push(symbol.to_string());
            return Err(RegistryError::Cycle { path });
        }

        on_path.push(symbol);
        if let Some(TokenDescriptor {
            kind: TokenKind::Composite {
                component0,
                component1,
                ..
            },
            ..
        }) = self.tokens.get(symbol)
        {
            self.visit(component0, on_path, done)?;
            self.visit(component1, on_path, done)?;
        }
        on_path.pop();
        done.insert(symbol);
        Ok(())
    }

    /// Dependency-ordered layers: layer 0 holds every Base token, each later
    /// layer holds composites whose components are all in earlier layers.
    /// Registry is validated acyclic, so peeling always terminates.
    pub fn topo_layers(&self) -> Vec<Vec<String>> {
        let mut layers: Vec<Vec<String>> = Vec::new();
        let mut placed: HashSet<String> = HashSet::new();

        let mut base: Vec<String> = self
            .tokens
            .values()
            .filter(|t| !t.is_composite())
            .map(|t| t.symbol.clone())
            .collect();
        base.sort();
        placed.extend(base.iter().cloned());
        if !base.is_empty() {
            layers.push(base);
        }

        let mut remaining: Vec<&TokenDescriptor> =
            self.tokens.values().filter(|t| t.is_composite()).collect();

        while !remaining.is_empty() {
            let (ready, pending): (Vec<&TokenDescriptor>, Vec<&TokenDescriptor>) =
                remaining.into_iter().partition(|t| match &t.kind {
                    TokenKind::Composite {
                        component0,
                        component1,
                        ..
                    } => placed.contains(component0) && placed.contains(component1),
                    TokenKind::Base => true,
                });

            // Validated acyclic, so a non-empty remaining set always yields work
            debug_assert!(!ready.is_empty());

            let mut layer: Vec<String> = ready.iter().map(|t| t.symbol.clone()).collect();
            layer.sort();
            placed.extend(layer.iter().cloned());
            layers.push(layer);
            remaining = pending;
        }

        layers
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

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

    fn composite(symbol: &str, pool_id: u32, c0: &str, c1: &str) -> TokenDescriptor {
        TokenDescriptor {
            symbol: symbol.to_string(),
            contract_id: format!("SP000.{}", symbol.to_lowercase()),
            decimals: 6,
            kind: TokenKind::Composite {
                pool_id,
                component0: c0.to_string(),
                component1: c1.to_string(),
            },
            market_quoted: false,
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

    #[test]
    fn test_valid_registry() {
        let registry = Registry::new(
            vec![base("STX"), base("CHA"), composite("STX-CHA-LP", 4, "STX", "CHA")],
            vec![pool(4, "STX", "CHA")],
        )
        .unwrap();

        assert!(registry.describe("STX").is_some());
        assert!(registry.describe("STX-CHA-LP").unwrap().is_composite());
        assert_eq!(registry.all_symbols().len(), 3);
    }

    #[test]
    fn test_cycle_refused() {
        // A derives from B, B derives from A
        let result = Registry::new(
            vec![
                composite("A", 1, "B", "B"),
                composite("B", 2, "A", "A"),
            ],
            vec![pool(1, "B", "B"), pool(2, "A", "A")],
        );

        match result {
            Err(RegistryError::Cycle { path }) => {
                assert!(path.len() >= 3);
                assert_eq!(path.first(), path.last());
            }
            other => panic!("expected Cycle, got {:?}", other.map(|_| ())),
        }
    }

    #[test]
    fn test_self_cycle_refused() {
        let result = Registry::new(
            vec![composite("A", 1, "A", "A")],
            vec![pool(1, "A", "A")],
        );
        assert!(matches!(result, Err(RegistryError::Cycle { .. })));
    }

    #[test]
    fn test_unknown_pool() {
        let result = Registry::new(
            vec![base("STX"), base("CHA"), composite("LP", 99, "STX", "CHA")],
            vec![pool(4, "STX", "CHA")],
        );
        assert!(matches!(result, Err(RegistryError::UnknownPool { pool_id: 99, .. })));
    }

    #[test]
    fn test_component_mismatch() {
        let result = Registry::new(
            vec![base("STX"), base("CHA"), composite("LP", 4, "CHA", "STX")],
            vec![pool(4, "STX", "CHA")],
        );
        assert!(matches!(result, Err(RegistryError::ComponentMismatch { .. })));
    }

    #[test]
    fn test_topo_layers() {
        // Diamond on STX plus a second-order composite
        let registry = Registry::new(
            vec![
                base("STX"),
                base("CHA"),
                base("WELSH"),
                composite("LP-A", 1, "STX", "CHA"),
                composite("LP-B", 2, "STX", "WELSH"),
                composite("IDX", 3, "LP-A", "LP-B"),
            ],
            vec![
                pool(1, "STX", "CHA"),
                pool(2, "STX", "WELSH"),
                pool(3, "LP-A", "LP-B"),
            ],
        )
        .unwrap();

        let layers = registry.topo_layers();
        assert_eq!(layers.len(), 3);
        assert_eq!(layers[0], vec!["CHA", "STX", "WELSH"]);
        assert_eq!(layers[1], vec!["LP-A", "LP-B"]);
        assert_eq!(layers[2], vec!["IDX"]);
    }

    #[test]
    fn test_load_from_toml() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"
[[tokens]]
symbol = "STX"
contract_id = "SP000.wstx"
decimals = 6
kind = "base"

[[tokens]]
symbol = "CHA"
contract_id = "SP000.charisma-token"
decimals = 6
kind = "base"

[[tokens]]
symbol = "STX-CHA-LP"
contract_id = "SP000.stx-cha-lp"
decimals = 6
kind = "composite"
pool_id = 4
component0 = "STX"
component1 = "CHA"
market_quoted = true

[[pools]]
id = 4
token0_symbol = "STX"
token1_symbol = "CHA"
contract_address = "SP000.univ2-core"
"#
        )
        .unwrap();

        let registry = Registry::load(file.path()).unwrap();
        assert_eq!(registry.all_symbols().len(), 3);
        assert_eq!(registry.traded_composites().len(), 1);
        assert_eq!(registry.pool_of(4).unwrap().token0_symbol, "STX");
    }

    #[test]
    fn test_load_rejects_cyclic_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"
[[tokens]]
symbol = "A"
contract_id = "SP000.a"
decimals = 6
kind = "composite"
pool_id = 1
component0 = "B"
component1 = "B"

[[tokens]]
symbol = "B"
contract_id = "SP000.b"
decimals = 6
kind = "composite"
pool_id = 2
component0 = "A"
component1 = "A"

[[pools]]
id = 1
token0_symbol = "B"
token1_symbol = "B"
contract_address = "SP000.univ2-core"

[[pools]]
id = 2
token0_symbol = "A"
token1_symbol = "A"
contract_address = "SP000.univ2-core"
"#
        )
        .unwrap();

        assert!(Registry::load(file.path()).is_err());
    }
}
