//! Recursive token valuation

pub mod engine;

pub use engine::{ValuationEngine, ValuationTuning};
