//! Core zero-overhead types for the decision path
//!
//! This module provides the fundamental building blocks shared by the engine,
//! the logger and the venue layer:
//! - `Order`: 64-byte cache-line aligned venue order
//! - `MarketFeatures`: immutable per-cycle feature record
//! - `OrderIdSequence`: process-scoped monotonic id source
//! - Domain error types
//!
//! All types are designed to minimize latency:
//! - Copy semantics where possible (no allocations)
//! - Cache-line alignment (64 bytes)
//! - Atomic operations (lock-free)

pub mod errors;
pub mod features;
pub mod types;

// Re-export commonly used types
pub use errors::{ConfigError, OracleError, RingLogError, VenueError};
pub use features::MarketFeatures;
pub use types::{fnv1a, Exchange, Order, OrderIdSequence, Side, StrategyTag, SymbolId};
