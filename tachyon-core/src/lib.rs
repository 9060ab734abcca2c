//! Tachyon Core - Low-Latency Hybrid Signal Engine
//!
//! Tachyon blends a fixed panel of rule-based strategies with an external
//! scoring oracle into one position-sized, risk-checked order per decision
//! cycle, and routes it over a pooled venue connection.
//!
//! ## Architecture
//! - **No blocking I/O** on the decision thread: every decision goes to the
//!   lock-free `RingLog`, drained by a low-priority thread
//! - **Cache-line aligned** orders and counters (64 bytes)
//! - **Closed sets**: the strategy panel and the transport kinds are enums
//! - **Explicit shared state**: order ids, connection pool and counters are
//!   passed in by `Arc`, never global
//!
//! ## Core Modules
//! - `core`: Order, feature record, symbol ids, error types
//! - `config`: layered TOML/env configuration and compiled-in defaults
//! - `data`: market data sources (static, seeded synthetic)
//! - `oracle`: scoring oracle seam with latency and finiteness guards
//! - `strategy`: the six-strategy panel
//! - `engine`: features, confidence blending, sizing, risk, decision loop
//! - `ringlog`: asynchronous decision log
//! - `venue`: transports and the connection pool
//! - `monitoring`: Prometheus export
//! - `perf`, `resilience`, `utils`: CPU placement, counters, panic hook, tracing

pub mod config;
pub mod core;
pub mod data;
pub mod engine;
pub mod monitoring;
pub mod oracle;
pub mod perf;
pub mod resilience;
pub mod ringlog;
pub mod strategy;
pub mod testing;
pub mod utils;
pub mod venue;

// Re-export core types
pub use crate::core::{
    Exchange, MarketFeatures, Order, OrderIdSequence, Side, StrategyTag, SymbolId,
};

pub use crate::config::TachyonConfig;
pub use crate::engine::{CycleOutcome, EngineStats, ExecutionReport, ExecutionStatus, SignalEngine};
pub use crate::ringlog::{LogProducer, RingLog, RingLogStats};
pub use crate::venue::{Connection, ConnectionConfig, ConnectionPool, Protocol, Transport};

// Re-export error types
pub use anyhow::{Error, Result};

/// Prelude for convenient imports
pub mod prelude {
    pub use crate::core::{Exchange, MarketFeatures, Order, OrderIdSequence, Side, SymbolId};

    pub use crate::config::{EngineConfig, LoggerConfig, TachyonConfig, VenueConfig};

    pub use crate::engine::{CycleOutcome, EngineStats, SignalEngine};

    pub use crate::data::{MarketDataSource, StaticMarketData, SyntheticMarketData};
    pub use crate::oracle::{NeutralOracle, ScoringOracle};

    pub use crate::ringlog::RingLog;
    pub use crate::venue::{ConnectionPool, Transport};

    pub use crate::perf::{optimize_for_hft, pin_to_core, EngineCounters};

    pub use crate::ring_log;
    pub use crate::{Error, Result};
}
