use super::constants::*;
use crate::core::Exchange;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Main configuration structure
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TachyonConfig {
    pub engine: EngineConfig,
    pub logger: LoggerConfig,
    pub venue: VenueConfig,
    pub metrics: MetricsConfig,
}

/// Signal engine parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// EWMA smoothing factor for strategy confidence, in (0, 1]
    pub alpha: f64,

    /// Minimum confidence for a strategy to take part in blending
    pub min_weight: f64,

    /// Upper clamp of the sized order quantity
    pub max_order_size: f64,

    /// Maximum absolute net exposure (notional)
    pub max_exposure: f64,

    /// Per-order notional limit, in units of 10_000
    pub vol_limit: f64,

    pub garch_omega: f64,
    pub garch_alpha: f64,
    pub garch_beta: f64,

    /// Volatility state before the first observation
    pub initial_volatility: f64,

    /// Blended signals at or below this magnitude are not executed
    pub min_trade_signal: f64,

    /// Regime confidence below which the cycle holds (0.0 disables)
    pub regime_hold_threshold: f64,

    /// Oracle call budget in microseconds
    pub oracle_budget_us: u64,

    /// Pause between decision cycles in microseconds (0 runs back to back)
    pub cycle_interval_us: u64,

    /// Venue orders are routed to
    pub exchange: Exchange,

    /// Ticker of the traded instrument
    pub symbol: String,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            alpha: EWMA_ALPHA,
            min_weight: MIN_WEIGHT,
            max_order_size: MAX_ORDER_SIZE,
            max_exposure: MAX_EXPOSURE,
            vol_limit: VOL_LIMIT,
            garch_omega: GARCH_OMEGA,
            garch_alpha: GARCH_ALPHA,
            garch_beta: GARCH_BETA,
            initial_volatility: INITIAL_VOLATILITY,
            min_trade_signal: MIN_TRADE_SIGNAL,
            regime_hold_threshold: REGIME_HOLD_THRESHOLD,
            oracle_budget_us: ORACLE_BUDGET_US,
            cycle_interval_us: CYCLE_INTERVAL_US,
            exchange: Exchange::Nyse,
            symbol: "AAPL".to_string(),
        }
    }
}

/// Asynchronous logger parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggerConfig {
    /// Append-only log file
    pub path: PathBuf,

    /// Ring slots, power of two
    pub capacity: usize,

    /// Idle iterations spent yielding before sleeping
    pub spin_yield_threshold: u32,

    /// Idle iterations after which back-off sleeping begins
    pub sleep_threshold: u32,

    pub min_sleep_us: u64,
    pub max_sleep_us: u64,

    /// Smallest drain batch
    pub min_batch: usize,

    /// Run the drainer at reduced scheduling priority
    pub lower_priority: bool,

    /// Pin the drainer to the last core, away from the decision thread
    pub pin_to_last_core: bool,
}

impl Default for LoggerConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from(DEFAULT_LOG_PATH),
            capacity: LOG_CAPACITY,
            spin_yield_threshold: SPIN_YIELD_THRESHOLD,
            sleep_threshold: SLEEP_THRESHOLD,
            min_sleep_us: MIN_IDLE_SLEEP_US,
            max_sleep_us: MAX_IDLE_SLEEP_US,
            min_batch: MIN_DRAIN_BATCH,
            lower_priority: true,
            pin_to_last_core: true,
        }
    }
}

/// Venue transport parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct VenueConfig {
    pub session_port: u16,
    pub fallback_port: u16,
    pub session_latency_ns: u64,
    pub shared_memory_latency_ns: u64,
    pub shared_memory_slots: usize,
}

impl Default for VenueConfig {
    fn default() -> Self {
        Self {
            session_port: SESSION_PORT,
            fallback_port: FALLBACK_PORT,
            session_latency_ns: SESSION_LATENCY_NS,
            shared_memory_latency_ns: SHARED_MEMORY_LATENCY_NS,
            shared_memory_slots: SHARED_MEMORY_SLOTS,
        }
    }
}

/// Metrics and monitoring configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MetricsConfig {
    /// Serve Prometheus metrics over HTTP
    pub enable_prometheus: bool,

    /// Address of the metrics endpoint
    pub listen_addr: String,

    /// Log level: "trace", "debug", "info", "warn", "error"
    pub log_level: String,

    /// Enable JSON logging
    pub json_logs: bool,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            enable_prometheus: false,
            listen_addr: "127.0.0.1:9090".to_string(),
            log_level: "info".to_string(),
            json_logs: false,
        }
    }
}
