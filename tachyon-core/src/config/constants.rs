//! Centralized defaults for the decision engine, logger and venue layer
//!
//! These are the compiled-in values; every one of them can be overridden at
//! startup through `TachyonConfig` unless noted otherwise.

// ===== SIGNAL ENGINE =====

/// EWMA smoothing factor for strategy confidence
pub const EWMA_ALPHA: f64 = 0.3;

/// Minimum confidence for a strategy to take part in blending
pub const MIN_WEIGHT: f64 = 0.05;

/// Scale from raw strategy signal to the P&L proxy fed into the EWMA (fixed)
pub const PNL_PROXY_SCALE: f64 = 0.1;

/// Floor of the per-cycle confidence threshold (fixed)
pub const CONFIDENCE_THRESHOLD_FLOOR: f64 = 0.05;

/// Volatility multiplier of the per-cycle confidence threshold (fixed)
pub const CONFIDENCE_THRESHOLD_VOL_SCALE: f64 = 0.1;

/// Weight of the oracle signal per unit of regime confidence (fixed)
pub const ORACLE_WEIGHT_SCALE: f64 = 0.3;

/// Anomaly score above which blending returns a zero signal (fixed)
pub const BLEND_ANOMALY_CUTOUT: f64 = 0.95;

/// Anomaly score above which execution cancels unconditionally (fixed)
pub const EXECUTION_ANOMALY_CUTOUT: f64 = 0.98;

/// Blended signals at or below this magnitude never reach execution
pub const MIN_TRADE_SIGNAL: f64 = 0.01;

/// Regime confidence below which a cycle holds. 0.0 disables the hold.
pub const REGIME_HOLD_THRESHOLD: f64 = 0.0;

// ===== GARCH(1,1) =====

pub const GARCH_OMEGA: f64 = 0.00001;
pub const GARCH_ALPHA: f64 = 0.1;
pub const GARCH_BETA: f64 = 0.8;

/// Volatility state before the first observation
pub const INITIAL_VOLATILITY: f64 = 0.01;

/// Clamp range for the published volatility (fixed)
pub const VOLATILITY_FLOOR: f64 = 0.0001;
pub const VOLATILITY_CEILING: f64 = 5.0;

/// Number of returns kept for trend detection (fixed)
pub const RETURN_WINDOW: usize = 100;

/// Per-step decay of the trend weights, most recent first (fixed)
pub const TREND_DECAY: f64 = 0.95;

// ===== EXECUTION & RISK =====

pub const MAX_ORDER_SIZE: f64 = 1000.0;
pub const MAX_EXPOSURE: f64 = 10_000.0;
pub const VOL_LIMIT: f64 = 2.0;

/// Notional allowed per unit of `VOL_LIMIT` (fixed)
pub const NOTIONAL_PER_VOL_UNIT: f64 = 10_000.0;

/// Base order size per unit of blended signal (fixed)
pub const BASE_SIZE_PER_SIGNAL: f64 = 100.0;

/// Liquidity score below which order size is halved (fixed)
pub const LOW_LIQUIDITY: f64 = 0.3;

/// Exponential decay applied to price impact (fixed)
pub const IMPACT_DECAY: f64 = 5.0;

/// Reference price of the synthetic quote (fixed)
pub const SYNTHETIC_REFERENCE_PRICE: f64 = 100.0;

/// Oracle call budget before its outputs are treated as unavailable
pub const ORACLE_BUDGET_US: u64 = 50;

/// Pause between decision cycles; 0 runs cycles back to back
pub const CYCLE_INTERVAL_US: u64 = 0;

// ===== RING LOG =====

/// Slots in the log ring (power of two)
pub const LOG_CAPACITY: usize = 0x2000;

/// Idle iterations spent yielding before the drainer starts sleeping
pub const SPIN_YIELD_THRESHOLD: u32 = 1_000;
pub const SLEEP_THRESHOLD: u32 = 10_000;

pub const MIN_IDLE_SLEEP_US: u64 = 1;
pub const MAX_IDLE_SLEEP_US: u64 = 100;

/// Smallest drain batch, unless the backlog itself is smaller
pub const MIN_DRAIN_BATCH: usize = 32;

pub const DEFAULT_LOG_PATH: &str = "trading_log.txt";

// ===== VENUE =====

pub const SESSION_PORT: u16 = 8001;
pub const FALLBACK_PORT: u16 = 9001;

/// Nominal one-way latency of the socket transport
pub const SESSION_LATENCY_NS: u64 = 50_000;

/// Nominal one-way latency of the shared-memory transport
pub const SHARED_MEMORY_LATENCY_NS: u64 = 500;

/// Order slots in each shared-memory segment
pub const SHARED_MEMORY_SLOTS: usize = 1024;
