//! Lock-Free Engine Counters
//!
//! Cache-padded atomic counters written by the decision thread and read by
//! exporters on other threads. All counters use relaxed ordering.

use crossbeam_utils::CachePadded;
use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};

/// Per-engine decision counters
///
/// Each counter sits on its own cache line so a scraping thread never
/// bounces the line the decision thread is writing.
#[derive(Default)]
pub struct EngineCounters {
    /// Decision cycles started
    pub cycles: CachePadded<AtomicU64>,
    /// Cycles whose blended signal passed the pre-sizing gate
    pub signals: CachePadded<AtomicU64>,
    /// Orders handed to a venue
    pub orders_sent: CachePadded<AtomicU64>,
    /// Orders the venue accepted
    pub orders_filled: CachePadded<AtomicU64>,
    /// Orders the venue rejected or could not take
    pub orders_unfilled: CachePadded<AtomicU64>,
    /// Orders stopped by the local limit check
    pub suppressed: CachePadded<AtomicU64>,
    /// Executions cancelled by the anomaly cutout
    pub cancelled: CachePadded<AtomicU64>,
    /// Cycles held for low regime confidence
    pub holds: CachePadded<AtomicU64>,
    /// Strategy outputs replaced with zero (panic or non-finite)
    pub strategy_faults: CachePadded<AtomicU64>,
    /// Oracle calls neutralized (over budget or non-finite)
    pub oracle_overruns: CachePadded<AtomicU64>,
    /// Cumulative cycle latency in nanoseconds
    pub total_cycle_ns: CachePadded<AtomicU64>,
    /// Net exposure as `f64` bits, mirrored after every fill
    exposure_bits: CachePadded<AtomicU64>,
}

#[inline(always)]
fn bump(counter: &AtomicU64) {
    counter.fetch_add(1, Ordering::Relaxed);
}

impl EngineCounters {
    pub fn new() -> Self {
        Self::default()
    }

    #[inline(always)]
    pub fn inc_cycles(&self) {
        bump(&self.cycles);
    }

    #[inline(always)]
    pub fn inc_signals(&self) {
        bump(&self.signals);
    }

    #[inline(always)]
    pub fn inc_orders_sent(&self) {
        bump(&self.orders_sent);
    }

    #[inline(always)]
    pub fn inc_filled(&self) {
        bump(&self.orders_filled);
    }

    #[inline(always)]
    pub fn inc_unfilled(&self) {
        bump(&self.orders_unfilled);
    }

    #[inline(always)]
    pub fn inc_suppressed(&self) {
        bump(&self.suppressed);
    }

    #[inline(always)]
    pub fn inc_cancelled(&self) {
        bump(&self.cancelled);
    }

    #[inline(always)]
    pub fn inc_holds(&self) {
        bump(&self.holds);
    }

    #[inline(always)]
    pub fn inc_strategy_faults(&self) {
        bump(&self.strategy_faults);
    }

    #[inline(always)]
    pub fn inc_oracle_overruns(&self) {
        bump(&self.oracle_overruns);
    }

    #[inline(always)]
    pub fn add_cycle_latency(&self, ns: u64) {
        self.total_cycle_ns.fetch_add(ns, Ordering::Relaxed);
    }

    #[inline(always)]
    pub fn set_exposure(&self, exposure: f64) {
        self.exposure_bits.store(exposure.to_bits(), Ordering::Relaxed);
    }

    pub fn exposure(&self) -> f64 {
        f64::from_bits(self.exposure_bits.load(Ordering::Relaxed))
    }

    /// Get snapshot of all counters
    pub fn snapshot(&self) -> CountersSnapshot {
        let load = |c: &AtomicU64| c.load(Ordering::Relaxed);
        CountersSnapshot {
            cycles: load(&self.cycles),
            signals: load(&self.signals),
            orders_sent: load(&self.orders_sent),
            orders_filled: load(&self.orders_filled),
            orders_unfilled: load(&self.orders_unfilled),
            suppressed: load(&self.suppressed),
            cancelled: load(&self.cancelled),
            holds: load(&self.holds),
            strategy_faults: load(&self.strategy_faults),
            oracle_overruns: load(&self.oracle_overruns),
            total_cycle_ns: load(&self.total_cycle_ns),
        }
    }
}

/// Snapshot of counters at a point in time
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CountersSnapshot {
    pub cycles: u64,
    pub signals: u64,
    pub orders_sent: u64,
    pub orders_filled: u64,
    pub orders_unfilled: u64,
    pub suppressed: u64,
    pub cancelled: u64,
    pub holds: u64,
    pub strategy_faults: u64,
    pub oracle_overruns: u64,
    pub total_cycle_ns: u64,
}

impl CountersSnapshot {
    pub fn avg_cycle_ns(&self) -> f64 {
        if self.cycles > 0 {
            self.total_cycle_ns as f64 / self.cycles as f64
        } else {
            0.0
        }
    }

    /// Fills per order sent
    pub fn fill_rate(&self) -> f64 {
        if self.orders_sent > 0 {
            self.orders_filled as f64 / self.orders_sent as f64
        } else {
            0.0
        }
    }
}
