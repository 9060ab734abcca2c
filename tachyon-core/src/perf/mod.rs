//! Performance Utilities
//!
//! - **CPU affinity / priority**: pin the decision thread, push the log
//!   drainer out of its way
//! - **Lock-free counters**: cache-padded atomics shared with exporters

pub mod cpu;
pub mod metrics;

// Re-exports for convenience
pub use cpu::{
    lower_current_thread_priority, num_cores, optimize_for_hft, pin_to_core, pin_to_last_core,
    set_realtime_priority,
};
pub use metrics::{CountersSnapshot, EngineCounters};
