//! Monitoring and observability
//!
//! Prometheus export of the engine's lock-free counters, decision log
//! health and connection pool statistics, plus the HTTP server that
//! Prometheus scrapes.

pub mod metrics;
pub mod server;

pub use metrics::{EngineMetrics, LoggerMetrics, MetricsRegistry, MetricsSample, VenueMetrics};
pub use server::{encode_metrics, MetricsSampler, MetricsServer};
