//! Prometheus metrics for the decision engine
//!
//! Metric families:
//! - Engine activity (cycles, signals, orders, faults)
//! - Risk (net exposure)
//! - Decision log (written, dropped, backlog)
//! - Venue pool (hits, misses, reconnects)
//!
//! The hot path never touches these. A sampler copies the lock-free
//! counters in periodically through `observe`.

use crate::perf::CountersSnapshot;
use crate::ringlog::RingLogStats;
use crate::venue::PoolStats;
use prometheus::{Gauge, IntCounter, IntGauge, Opts, Registry};
use std::sync::Arc;
use tracing::info;

const NAMESPACE: &str = "tachyon";

/// Everything `observe` needs from one sampling pass
#[derive(Debug, Clone, Copy, Default)]
pub struct MetricsSample {
    pub counters: CountersSnapshot,
    pub exposure: f64,
    pub ringlog: RingLogStats,
    pub pool: PoolStats,
}

/// Central registry for all Prometheus metrics
#[derive(Clone)]
pub struct MetricsRegistry {
    registry: Arc<Registry>,
    engine: Arc<EngineMetrics>,
    logger: Arc<LoggerMetrics>,
    venue: Arc<VenueMetrics>,
}

impl MetricsRegistry {
    pub fn new() -> Result<Self, prometheus::Error> {
        let registry = Arc::new(Registry::new());

        let engine = Arc::new(EngineMetrics::new(&registry)?);
        let logger = Arc::new(LoggerMetrics::new(&registry)?);
        let venue = Arc::new(VenueMetrics::new(&registry)?);

        info!("Prometheus metrics registry initialized");

        Ok(Self {
            registry,
            engine,
            logger,
            venue,
        })
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    pub fn engine(&self) -> &EngineMetrics {
        &self.engine
    }

    pub fn logger(&self) -> &LoggerMetrics {
        &self.logger
    }

    pub fn venue(&self) -> &VenueMetrics {
        &self.venue
    }

    /// Bring every metric up to the sampled totals
    pub fn observe(&self, sample: &MetricsSample) {
        self.engine.observe(&sample.counters, sample.exposure);
        self.logger.observe(&sample.ringlog);
        self.venue.observe(&sample.pool);
    }
}

fn counter(registry: &Registry, name: &str, help: &str) -> Result<IntCounter, prometheus::Error> {
    let c = IntCounter::with_opts(Opts::new(name, help).namespace(NAMESPACE))?;
    registry.register(Box::new(c.clone()))?;
    Ok(c)
}

fn int_gauge(registry: &Registry, name: &str, help: &str) -> Result<IntGauge, prometheus::Error> {
    let g = IntGauge::with_opts(Opts::new(name, help).namespace(NAMESPACE))?;
    registry.register(Box::new(g.clone()))?;
    Ok(g)
}

fn gauge(registry: &Registry, name: &str, help: &str) -> Result<Gauge, prometheus::Error> {
    let g = Gauge::with_opts(Opts::new(name, help).namespace(NAMESPACE))?;
    registry.register(Box::new(g.clone()))?;
    Ok(g)
}

/// Advance a monotonic counter to `total`; totals never go backwards
#[inline]
fn advance(c: &IntCounter, total: u64) {
    let current = c.get();
    if total > current {
        c.inc_by(total - current);
    }
}

/// Engine activity and risk
pub struct EngineMetrics {
    pub cycles_total: IntCounter,
    pub signals_total: IntCounter,
    pub orders_sent_total: IntCounter,
    pub orders_filled_total: IntCounter,
    pub orders_unfilled_total: IntCounter,
    pub suppressed_total: IntCounter,
    pub cancelled_total: IntCounter,
    pub holds_total: IntCounter,
    pub strategy_faults_total: IntCounter,
    pub oracle_overruns_total: IntCounter,
    /// Mean decision cycle latency (nanoseconds)
    pub avg_cycle_ns: Gauge,
    /// Fills per order sent (0.0 to 1.0)
    pub fill_rate: Gauge,
    /// Signed net exposure (notional)
    pub exposure: Gauge,
}

impl EngineMetrics {
    fn new(registry: &Registry) -> Result<Self, prometheus::Error> {
        Ok(Self {
            cycles_total: counter(registry, "engine_cycles_total", "Decision cycles run")?,
            signals_total: counter(
                registry,
                "engine_signals_total",
                "Blended signals that passed the pre-sizing gate",
            )?,
            orders_sent_total: counter(
                registry,
                "engine_orders_sent_total",
                "Orders handed to a venue",
            )?,
            orders_filled_total: counter(
                registry,
                "engine_orders_filled_total",
                "Orders accepted by the venue",
            )?,
            orders_unfilled_total: counter(
                registry,
                "engine_orders_unfilled_total",
                "Orders the venue did not take",
            )?,
            suppressed_total: counter(
                registry,
                "engine_suppressed_total",
                "Orders stopped by the local limit check",
            )?,
            cancelled_total: counter(
                registry,
                "engine_cancelled_total",
                "Executions cancelled by the anomaly cutout",
            )?,
            holds_total: counter(
                registry,
                "engine_holds_total",
                "Cycles held for low regime confidence",
            )?,
            strategy_faults_total: counter(
                registry,
                "engine_strategy_faults_total",
                "Strategy outputs discarded (panic or non-finite)",
            )?,
            oracle_overruns_total: counter(
                registry,
                "engine_oracle_overruns_total",
                "Oracle outputs neutralized (over budget or non-finite)",
            )?,
            avg_cycle_ns: gauge(
                registry,
                "engine_avg_cycle_ns",
                "Mean decision cycle latency in nanoseconds",
            )?,
            fill_rate: gauge(registry, "engine_fill_rate", "Fills per order sent")?,
            exposure: gauge(registry, "risk_exposure", "Signed net exposure")?,
        })
    }

    fn observe(&self, c: &CountersSnapshot, exposure: f64) {
        advance(&self.cycles_total, c.cycles);
        advance(&self.signals_total, c.signals);
        advance(&self.orders_sent_total, c.orders_sent);
        advance(&self.orders_filled_total, c.orders_filled);
        advance(&self.orders_unfilled_total, c.orders_unfilled);
        advance(&self.suppressed_total, c.suppressed);
        advance(&self.cancelled_total, c.cancelled);
        advance(&self.holds_total, c.holds);
        advance(&self.strategy_faults_total, c.strategy_faults);
        advance(&self.oracle_overruns_total, c.oracle_overruns);
        self.avg_cycle_ns.set(c.avg_cycle_ns());
        self.fill_rate.set(c.fill_rate());
        self.exposure.set(exposure);
    }
}

/// Decision log health
pub struct LoggerMetrics {
    pub written_total: IntCounter,
    pub dropped_total: IntCounter,
    pub write_errors_total: IntCounter,
    pub backlog: IntGauge,
    pub avg_batch: IntGauge,
}

impl LoggerMetrics {
    fn new(registry: &Registry) -> Result<Self, prometheus::Error> {
        Ok(Self {
            written_total: counter(
                registry,
                "ringlog_written_total",
                "Decision log entries written to the sink",
            )?,
            dropped_total: counter(
                registry,
                "ringlog_dropped_total",
                "Decision log entries dropped on a full ring",
            )?,
            write_errors_total: counter(
                registry,
                "ringlog_write_errors_total",
                "Failed writes to the log sink",
            )?,
            backlog: int_gauge(registry, "ringlog_backlog", "Entries waiting to be drained")?,
            avg_batch: int_gauge(registry, "ringlog_avg_batch", "Smoothed drain batch size")?,
        })
    }

    fn observe(&self, s: &RingLogStats) {
        advance(&self.written_total, s.written);
        advance(&self.dropped_total, s.dropped);
        advance(&self.write_errors_total, s.write_errors);
        self.backlog.set(s.backlog as i64);
        self.avg_batch.set(s.avg_batch as i64);
    }
}

/// Connection pool effectiveness
pub struct VenueMetrics {
    pub pool_hits_total: IntCounter,
    pub pool_misses_total: IntCounter,
    pub reconnects_total: IntCounter,
    pub cached_connections: IntGauge,
}

impl VenueMetrics {
    fn new(registry: &Registry) -> Result<Self, prometheus::Error> {
        Ok(Self {
            pool_hits_total: counter(
                registry,
                "venue_pool_hits_total",
                "Connection lookups served from the pool",
            )?,
            pool_misses_total: counter(
                registry,
                "venue_pool_misses_total",
                "Connection lookups that constructed a transport",
            )?,
            reconnects_total: counter(
                registry,
                "venue_reconnects_total",
                "Unhealthy pooled connections replaced",
            )?,
            cached_connections: int_gauge(
                registry,
                "venue_cached_connections",
                "Entries currently in the connection pool",
            )?,
        })
    }

    fn observe(&self, s: &PoolStats) {
        advance(&self.pool_hits_total, s.hits);
        advance(&self.pool_misses_total, s.misses);
        advance(&self.reconnects_total, s.reconnects);
        self.cached_connections.set(s.cached as i64);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_registry_creation() {
        let registry = MetricsRegistry::new().unwrap();
        let families = registry.registry().gather();
        assert!(families.len() >= 20);
    }

    #[test]
    fn test_observe_advances_to_totals() {
        let registry = MetricsRegistry::new().unwrap();
        let mut sample = MetricsSample {
            counters: CountersSnapshot {
                cycles: 10,
                orders_sent: 4,
                orders_filled: 3,
                ..Default::default()
            },
            exposure: -250.0,
            ..Default::default()
        };

        registry.observe(&sample);
        assert_eq!(registry.engine().cycles_total.get(), 10);
        assert_eq!(registry.engine().fill_rate.get(), 0.75);
        assert_eq!(registry.engine().exposure.get(), -250.0);

        sample.counters.cycles = 25;
        sample.ringlog.dropped = 7;
        sample.pool.cached = 2;
        registry.observe(&sample);
        registry.observe(&sample);

        assert_eq!(registry.engine().cycles_total.get(), 25);
        assert_eq!(registry.logger().dropped_total.get(), 7);
        assert_eq!(registry.venue().cached_connections.get(), 2);
    }

    #[test]
    fn test_separate_registries_do_not_collide() {
        let a = MetricsRegistry::new().unwrap();
        let b = MetricsRegistry::new().unwrap();
        a.engine().cycles_total.inc();
        assert_eq!(b.engine().cycles_total.get(), 0);
    }
}
