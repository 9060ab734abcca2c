//! The hybrid decision loop
//!
//! One cycle:
//! 1. Build features, enrich them through the oracle under its latency budget
//! 2. Feed the oracle back, hold if regime confidence is too low
//! 3. Evaluate the strategy panel (strategy 0 on a scoped thread)
//! 4. Update confidence, blend with the oracle signal
//! 5. Gate, size, risk-check and route the order
//!
//! Every decision is written to the `RingLog`; nothing on this path blocks
//! on I/O. Operational events (faults, reconnects) also go to `tracing`.

use super::confidence::ConfidenceTracker;
use super::execution::{self, ExecutionReport};
use super::features::FeatureBuilder;
use super::panel::evaluate_panel;
use super::risk::ExposureTracker;
use crate::config::EngineConfig;
use crate::core::{Exchange, MarketFeatures, Order, OrderIdSequence, Side, StrategyTag, SymbolId};
use crate::data::MarketDataSource;
use crate::oracle::{self, Enrichment, ScoringOracle};
use crate::perf::{CountersSnapshot, EngineCounters};
use crate::ring_log;
use crate::ringlog::RingLog;
use crate::strategy::{PANEL, PANEL_SIZE};
use crate::venue::{Connection, ConnectionPool, Transport};
use serde::Serialize;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// What a single decision cycle ended in
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum CycleOutcome {
    /// Regime confidence below the hold threshold
    Hold { regime_confidence: f64 },
    /// Nothing carried weight, or the anomaly cutout zeroed the blend
    NoSignal { anomaly_override: bool },
    /// Blended signal too small or too large for current exposure
    Gated { signal: f64 },
    /// Execution was attempted
    Executed { signal: f64, report: ExecutionReport },
}

impl CycleOutcome {
    pub fn report(&self) -> Option<&ExecutionReport> {
        match self {
            CycleOutcome::Executed { report, .. } => Some(report),
            _ => None,
        }
    }
}

/// Engine statistics
#[derive(Debug, Clone, Serialize)]
pub struct EngineStats {
    #[serde(flatten)]
    pub counters: CountersSnapshot,
    pub final_exposure: f64,
    pub confidence: [f64; PANEL_SIZE],
    pub dropped_logs: u64,
}

pub struct SignalEngine<O, M>
where
    O: ScoringOracle,
    M: MarketDataSource,
{
    config: EngineConfig,
    oracle: O,
    market: M,
    log: Arc<RingLog>,
    pool: Arc<ConnectionPool>,
    order_ids: Arc<OrderIdSequence>,
    counters: Arc<EngineCounters>,

    features: FeatureBuilder,
    confidence: ConfidenceTracker,
    risk: ExposureTracker,

    /// Strong handles keep pooled connections alive between cycles
    venues: HashMap<Exchange, Arc<Connection>>,
    symbol: SymbolId,
    oracle_budget: Duration,
    epoch: Instant,
    shutdown: Arc<AtomicBool>,
}

impl<O, M> SignalEngine<O, M>
where
    O: ScoringOracle,
    M: MarketDataSource,
{
    pub fn new(
        config: EngineConfig,
        oracle: O,
        market: M,
        log: Arc<RingLog>,
        pool: Arc<ConnectionPool>,
        order_ids: Arc<OrderIdSequence>,
    ) -> Self {
        let symbol = SymbolId::from_ticker(&config.symbol);
        tracing::info!(
            exchange = %config.exchange,
            symbol = %config.symbol,
            ultra_low_latency = symbol.wants_ultra_low_latency(),
            "Creating signal engine"
        );

        Self {
            features: FeatureBuilder::new(&config),
            confidence: ConfidenceTracker::new(config.alpha, config.min_weight),
            risk: ExposureTracker::from_config(&config),
            oracle_budget: Duration::from_micros(config.oracle_budget_us),
            counters: Arc::new(EngineCounters::new()),
            venues: HashMap::new(),
            epoch: Instant::now(),
            shutdown: Arc::new(AtomicBool::new(false)),
            symbol,
            config,
            oracle,
            market,
            log,
            pool,
            order_ids,
        }
    }

    /// Fresh features for this cycle, oracle fields filled or neutralized
    pub fn compute_features(&mut self) -> MarketFeatures {
        let mut features = self.features.build(&mut self.market);

        match oracle::enrich(&mut self.oracle, &mut features, self.oracle_budget) {
            Enrichment::Applied => {}
            outcome => {
                self.counters.inc_oracle_overruns();
                let total = self.counters.oracle_overruns.load(Ordering::Relaxed);
                // Warn on overrun 1, 2, 4, 8, ...
                if total.is_power_of_two() {
                    tracing::warn!(?outcome, total, "Oracle output neutralized");
                }
                ring_log!(self.log, "[ORACLE] neutralized: {:?}", outcome);
            }
        }

        features
    }

    /// Run one full decision cycle
    pub fn run_cycle(&mut self) -> CycleOutcome {
        let start = Instant::now();
        self.counters.inc_cycles();

        let outcome = self.decide();

        self.counters
            .add_cycle_latency(start.elapsed().as_nanos() as u64);
        outcome
    }

    fn decide(&mut self) -> CycleOutcome {
        let features = self.compute_features();
        self.oracle.update_model(&features, self.risk.exposure());

        if features.regime_confidence < self.config.regime_hold_threshold {
            self.counters.inc_holds();
            ring_log!(
                self.log,
                "[HOLD] regime confidence {:.4} below {:.4}",
                features.regime_confidence,
                self.config.regime_hold_threshold
            );
            return CycleOutcome::Hold {
                regime_confidence: features.regime_confidence,
            };
        }

        ring_log!(
            self.log,
            "[FEATURES] vol={:.6} trend={:.6} imb={:.4} z={:.4} liq={:.4} anomaly={:.4}",
            features.volatility,
            features.trend_strength,
            features.order_book_imbalance,
            features.cointegration_zscore,
            features.liquidity_score,
            features.anomaly_score
        );

        let panel = evaluate_panel(&features);
        for (i, fault) in panel.faults() {
            self.counters.inc_strategy_faults();
            tracing::warn!(strategy = PANEL[i].name(), %fault, "Strategy output discarded");
            ring_log!(self.log, "[FAULT] {} {}", PANEL[i].name(), fault);
        }
        for (strategy, &signal) in PANEL.iter().zip(panel.signals.iter()) {
            if strategy.logs_firing() && signal != 0.0 {
                ring_log!(self.log, "[PATTERN] {} fired {:.4}", strategy.name(), signal);
            }
        }

        self.confidence.update(&panel.signals);
        let oracle_signal = oracle::guarded_signal(&mut self.oracle, &features);
        let blend = self.confidence.blend(&panel.signals, &features, oracle_signal);

        if blend.anomaly_override {
            ring_log!(
                self.log,
                "[ANOMALY] score {:.4}, blend overridden",
                features.anomaly_score
            );
        }

        let signal = match blend.signal() {
            Some(s) => s,
            None => {
                if !blend.anomaly_override {
                    ring_log!(self.log, "[SIGNAL] none");
                }
                return CycleOutcome::NoSignal {
                    anomaly_override: blend.anomaly_override,
                }
            }
        };

        ring_log!(
            self.log,
            "[SIGNAL] blended {:.6} weight {:.4} contributors {:06b} oracle {:.4}",
            signal,
            blend.total_weight,
            blend.contributors,
            oracle_signal
        );

        if signal.abs() <= self.config.min_trade_signal || !self.risk.admits_signal(signal) {
            return CycleOutcome::Gated { signal };
        }

        self.counters.inc_signals();
        let report = self.smart_execute(signal, &features);

        if report.filled() {
            self.risk
                .apply_fill(report.side, report.price, report.quantity);
            self.counters.set_exposure(self.risk.exposure());
        }

        ring_log!(
            self.log,
            "[EXEC] {} {} @ {:.4} {} exposure {:.2}",
            report.side.as_char(),
            report.quantity,
            report.price,
            report.status,
            self.risk.exposure()
        );

        CycleOutcome::Executed { signal, report }
    }

    /// Size, risk-check and route one order for `signal`
    ///
    /// Does not touch exposure; the caller books a fill.
    pub fn smart_execute(&mut self, signal: f64, features: &MarketFeatures) -> ExecutionReport {
        let advice = oracle::guarded_execution(&mut self.oracle, features);

        let plan = match execution::plan(
            signal,
            features,
            &advice,
            self.risk.exposure(),
            self.risk.max_exposure(),
            self.config.max_order_size,
        ) {
            Some(plan) => plan,
            None => {
                self.counters.inc_cancelled();
                ring_log!(
                    self.log,
                    "[CANCEL] critical anomaly {:.4}, order cancelled",
                    features.anomaly_score
                );
                return ExecutionReport::cancelled(Side::from_signal(signal));
            }
        };

        if let Err(violation) = self.risk.check(plan.price, plan.quantity) {
            self.counters.inc_suppressed();
            ring_log!(
                self.log,
                "[RISK] {} {} @ {:.4} suppressed: {}",
                plan.side.as_char(),
                plan.quantity,
                plan.price,
                violation
            );
            return ExecutionReport::suppressed(plan, violation);
        }

        let conn = match self.connection() {
            Some(conn) => conn,
            None => return ExecutionReport::venue_unavailable(plan),
        };

        let order = Order::new(
            self.config.exchange,
            plan.side,
            self.symbol,
            self.order_ids.next_id(),
            plan.price,
            plan.quantity,
            self.timestamp(),
            conn.last_latency_ns(),
            StrategyTag::HYBRID,
        );

        self.log.notify_high_priority(true);
        let accepted = conn.send(&order);
        self.log.notify_high_priority(false);

        self.counters.inc_orders_sent();
        if accepted {
            self.counters.inc_filled();
        } else {
            self.counters.inc_unfilled();
        }

        ExecutionReport::dispatched(plan, order.order_id, accepted)
    }

    /// Healthy connection for the configured venue, reconnecting if needed
    fn connection(&mut self) -> Option<Arc<Connection>> {
        let exchange = self.config.exchange;

        if let Some(conn) = self.venues.get(&exchange) {
            if conn.is_healthy() {
                return Some(Arc::clone(conn));
            }
        }

        match self
            .pool
            .best_for_venue(exchange, self.symbol.wants_ultra_low_latency())
        {
            Ok(conn) => {
                self.venues.insert(exchange, Arc::clone(&conn));
                Some(conn)
            }
            Err(e) => {
                tracing::error!(%exchange, error = %e, "Venue connection failed");
                ring_log!(self.log, "[VENUE] {} unavailable: {}", exchange, e);
                None
            }
        }
    }

    /// Microseconds since engine start, wrapping
    #[inline(always)]
    fn timestamp(&self) -> u32 {
        self.epoch.elapsed().as_micros() as u32
    }

    /// Run cycles until shutdown is requested or `max_cycles` is reached
    pub fn run(&mut self, max_cycles: Option<u64>) -> EngineStats {
        tracing::info!(?max_cycles, "Starting engine main loop");

        let interval = Duration::from_micros(self.config.cycle_interval_us);
        let mut completed = 0u64;

        while !self.shutdown.load(Ordering::Acquire) {
            if max_cycles.is_some_and(|limit| completed >= limit) {
                tracing::info!(completed, "Cycle limit reached");
                break;
            }

            self.run_cycle();
            completed += 1;

            if !interval.is_zero() {
                std::thread::sleep(interval);
            }
        }

        self.log.signal_flush();
        let stats = self.stats();
        tracing::info!("Engine stopped. Stats: {:?}", stats);
        stats
    }

    /// Flag checked once per cycle by `run`
    pub fn shutdown_handle(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.shutdown)
    }

    pub fn stats(&self) -> EngineStats {
        EngineStats {
            counters: self.counters.snapshot(),
            final_exposure: self.risk.exposure(),
            confidence: *self.confidence.confidence(),
            dropped_logs: self.log.dropped_count(),
        }
    }

    pub fn exposure(&self) -> f64 {
        self.risk.exposure()
    }

    pub fn confidence(&self) -> &[f64; PANEL_SIZE] {
        self.confidence.confidence()
    }

    /// Shared with exporters on other threads
    pub fn counters(&self) -> Arc<EngineCounters> {
        Arc::clone(&self.counters)
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn oracle(&self) -> &O {
        &self.oracle
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::LoggerConfig;
    use crate::engine::ExecutionStatus;
    use crate::data::StaticMarketData;
    use crate::testing::{ScriptedOracle, SharedBuffer};
    use crate::venue::SessionTransport;

    fn engine_with(
        config: EngineConfig,
        oracle: ScriptedOracle,
        market: StaticMarketData,
    ) -> (SignalEngine<ScriptedOracle, StaticMarketData>, SharedBuffer) {
        engine_on_pool(config, oracle, market, Arc::new(ConnectionPool::default()))
    }

    fn engine_on_pool(
        config: EngineConfig,
        oracle: ScriptedOracle,
        market: StaticMarketData,
        pool: Arc<ConnectionPool>,
    ) -> (SignalEngine<ScriptedOracle, StaticMarketData>, SharedBuffer) {
        let buffer = SharedBuffer::new();
        let log = RingLog::with_sink(
            buffer.clone(),
            &LoggerConfig {
                capacity: 1024,
                lower_priority: false,
                pin_to_last_core: false,
                ..LoggerConfig::default()
            },
        )
        .unwrap();

        let engine = SignalEngine::new(
            config,
            oracle,
            market,
            Arc::new(log),
            pool,
            Arc::new(OrderIdSequence::new()),
        );
        (engine, buffer)
    }

    /// ES is not on the ultra-low-latency list, so NYSE routes it over FIX
    fn session_config() -> EngineConfig {
        EngineConfig {
            symbol: "ES".to_string(),
            max_exposure: 1_000_000.0,
            ..config()
        }
    }

    fn buying_oracle() -> ScriptedOracle {
        ScriptedOracle {
            regime_confidence: 1.0,
            signal: 0.5,
            ..ScriptedOracle::default()
        }
    }

    fn session_of(conn: &Connection) -> &SessionTransport {
        match conn {
            Connection::Session(session) => session,
            other => panic!("expected a session, got {:?}", other),
        }
    }

    /// Generous oracle budget so scheduler noise never neutralizes a scripted oracle
    fn config() -> EngineConfig {
        EngineConfig {
            oracle_budget_us: 1_000_000,
            ..EngineConfig::default()
        }
    }

    /// Pair trading fires -1 on every cycle with these observations
    fn short_market() -> StaticMarketData {
        StaticMarketData {
            cointegration_zscore: 2.5,
            ..StaticMarketData::default()
        }
    }

    #[test]
    fn test_anomaly_blend_override_reports_no_signal() {
        let oracle = ScriptedOracle {
            regime_confidence: 1.0,
            anomaly_score: 0.96,
            signal: 1.0,
            ..ScriptedOracle::default()
        };
        let (mut engine, _) = engine_with(config(), oracle, short_market());

        let outcome = engine.run_cycle();
        assert_eq!(
            outcome,
            CycleOutcome::NoSignal {
                anomaly_override: true
            }
        );
        assert_eq!(engine.exposure(), 0.0);
    }

    #[test]
    fn test_oracle_only_signal_executes_and_books_fill() {
        // No strategy confidence yet; the oracle alone carries the blend
        let oracle = ScriptedOracle {
            regime_confidence: 1.0,
            signal: 0.5,
            ..ScriptedOracle::default()
        };
        let (mut engine, _) = engine_with(config(), oracle, short_market());

        let outcome = engine.run_cycle();
        let report = *outcome.report().unwrap();
        assert_eq!(report.side, Side::Buy);
        assert_eq!(report.status, ExecutionStatus::Filled);
        assert_eq!(report.order_id, Some(1));

        let expected = report.price * report.quantity as f64;
        assert!((engine.exposure() - expected).abs() < 1e-9);

        let stats = engine.stats();
        assert_eq!(stats.counters.cycles, 1);
        assert_eq!(stats.counters.orders_filled, 1);
        // AAPL on NYSE routes over shared memory
        assert!(engine.venues[&Exchange::Nyse].is_shared_memory());
    }

    #[test]
    fn test_regime_hold() {
        let config = EngineConfig {
            regime_hold_threshold: 0.2,
            ..config()
        };
        let oracle = ScriptedOracle {
            regime_confidence: 0.1,
            signal: 1.0,
            ..ScriptedOracle::default()
        };
        let (mut engine, _) = engine_with(config, oracle, short_market());

        assert_eq!(
            engine.run_cycle(),
            CycleOutcome::Hold {
                regime_confidence: 0.1
            }
        );
        assert_eq!(engine.stats().counters.holds, 1);
        // The hold happens before the panel, so confidence is untouched
        assert_eq!(engine.confidence(), &[0.0; PANEL_SIZE]);
    }

    #[test]
    fn test_critical_anomaly_cancels_execution() {
        let oracle = ScriptedOracle {
            anomaly_score: 0.99,
            ..ScriptedOracle::default()
        };
        let (mut engine, _) = engine_with(config(), oracle, short_market());
        let features = engine.compute_features();

        let report = engine.smart_execute(0.8, &features);
        assert_eq!(report.status, ExecutionStatus::Cancelled);
        assert_eq!(report.price, 0.0);
        assert_eq!(report.quantity, 0);
        assert_eq!(engine.stats().counters.cancelled, 1);
        assert_eq!(engine.stats().counters.orders_sent, 0);
    }

    #[test]
    fn test_limit_check_suppresses() {
        let config = EngineConfig {
            max_exposure: 500.0,
            ..config()
        };
        let (mut engine, _) = engine_with(config, ScriptedOracle::default(), short_market());
        let features = engine.compute_features();

        // 100 units at ~101 is far above a 500 exposure cap
        let report = engine.smart_execute(1.0, &features);
        assert_eq!(report.status, ExecutionStatus::Suppressed);
        assert!(report.violation.is_some());
        assert!(!report.status.dispatched());
        assert_eq!(engine.exposure(), 0.0);
    }

    #[test]
    fn test_small_signal_is_gated() {
        let oracle = ScriptedOracle {
            regime_confidence: 1.0,
            signal: 0.005,
            ..ScriptedOracle::default()
        };
        let (mut engine, _) = engine_with(config(), oracle, StaticMarketData::default());

        match engine.run_cycle() {
            CycleOutcome::Gated { signal } => assert!(signal.abs() <= 0.01),
            other => panic!("expected gate, got {:?}", other),
        }
        assert_eq!(engine.stats().counters.signals, 0);
    }

    #[test]
    fn test_decisions_reach_the_log() {
        let oracle = ScriptedOracle {
            regime_confidence: 1.0,
            signal: 0.5,
            ..ScriptedOracle::default()
        };
        let (mut engine, buffer) = engine_with(config(), oracle, short_market());
        engine.run_cycle();
        drop(engine);

        let deadline = Instant::now() + Duration::from_secs(5);
        while !buffer.contents().contains("[EXEC]") && Instant::now() < deadline {
            std::thread::sleep(Duration::from_millis(1));
        }
        let text = buffer.contents();
        assert!(text.contains("[FEATURES]"));
        assert!(text.contains("[SIGNAL]"));
        assert!(text.contains("[EXEC] B"));
    }

    #[test]
    fn test_severed_session_reconnects_next_cycle() {
        let pool = Arc::new(ConnectionPool::default());
        let (mut engine, _) =
            engine_on_pool(session_config(), buying_oracle(), short_market(), Arc::clone(&pool));

        let first = engine.run_cycle().report().map(|r| r.status);
        assert_eq!(first, Some(ExecutionStatus::Filled));

        let original = pool.best_for_venue(Exchange::Nyse, false).unwrap();
        assert!(Arc::ptr_eq(&original, &engine.venues[&Exchange::Nyse]));
        session_of(&original).sever();

        let report = *engine.run_cycle().report().unwrap();
        assert_eq!(report.status, ExecutionStatus::Filled);

        let stats = pool.stats();
        assert_eq!(stats.reconnects, 1);
        assert_eq!(stats.constructions, 2);
        let current = &engine.venues[&Exchange::Nyse];
        assert!(!Arc::ptr_eq(&original, current));
        assert!(current.is_healthy());
        assert_eq!(session_of(&original).sent(), 1);
        assert_eq!(session_of(current).sent(), 1);
    }

    #[test]
    fn test_refused_send_is_unfilled_and_not_booked() {
        let pool = Arc::new(ConnectionPool::default());
        let (mut engine, buffer) =
            engine_on_pool(session_config(), buying_oracle(), short_market(), Arc::clone(&pool));

        engine.run_cycle();
        let exposure = engine.exposure();
        assert!(exposure > 0.0);

        let conn = Arc::clone(&engine.venues[&Exchange::Nyse]);
        session_of(&conn).set_rejecting(true);

        let report = *engine.run_cycle().report().unwrap();
        assert_eq!(report.status, ExecutionStatus::Unfilled);
        assert!(report.order_id.is_some());
        assert!(report.quantity >= 1);
        assert_eq!(engine.exposure(), exposure);

        // One attempt per cycle, no retry
        let c = engine.stats().counters;
        assert_eq!(c.orders_sent, 2);
        assert_eq!(c.orders_unfilled, 1);
        assert_eq!(session_of(&conn).sent(), 1);

        // The session stayed healthy, so it is kept rather than replaced
        session_of(&conn).set_rejecting(false);
        assert!(engine.run_cycle().report().unwrap().filled());
        assert_eq!(pool.stats().reconnects, 0);
        assert!(Arc::ptr_eq(&conn, &engine.venues[&Exchange::Nyse]));

        drop(engine);
        assert!(buffer.wait_until(Duration::from_secs(5), |t| t.contains("unfilled")));
    }

    #[test]
    fn test_no_signal_is_logged() {
        let (mut engine, buffer) = engine_with(
            config(),
            ScriptedOracle::default(),
            StaticMarketData::default(),
        );
        assert_eq!(
            engine.run_cycle(),
            CycleOutcome::NoSignal {
                anomaly_override: false
            }
        );
        drop(engine);

        assert!(buffer.wait_until(Duration::from_secs(5), |t| t.contains("[SIGNAL] none")));
    }

    #[test]
    fn test_run_honours_cycle_limit_and_shutdown() {
        let (mut engine, _) = engine_with(
            config(),
            ScriptedOracle::default(),
            StaticMarketData::default(),
        );
        let stats = engine.run(Some(25));
        assert_eq!(stats.counters.cycles, 25);

        engine.shutdown_handle().store(true, Ordering::Release);
        let stats = engine.run(None);
        assert_eq!(stats.counters.cycles, 25);
    }

    #[test]
    fn test_stats_serialize_flat() {
        let (mut engine, _) = engine_with(
            config(),
            ScriptedOracle::default(),
            StaticMarketData::default(),
        );
        let stats = engine.run(Some(3));

        let json = serde_json::to_value(&stats).unwrap();
        assert_eq!(json["cycles"], 3);
        assert!(json["orders_sent"].is_u64());
        assert_eq!(json["confidence"].as_array().map(Vec::len), Some(6));
    }

    #[test]
    fn test_oracle_feedback_receives_exposure() {
        let oracle = ScriptedOracle {
            regime_confidence: 1.0,
            signal: 0.5,
            ..ScriptedOracle::default()
        };
        let (mut engine, _) = engine_with(config(), oracle, short_market());
        engine.run_cycle();
        let after_first = engine.exposure();
        engine.run_cycle();

        let seen = &engine.oracle().pnl_history;
        assert_eq!(seen.len(), 2);
        assert_eq!(seen[0], 0.0);
        assert_eq!(seen[1], after_first);
    }
}
