//! Property-based tests for the decision path invariants
//!
//! Clamps, cutouts and accounting rules checked across randomized inputs.

use proptest::prelude::*;
use std::sync::Arc;
use tachyon_core::config::constants::{VOLATILITY_CEILING, VOLATILITY_FLOOR};
use tachyon_core::config::EngineConfig;
use tachyon_core::engine::execution::{order_size, plan};
use tachyon_core::engine::{ConfidenceTracker, GarchVolatility};
use tachyon_core::oracle::ExecutionAdvice;
use tachyon_core::ringlog::bounded;
use tachyon_core::venue::{ConnectionConfig, ConnectionPool, Protocol};
use tachyon_core::{Exchange, MarketFeatures};

fn signal_array() -> impl Strategy<Value = [f64; 6]> {
    prop::array::uniform6(-3.0..3.0_f64)
}

fn features_strategy() -> impl Strategy<Value = MarketFeatures> {
    (
        0.0001..5.0_f64,
        -1.0..1.0_f64,
        0.0..1.0_f64,
        0.0..0.1_f64,
        -1.0..1.0_f64,
        0.0..1.0_f64,
        0.0..0.05_f64,
    )
        .prop_map(
            |(volatility, news, liquidity, impact, imbalance, regime, spread)| MarketFeatures {
                volatility,
                news_sentiment: news,
                liquidity_score: liquidity,
                price_impact: impact,
                order_book_imbalance: imbalance,
                regime_confidence: regime,
                bid_ask_spread: spread,
                ..MarketFeatures::default()
            },
        )
}

proptest! {
    /// Property: anomaly above 0.95 zeroes the blend whatever else holds
    #[test]
    fn prop_blend_anomaly_cutout(
        conf in signal_array(),
        signals in signal_array(),
        features in features_strategy(),
        anomaly in 0.9501..1.0_f64,
        oracle_signal in -1.0..1.0_f64,
    ) {
        let tracker = ConfidenceTracker::with_confidence(0.3, 0.05, conf);
        let features = MarketFeatures { anomaly_score: anomaly, ..features };

        let blend = tracker.blend(&signals, &features, oracle_signal);
        prop_assert!(blend.anomaly_override);
        prop_assert_eq!(blend.total_weight, 0.0);
        prop_assert_eq!(blend.weighted_signal, 0.0);
        prop_assert!(blend.signal().is_none());
    }

    /// Property: anomaly above 0.98 cancels execution for any signal
    #[test]
    fn prop_execution_anomaly_cutout(
        signal in -5.0..5.0_f64,
        features in features_strategy(),
        anomaly in 0.9801..1.0_f64,
        exposure in -10_000.0..10_000.0_f64,
    ) {
        let features = MarketFeatures { anomaly_score: anomaly, ..features };
        let planned = plan(signal, &features, &ExecutionAdvice::default(), exposure, 10_000.0, 1_000.0);
        prop_assert!(planned.is_none());
    }

    /// Property: order size always lands in [1, max_order_size]
    #[test]
    fn prop_order_size_clamped(
        signal in -10.0..10.0_f64,
        features in features_strategy(),
        risk_score in 0.0..1.0_f64,
        exposure in -20_000.0..20_000.0_f64,
    ) {
        let advice = ExecutionAdvice { size_adjustment: 0.0, risk_score };
        let size = order_size(signal, &features, &advice, exposure, 10_000.0, 1_000.0);
        prop_assert!((1.0..=1_000.0).contains(&size), "size {} out of range", size);
    }

    /// Property: GARCH volatility stays inside its clamp for any return path
    #[test]
    fn prop_garch_clamped(returns in prop::collection::vec(-100.0..100.0_f64, 1..200)) {
        let mut garch = GarchVolatility::from_config(&EngineConfig::default());
        for r in returns {
            let (prior, vol) = garch.update(r);
            prop_assert!((VOLATILITY_FLOOR..=VOLATILITY_CEILING).contains(&vol));
            prop_assert!(prior <= VOLATILITY_CEILING);
        }
    }

    /// Property: zero signals decay confidence geometrically by (1 − α)
    #[test]
    fn prop_ewma_geometric_decay(
        start in signal_array(),
        alpha in 0.01..1.0_f64,
        steps in 1..40_i32,
    ) {
        let mut tracker = ConfidenceTracker::with_confidence(alpha, 0.05, start);
        for _ in 0..steps {
            tracker.update(&[0.0; 6]);
        }
        let factor = (1.0 - alpha).powi(steps);
        for (c, s) in tracker.confidence().iter().zip(start) {
            prop_assert!((c - s * factor).abs() <= 1e-9 * s.abs().max(1.0));
        }
    }

    /// Property: with nothing draining, pushes beyond capacity are dropped
    /// one for one, and the last slot stays free
    #[test]
    fn prop_ring_drop_accounting(shift in 1u32..9, extra in 0usize..300) {
        let capacity = 1usize << shift;
        let pushed = capacity + extra;
        let (producer, _consumer) = bounded(capacity).unwrap();

        let accepted = (0..pushed)
            .filter(|i| producer.push("ts", format_args!("entry {}", i)))
            .count();

        prop_assert_eq!(accepted, capacity - 1);
        prop_assert_eq!(producer.dropped(), (pushed - capacity + 1) as u64);
    }
}

#[test]
fn test_ring_keeps_order_without_duplicates_after_drops() {
    let (producer, mut consumer) = bounded(16).unwrap();
    for i in 0..40 {
        producer.push("ts", format_args!("{}", i));
    }

    let mut seen = Vec::new();
    while consumer.pending() {
        consumer.drain_batch(4, |line| seen.push(line.trim_end().to_string()));
    }

    let expected: Vec<String> = (0..15).map(|i| format!("ts {}", i)).collect();
    assert_eq!(seen, expected);
    assert_eq!(consumer.dropped(), 25);
}

#[test]
fn test_pool_reuses_healthy_connection() {
    let pool = ConnectionPool::default();
    let config = ConnectionConfig {
        venue: Exchange::Nasdaq,
        protocol: Protocol::Fix,
        low_latency: true,
        port: 8001,
    };

    let first = pool.create(config).unwrap();
    let second = pool.create(config).unwrap();
    assert!(Arc::ptr_eq(&first, &second));

    let stats = pool.stats();
    assert_eq!(stats.constructions, 1);
    assert_eq!(stats.hits, 1);
}
