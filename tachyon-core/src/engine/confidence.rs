//! Strategy confidence tracking and signal blending
//!
//! Confidence is an EWMA of a P&L proxy (`signal · PNL_PROXY_SCALE`), one
//! lane per panel strategy. Both the update and the masked sums of blending
//! run four lanes at a time with AVX2 when the CPU has it, finishing the tail
//! in scalar code; otherwise they are plain scalar.

use crate::config::constants::{
    BLEND_ANOMALY_CUTOUT, CONFIDENCE_THRESHOLD_FLOOR, CONFIDENCE_THRESHOLD_VOL_SCALE,
    ORACLE_WEIGHT_SCALE, PNL_PROXY_SCALE,
};
use crate::core::MarketFeatures;
use crate::strategy::PANEL_SIZE;

/// Per-strategy EWMA confidence
#[derive(Debug, Clone, PartialEq)]
pub struct ConfidenceTracker {
    alpha: f64,
    min_weight: f64,
    conf: [f64; PANEL_SIZE],
}

impl ConfidenceTracker {
    pub fn new(alpha: f64, min_weight: f64) -> Self {
        Self {
            alpha,
            min_weight,
            conf: [0.0; PANEL_SIZE],
        }
    }

    /// Start from an explicit confidence vector
    pub fn with_confidence(alpha: f64, min_weight: f64, conf: [f64; PANEL_SIZE]) -> Self {
        Self {
            alpha,
            min_weight,
            conf,
        }
    }

    pub fn confidence(&self) -> &[f64; PANEL_SIZE] {
        &self.conf
    }

    /// `conf[i] = α·(signal[i]·0.1) + (1 − α)·conf[i]`
    #[inline]
    pub fn update(&mut self, signals: &[f64; PANEL_SIZE]) {
        #[cfg(target_arch = "x86_64")]
        {
            if std::is_x86_feature_detected!("avx2") {
                // SAFETY: AVX2 support was just verified at runtime
                unsafe { ewma_avx2(&mut self.conf, signals, self.alpha) };
                return;
            }
        }
        ewma_scalar(&mut self.conf, signals, self.alpha);
    }

    /// Blend panel signals and the oracle signal into one weighted sum
    ///
    /// A strategy takes part only when its confidence exceeds `min_weight`
    /// and its signal magnitude exceeds the volatility-scaled threshold. The
    /// oracle is always folded in with weight `regime_confidence · 0.3`.
    pub fn blend(
        &self,
        signals: &[f64; PANEL_SIZE],
        features: &MarketFeatures,
        oracle_signal: f64,
    ) -> BlendResult {
        let threshold = confidence_threshold(features.volatility);
        let MaskedSums {
            mut total_weight,
            mut weighted_signal,
            contributors,
        } = masked_sums(&self.conf, signals, self.min_weight, threshold);

        let oracle_weight = features.regime_confidence * ORACLE_WEIGHT_SCALE;
        total_weight += oracle_weight;
        weighted_signal += oracle_weight * oracle_signal;

        if features.anomaly_score > BLEND_ANOMALY_CUTOUT {
            return BlendResult {
                total_weight: 0.0,
                weighted_signal: 0.0,
                contributors: 0,
                anomaly_override: true,
            };
        }

        BlendResult {
            total_weight,
            weighted_signal,
            contributors,
            anomaly_override: false,
        }
    }
}

/// `max(0.05, 0.1 · volatility)`
#[inline(always)]
pub fn confidence_threshold(volatility: f64) -> f64 {
    CONFIDENCE_THRESHOLD_FLOOR.max(CONFIDENCE_THRESHOLD_VOL_SCALE * volatility)
}

/// Outcome of blending
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BlendResult {
    pub total_weight: f64,
    /// Σ weight·signal, not yet normalized
    pub weighted_signal: f64,
    /// Bit i set when panel strategy i was included
    pub contributors: u8,
    /// The anomaly cutout zeroed the result
    pub anomaly_override: bool,
}

impl BlendResult {
    /// Normalized signal, `None` when nothing carries weight
    #[inline]
    pub fn signal(&self) -> Option<f64> {
        if self.total_weight > 0.0 {
            Some(self.weighted_signal / self.total_weight)
        } else {
            None
        }
    }
}

/// Confidence-weighted sums over the lanes that pass both gates
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct MaskedSums {
    pub total_weight: f64,
    pub weighted_signal: f64,
    /// Bit i set when lane i passed (first 8 lanes)
    pub contributors: u8,
}

#[inline]
fn masked_sums(conf: &[f64], signals: &[f64], min_weight: f64, threshold: f64) -> MaskedSums {
    #[cfg(target_arch = "x86_64")]
    {
        if std::is_x86_feature_detected!("avx2") {
            // SAFETY: AVX2 support was just verified at runtime
            return unsafe { masked_sums_avx2(conf, signals, min_weight, threshold) };
        }
    }
    masked_sums_scalar(conf, signals, min_weight, threshold)
}

/// `bits` moved up to lane `first`; lanes past the eighth are not recorded
#[inline(always)]
fn lane_bits(bits: u8, first: usize) -> u8 {
    u32::try_from(first)
        .ok()
        .and_then(|shift| bits.checked_shl(shift))
        .unwrap_or(0)
}

/// Scalar masked sums: lane i counts when `conf > min_weight` and
/// `|signal| > threshold`
pub fn masked_sums_scalar(
    conf: &[f64],
    signals: &[f64],
    min_weight: f64,
    threshold: f64,
) -> MaskedSums {
    let mut sums = MaskedSums::default();
    for (i, (&c, &s)) in conf.iter().zip(signals).enumerate() {
        if c > min_weight && s.abs() > threshold {
            sums.total_weight += c;
            sums.weighted_signal += c * s;
            sums.contributors |= lane_bits(1, i);
        }
    }
    sums
}

/// Four-lane AVX2 masked sums with scalar tail
///
/// # Safety
/// The caller must ensure the CPU supports AVX2.
#[cfg(target_arch = "x86_64")]
#[target_feature(enable = "avx2")]
pub unsafe fn masked_sums_avx2(
    conf: &[f64],
    signals: &[f64],
    min_weight: f64,
    threshold: f64,
) -> MaskedSums {
    use std::arch::x86_64::{
        _mm256_add_pd, _mm256_and_pd, _mm256_andnot_pd, _mm256_cmp_pd, _mm256_loadu_pd,
        _mm256_movemask_pd, _mm256_mul_pd, _mm256_set1_pd, _mm256_setzero_pd, _mm256_storeu_pd,
        _CMP_GT_OQ,
    };

    let n = conf.len().min(signals.len());
    let lanes = n / 4 * 4;

    let min_weight_v = _mm256_set1_pd(min_weight);
    let threshold_v = _mm256_set1_pd(threshold);
    let sign_bit = _mm256_set1_pd(-0.0);

    let mut weight_acc = _mm256_setzero_pd();
    let mut signal_acc = _mm256_setzero_pd();
    let mut contributors = 0u8;

    let mut i = 0;
    while i < lanes {
        // SAFETY: i + 4 <= lanes <= n, so both 4-wide loads are in bounds
        let c = _mm256_loadu_pd(conf.as_ptr().add(i));
        let s = _mm256_loadu_pd(signals.as_ptr().add(i));

        let abs_s = _mm256_andnot_pd(sign_bit, s);
        let mask = _mm256_and_pd(
            _mm256_cmp_pd(c, min_weight_v, _CMP_GT_OQ),
            _mm256_cmp_pd(abs_s, threshold_v, _CMP_GT_OQ),
        );
        // Mask after multiplying so a NaN in a rejected lane cannot leak in
        let weight = _mm256_and_pd(mask, c);
        let product = _mm256_and_pd(mask, _mm256_mul_pd(c, s));

        weight_acc = _mm256_add_pd(weight_acc, weight);
        signal_acc = _mm256_add_pd(signal_acc, product);
        contributors |= lane_bits(_mm256_movemask_pd(mask) as u8, i);
        i += 4;
    }

    let mut weights = [0.0f64; 4];
    let mut products = [0.0f64; 4];
    _mm256_storeu_pd(weights.as_mut_ptr(), weight_acc);
    _mm256_storeu_pd(products.as_mut_ptr(), signal_acc);

    let tail = masked_sums_scalar(&conf[lanes..n], &signals[lanes..n], min_weight, threshold);
    MaskedSums {
        total_weight: weights.iter().sum::<f64>() + tail.total_weight,
        weighted_signal: products.iter().sum::<f64>() + tail.weighted_signal,
        contributors: contributors | lane_bits(tail.contributors, lanes),
    }
}

/// Scalar EWMA update
#[inline]
pub fn ewma_scalar(conf: &mut [f64], signals: &[f64], alpha: f64) {
    for (c, &s) in conf.iter_mut().zip(signals) {
        *c = alpha * (s * PNL_PROXY_SCALE) + (1.0 - alpha) * *c;
    }
}

/// Four-lane AVX2 EWMA update with scalar tail
///
/// # Safety
/// The caller must ensure the CPU supports AVX2.
#[cfg(target_arch = "x86_64")]
#[target_feature(enable = "avx2")]
pub unsafe fn ewma_avx2(conf: &mut [f64], signals: &[f64], alpha: f64) {
    use std::arch::x86_64::{
        _mm256_add_pd, _mm256_loadu_pd, _mm256_mul_pd, _mm256_set1_pd, _mm256_storeu_pd,
    };

    let n = conf.len().min(signals.len());
    let lanes = n / 4 * 4;

    let alpha_v = _mm256_set1_pd(alpha);
    let keep_v = _mm256_set1_pd(1.0 - alpha);
    let scale_v = _mm256_set1_pd(PNL_PROXY_SCALE);

    let mut i = 0;
    while i < lanes {
        // SAFETY: i + 4 <= lanes <= n, so both 4-wide loads/stores are in bounds
        let s = _mm256_loadu_pd(signals.as_ptr().add(i));
        let c = _mm256_loadu_pd(conf.as_ptr().add(i));
        let pnl = _mm256_mul_pd(s, scale_v);
        let next = _mm256_add_pd(_mm256_mul_pd(alpha_v, pnl), _mm256_mul_pd(keep_v, c));
        _mm256_storeu_pd(conf.as_mut_ptr().add(i), next);
        i += 4;
    }

    ewma_scalar(&mut conf[lanes..n], &signals[lanes..n], alpha);
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    const ALPHA: f64 = 0.3;
    const MIN_WEIGHT: f64 = 0.05;

    #[test]
    fn test_ewma_single_step() {
        let mut tracker = ConfidenceTracker::new(ALPHA, MIN_WEIGHT);
        tracker.update(&[1.0, -1.0, 0.0, 2.0, 0.5, -3.0]);

        let expected = [0.03, -0.03, 0.0, 0.06, 0.015, -0.09];
        for (c, e) in tracker.confidence().iter().zip(expected) {
            assert_relative_eq!(*c, e, epsilon = 1e-15);
        }
    }

    #[test]
    fn test_ewma_geometric_decay_under_zero_signals() {
        let start = [0.8, -0.4, 0.2, 0.1, 0.6, 1.0];
        let mut tracker = ConfidenceTracker::with_confidence(ALPHA, MIN_WEIGHT, start);

        for k in 1..=10 {
            tracker.update(&[0.0; PANEL_SIZE]);
            let factor = (1.0 - ALPHA).powi(k);
            for (c, s) in tracker.confidence().iter().zip(start) {
                assert_relative_eq!(*c, s * factor, epsilon = 1e-12);
            }
        }
    }

    #[cfg(target_arch = "x86_64")]
    #[test]
    fn test_avx2_matches_scalar() {
        if !std::is_x86_feature_detected!("avx2") {
            return;
        }
        let signals = [0.7, -1.3, 2.0, 0.0, -0.25, 1.5, 0.9];
        let mut scalar = [0.1, 0.2, -0.3, 0.4, 0.5, -0.6, 0.05];
        let mut lanes = scalar;

        for _ in 0..25 {
            ewma_scalar(&mut scalar, &signals, ALPHA);
            // SAFETY: guarded by the feature check above
            unsafe { ewma_avx2(&mut lanes, &signals, ALPHA) };
        }
        for (a, b) in scalar.iter().zip(lanes.iter()) {
            assert_relative_eq!(*a, *b, epsilon = 1e-15);
        }
    }

    #[cfg(target_arch = "x86_64")]
    #[test]
    fn test_avx2_masked_sums_match_scalar() {
        if !std::is_x86_feature_detected!("avx2") {
            return;
        }
        // Mixed lanes: passing, low confidence, small signal, NaN signal
        let conf = [0.2, 0.01, 0.3, 0.1, -0.4, 0.25, 0.6];
        let signals = [1.0, 1.0, -0.5, 0.04, 2.0, f64::NAN, -1.5];

        let scalar = masked_sums_scalar(&conf, &signals, MIN_WEIGHT, 0.05);
        // SAFETY: guarded by the feature check above
        let lanes = unsafe { masked_sums_avx2(&conf, &signals, MIN_WEIGHT, 0.05) };

        assert_eq!(scalar.contributors, 0b100_0101);
        assert_eq!(lanes.contributors, scalar.contributors);
        assert_relative_eq!(lanes.total_weight, scalar.total_weight, epsilon = 1e-15);
        assert_relative_eq!(lanes.weighted_signal, scalar.weighted_signal, epsilon = 1e-15);
        assert_relative_eq!(scalar.total_weight, 1.1, epsilon = 1e-12);
        assert!(lanes.weighted_signal.is_finite());
    }

    #[test]
    fn test_masked_sums_scalar_gates() {
        let sums = masked_sums_scalar(&[0.5, 0.5, 0.04], &[0.06, -0.05, 1.0], 0.05, 0.05);
        // Lane 1 sits exactly on the threshold, lane 2 below min_weight
        assert_eq!(sums.contributors, 0b001);
        assert_relative_eq!(sums.total_weight, 0.5, epsilon = 1e-15);
        assert_relative_eq!(sums.weighted_signal, 0.03, epsilon = 1e-15);
    }

    #[test]
    fn test_confidence_threshold() {
        assert_eq!(confidence_threshold(0.01), 0.05);
        assert_relative_eq!(confidence_threshold(2.0), 0.2, epsilon = 1e-15);
    }

    #[test]
    fn test_blend_filters_by_confidence_and_magnitude() {
        let conf = [0.2, 0.01, 0.3, 0.1, 0.0, 0.0];
        let tracker = ConfidenceTracker::with_confidence(ALPHA, MIN_WEIGHT, conf);
        let signals = [1.0, 1.0, -0.5, 0.04, 0.0, 0.0];
        let features = MarketFeatures {
            volatility: 0.01,
            ..Default::default()
        };

        let blend = tracker.blend(&signals, &features, 0.0);
        // strategy 1: low confidence; strategy 3: below threshold
        assert_eq!(blend.contributors, 0b101);
        assert_relative_eq!(blend.total_weight, 0.5, epsilon = 1e-15);
        assert_relative_eq!(blend.weighted_signal, 0.2 - 0.15, epsilon = 1e-15);
        assert_relative_eq!(blend.signal().unwrap(), 0.1, epsilon = 1e-12);
    }

    #[test]
    fn test_blend_folds_in_oracle() {
        let tracker = ConfidenceTracker::new(ALPHA, MIN_WEIGHT);
        let features = MarketFeatures {
            regime_confidence: 0.5,
            ..Default::default()
        };

        let blend = tracker.blend(&[0.0; PANEL_SIZE], &features, 0.8);
        assert_relative_eq!(blend.total_weight, 0.15, epsilon = 1e-15);
        assert_relative_eq!(blend.signal().unwrap(), 0.8, epsilon = 1e-12);
    }

    #[test]
    fn test_blend_anomaly_cutout() {
        let tracker = ConfidenceTracker::with_confidence(ALPHA, MIN_WEIGHT, [0.5; PANEL_SIZE]);
        let features = MarketFeatures {
            anomaly_score: 0.96,
            regime_confidence: 1.0,
            ..Default::default()
        };

        let blend = tracker.blend(&[1.0; PANEL_SIZE], &features, 1.0);
        assert!(blend.anomaly_override);
        assert_eq!(blend.total_weight, 0.0);
        assert_eq!(blend.weighted_signal, 0.0);
        assert_eq!(blend.signal(), None);
    }

    #[test]
    fn test_no_weight_means_no_trade() {
        let tracker = ConfidenceTracker::new(ALPHA, MIN_WEIGHT);
        let blend = tracker.blend(&[1.0; PANEL_SIZE], &MarketFeatures::default(), 1.0);
        assert_eq!(blend.signal(), None);
    }
}
