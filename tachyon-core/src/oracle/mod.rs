//! Scoring oracle interface
//!
//! The predictive model suite lives outside this crate. The engine talks to
//! it through `ScoringOracle` and treats every answer as advisory: late or
//! non-finite outputs are replaced by neutral zeros before they can reach
//! blending or sizing.

use crate::core::{MarketFeatures, OracleError};
use std::path::Path;
use std::time::{Duration, Instant};

/// Execution advice: `(size adjustment, risk score)`
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct ExecutionAdvice {
    pub size_adjustment: f64,
    /// Fraction of the base size withheld, 0 = no reduction
    pub risk_score: f64,
}

pub trait ScoringOracle {
    /// Feedback after features are built; `pnl` is the current net exposure
    fn update_model(&mut self, features: &MarketFeatures, pnl: f64);

    fn predict_signal(&mut self, features: &MarketFeatures) -> f64;

    /// Fill the oracle-derived fields of `features`
    fn compute_ai_features(&mut self, features: &mut MarketFeatures);

    fn predict_optimal_execution(&mut self, features: &MarketFeatures) -> ExecutionAdvice;

    fn load_models(&mut self, path: &Path) -> Result<(), OracleError>;
}

/// Oracle that knows nothing: every answer is zero
#[derive(Debug, Clone, Copy, Default)]
pub struct NeutralOracle;

impl ScoringOracle for NeutralOracle {
    fn update_model(&mut self, _features: &MarketFeatures, _pnl: f64) {}

    fn predict_signal(&mut self, _features: &MarketFeatures) -> f64 {
        0.0
    }

    fn compute_ai_features(&mut self, features: &mut MarketFeatures) {
        features.neutralize_oracle_fields();
    }

    fn predict_optimal_execution(&mut self, _features: &MarketFeatures) -> ExecutionAdvice {
        ExecutionAdvice::default()
    }

    fn load_models(&mut self, path: &Path) -> Result<(), OracleError> {
        tracing::debug!(path = %path.display(), "Neutral oracle has no models to load");
        Ok(())
    }
}

/// Result of one guarded enrichment call
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Enrichment {
    Applied,
    /// Call took longer than the budget; fields neutralized
    OverBudget(Duration),
    /// Oracle produced NaN or infinity; fields neutralized
    NonFinite,
}

impl Enrichment {
    pub fn is_applied(&self) -> bool {
        matches!(self, Enrichment::Applied)
    }
}

/// Run `compute_ai_features` under a latency budget
pub fn enrich<O>(oracle: &mut O, features: &mut MarketFeatures, budget: Duration) -> Enrichment
where
    O: ScoringOracle + ?Sized,
{
    let start = Instant::now();
    oracle.compute_ai_features(features);
    let elapsed = start.elapsed();

    if elapsed > budget {
        features.neutralize_oracle_fields();
        Enrichment::OverBudget(elapsed)
    } else if !features.oracle_fields_finite() {
        features.neutralize_oracle_fields();
        Enrichment::NonFinite
    } else {
        Enrichment::Applied
    }
}

/// Oracle signal, zero when non-finite
pub fn guarded_signal<O>(oracle: &mut O, features: &MarketFeatures) -> f64
where
    O: ScoringOracle + ?Sized,
{
    finite_or_zero(oracle.predict_signal(features))
}

/// Execution advice with non-finite parts zeroed
pub fn guarded_execution<O>(oracle: &mut O, features: &MarketFeatures) -> ExecutionAdvice
where
    O: ScoringOracle + ?Sized,
{
    let advice = oracle.predict_optimal_execution(features);
    ExecutionAdvice {
        size_adjustment: finite_or_zero(advice.size_adjustment),
        risk_score: finite_or_zero(advice.risk_score),
    }
}

#[inline(always)]
fn finite_or_zero(v: f64) -> f64 {
    if v.is_finite() {
        v
    } else {
        0.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::ScriptedOracle;

    #[test]
    fn test_neutral_oracle_zeroes_fields() {
        let mut oracle = NeutralOracle;
        let mut features = MarketFeatures {
            anomaly_score: 0.5,
            volatility: 0.02,
            ..Default::default()
        };

        let outcome = enrich(&mut oracle, &mut features, Duration::from_micros(50));
        assert!(outcome.is_applied());
        assert_eq!(features.anomaly_score, 0.0);
        assert_eq!(features.volatility, 0.02);
        assert_eq!(guarded_signal(&mut oracle, &features), 0.0);
        assert_eq!(
            guarded_execution(&mut oracle, &features),
            ExecutionAdvice::default()
        );
        assert!(oracle.load_models(Path::new("/models")).is_ok());
    }

    #[test]
    fn test_non_finite_fields_are_neutralized() {
        let mut oracle = ScriptedOracle {
            news_sentiment: f64::NAN,
            regime_confidence: 0.8,
            ..Default::default()
        };
        let mut features = MarketFeatures::default();

        let outcome = enrich(&mut oracle, &mut features, Duration::from_secs(1));
        assert_eq!(outcome, Enrichment::NonFinite);
        assert_eq!(features.regime_confidence, 0.0);
        assert!(features.oracle_fields_finite());
    }

    #[test]
    fn test_slow_oracle_is_neutralized() {
        let mut oracle = ScriptedOracle {
            regime_confidence: 0.8,
            delay: Some(Duration::from_millis(2)),
            ..Default::default()
        };
        let mut features = MarketFeatures::default();

        let outcome = enrich(&mut oracle, &mut features, Duration::from_micros(50));
        assert!(matches!(outcome, Enrichment::OverBudget(_)));
        assert_eq!(features.regime_confidence, 0.0);
    }

    #[test]
    fn test_guarded_outputs() {
        let mut oracle = ScriptedOracle {
            signal: f64::INFINITY,
            advice: ExecutionAdvice {
                size_adjustment: 0.2,
                risk_score: f64::NAN,
            },
            ..Default::default()
        };
        let features = MarketFeatures::default();

        assert_eq!(guarded_signal(&mut oracle, &features), 0.0);
        let advice = guarded_execution(&mut oracle, &features);
        assert_eq!(advice.size_adjustment, 0.2);
        assert_eq!(advice.risk_score, 0.0);
    }
}
