//! Test doubles and builders
//!
//! - `ScriptedOracle`: fixed oracle answers, optional artificial delay
//! - `ScriptedMarketData`: queued returns over static observations
//! - `SharedBuffer`: clonable in-memory log sink
//! - Feature record builders for the reference scenarios

use crate::core::{MarketFeatures, OracleError};
use crate::data::{BookMetrics, MarketDataSource, StaticMarketData};
use crate::oracle::{ExecutionAdvice, ScoringOracle};
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

/// Oracle with fixed answers that records what it was told
#[derive(Debug, Clone, Default)]
pub struct ScriptedOracle {
    pub news_sentiment: f64,
    pub latent_orderbook_state: f64,
    pub regime_confidence: f64,
    pub anomaly_score: f64,
    pub execution_adjustment: f64,
    pub signal: f64,
    pub advice: ExecutionAdvice,
    /// Sleep inside `compute_ai_features`
    pub delay: Option<Duration>,
    /// Reject `load_models`
    pub fail_load: bool,

    /// `pnl` of every `update_model` call, in order
    pub pnl_history: Vec<f64>,
    pub loaded_from: Option<PathBuf>,
}

impl ScoringOracle for ScriptedOracle {
    fn update_model(&mut self, _features: &MarketFeatures, pnl: f64) {
        self.pnl_history.push(pnl);
    }

    fn predict_signal(&mut self, _features: &MarketFeatures) -> f64 {
        self.signal
    }

    fn compute_ai_features(&mut self, features: &mut MarketFeatures) {
        if let Some(delay) = self.delay {
            thread::sleep(delay);
        }
        features.news_sentiment = self.news_sentiment;
        features.latent_orderbook_state = self.latent_orderbook_state;
        features.regime_confidence = self.regime_confidence;
        features.anomaly_score = self.anomaly_score;
        features.execution_adjustment = self.execution_adjustment;
    }

    fn predict_optimal_execution(&mut self, _features: &MarketFeatures) -> ExecutionAdvice {
        self.advice
    }

    fn load_models(&mut self, path: &Path) -> Result<(), OracleError> {
        if self.fail_load {
            return Err(OracleError::ModelLoad {
                path: path.to_path_buf(),
                reason: "scripted failure".to_string(),
            });
        }
        self.loaded_from = Some(path.to_path_buf());
        Ok(())
    }
}

/// Static observations with a queue of returns consumed one per cycle
#[derive(Debug, Clone, Default)]
pub struct ScriptedMarketData {
    pub returns: VecDeque<f64>,
    pub base: StaticMarketData,
}

impl ScriptedMarketData {
    pub fn new(base: StaticMarketData) -> Self {
        Self {
            returns: VecDeque::new(),
            base,
        }
    }

    pub fn with_returns(mut self, returns: impl IntoIterator<Item = f64>) -> Self {
        self.returns.extend(returns);
        self
    }
}

impl MarketDataSource for ScriptedMarketData {
    /// Next queued return, then the static one once the queue is empty
    fn latest_return(&mut self) -> f64 {
        self.returns
            .pop_front()
            .unwrap_or(self.base.latest_return)
    }

    fn order_book_metrics(&mut self) -> BookMetrics {
        self.base.order_book_metrics()
    }

    fn liquidity(&mut self) -> f64 {
        self.base.liquidity()
    }

    fn price_impact(&self, liquidity: f64) -> f64 {
        self.base.price_impact(liquidity)
    }

    fn cointegration_zscore(&mut self) -> f64 {
        self.base.cointegration_zscore()
    }

    fn short_term_reversal(&mut self) -> f64 {
        self.base.short_term_reversal()
    }
}

/// In-memory `Write` sink shared between a test and a drainer thread
#[derive(Debug, Clone, Default)]
pub struct SharedBuffer {
    inner: Arc<Mutex<Vec<u8>>>,
}

impl SharedBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contents(&self) -> String {
        String::from_utf8_lossy(&self.inner.lock()).into_owned()
    }

    pub fn lines(&self) -> Vec<String> {
        self.contents().lines().map(str::to_owned).collect()
    }

    /// Poll until `done` holds for the contents, up to `timeout`
    pub fn wait_until(&self, timeout: Duration, mut done: impl FnMut(&str) -> bool) -> bool {
        let deadline = Instant::now() + timeout;
        loop {
            if done(&self.contents()) {
                return true;
            }
            if Instant::now() >= deadline {
                return false;
            }
            thread::sleep(Duration::from_millis(1));
        }
    }
}

impl Write for SharedBuffer {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.inner.lock().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

/// The reference end-to-end feature record
///
/// Pair trading fires −1 (z = 2.5) and microstructure fires
/// `+exp(−0.05)` (tight spread, imbalance above 0.5).
pub fn reference_features() -> MarketFeatures {
    MarketFeatures {
        volatility: 0.02,
        cointegration_zscore: 2.5,
        bid_ask_spread: 0.01,
        order_book_imbalance: 0.6,
        trend_strength: 0.1,
        liquidity_score: 0.7,
        price_impact: 0.01,
        short_term_reversal: 0.0,
        ..MarketFeatures::default()
    }
}

/// Features that trip every condition of the hot pattern
pub fn hot_pattern_features() -> MarketFeatures {
    MarketFeatures {
        volatility: 0.03,
        prior_volatility: 0.01,
        bid_ask_spread: 0.005,
        order_book_imbalance: 0.5,
        short_term_reversal: -0.4,
        liquidity_score: 0.3,
        price_impact: 0.01,
        cointegration_zscore: 1.0,
        trend_strength: 0.05,
        ..MarketFeatures::default()
    }
}

/// Calm market: nothing in the panel fires
pub fn quiet_features() -> MarketFeatures {
    MarketFeatures {
        volatility: 0.01,
        prior_volatility: 0.01,
        bid_ask_spread: 0.01,
        liquidity_score: 0.7,
        price_impact: 0.0125,
        ..MarketFeatures::default()
    }
}
