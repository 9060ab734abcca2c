//! Per-cycle feature construction
//!
//! - GARCH(1,1) volatility with a clamped, self-feeding state
//! - Exponentially decayed trend over the last `RETURN_WINDOW` returns
//! - Book, liquidity and reversal observations from the market data source

use crate::config::constants::{
    RETURN_WINDOW, TREND_DECAY, VOLATILITY_CEILING, VOLATILITY_FLOOR,
};
use crate::config::EngineConfig;
use crate::core::MarketFeatures;
use crate::data::MarketDataSource;

/// GARCH(1,1) volatility estimator
///
/// `variance = ω + α·r² + β·σ²_prev`, `σ = sqrt(variance)` clamped to
/// `[VOLATILITY_FLOOR, VOLATILITY_CEILING]`. The clamped value becomes the
/// next cycle's `σ_prev`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GarchVolatility {
    omega: f64,
    alpha: f64,
    beta: f64,
    prev: f64,
}

impl GarchVolatility {
    pub fn new(omega: f64, alpha: f64, beta: f64, initial: f64) -> Self {
        Self {
            omega,
            alpha,
            beta,
            prev: initial,
        }
    }

    pub fn from_config(cfg: &EngineConfig) -> Self {
        Self::new(
            cfg.garch_omega,
            cfg.garch_alpha,
            cfg.garch_beta,
            cfg.initial_volatility,
        )
    }

    /// Fold in one return; yields `(prior, updated)`
    #[inline]
    pub fn update(&mut self, r: f64) -> (f64, f64) {
        let prior = self.prev;
        let variance = self.omega + self.alpha * r * r + self.beta * prior * prior;
        let vol = variance.sqrt().clamp(VOLATILITY_FLOOR, VOLATILITY_CEILING);
        self.prev = vol;
        (prior, vol)
    }

    pub fn current(&self) -> f64 {
        self.prev
    }

    /// Fixed point under zero returns: `sqrt(ω / (1 − β))`
    pub fn zero_return_level(&self) -> f64 {
        (self.omega / (1.0 - self.beta))
            .sqrt()
            .clamp(VOLATILITY_FLOOR, VOLATILITY_CEILING)
    }
}

/// Circular window of the most recent returns
#[derive(Debug, Clone)]
pub struct ReturnWindow {
    buf: [f64; RETURN_WINDOW],
    len: usize,
    next: usize,
}

impl ReturnWindow {
    pub fn new() -> Self {
        Self {
            buf: [0.0; RETURN_WINDOW],
            len: 0,
            next: 0,
        }
    }

    #[inline]
    pub fn push(&mut self, r: f64) {
        self.buf[self.next] = r;
        self.next = (self.next + 1) % RETURN_WINDOW;
        self.len = (self.len + 1).min(RETURN_WINDOW);
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Most recent first
    pub fn iter_recent(&self) -> impl Iterator<Item = f64> + '_ {
        (0..self.len).map(move |k| self.buf[(self.next + RETURN_WINDOW - 1 - k) % RETURN_WINDOW])
    }

    /// Decay-weighted mean, weight `TREND_DECAY^k` for the k-th most recent
    /// return; 0 when empty
    pub fn trend(&self) -> f64 {
        let mut weight = 1.0;
        let mut total_weight = 0.0;
        let mut sum = 0.0;

        for r in self.iter_recent() {
            sum += weight * r;
            total_weight += weight;
            weight *= TREND_DECAY;
        }

        if total_weight > 0.0 {
            sum / total_weight
        } else {
            0.0
        }
    }
}

impl Default for ReturnWindow {
    fn default() -> Self {
        Self::new()
    }
}

/// Builds the non-oracle part of `MarketFeatures`
#[derive(Debug, Clone)]
pub struct FeatureBuilder {
    garch: GarchVolatility,
    window: ReturnWindow,
}

impl FeatureBuilder {
    pub fn new(cfg: &EngineConfig) -> Self {
        Self {
            garch: GarchVolatility::from_config(cfg),
            window: ReturnWindow::new(),
        }
    }

    /// Pull one observation of everything and derive the features
    ///
    /// Non-finite observations are read as zero so the record stays finite.
    pub fn build<M>(&mut self, md: &mut M) -> MarketFeatures
    where
        M: MarketDataSource + ?Sized,
    {
        let r = finite_or_zero(md.latest_return());
        self.window.push(r);

        let (prior_volatility, volatility) = self.garch.update(r);
        let trend_strength = self.window.trend();

        let liquidity_score = finite_or_zero(md.liquidity());
        let book = md.order_book_metrics();

        MarketFeatures {
            volatility,
            prior_volatility,
            trend_strength,
            order_book_imbalance: finite_or_zero(book.imbalance),
            cointegration_zscore: finite_or_zero(md.cointegration_zscore()),
            price_impact: finite_or_zero(md.price_impact(liquidity_score)),
            liquidity_score,
            short_term_reversal: finite_or_zero(md.short_term_reversal()),
            bid_ask_spread: finite_or_zero(book.spread),
            ..MarketFeatures::default()
        }
    }

    pub fn volatility(&self) -> f64 {
        self.garch.current()
    }

    pub fn window(&self) -> &ReturnWindow {
        &self.window
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
