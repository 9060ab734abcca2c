//! Market data sources feeding the feature builder
//!
//! The engine pulls one observation of each quantity per cycle. Two sources
//! ship with the crate:
//! - `StaticMarketData`: fixed stand-in values, deterministic
//! - `SyntheticMarketData`: seeded random walk with mean-reverting book state

use rand::rngs::StdRng;
use rand::SeedableRng;
use rand_distr::{Distribution, StandardNormal};

/// Top-of-book summary
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BookMetrics {
    /// Relative bid/ask spread
    pub spread: f64,
    /// Order-book imbalance in [-1, 1], positive when bids dominate
    pub imbalance: f64,
}

/// Per-cycle market observations
pub trait MarketDataSource {
    /// Most recent log return of the traded instrument
    fn latest_return(&mut self) -> f64;

    fn order_book_metrics(&mut self) -> BookMetrics;

    /// Liquidity score, roughly in [0, 1]
    fn liquidity(&mut self) -> f64;

    /// Expected price impact at the given liquidity
    fn price_impact(&self, liquidity: f64) -> f64 {
        0.01 / (liquidity + 0.1)
    }

    fn cointegration_zscore(&mut self) -> f64;

    fn short_term_reversal(&mut self) -> f64;
}

/// Constant observations
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StaticMarketData {
    pub latest_return: f64,
    pub spread: f64,
    pub imbalance: f64,
    pub liquidity: f64,
    pub cointegration_zscore: f64,
    pub short_term_reversal: f64,
}

impl Default for StaticMarketData {
    fn default() -> Self {
        Self {
            latest_return: 0.001,
            spread: 0.01,
            imbalance: 0.2,
            liquidity: 0.7,
            cointegration_zscore: -1.5,
            short_term_reversal: -0.3,
        }
    }
}

impl MarketDataSource for StaticMarketData {
    fn latest_return(&mut self) -> f64 {
        self.latest_return
    }

    fn order_book_metrics(&mut self) -> BookMetrics {
        BookMetrics {
            spread: self.spread,
            imbalance: self.imbalance,
        }
    }

    fn liquidity(&mut self) -> f64 {
        self.liquidity
    }

    fn cointegration_zscore(&mut self) -> f64 {
        self.cointegration_zscore
    }

    fn short_term_reversal(&mut self) -> f64 {
        self.short_term_reversal
    }
}

/// Shape of the synthetic market
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SyntheticParams {
    /// Standard deviation of per-cycle returns
    pub return_vol: f64,
    /// Baseline relative spread
    pub base_spread: f64,
    /// AR(1) persistence of imbalance, liquidity and z-score
    pub persistence: f64,
    /// Long-run liquidity score
    pub mean_liquidity: f64,
}

impl Default for SyntheticParams {
    fn default() -> Self {
        Self {
            return_vol: 0.001,
            base_spread: 0.01,
            persistence: 0.9,
            mean_liquidity: 0.7,
        }
    }
}

/// Seeded random-walk market
pub struct SyntheticMarketData {
    rng: StdRng,
    params: SyntheticParams,
    price: f64,
    last_return: f64,
    imbalance: f64,
    liquidity: f64,
    zscore: f64,
}

impl SyntheticMarketData {
    pub fn new(seed: u64) -> Self {
        Self::with_params(seed, SyntheticParams::default())
    }

    pub fn with_params(seed: u64, params: SyntheticParams) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
            params,
            price: 100.0,
            last_return: 0.0,
            imbalance: 0.0,
            liquidity: params.mean_liquidity,
            zscore: 0.0,
        }
    }

    /// Price implied by the returns drawn so far
    pub fn price(&self) -> f64 {
        self.price
    }

    fn noise(&mut self) -> f64 {
        StandardNormal.sample(&mut self.rng)
    }
}

impl MarketDataSource for SyntheticMarketData {
    fn latest_return(&mut self) -> f64 {
        let r = self.params.return_vol * self.noise();
        self.last_return = r;
        self.price *= r.exp();
        r
    }

    fn order_book_metrics(&mut self) -> BookMetrics {
        let phi = self.params.persistence;
        let shock = self.noise();
        self.imbalance = (phi * self.imbalance + (1.0 - phi) * shock).clamp(-1.0, 1.0);

        let widen = self.noise().abs();
        BookMetrics {
            spread: self.params.base_spread * (1.0 + 0.5 * widen),
            imbalance: self.imbalance,
        }
    }

    fn liquidity(&mut self) -> f64 {
        let phi = self.params.persistence;
        let target = self.params.mean_liquidity + 0.2 * self.noise();
        self.liquidity = (phi * self.liquidity + (1.0 - phi) * target).clamp(0.05, 1.0);
        self.liquidity
    }

    fn cointegration_zscore(&mut self) -> f64 {
        let phi = self.params.persistence;
        let shock = self.noise();
        self.zscore = phi * self.zscore + shock * (1.0 - phi * phi).sqrt();
        self.zscore
    }

    fn short_term_reversal(&mut self) -> f64 {
        // Fade the last move, scaled to the return volatility
        let scaled = self.last_return / self.params.return_vol;
        (-0.5 * scaled).clamp(-1.0, 1.0)
    }
}
