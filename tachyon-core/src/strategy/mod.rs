//! Signal strategy panel
//!
//! Every strategy is a pure function of the cycle's `MarketFeatures` and
//! returns a signed signal (positive = buy). The panel is a closed enum with
//! a fixed order; the engine's confidence vector is indexed the same way.
//!
//! | # | Strategy              | Fires when                                        |
//! |---|-----------------------|---------------------------------------------------|
//! | 0 | Pair trading          | `|z| > 2`, trades against the spread              |
//! | 1 | Microstructure alpha  | tight spread with strong one-sided book           |
//! | 2 | Order-book imbalance  | impact-adjusted imbalance beyond ±0.3             |
//! | 3 | Momentum ignition     | liquidity-boosted trend beyond ±0.7               |
//! | 4 | Volatility breakout   | volatility jump with reversal, or collapse        |
//! | 5 | Hot pattern           | composite of three market-state conditions        |

use crate::core::{MarketFeatures, StrategyTag};

/// Number of strategies in the panel
pub const PANEL_SIZE: usize = 6;

/// The full panel in evaluation order
pub const PANEL: [Strategy; PANEL_SIZE] = [
    Strategy::PairTrading,
    Strategy::MicrostructureAlpha,
    Strategy::OrderBookImbalance,
    Strategy::MomentumIgnition,
    Strategy::VolatilityBreakout,
    Strategy::HotPattern,
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Strategy {
    PairTrading,
    MicrostructureAlpha,
    OrderBookImbalance,
    MomentumIgnition,
    VolatilityBreakout,
    HotPattern,
}

impl Strategy {
    #[inline]
    pub fn evaluate(self, f: &MarketFeatures) -> f64 {
        match self {
            Strategy::PairTrading => pair_trading(f),
            Strategy::MicrostructureAlpha => microstructure_alpha(f),
            Strategy::OrderBookImbalance => order_book_imbalance(f),
            Strategy::MomentumIgnition => momentum_ignition(f),
            Strategy::VolatilityBreakout => volatility_breakout(f),
            Strategy::HotPattern => hot_pattern(f),
        }
    }

    pub const fn name(self) -> &'static str {
        match self {
            Strategy::PairTrading => "pair_trading",
            Strategy::MicrostructureAlpha => "microstructure_alpha",
            Strategy::OrderBookImbalance => "order_book_imbalance",
            Strategy::MomentumIgnition => "momentum_ignition",
            Strategy::VolatilityBreakout => "volatility_breakout",
            Strategy::HotPattern => "hot_pattern",
        }
    }

    pub const fn tag(self) -> StrategyTag {
        match self {
            Strategy::PairTrading => StrategyTag::PAIR_TRADING,
            Strategy::MicrostructureAlpha => StrategyTag::MICROSTRUCTURE_ALPHA,
            Strategy::OrderBookImbalance => StrategyTag::ORDER_BOOK_IMBALANCE,
            Strategy::MomentumIgnition => StrategyTag::MOMENTUM_IGNITION,
            Strategy::VolatilityBreakout => StrategyTag::VOLATILITY_BREAKOUT,
            Strategy::HotPattern => StrategyTag::HOT_PATTERN,
        }
    }

    /// Whether every non-zero output goes to the decision log
    pub const fn logs_firing(self) -> bool {
        matches!(self, Strategy::HotPattern)
    }
}

/// Mean-reversion on the cointegration z-score
#[inline(always)]
pub fn pair_trading(f: &MarketFeatures) -> f64 {
    if f.cointegration_zscore > 2.0 {
        -1.0
    } else if f.cointegration_zscore < -2.0 {
        1.0
    } else {
        0.0
    }
}

/// Follow a one-sided book while the spread is tight, discounted by impact
#[inline(always)]
pub fn microstructure_alpha(f: &MarketFeatures) -> f64 {
    if f.bid_ask_spread >= 0.02 {
        return 0.0;
    }
    let strength = (-5.0 * f.price_impact).exp();
    if f.order_book_imbalance > 0.5 {
        strength
    } else if f.order_book_imbalance < -0.5 {
        -strength
    } else {
        0.0
    }
}

#[inline(always)]
pub fn order_book_imbalance(f: &MarketFeatures) -> f64 {
    let adjusted = f.order_book_imbalance * (1.0 - 10.0 * f.price_impact);
    if adjusted > 0.3 {
        1.0
    } else if adjusted < -0.3 {
        -1.0
    } else {
        0.0
    }
}

#[inline(always)]
pub fn momentum_ignition(f: &MarketFeatures) -> f64 {
    let combined = f.trend_strength * (1.0 + f.liquidity_score);
    if combined > 0.7 {
        1.0
    } else if combined < -0.7 {
        -1.0
    } else {
        0.0
    }
}

/// Compares this cycle's volatility against the state before the update
#[inline(always)]
pub fn volatility_breakout(f: &MarketFeatures) -> f64 {
    let threshold = 1.5 * f.prior_volatility;
    if f.volatility > threshold && f.short_term_reversal < -0.2 {
        1.0
    } else if f.volatility < 0.3 * threshold && f.short_term_reversal > 0.2 {
        -1.0
    } else {
        0.0
    }
}

/// Tight spread in a volatility jump, contrarian flow and hidden liquidity
/// all at once: fade the spread hard, harder still without a trend
#[inline(always)]
pub fn hot_pattern(f: &MarketFeatures) -> f64 {
    let tight_spread_high_vol =
        f.bid_ask_spread < 0.01 && f.volatility > 1.5 * f.prior_volatility;
    let contra_flow = (f.order_book_imbalance > 0.4 && f.short_term_reversal < -0.3)
        || (f.order_book_imbalance < -0.4 && f.short_term_reversal > 0.3);
    let hidden_liquidity = f.liquidity_score < 0.4 && f.price_impact < 0.02;

    if !(tight_spread_high_vol && contra_flow && hidden_liquidity) {
        return 0.0;
    }

    let signal = if f.cointegration_zscore > 0.0 { -2.0 } else { 2.0 };
    if f.trend_strength.abs() < 0.2 {
        signal * 1.5
    } else {
        signal
    }
}
