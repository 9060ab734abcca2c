//! Per-cycle market feature record
//!
//! Built fresh every decision cycle by the feature builder, enriched once by
//! the scoring oracle, then frozen and shared by reference with every
//! strategy. A zeroed record is valid input everywhere (oracle unavailable).

/// Market features for one decision cycle
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct MarketFeatures {
    /// GARCH(1,1) volatility after this cycle's update, clamped
    pub volatility: f64,
    /// GARCH volatility state before this cycle's update
    pub prior_volatility: f64,
    pub trend_strength: f64,
    pub order_book_imbalance: f64,
    pub cointegration_zscore: f64,
    pub price_impact: f64,
    pub liquidity_score: f64,
    pub short_term_reversal: f64,
    pub bid_ask_spread: f64,

    // Oracle-derived fields, neutral (zero) when the oracle is unavailable
    pub news_sentiment: f64,
    pub latent_orderbook_state: f64,
    pub regime_confidence: f64,
    pub anomaly_score: f64,
    pub execution_adjustment: f64,
}

impl MarketFeatures {
    /// True when every field is a finite real number
    pub fn is_finite(&self) -> bool {
        self.as_array().iter().all(|v| v.is_finite())
    }

    /// True when every oracle-derived field is finite
    pub fn oracle_fields_finite(&self) -> bool {
        [
            self.news_sentiment,
            self.latent_orderbook_state,
            self.regime_confidence,
            self.anomaly_score,
            self.execution_adjustment,
        ]
        .iter()
        .all(|v| v.is_finite())
    }

    /// Reset the oracle-derived fields to their neutral value
    pub fn neutralize_oracle_fields(&mut self) {
        self.news_sentiment = 0.0;
        self.latent_orderbook_state = 0.0;
        self.regime_confidence = 0.0;
        self.anomaly_score = 0.0;
        self.execution_adjustment = 0.0;
    }

    fn as_array(&self) -> [f64; 14] {
        [
            self.volatility,
            self.prior_volatility,
            self.trend_strength,
            self.order_book_imbalance,
            self.cointegration_zscore,
            self.price_impact,
            self.liquidity_score,
            self.short_term_reversal,
            self.bid_ask_spread,
            self.news_sentiment,
            self.latent_orderbook_state,
            self.regime_confidence,
            self.anomaly_score,
            self.execution_adjustment,
        ]
    }
}
