//! Order sizing and execution outcomes
//!
//! Size formula, applied in order:
//! 1. base = |signal| · 100
//! 2. × (1 − risk_score) × (1 + tanh(2 · news_sentiment))
//! 3. ÷ (1 + |exposure| / max_exposure)
//! 4. × 0.5 when liquidity_score < 0.3
//! 5. × exp(−5 · price_impact)
//! 6. clamp to [1, max_order_size]; quantity is the integer part

use super::risk::RiskViolation;
use crate::config::constants::{
    BASE_SIZE_PER_SIGNAL, EXECUTION_ANOMALY_CUTOUT, IMPACT_DECAY, LOW_LIQUIDITY,
    SYNTHETIC_REFERENCE_PRICE,
};
use crate::core::{MarketFeatures, Side};
use crate::oracle::ExecutionAdvice;
use serde::Serialize;
use std::fmt;

/// Sized order, before risk checks
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ExecutionPlan {
    pub side: Side,
    pub price: f64,
    pub quantity: i32,
}

/// Unclamped-then-clamped order size for a blended signal
#[inline]
pub fn order_size(
    signal: f64,
    features: &MarketFeatures,
    advice: &ExecutionAdvice,
    exposure: f64,
    max_exposure: f64,
    max_order_size: f64,
) -> f64 {
    let base = signal.abs() * BASE_SIZE_PER_SIGNAL;

    let mut size = base * (1.0 - advice.risk_score);
    size *= 1.0 + (2.0 * features.news_sentiment).tanh();
    size /= 1.0 + exposure.abs() / max_exposure;

    if features.liquidity_score < LOW_LIQUIDITY {
        size *= 0.5;
    }

    size *= (-IMPACT_DECAY * features.price_impact).exp();
    size.clamp(1.0, max_order_size)
}

/// Synthetic quote around the reference price, crossing the spread in the
/// trade direction
#[inline(always)]
pub fn synthetic_price(side: Side, spread: f64) -> f64 {
    SYNTHETIC_REFERENCE_PRICE * (1.0 + side.sign() * spread)
}

/// Size and price an order; `None` when the anomaly cutout cancels it
pub fn plan(
    signal: f64,
    features: &MarketFeatures,
    advice: &ExecutionAdvice,
    exposure: f64,
    max_exposure: f64,
    max_order_size: f64,
) -> Option<ExecutionPlan> {
    let size = order_size(signal, features, advice, exposure, max_exposure, max_order_size);

    if features.anomaly_score > EXECUTION_ANOMALY_CUTOUT {
        return None;
    }

    let side = Side::from_signal(signal);
    Some(ExecutionPlan {
        side,
        price: synthetic_price(side, features.bid_ask_spread),
        // size is clamped to [1, max_order_size], so the cast cannot wrap
        quantity: size as i32,
    })
}

/// How an execution attempt ended
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ExecutionStatus {
    /// Venue accepted the order
    Filled,
    /// Venue refused or could not take the order
    Unfilled,
    /// Stopped by the local limit check
    Suppressed,
    /// Anomaly cutout: nothing sized, nothing sent
    Cancelled,
    /// No connection could be established
    VenueUnavailable,
}

impl ExecutionStatus {
    /// An order reached the venue, accepted or not
    pub fn dispatched(self) -> bool {
        matches!(self, ExecutionStatus::Filled | ExecutionStatus::Unfilled)
    }
}

impl fmt::Display for ExecutionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ExecutionStatus::Filled => "filled",
            ExecutionStatus::Unfilled => "unfilled",
            ExecutionStatus::Suppressed => "suppressed",
            ExecutionStatus::Cancelled => "cancelled",
            ExecutionStatus::VenueUnavailable => "venue unavailable",
        };
        f.write_str(s)
    }
}

/// Result of `smart_execute`: price, quantity, whether it filled
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ExecutionReport {
    pub side: Side,
    pub price: f64,
    pub quantity: i32,
    pub status: ExecutionStatus,
    /// Set once an order was built and handed to a venue
    pub order_id: Option<u64>,
    pub violation: Option<RiskViolation>,
}

impl ExecutionReport {
    pub fn cancelled(side: Side) -> Self {
        Self {
            side,
            price: 0.0,
            quantity: 0,
            status: ExecutionStatus::Cancelled,
            order_id: None,
            violation: None,
        }
    }

    pub fn suppressed(plan: ExecutionPlan, violation: RiskViolation) -> Self {
        Self {
            side: plan.side,
            price: plan.price,
            quantity: plan.quantity,
            status: ExecutionStatus::Suppressed,
            order_id: None,
            violation: Some(violation),
        }
    }

    pub fn dispatched(plan: ExecutionPlan, order_id: u64, accepted: bool) -> Self {
        Self {
            side: plan.side,
            price: plan.price,
            quantity: plan.quantity,
            status: if accepted {
                ExecutionStatus::Filled
            } else {
                ExecutionStatus::Unfilled
            },
            order_id: Some(order_id),
            violation: None,
        }
    }

    pub fn venue_unavailable(plan: ExecutionPlan) -> Self {
        Self {
            side: plan.side,
            price: plan.price,
            quantity: plan.quantity,
            status: ExecutionStatus::VenueUnavailable,
            order_id: None,
            violation: None,
        }
    }

    #[inline(always)]
    pub fn filled(&self) -> bool {
        self.status == ExecutionStatus::Filled
    }
}
