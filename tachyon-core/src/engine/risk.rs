//! Exposure accounting and pre-send limit checks
//!
//! Exposure is the signed notional of everything filled so far (buys add,
//! sells subtract). It only moves on a confirmed fill. Checks are inline and
//! allocation-free.

use crate::config::constants::{BASE_SIZE_PER_SIGNAL, NOTIONAL_PER_VOL_UNIT};
use crate::config::EngineConfig;
use crate::core::Side;
use std::fmt;

/// Why an order was stopped before reaching the venue
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum RiskViolation {
    /// `|exposure| + notional` would exceed `max_exposure`
    ExposureLimit = 0,
    /// Order notional above `vol_limit · 10_000`
    NotionalLimit = 1,
}

impl fmt::Display for RiskViolation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RiskViolation::ExposureLimit => write!(f, "exposure limit"),
            RiskViolation::NotionalLimit => write!(f, "notional limit"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ExposureTracker {
    exposure: f64,
    max_exposure: f64,
    vol_limit: f64,
}

impl ExposureTracker {
    pub fn new(max_exposure: f64, vol_limit: f64) -> Self {
        Self {
            exposure: 0.0,
            max_exposure,
            vol_limit,
        }
    }

    pub fn from_config(cfg: &EngineConfig) -> Self {
        Self::new(cfg.max_exposure, cfg.vol_limit)
    }

    #[inline(always)]
    pub fn exposure(&self) -> f64 {
        self.exposure
    }

    #[inline(always)]
    pub fn max_exposure(&self) -> f64 {
        self.max_exposure
    }

    /// Gate before sizing: the signal alone must fit under the exposure cap
    #[inline(always)]
    pub fn admits_signal(&self, signal: f64) -> bool {
        self.exposure.abs() + signal.abs() * BASE_SIZE_PER_SIGNAL <= self.max_exposure
    }

    /// Local limit check on a sized order
    #[inline(always)]
    pub fn check(&self, price: f64, quantity: i32) -> Result<(), RiskViolation> {
        let notional = price * quantity as f64;

        if self.exposure.abs() + notional > self.max_exposure {
            return Err(RiskViolation::ExposureLimit);
        }
        if notional > self.vol_limit * NOTIONAL_PER_VOL_UNIT {
            return Err(RiskViolation::NotionalLimit);
        }
        Ok(())
    }

    #[inline(always)]
    pub fn limit_check(&self, price: f64, quantity: i32) -> bool {
        self.check(price, quantity).is_ok()
    }

    /// Book a confirmed fill
    #[inline(always)]
    pub fn apply_fill(&mut self, side: Side, price: f64, quantity: i32) {
        self.exposure += side.sign() * price * quantity as f64;
    }
}
