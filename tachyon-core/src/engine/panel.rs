//! Concurrent panel evaluation
//!
//! Strategy 0 runs on a scoped thread while the rest run in order on the
//! calling thread; the scoped result is joined last. Any strategy that
//! panics or returns a non-finite value contributes 0 and is reported.

use crate::core::MarketFeatures;
use crate::resilience::payload_message;
use crate::strategy::{PANEL, PANEL_SIZE};
use std::fmt;
use std::panic::{self, AssertUnwindSafe};

/// Why a strategy's output was discarded
#[derive(Debug, Clone, PartialEq)]
pub enum StrategyFault {
    Panicked(String),
    NonFinite(f64),
}

impl fmt::Display for StrategyFault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StrategyFault::Panicked(msg) => write!(f, "panicked: {}", msg),
            StrategyFault::NonFinite(v) => write!(f, "non-finite output {}", v),
        }
    }
}

/// Signals of one panel pass, faults already zeroed
#[derive(Debug, Clone, PartialEq)]
pub struct PanelOutput {
    pub signals: [f64; PANEL_SIZE],
    pub faults: [Option<StrategyFault>; PANEL_SIZE],
}

impl PanelOutput {
    pub fn fault_count(&self) -> usize {
        self.faults.iter().filter(|f| f.is_some()).count()
    }

    /// `(index, fault)` for every discarded output
    pub fn faults(&self) -> impl Iterator<Item = (usize, &StrategyFault)> {
        self.faults
            .iter()
            .enumerate()
            .filter_map(|(i, f)| f.as_ref().map(|f| (i, f)))
    }
}

/// Evaluate the fixed strategy panel
pub fn evaluate_panel(features: &MarketFeatures) -> PanelOutput {
    evaluate_with(features, |i, f| PANEL[i].evaluate(f))
}

/// Evaluate `PANEL_SIZE` lanes of `eval` with the panel's threading contract
pub fn evaluate_with<F>(features: &MarketFeatures, eval: F) -> PanelOutput
where
    F: Fn(usize, &MarketFeatures) -> f64 + Sync,
{
    let mut raw: [Result<f64, StrategyFault>; PANEL_SIZE] = std::array::from_fn(|_| Ok(0.0));

    let scoped = crossbeam::thread::scope(|scope| {
        let concurrent = scope.spawn(|_| eval(0, features));

        for (i, slot) in raw.iter_mut().enumerate().skip(1) {
            *slot = panic::catch_unwind(AssertUnwindSafe(|| eval(i, features)))
                .map_err(|payload| StrategyFault::Panicked(payload_message(payload.as_ref())));
        }

        concurrent
            .join()
            .map_err(|payload| StrategyFault::Panicked(payload_message(payload.as_ref())))
    });

    raw[0] = match scoped {
        Ok(result) => result,
        // Only reachable if the scope itself failed to join a thread
        Err(payload) => Err(StrategyFault::Panicked(payload_message(payload.as_ref()))),
    };

    let mut out = PanelOutput {
        signals: [0.0; PANEL_SIZE],
        faults: Default::default(),
    };

    for (i, result) in raw.into_iter().enumerate() {
        match result {
            Ok(v) if v.is_finite() => out.signals[i] = v,
            Ok(v) => out.faults[i] = Some(StrategyFault::NonFinite(v)),
            Err(fault) => out.faults[i] = Some(fault),
        }
    }

    out
}
