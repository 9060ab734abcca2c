//! Hybrid signal engine
//!
//! - `features`: GARCH volatility, return window, feature builder
//! - `panel`: concurrent strategy panel evaluation
//! - `confidence`: EWMA confidence tracking and blending
//! - `execution`: order sizing and execution outcomes
//! - `risk`: exposure accounting and limit checks
//! - `signal_engine`: the decision loop tying it together

pub mod confidence;
pub mod execution;
pub mod features;
pub mod panel;
pub mod risk;
pub mod signal_engine;

pub use confidence::{confidence_threshold, BlendResult, ConfidenceTracker, MaskedSums};
pub use execution::{ExecutionPlan, ExecutionReport, ExecutionStatus};
pub use features::{FeatureBuilder, GarchVolatility, ReturnWindow};
pub use panel::{evaluate_panel, PanelOutput, StrategyFault};
pub use risk::{ExposureTracker, RiskViolation};
pub use signal_engine::{CycleOutcome, EngineStats, SignalEngine};
