//! Testing utilities shared by unit tests, integration tests and benches
//!
//! Provides scripted implementations of the engine's seams:
//! - ScriptedOracle: fixed oracle answers, records feedback
//! - ScriptedMarketData: programmable return sequence
//! - SharedBuffer: in-memory log sink
//! - Feature record builders

pub mod helpers;

pub use helpers::*;
