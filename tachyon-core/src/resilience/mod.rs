//! Resilience helpers
//!
//! - Process-wide panic hook that logs through `tracing`
//! - Payload rendering shared with the places that contain worker panics

pub mod panic;

pub use panic::{install_panic_handler, payload_message};
