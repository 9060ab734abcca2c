//! Shared setup for the Tachyon binaries

pub mod common;
