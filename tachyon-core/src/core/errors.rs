//! Domain-specific error types
//!
//! Only construction-time failures are surfaced as errors. Hot-path failures
//! (full ring buffer, unhealthy venue, risk violation, oracle outage) are
//! absorbed locally and reported as counters or log lines instead.

use std::path::PathBuf;
use thiserror::Error;

/// Errors raised while setting up the asynchronous logger
#[derive(Debug, Error)]
pub enum RingLogError {
    /// Ring capacity must be a power of two and at least 2
    #[error("ring capacity {capacity} must be a power of two >= 2")]
    InvalidCapacity { capacity: usize },

    /// The log sink could not be opened
    #[error("failed to open log sink {path:?}: {source}")]
    SinkOpen {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The drainer thread could not be spawned
    #[error("failed to spawn log drainer thread: {0}")]
    Spawn(#[source] std::io::Error),
}

/// Errors raised while constructing venue connections
#[derive(Debug, Error)]
pub enum VenueError {
    /// Mapping the shared-memory segment failed
    #[error("failed to map shared-memory segment of {bytes} bytes: {source}")]
    SharedMemory {
        bytes: usize,
        #[source]
        source: std::io::Error,
    },
}

/// Errors reported by a scoring oracle
#[derive(Debug, Error)]
pub enum OracleError {
    /// Model artifacts could not be loaded
    #[error("failed to load models from {path:?}: {reason}")]
    ModelLoad { path: PathBuf, reason: String },
}

/// Configuration validation failures
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConfigError {
    #[error("invalid {field}: {reason}")]
    Invalid { field: &'static str, reason: String },
}

impl ConfigError {
    pub(crate) fn invalid(field: &'static str, reason: impl Into<String>) -> Self {
        ConfigError::Invalid {
            field,
            reason: reason.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ring_capacity_error_display() {
        let err = RingLogError::InvalidCapacity { capacity: 1000 };
        let msg = format!("{}", err);
        assert!(msg.contains("1000"));
        assert!(msg.contains("power of two"));
    }

    #[test]
    fn test_sink_open_error_keeps_source() {
        use std::error::Error as _;

        let err = RingLogError::SinkOpen {
            path: PathBuf::from("/nonexistent/trading_log.txt"),
            source: std::io::Error::new(std::io::ErrorKind::NotFound, "missing"),
        };
        assert!(err.source().is_some());
        assert!(format!("{}", err).contains("trading_log.txt"));
    }

    #[test]
    fn test_config_error_display() {
        let err = ConfigError::invalid("engine.alpha", "must be in (0, 1]");
        assert_eq!(format!("{}", err), "invalid engine.alpha: must be in (0, 1]");
    }
}
