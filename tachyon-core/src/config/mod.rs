pub mod constants;
pub mod types;

pub use types::*;

use crate::core::ConfigError;
use anyhow::{Context, Result};
use ::config::{Config as ConfigLoader, Environment, File, FileFormat};
use std::net::SocketAddr;
use std::path::Path;

impl TachyonConfig {
    /// Load configuration from file with optional environment variable overrides
    ///
    /// Environment overrides use the `TACHYON_` prefix and `__` as the section
    /// separator, e.g. `TACHYON_ENGINE__MAX_EXPOSURE=5000`.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let config_path = path.as_ref();

        let config = ConfigLoader::builder()
            // Load from TOML file
            .add_source(File::from(config_path))
            // Override with environment variables (TACHYON_)
            .add_source(
                Environment::with_prefix("TACHYON")
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()
            .context("Failed to build configuration")?;

        Self::finish(config)
    }

    /// Load from default location (./config/default.toml)
    pub fn load_default() -> Result<Self> {
        Self::load("config/default.toml")
    }

    /// Parse an in-memory TOML document (no environment overrides)
    pub fn from_toml_str(toml: &str) -> Result<Self> {
        let config = ConfigLoader::builder()
            .add_source(File::from_str(toml, FileFormat::Toml))
            .build()
            .context("Failed to build configuration")?;

        Self::finish(config)
    }

    fn finish(config: ConfigLoader) -> Result<Self> {
        // Deserialize into TachyonConfig; absent keys take the compiled defaults
        let cfg: TachyonConfig = config
            .try_deserialize()
            .context("Failed to deserialize configuration")?;

        // Validate configuration
        cfg.validate()?;

        Ok(cfg)
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<(), ConfigError> {
        let engine = &self.engine;

        if !(engine.alpha > 0.0 && engine.alpha <= 1.0) {
            return Err(ConfigError::invalid("engine.alpha", "must be in (0, 1]"));
        }

        if !(engine.min_weight >= 0.0) {
            return Err(ConfigError::invalid("engine.min_weight", "must be non-negative"));
        }

        if !(engine.max_order_size >= 1.0) {
            return Err(ConfigError::invalid("engine.max_order_size", "must be at least 1"));
        }

        if !(engine.max_exposure > 0.0) {
            return Err(ConfigError::invalid("engine.max_exposure", "must be positive"));
        }

        if !(engine.vol_limit > 0.0) {
            return Err(ConfigError::invalid("engine.vol_limit", "must be positive"));
        }

        if !(engine.garch_omega > 0.0) || engine.garch_alpha < 0.0 || engine.garch_beta < 0.0 {
            return Err(ConfigError::invalid(
                "engine.garch",
                "omega must be positive, alpha and beta non-negative",
            ));
        }

        if engine.garch_alpha + engine.garch_beta >= 1.0 {
            return Err(ConfigError::invalid(
                "engine.garch",
                format!(
                    "alpha + beta = {} is not stationary (must be < 1)",
                    engine.garch_alpha + engine.garch_beta
                ),
            ));
        }

        if !(constants::VOLATILITY_FLOOR..=constants::VOLATILITY_CEILING)
            .contains(&engine.initial_volatility)
        {
            return Err(ConfigError::invalid(
                "engine.initial_volatility",
                "must lie inside the volatility clamp range",
            ));
        }

        if !(engine.min_trade_signal >= 0.0) {
            return Err(ConfigError::invalid("engine.min_trade_signal", "must be non-negative"));
        }

        if engine.symbol.is_empty() {
            return Err(ConfigError::invalid("engine.symbol", "must not be empty"));
        }

        let logger = &self.logger;

        if logger.capacity < 2 || !logger.capacity.is_power_of_two() {
            return Err(ConfigError::invalid(
                "logger.capacity",
                format!("{} is not a power of two >= 2", logger.capacity),
            ));
        }

        if logger.min_sleep_us == 0 || logger.min_sleep_us > logger.max_sleep_us {
            return Err(ConfigError::invalid(
                "logger.sleep",
                "need 0 < min_sleep_us <= max_sleep_us",
            ));
        }

        if logger.spin_yield_threshold > logger.sleep_threshold {
            return Err(ConfigError::invalid(
                "logger.spin_yield_threshold",
                "cannot exceed sleep_threshold",
            ));
        }

        if logger.min_batch == 0 {
            return Err(ConfigError::invalid("logger.min_batch", "must be positive"));
        }

        if self.venue.shared_memory_slots == 0 {
            return Err(ConfigError::invalid("venue.shared_memory_slots", "must be positive"));
        }

        // Validate log level
        let valid_log_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_log_levels.contains(&self.metrics.log_level.as_str()) {
            return Err(ConfigError::invalid(
                "metrics.log_level",
                format!(
                    "'{}' must be one of: {:?}",
                    self.metrics.log_level, valid_log_levels
                ),
            ));
        }

        if self.metrics.listen_addr.parse::<SocketAddr>().is_err() {
            return Err(ConfigError::invalid(
                "metrics.listen_addr",
                format!("'{}' is not a socket address", self.metrics.listen_addr),
            ));
        }

        Ok(())
    }
}
