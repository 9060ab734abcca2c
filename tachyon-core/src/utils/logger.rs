use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Initialize the `tracing` subscriber for cold-path events
///
/// `RUST_LOG` wins over `log_level` when set. Calling this twice is a no-op
/// for the second call.
pub fn init_logger(log_level: &str, json_logs: bool) {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(log_level));

    let result = if json_logs {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(fmt::layer().json().with_thread_names(true))
            .try_init()
    } else {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(fmt::layer().with_target(true).with_thread_names(true))
            .try_init()
    };

    if let Err(e) = result {
        tracing::debug!("Logger already initialized: {}", e);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_init_twice_is_harmless() {
        init_logger("debug", false);
        init_logger("info", true);
        tracing::info!("still logging");
    }
}
