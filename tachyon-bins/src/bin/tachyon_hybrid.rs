//! Hybrid Signal Engine against a Synthetic Feed
//!
//! This binary combines:
//! - The six-strategy panel blended with a scoring oracle
//! - SyntheticMarketData (seeded, reproducible)
//! - RingLog decision log and pooled venue connections
//!
//! Runs until Ctrl-C or the cycle limit, then prints final statistics.

#[cfg(all(feature = "jemalloc", not(target_env = "msvc")))]
#[global_allocator]
static GLOBAL: tikv_jemallocator::Jemalloc = tikv_jemallocator::Jemalloc;

use anyhow::{Context, Result};
use clap::Parser;
use std::sync::Arc;
use tachyon_bins::common::{
    install_shutdown_handler, load_config, print_stats, setup_performance, start_metrics,
    CommonArgs,
};
use tachyon_core::data::SyntheticMarketData;
use tachyon_core::oracle::{NeutralOracle, ScoringOracle};
use tachyon_core::resilience::install_panic_handler;
use tachyon_core::utils::init_logger;
use tachyon_core::{ConnectionPool, OrderIdSequence, RingLog, SignalEngine};

fn main() -> Result<()> {
    let args = CommonArgs::parse();
    let config = load_config(&args)?;

    init_logger(&config.metrics.log_level, config.metrics.json_logs);
    install_panic_handler();

    tracing::info!("=== Tachyon: Hybrid Signal Engine + Synthetic Feed ===");
    tracing::info!(
        "Venue: {} {}, seed {}",
        config.engine.exchange,
        config.engine.symbol,
        args.seed
    );

    setup_performance(args.cpu_core, args.realtime)?;

    let log = Arc::new(RingLog::open(&config.logger).context("Failed to open decision log")?);
    let pool = Arc::new(ConnectionPool::new(config.venue.clone()));
    let order_ids = Arc::new(OrderIdSequence::new());

    let mut oracle = NeutralOracle;
    if let Some(models) = &args.models {
        oracle
            .load_models(models)
            .with_context(|| format!("Failed to load models from {}", models.display()))?;
    }

    let mut engine = SignalEngine::new(
        config.engine.clone(),
        oracle,
        SyntheticMarketData::new(args.seed),
        Arc::clone(&log),
        Arc::clone(&pool),
        order_ids,
    );
    install_shutdown_handler(engine.shutdown_handle());

    let metrics = start_metrics(
        &config.metrics,
        engine.counters(),
        Arc::clone(&log),
        Arc::clone(&pool),
    )?;

    tracing::info!("Starting engine...");
    let stats = engine.run(args.cycles);
    drop(engine);

    print_stats(&stats, &log.stats(), &pool.stats())?;

    // The sampler holds a log handle; stop it before the final drain
    drop(metrics);
    let dropped = log.dropped_count();
    drop(log);

    tracing::info!(
        "Decision log closed: {} ({} dropped)",
        config.logger.path.display(),
        dropped
    );
    Ok(())
}
