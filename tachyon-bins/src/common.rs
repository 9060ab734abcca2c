//! Common utilities for all binaries
//!
//! Shared initialization, CLI parsing, and setup code.

use anyhow::{Context, Result};
use clap::Parser;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tachyon_core::config::{MetricsConfig, TachyonConfig};
use tachyon_core::monitoring::{MetricsRegistry, MetricsSampler, MetricsServer};
use tachyon_core::perf::EngineCounters;
use tachyon_core::ringlog::RingLogStats;
use tachyon_core::venue::PoolStats;
use tachyon_core::{ConnectionPool, EngineStats, RingLog};
use tokio::runtime::Runtime;

const DEFAULT_CONFIG: &str = "config/default.toml";
const METRICS_SAMPLE_PERIOD: Duration = Duration::from_secs(1);

/// Common CLI arguments for all binaries
#[derive(Parser, Debug)]
#[command(author, version, about)]
pub struct CommonArgs {
    /// TOML configuration file (defaults to config/default.toml when present)
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Stop after this many decision cycles (runs until Ctrl-C otherwise)
    #[arg(short = 'n', long)]
    pub cycles: Option<u64>,

    /// Decision log file, overrides logger.path
    #[arg(long)]
    pub log_file: Option<PathBuf>,

    /// Seed of the synthetic market data feed
    #[arg(long, default_value = "42")]
    pub seed: u64,

    /// Model directory handed to the scoring oracle
    #[arg(long)]
    pub models: Option<PathBuf>,

    /// CPU core to pin the decision thread to
    #[arg(short = 'c', long)]
    pub cpu_core: Option<usize>,

    /// Enable real-time priority (requires privileges)
    #[arg(long)]
    pub realtime: bool,

    /// Serve Prometheus metrics, overrides metrics.enable_prometheus
    #[arg(long)]
    pub metrics: bool,

    /// Log level, overrides metrics.log_level
    #[arg(short, long)]
    pub log_level: Option<String>,

    /// JSON log output, overrides metrics.json_logs
    #[arg(long)]
    pub json_logs: bool,
}

/// Load the configuration file and fold the CLI overrides into it
pub fn load_config(args: &CommonArgs) -> Result<TachyonConfig> {
    let mut config = match &args.config {
        Some(path) => TachyonConfig::load(path)?,
        None if Path::new(DEFAULT_CONFIG).exists() => TachyonConfig::load_default()?,
        None => TachyonConfig::default(),
    };

    if let Some(path) = &args.log_file {
        config.logger.path = path.clone();
    }
    if let Some(level) = &args.log_level {
        config.metrics.log_level = level.clone();
    }
    config.metrics.json_logs |= args.json_logs;
    config.metrics.enable_prometheus |= args.metrics;

    config.validate().context("Invalid configuration after CLI overrides")?;
    Ok(config)
}

/// Setup CPU affinity and real-time priority
pub fn setup_performance(cpu_core: Option<usize>, realtime: bool) -> Result<()> {
    #[cfg(target_os = "linux")]
    if let (Some(core), true) = (cpu_core, realtime) {
        return tachyon_core::perf::optimize_for_hft(core, 50);
    }

    if let Some(core) = cpu_core {
        tachyon_core::perf::cpu::pin_to_core(core)?;
        tracing::info!("Pinned to CPU core {}", core);
    }

    #[cfg(target_os = "linux")]
    if realtime {
        tachyon_core::perf::cpu::set_realtime_priority(50)?;
        tracing::info!("Enabled real-time priority");
    }

    #[cfg(not(target_os = "linux"))]
    if realtime {
        tracing::warn!("Real-time priority only supported on Linux");
    }

    Ok(())
}

/// Ctrl-C sets `shutdown`; the engine stops at the next cycle boundary
pub fn install_shutdown_handler(shutdown: Arc<AtomicBool>) {
    if let Err(e) = ctrlc::set_handler(move || {
        tracing::warn!("Received shutdown signal");
        shutdown.store(true, Ordering::Release);
    }) {
        tracing::warn!("Failed to set Ctrl-C handler: {}. Shutdown via cycle limit only.", e);
    }
}

/// Start the metrics server and sampler on a small runtime of their own
///
/// Returns `None` when Prometheus export is disabled. Dropping the runtime
/// stops both tasks.
pub fn start_metrics(
    config: &MetricsConfig,
    counters: Arc<EngineCounters>,
    log: Arc<RingLog>,
    pool: Arc<ConnectionPool>,
) -> Result<Option<Runtime>> {
    if !config.enable_prometheus {
        return Ok(None);
    }

    let addr: SocketAddr = config
        .listen_addr
        .parse()
        .with_context(|| format!("Invalid metrics listen address {}", config.listen_addr))?;

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .worker_threads(1)
        .thread_name("tachyon-metrics")
        .enable_all()
        .build()
        .context("Failed to build metrics runtime")?;

    let registry = Arc::new(
        MetricsRegistry::new()
            .map_err(|e| anyhow::anyhow!("Failed to create metrics registry: {}", e))?,
    );
    let sampler = MetricsSampler::new(Arc::clone(&registry), counters, log, pool);
    let server = MetricsServer::new(addr, registry);

    runtime.spawn(sampler.run(METRICS_SAMPLE_PERIOD));
    runtime.spawn(async move {
        if let Err(e) = server.serve().await {
            tracing::error!("Metrics server stopped: {:#}", e);
        }
    });

    Ok(Some(runtime))
}

/// Print final statistics
pub fn print_stats(stats: &EngineStats, log: &RingLogStats, pool: &PoolStats) -> Result<()> {
    let c = &stats.counters;

    tracing::info!("=== Final Statistics ===");
    tracing::info!("Cycles: {}", c.cycles);
    tracing::info!("Signals past gate: {}", c.signals);
    tracing::info!(
        "Orders sent: {} (filled {}, unfilled {})",
        c.orders_sent,
        c.orders_filled,
        c.orders_unfilled
    );
    tracing::info!(
        "Suppressed: {}, cancelled: {}, holds: {}",
        c.suppressed,
        c.cancelled,
        c.holds
    );
    tracing::info!("Final exposure: {:.2}", stats.final_exposure);
    tracing::info!("Average cycle: {:.0}ns", c.avg_cycle_ns());

    if c.strategy_faults > 0 || c.oracle_overruns > 0 {
        tracing::warn!(
            "Strategy faults: {}, oracle overruns: {}",
            c.strategy_faults,
            c.oracle_overruns
        );
    }

    tracing::info!(
        "Pool: {} hits, {} misses, {} reconnects",
        pool.hits,
        pool.misses,
        pool.reconnects
    );

    let report = serde_json::json!({
        "engine": stats,
        "ringlog": log,
        "pool": pool,
    });
    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}
