//! HTTP server for Prometheus metrics export
//!
//! Serves the registry at `/metrics` and a liveness check at `/health`.
//! A sampler task refreshes the registry from the engine's lock-free
//! counters on a fixed period.

use super::metrics::{MetricsRegistry, MetricsSample};
use crate::perf::EngineCounters;
use crate::ringlog::RingLog;
use crate::venue::ConnectionPool;
use anyhow::{Context, Result};
use http_body_util::Full;
use hyper::body::Bytes;
use hyper::header::{HeaderValue, CONTENT_TYPE};
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper::{Request, Response, StatusCode};
use hyper_util::rt::TokioIo;
use prometheus::{Encoder, TextEncoder};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tracing::{debug, error, info, warn};

const METRICS_PATH: &str = "/metrics";

/// HTTP server for Prometheus metrics
pub struct MetricsServer {
    listen_addr: SocketAddr,
    registry: Arc<MetricsRegistry>,
}

impl MetricsServer {
    pub fn new(listen_addr: SocketAddr, registry: Arc<MetricsRegistry>) -> Self {
        Self {
            listen_addr,
            registry,
        }
    }

    /// Runs until the task is dropped; spawn it on a tokio runtime
    pub async fn serve(self) -> Result<()> {
        let listener = TcpListener::bind(&self.listen_addr)
            .await
            .with_context(|| format!("Failed to bind metrics server on {}", self.listen_addr))?;

        info!(
            "Metrics server listening on http://{}{}",
            self.listen_addr, METRICS_PATH
        );

        loop {
            let (stream, remote_addr) = match listener.accept().await {
                Ok(conn) => conn,
                Err(e) => {
                    error!("Failed to accept connection: {}", e);
                    continue;
                }
            };

            let registry = Arc::clone(&self.registry);

            tokio::spawn(async move {
                let io = TokioIo::new(stream);

                let service = service_fn(move |req: Request<hyper::body::Incoming>| {
                    let registry = Arc::clone(&registry);
                    async move { Ok::<_, hyper::Error>(route(req.uri().path(), &registry)) }
                });

                if let Err(err) = http1::Builder::new().serve_connection(io, service).await {
                    debug!("Connection error from {}: {}", remote_addr, err);
                }
            });
        }
    }
}

fn respond(status: StatusCode, body: impl Into<Bytes>) -> Response<Full<Bytes>> {
    let mut response = Response::new(Full::new(body.into()));
    *response.status_mut() = status;
    response
}

fn route(path: &str, registry: &MetricsRegistry) -> Response<Full<Bytes>> {
    debug!("Metrics request: {}", path);

    match path {
        "/health" | "/healthz" => respond(StatusCode::OK, "OK"),
        METRICS_PATH => match encode_metrics(registry) {
            Ok(text) => {
                let mut response = respond(StatusCode::OK, text);
                response.headers_mut().insert(
                    CONTENT_TYPE,
                    HeaderValue::from_static("text/plain; version=0.0.4"),
                );
                response
            }
            Err(e) => {
                error!("Failed to encode metrics: {}", e);
                respond(StatusCode::INTERNAL_SERVER_ERROR, format!("Error: {}", e))
            }
        },
        _ => {
            warn!("Unknown metrics endpoint requested: {}", path);
            respond(StatusCode::NOT_FOUND, "Not Found")
        }
    }
}

/// Encode metrics to Prometheus text format
pub fn encode_metrics(registry: &MetricsRegistry) -> Result<String> {
    let encoder = TextEncoder::new();
    let metric_families = registry.registry().gather();

    let mut buffer = Vec::new();
    encoder
        .encode(&metric_families, &mut buffer)
        .context("Failed to encode metrics")?;

    String::from_utf8(buffer).context("Invalid UTF-8 in metrics")
}

/// Copies engine, logger and pool state into the registry
pub struct MetricsSampler {
    registry: Arc<MetricsRegistry>,
    counters: Arc<EngineCounters>,
    log: Arc<RingLog>,
    pool: Arc<ConnectionPool>,
}

impl MetricsSampler {
    pub fn new(
        registry: Arc<MetricsRegistry>,
        counters: Arc<EngineCounters>,
        log: Arc<RingLog>,
        pool: Arc<ConnectionPool>,
    ) -> Self {
        Self {
            registry,
            counters,
            log,
            pool,
        }
    }

    /// Expired pool entries are pruned first so `cached` counts live connections
    pub fn sample(&self) {
        let pruned = self.pool.prune();
        if pruned > 0 {
            debug!("Pruned {} expired connections", pruned);
        }
        self.registry.observe(&MetricsSample {
            counters: self.counters.snapshot(),
            exposure: self.counters.exposure(),
            ringlog: self.log.stats(),
            pool: self.pool.stats(),
        });
    }

    /// Sample every `period` until the task is dropped
    pub async fn run(self, period: Duration) {
        let mut ticker = tokio::time::interval(period);
        loop {
            ticker.tick().await;
            self.sample();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::LoggerConfig;
    use crate::core::Exchange;
    use http_body_util::BodyExt;
    use std::io;

    fn registry() -> Arc<MetricsRegistry> {
        Arc::new(MetricsRegistry::new().unwrap())
    }

    async fn body_text(response: Response<Full<Bytes>>) -> String {
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        String::from_utf8(bytes.to_vec()).unwrap()
    }

    #[tokio::test]
    async fn test_routes() {
        let registry = registry();
        registry.engine().cycles_total.inc_by(3);

        let health = route("/health", &registry);
        assert_eq!(health.status(), StatusCode::OK);
        assert_eq!(body_text(health).await, "OK");

        let metrics = route("/metrics", &registry);
        assert_eq!(metrics.status(), StatusCode::OK);
        assert_eq!(
            metrics.headers()[CONTENT_TYPE],
            "text/plain; version=0.0.4"
        );
        let text = body_text(metrics).await;
        assert!(text.contains("tachyon_engine_cycles_total 3"));
        assert!(text.contains("# TYPE"));

        assert_eq!(route("/nope", &registry).status(), StatusCode::NOT_FOUND);
    }

    #[test]
    fn test_sampler_copies_live_state() {
        let registry = registry();
        let counters = Arc::new(EngineCounters::new());
        let log = Arc::new(
            RingLog::with_sink(
                io::sink(),
                &LoggerConfig {
                    capacity: 64,
                    lower_priority: false,
                    pin_to_last_core: false,
                    ..LoggerConfig::default()
                },
            )
            .unwrap(),
        );
        let pool = Arc::new(ConnectionPool::default());

        counters.inc_cycles();
        counters.inc_orders_sent();
        counters.set_exposure(1_000.0);

        let sampler = MetricsSampler::new(Arc::clone(&registry), counters, log, pool);
        sampler.sample();

        assert_eq!(registry.engine().cycles_total.get(), 1);
        assert_eq!(registry.engine().orders_sent_total.get(), 1);
        assert_eq!(registry.engine().exposure.get(), 1_000.0);
        assert!(encode_metrics(&registry).unwrap().contains("tachyon_ringlog_dropped_total 0"));
    }

    #[test]
    fn test_sample_prunes_expired_connections() {
        let registry = registry();
        let log = Arc::new(
            RingLog::with_sink(
                io::sink(),
                &LoggerConfig {
                    capacity: 64,
                    lower_priority: false,
                    pin_to_last_core: false,
                    ..LoggerConfig::default()
                },
            )
            .unwrap(),
        );
        let pool = Arc::new(ConnectionPool::default());
        let live = pool.best_for_venue(Exchange::Nyse, true).unwrap();
        drop(pool.best_for_venue(Exchange::Cme, true).unwrap());
        assert_eq!(pool.stats().cached, 2);

        let sampler = MetricsSampler::new(
            Arc::clone(&registry),
            Arc::new(EngineCounters::new()),
            log,
            Arc::clone(&pool),
        );
        sampler.sample();
        assert_eq!(pool.stats().cached, 1);

        drop(live);
        sampler.sample();
        assert_eq!(pool.stats().cached, 0);
    }

    #[tokio::test]
    async fn test_bind_failure_is_reported() {
        let taken = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = taken.local_addr().unwrap();

        let result = MetricsServer::new(addr, registry()).serve().await;
        assert!(result.is_err());
    }
}
