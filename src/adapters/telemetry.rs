//! Query Telemetry - Prometheus Exposition of Provider Calls
//!
//! Counts queries and health checks per backend and outcome, and
//! records query latency. Exposed on `/metrics` for scraping.
//!
//! Only counters and latency histograms are kept; query values are
//! never stored.

use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;
use axum::http::StatusCode;
use axum::routing::get;
use axum::Router;
use prometheus::{Encoder, HistogramOpts, HistogramVec, IntCounterVec, Opts, Registry, TextEncoder};
use tokio::sync::broadcast;
use tracing::{info, instrument, warn};

use crate::domain::error::ProviderResult;
use crate::domain::provider::ProviderType;
use crate::ports::metrics_provider::MetricsProvider;

/// Prometheus metrics for provider calls.
///
/// Metric names are prefixed `canary_metrics_` and labelled with the
/// backend kind.
pub struct MetricsRegistry {
    /// Prometheus registry.
    registry: Registry,
    /// Queries by backend and outcome (`ok`, `no_data`, `backend`, ...).
    pub queries: IntCounterVec,
    /// Query latency in seconds.
    pub query_duration: HistogramVec,
    /// Health checks by backend and outcome (`online`, `offline`, `error`).
    pub health_checks: IntCounterVec,
}

impl MetricsRegistry {
    /// Create and register all metrics.
    pub fn new() -> anyhow::Result<Self> {
        let registry = Registry::new();

        let queries = IntCounterVec::new(
            Opts::new("canary_metrics_queries_total", "Metric queries executed"),
            &["provider", "outcome"],
        )?;

        let query_duration = HistogramVec::new(
            HistogramOpts::new(
                "canary_metrics_query_duration_seconds",
                "Metric query latency in seconds",
            )
            .buckets(vec![0.01, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0]),
            &["provider"],
        )?;

        let health_checks = IntCounterVec::new(
            Opts::new("canary_metrics_health_checks_total", "Provider health checks executed"),
            &["provider", "outcome"],
        )?;

        registry.register(Box::new(queries.clone()))?;
        registry.register(Box::new(query_duration.clone()))?;
        registry.register(Box::new(health_checks.clone()))?;

        Ok(Self {
            registry,
            queries,
            query_duration,
            health_checks,
        })
    }

    /// Render all metrics in the Prometheus text format.
    pub fn render(&self) -> anyhow::Result<String> {
        let encoder = TextEncoder::new();
        let mut buffer = Vec::new();
        encoder.encode(&self.registry.gather(), &mut buffer)?;
        Ok(String::from_utf8(buffer)?)
    }

    /// Serve `/metrics` on `bind_address` until shutdown.
    #[instrument(skip(self, shutdown_rx))]
    pub async fn serve(
        self: Arc<Self>,
        bind_address: String,
        mut shutdown_rx: broadcast::Receiver<()>,
    ) -> anyhow::Result<()> {
        let metrics_self = Arc::clone(&self);

        let app = Router::new().route(
            "/metrics",
            get(move || {
                let metrics = Arc::clone(&metrics_self);
                async move {
                    match metrics.render() {
                        Ok(text) => (StatusCode::OK, text),
                        Err(e) => {
                            warn!(error = %e, "Failed to encode metrics");
                            (StatusCode::INTERNAL_SERVER_ERROR, String::new())
                        }
                    }
                }
            }),
        );

        let listener = tokio::net::TcpListener::bind(&bind_address).await?;
        info!(address = %bind_address, "Metrics server started");

        axum::serve(listener, app)
            .with_graceful_shutdown(async move {
                let _ = shutdown_rx.recv().await;
            })
            .await?;

        Ok(())
    }
}

/// Decorator recording telemetry around any provider.
pub struct InstrumentedProvider<P> {
    inner: P,
    metrics: Arc<MetricsRegistry>,
}

impl<P: MetricsProvider> InstrumentedProvider<P> {
    /// Wrap `inner`, recording into `metrics`.
    pub const fn new(inner: P, metrics: Arc<MetricsRegistry>) -> Self {
        Self { inner, metrics }
    }

    /// The wrapped provider.
    pub const fn inner(&self) -> &P {
        &self.inner
    }
}

#[async_trait]
impl<P: MetricsProvider> MetricsProvider for InstrumentedProvider<P> {
    async fn run_query(&self, query: &str) -> ProviderResult<f64> {
        let provider = self.inner.kind().as_str();
        let started = Instant::now();

        let result = self.inner.run_query(query).await;

        self.metrics
            .query_duration
            .with_label_values(&[provider])
            .observe(started.elapsed().as_secs_f64());
        let outcome = result.as_ref().map_or_else(|e| e.kind(), |_| "ok");
        self.metrics
            .queries
            .with_label_values(&[provider, outcome])
            .inc();

        result
    }

    async fn is_online(&self) -> ProviderResult<bool> {
        let result = self.inner.is_online().await;

        let outcome = match &result {
            Ok(true) => "online",
            Ok(false) => "offline",
            Err(_) => "error",
        };
        self.metrics
            .health_checks
            .with_label_values(&[self.inner.kind().as_str(), outcome])
            .inc();

        result
    }

    fn kind(&self) -> ProviderType {
        self.inner.kind()
    }
}
