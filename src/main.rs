//! Canary Metrics Probe - Entry Point
//!
//! Runs the configured metric checks against their providers on every
//! metric interval and logs each value. Runs until SIGINT, or for a
//! single pass with `probe.run_once`.
//!
//! Wiring sequence:
//! 1. Load canary-metrics.toml + validate
//! 2. Init tracing (JSON structured logging)
//! 3. Resolve provider credentials from env vars
//! 4. Build each provider through the factory (wrapped with telemetry)
//! 5. Spawn metrics server (/metrics)
//! 6. Run the probe every interval until SIGINT

use std::collections::HashMap;
use std::sync::Arc;

use anyhow::{Context, Result};
use tokio::signal;
use tokio::sync::broadcast;
use tracing::{error, info, warn};

use canary_metrics::adapters::telemetry::{InstrumentedProvider, MetricsRegistry};
use canary_metrics::config::loader::{self, CONFIG_PATH_ENV, DEFAULT_CONFIG_PATH};
use canary_metrics::config::AppConfig;
use canary_metrics::domain::MetricInterval;
use canary_metrics::ports::MetricsProvider;
use canary_metrics::usecases::{Check, CheckOutcome, MetricsProbe, ProviderFactory};

#[tokio::main]
async fn main() -> Result<()> {
    // ── 1. Load configuration ───────────────────────────────
    let config_path =
        std::env::var(CONFIG_PATH_ENV).unwrap_or_else(|_| DEFAULT_CONFIG_PATH.to_string());
    let config = loader::load_config(&config_path).context("Failed to load configuration")?;

    // ── 2. Initialize structured JSON logging ───────────────
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&config.probe.log_level)),
        )
        .json()
        .init();

    // The loader runs before the subscriber exists, so the summary is logged here.
    info!(
        name = %config.probe.name,
        version = env!("CARGO_PKG_VERSION"),
        config = %config_path,
        providers = config.providers.len(),
        checks = config.checks.len(),
        interval = %config.probe.interval,
        run_once = config.probe.run_once,
        "Configuration loaded, starting canary metrics probe"
    );

    let interval = MetricInterval::parse(&config.probe.interval)
        .context("Invalid probe interval")?;

    // ── 3-4. Build providers ────────────────────────────────
    let telemetry = Arc::new(MetricsRegistry::new().context("Failed to create metrics registry")?);
    let providers = build_providers(&config, &interval, &telemetry).await?;

    let checks: Vec<Check> = config.checks.iter().map(Check::from).collect();
    let probe = MetricsProbe::new(providers, checks);

    // ── 5. Metrics server ───────────────────────────────────
    let (shutdown_tx, _shutdown_rx) = broadcast::channel::<()>(1);
    let metrics_handle = if config.metrics.enabled && !config.probe.run_once {
        let shutdown_rx = shutdown_tx.subscribe();
        let bind = config.metrics.bind_address.clone();
        let registry = Arc::clone(&telemetry);
        Some(tokio::spawn(async move {
            if let Err(e) = registry.serve(bind, shutdown_rx).await {
                error!(error = %e, "Metrics server failed");
            }
        }))
    } else {
        None
    };

    // ── 6. Probe loop ───────────────────────────────────────
    if config.probe.run_once {
        let reports = probe.run().await;
        let failed = reports
            .iter()
            .filter(|r| !matches!(r.outcome, CheckOutcome::Value(_)))
            .count();
        info!(checks = reports.len(), failed, "Probe pass complete");
        anyhow::ensure!(failed == 0, "{failed} check(s) returned no value");
        return Ok(());
    }

    let period = interval.as_duration().max(std::time::Duration::from_secs(1));
    let mut ticker = tokio::time::interval(period);

    loop {
        tokio::select! {
            _ = signal::ctrl_c() => {
                info!("SIGINT received, shutting down");
                break;
            }
            _ = ticker.tick() => {
                let reports = probe.run().await;
                info!(checks = reports.len(), "Probe pass complete");
            }
        }
    }

    let _ = shutdown_tx.send(());
    if let Some(handle) = metrics_handle {
        let _ = tokio::time::timeout(std::time::Duration::from_secs(5), handle).await;
    }

    info!("Shutdown complete");
    Ok(())
}

/// Build every configured provider, wrapped with telemetry.
///
/// A provider whose construction fails aborts startup: a probe with a
/// silently missing backend would report misleading results.
async fn build_providers(
    config: &AppConfig,
    interval: &MetricInterval,
    telemetry: &Arc<MetricsRegistry>,
) -> Result<HashMap<String, Arc<dyn MetricsProvider>>> {
    let factory = ProviderFactory::new();
    let mut providers: HashMap<String, Arc<dyn MetricsProvider>> = HashMap::new();

    for entry in &config.providers {
        let credentials = loader::resolve_credentials(entry)?;
        let provider = factory
            .provider(&interval.to_string(), &entry.provider_config(), &credentials)
            .await
            .with_context(|| format!("Failed to construct provider '{}'", entry.name))?;

        info!(provider = %entry.name, kind = %provider.kind(), "Provider ready");
        if config.checks.iter().all(|c| c.provider != entry.name) {
            warn!(provider = %entry.name, "Provider has no checks");
        }

        providers.insert(
            entry.name.clone(),
            Arc::new(InstrumentedProvider::new(provider, Arc::clone(telemetry))),
        );
    }

    Ok(providers)
}
