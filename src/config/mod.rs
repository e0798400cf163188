//! Configuration Module - TOML-based Probe Configuration
//!
//! Loads and validates the provider and check definitions from
//! `canary-metrics.toml`. Secrets never live in the file: each
//! provider names the environment variables its credentials are
//! read from.

pub mod loader;

use std::collections::BTreeMap;

use serde::Deserialize;

use crate::domain::provider::ProviderConfig;
use crate::usecases::probe::Check;

/// Top-level configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
  /// Probe identity and schedule.
  pub probe: ProbeConfig,
  /// Metrics backends, referenced by name from checks.
  pub providers: Vec<ProviderEntry>,
  /// Queries to run.
  #[serde(default)]
  pub checks: Vec<CheckConfig>,
  /// Telemetry exposition.
  #[serde(default)]
  pub metrics: MetricsConfig,
}

/// Probe identity and schedule.
#[derive(Debug, Clone, Deserialize)]
pub struct ProbeConfig {
  /// Human-readable name, used in logs.
  pub name: String,
  /// Log level (trace, debug, info, warn, error).
  #[serde(default = "default_log_level")]
  pub log_level: String,
  /// Metric interval: sizes provider lookback windows and paces the
  /// probe loop.
  #[serde(default = "default_interval")]
  pub interval: String,
  /// Run a single pass and exit.
  #[serde(default)]
  pub run_once: bool,
}

/// One metrics backend.
#[derive(Debug, Clone, Deserialize)]
pub struct ProviderEntry {
  /// Name checks refer to.
  pub name: String,
  /// Backend type (`prometheus`, `datadog`, `cloudwatch`).
  #[serde(rename = "type", default)]
  pub provider_type: String,
  /// Backend address; empty means the backend default.
  #[serde(default)]
  pub address: String,
  /// Credential key -> environment variable holding the secret.
  #[serde(default)]
  pub credentials_env: BTreeMap<String, String>,
}

impl ProviderEntry {
  /// The factory-facing provider config.
  pub fn provider_config(&self) -> ProviderConfig {
    ProviderConfig::new(self.provider_type.clone(), self.address.clone())
  }
}

/// One named query.
#[derive(Debug, Clone, Deserialize)]
pub struct CheckConfig {
  /// Check name.
  pub name: String,
  /// Provider name.
  pub provider: String,
  /// Backend-specific query.
  pub query: String,
}

impl From<&CheckConfig> for Check {
  fn from(config: &CheckConfig) -> Self {
    Self {
      name: config.name.clone(),
      provider: config.provider.clone(),
      query: config.query.clone(),
    }
  }
}

/// Telemetry exposition configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct MetricsConfig {
  /// Serve `/metrics`.
  #[serde(default = "default_true")]
  pub enabled: bool,
  /// Metrics server bind address.
  #[serde(default = "default_metrics_addr")]
  pub bind_address: String,
}

impl Default for MetricsConfig {
  fn default() -> Self {
    Self {
      enabled: default_true(),
      bind_address: default_metrics_addr(),
    }
  }
}

// Default value functions for serde

fn default_log_level() -> String {
  "info".to_string()
}

fn default_interval() -> String {
  "1m".to_string()
}

const fn default_true() -> bool {
  true
}

fn default_metrics_addr() -> String {
  "0.0.0.0:9090".to_string()
}
